//! Index overview printed before the session starts.
//!
//! A quick confidence check that syncs landed: backend capacity, the indexes
//! the store knows about, and document/vector counts for the current one.

use anyhow::Result;

use crate::traits::VectorStore;

pub async fn show_stats(store: &dyn VectorStore, current_index: &str) -> Result<()> {
    let stats = store.stats().await?;

    if let Some(backend) = stats.backend {
        println!("Vector store status:");
        println!(
            "Backend: Memory {:.2}%, Storage {:.2}%",
            backend.memory_pct, backend.storage_pct
        );
        println!();
    }

    let indexes = store.list_indexes().await?;
    println!("Available indexes:");
    for index in &indexes {
        println!("  {index}");
    }
    println!();
    println!("Current index: {current_index}");
    println!(
        "Documents: {}, Vectors: {}",
        stats.documents, stats.vectors
    );
    println!();

    Ok(())
}
