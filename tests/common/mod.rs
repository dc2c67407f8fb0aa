//! In-memory fakes and a scripted console shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use issue_harness::console::{Action, Choice, Console, Menu};
use issue_harness::models::{Document, Hit, IndexStats, Message, SourceDocument};
use issue_harness::traits::{CompletionProvider, DocumentSource, VectorStore};

pub fn source_doc(id: &str, body: &str, modified_at: DateTime<Utc>) -> SourceDocument {
    SourceDocument {
        id: id.to_string(),
        body: body.to_string(),
        modified_at,
        created_at: Some(Utc::now()),
        updated_at: None,
        closed_at: None,
    }
}

pub fn hit(id: &str, title: &str, summary: &str) -> Hit {
    Hit {
        id: id.to_string(),
        score: 0.9,
        highlights: Vec::new(),
        content: format!("content of {id}"),
        summary: summary.to_string(),
        title: title.to_string(),
    }
}

/// Document source backed by a mutable in-memory list.
pub struct FakeSource {
    documents: Mutex<Vec<SourceDocument>>,
}

impl FakeSource {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self {
            documents: Mutex::new(documents),
        }
    }

    pub fn set(&self, documents: Vec<SourceDocument>) {
        *self.documents.lock().unwrap() = documents;
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<SourceDocument>> {
        Ok(self.documents.lock().unwrap().clone())
    }

    fn resolve_url(&self, id: &str) -> Option<String> {
        Some(format!("https://tracker.test/issues/{id}"))
    }
}

/// Vector store holding documents in a map, recording every upsert batch and
/// search call.
pub struct FakeStore {
    pub documents: Mutex<HashMap<String, Document>>,
    pub upsert_batches: Mutex<Vec<Vec<String>>>,
    pub searches: Mutex<Vec<(String, usize)>>,
    pub hits: Mutex<Vec<Hit>>,
    pub fail_upsert: AtomicBool,
    pub fail_search: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            upsert_batches: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
            hits: Mutex::new(Vec::new()),
            fail_upsert: AtomicBool::new(false),
            fail_search: AtomicBool::new(false),
        }
    }

    pub fn with_hits(hits: Vec<Hit>) -> Self {
        let store = Self::new();
        *store.hits.lock().unwrap() = hits;
        store
    }

    /// Seed a stored document whose content matches `body`.
    pub fn seed(&self, id: &str, body: &str) {
        self.documents.lock().unwrap().insert(
            id.to_string(),
            Document {
                id: id.to_string(),
                filename: format!("{id}.markdown"),
                content: body.to_string(),
                title: String::new(),
                summary: String::new(),
                created_at: None,
                updated_at: None,
                closed_at: None,
            },
        );
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_batches.lock().unwrap().len()
    }

    pub fn search_offsets(&self) -> Vec<usize> {
        self.searches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, offset)| *offset)
            .collect()
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn ensure_index(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, documents: &[Document]) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            bail!("store rejected the batch");
        }
        let mut ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        ids.sort();
        self.upsert_batches.lock().unwrap().push(ids);
        let mut held = self.documents.lock().unwrap();
        for document in documents {
            held.insert(document.id.clone(), document.clone());
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.lock().unwrap().get(id).cloned())
    }

    async fn search(&self, text: &str, offset: usize) -> Result<Vec<Hit>> {
        if self.fail_search.load(Ordering::SeqCst) {
            bail!("store unreachable");
        }
        self.searches
            .lock()
            .unwrap()
            .push((text.to_string(), offset));
        Ok(self.hits.lock().unwrap().clone())
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            documents: self.documents.lock().unwrap().len() as i64,
            vectors: 0,
            backend: None,
        })
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        Ok(vec!["issues".to_string()])
    }
}

/// Completion provider that counts calls and tracks how many run at once.
pub struct CountingLlm {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub recorded: Mutex<Vec<Vec<Message>>>,
    pub delay: Duration,
    pub fail: AtomicBool,
}

impl CountingLlm {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
            delay: Duration::from_millis(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for CountingLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(messages.to_vec());

        if self.fail.load(Ordering::SeqCst) {
            bail!("model offline");
        }

        let user: String = messages
            .last()
            .map(|m| m.content.chars().take(32).collect())
            .unwrap_or_default();
        Ok(format!("reply::{user}"))
    }
}

/// Console driven by a pre-recorded input script; everything printed lands in
/// the transcript.
pub enum Input {
    Line(&'static str),
    Key(char),
}

pub struct ScriptedConsole {
    inputs: VecDeque<Input>,
    pub transcript: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(inputs: Vec<Input>) -> Self {
        Self {
            inputs: inputs.into(),
            transcript: Vec::new(),
        }
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.transcript.push(prompt.to_string());
        match self.inputs.pop_front() {
            Some(Input::Line(text)) => Ok(text.to_string()),
            _ => panic!("script expected a line of input at: {prompt}"),
        }
    }

    fn choose(&mut self, menu: &Menu) -> Result<Choice> {
        self.transcript.push(menu.render());
        loop {
            let key = match self.inputs.pop_front() {
                Some(Input::Key(key)) => key,
                _ => panic!("script expected a keystroke"),
            };
            match menu.resolve(key) {
                Some(choice) => return Ok(choice),
                None if menu.default_allowed() => return Ok(Choice::Action(Action::Default)),
                None => continue,
            }
        }
    }

    fn markdown(&mut self, text: &str) {
        self.transcript.push(text.to_string());
    }

    fn line(&mut self, text: &str) {
        self.transcript.push(text.to_string());
    }
}
