//! Driving the retrieval session end to end with a scripted console and
//! in-memory providers: state transitions, paging arithmetic, memoization of
//! the cross-match summary, and the recoverable/fatal failure split.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{hit, CountingLlm, FakeSource, FakeStore, Input, ScriptedConsole};
use issue_harness::config::Prompts;
use issue_harness::models::{Hit, Role};
use issue_harness::session::{RetrievalSession, SessionState};

fn eight_hits() -> Vec<Hit> {
    (1..=8)
        .map(|n| {
            hit(
                &n.to_string(),
                &format!("Issue {n} title"),
                &format!("summary {n}"),
            )
        })
        .collect()
}

fn session_with(
    store: Arc<FakeStore>,
    llm: Arc<CountingLlm>,
    inputs: Vec<Input>,
) -> RetrievalSession<ScriptedConsole> {
    let source = Arc::new(FakeSource::new(Vec::new()));
    RetrievalSession::new(
        store,
        llm,
        source,
        ScriptedConsole::new(inputs),
        8,
        Prompts::default(),
    )
}

#[tokio::test]
async fn a_blank_query_finishes_the_session() {
    let store = Arc::new(FakeStore::new());
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(Arc::clone(&store), llm, vec![Input::Line("")]);

    session.run().await.unwrap();

    assert_eq!(session.state(), SessionState::Finished);
    assert!(store.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_results_return_to_the_search_prompt() {
    let store = Arc::new(FakeStore::new());
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        llm,
        vec![Input::Line("nothing matches this"), Input::Line("")],
    );

    session.run().await.unwrap();

    assert_eq!(store.search_offsets(), vec![0]);
    assert_eq!(session.state(), SessionState::Finished);
}

#[tokio::test]
async fn paging_forward_and_back_never_goes_negative() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        llm,
        vec![
            Input::Line("login bug"),
            Input::Key('n'), // next page
            Input::Key('p'), // back to the first page
            Input::Key('x'), // default: new search
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    assert_eq!(store.search_offsets(), vec![0, 8, 0]);
}

#[tokio::test]
async fn previous_page_is_not_offered_on_the_first_page() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    // 'p' is unmapped on the first page, so it falls through to the default.
    let mut session = session_with(
        Arc::clone(&store),
        llm,
        vec![Input::Line("login bug"), Input::Key('p'), Input::Line("")],
    );

    session.run().await.unwrap();

    assert_eq!(store.search_offsets(), vec![0]);
    assert_eq!(session.state(), SessionState::Finished);
}

#[tokio::test]
async fn selecting_a_match_shows_its_summary_and_location() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        Arc::clone(&llm),
        vec![
            Input::Line("login bug"),
            Input::Key('2'), // pick issue 2
            Input::Key('c'), // continue searching
            Input::Key('x'), // default: new search
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    let transcript = session.console().transcript.join("\n");
    assert!(transcript.contains("## Issue 2 title"));
    assert!(transcript.contains("summary 2"));
    assert!(transcript.contains("Location: https://tracker.test/issues/2"));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn a_blank_question_returns_to_the_summary() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        Arc::clone(&llm),
        vec![
            Input::Line("login bug"),
            Input::Key('1'),
            Input::Key('q'),  // ask a question
            Input::Line(""),  // change of mind: blank returns to the summary
            Input::Key('c'),  // continue searching
            Input::Key('x'),
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    assert_eq!(llm.call_count(), 0);
    assert_eq!(session.state(), SessionState::Finished);
}

#[tokio::test]
async fn asking_about_an_issue_sends_the_framed_conversation() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        Arc::clone(&llm),
        vec![
            Input::Line("login bug"),
            Input::Key('1'),
            Input::Key('q'),
            Input::Line("who reported this?"),
            Input::Line(""), // done asking
            Input::Key('c'),
            Input::Key('x'),
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    assert_eq!(llm.call_count(), 1);
    let recorded = llm.recorded.lock().unwrap();
    let messages = &recorded[0];
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[1].content.contains("who reported this?"));
    assert!(messages[1].content.contains("content of 1"));
}

#[tokio::test]
async fn follow_up_questions_extend_the_same_conversation() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        Arc::clone(&llm),
        vec![
            Input::Line("login bug"),
            Input::Key('1'),
            Input::Key('q'),
            Input::Line("who reported this?"),
            Input::Line("and when?"),
            Input::Line(""),
            Input::Key('c'),
            Input::Key('x'),
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    assert_eq!(llm.call_count(), 2);
    let recorded = llm.recorded.lock().unwrap();
    // system + question + reply + follow-up
    assert_eq!(recorded[1].len(), 4);
    assert_eq!(recorded[1][3].content, "and when?");
}

#[tokio::test]
async fn the_cross_match_summary_is_computed_once_per_match_set() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        Arc::clone(&llm),
        vec![
            Input::Line("login bug"),
            Input::Key('s'), // summarise: one provider call
            Input::Key('z'), // default: back to the results
            Input::Key('s'), // summarise again: memoized, no call
            Input::Key('z'),
            Input::Key('n'), // next page: new match set
            Input::Key('s'), // summarise: exactly one new call
            Input::Key('z'),
            Input::Key('x'),
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    assert_eq!(llm.call_count(), 2);
    let recorded = llm.recorded.lock().unwrap();
    // system framing + 8 per-match summaries + the search question
    assert_eq!(recorded[0].len(), 10);
    assert_eq!(recorded[0][0].role, Role::System);
    assert!(recorded[0][9].content.contains("login bug"));
}

#[tokio::test]
async fn questions_about_the_summary_reuse_the_memoized_value() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        Arc::clone(&llm),
        vec![
            Input::Line("login bug"),
            Input::Key('s'),                 // summarise: call 1
            Input::Key('q'),                 // ask about the summary
            Input::Line("which are bugs?"),  // call 2
            Input::Line(""),                 // back to the summary view
            Input::Key('z'),                 // default: back to the results
            Input::Key('x'),
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    assert_eq!(llm.call_count(), 2);
    let recorded = llm.recorded.lock().unwrap();
    let question = &recorded[1];
    assert_eq!(question[0].role, Role::System);
    assert!(question[1].content.contains("which are bugs?"));
    // The memoized summary is inlined into the question.
    assert!(question[1].content.contains("reply::"));
}

#[tokio::test]
async fn finding_related_issues_pivots_the_query_and_resets_the_offset() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(
        Arc::clone(&store),
        llm,
        vec![
            Input::Line("login bug"),
            Input::Key('n'), // page forward first
            Input::Key('3'), // pick a match
            Input::Key('r'), // related issues
            Input::Key('x'),
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();

    let searches = store.searches.lock().unwrap().clone();
    assert_eq!(searches.len(), 3);
    assert_eq!(searches[2].0, "Issue 3 title summary 3");
    assert_eq!(searches[2].1, 0, "pivot resets the offset");
}

#[tokio::test]
async fn a_completion_failure_leaves_the_session_running() {
    let store = Arc::new(FakeStore::with_hits(eight_hits()));
    let llm = Arc::new(CountingLlm::new());
    llm.fail.store(true, Ordering::SeqCst);
    let mut session = session_with(
        Arc::clone(&store),
        Arc::clone(&llm),
        vec![
            Input::Line("login bug"),
            Input::Key('1'),
            Input::Key('q'),
            Input::Line("still there?"),
            Input::Line(""), // provider failed; blank returns to the summary
            Input::Key('c'),
            Input::Key('x'),
            Input::Line(""),
        ],
    );

    session.run().await.unwrap();
    assert_eq!(session.state(), SessionState::Finished);
}

#[tokio::test]
async fn a_store_failure_ends_the_session() {
    let store = Arc::new(FakeStore::new());
    store.fail_search.store(true, Ordering::SeqCst);
    let llm = Arc::new(CountingLlm::new());
    let mut session = session_with(Arc::clone(&store), llm, vec![Input::Line("login bug")]);

    let err = session.run().await.unwrap_err();
    assert!(err.to_string().contains("query failed"));
}
