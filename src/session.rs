//! Interactive retrieval session.
//!
//! A single-threaded state machine over the vector store, the completion
//! provider, and the console. Exactly one state is live at a time; each call
//! to [`RetrievalSession::advance`] runs the live state to completion and
//! installs its successor, and [`RetrievalSession::run`] is the driver loop
//! that repeats that until [`SessionState::Finished`].
//!
//! The session is the sole writer of the current query, the current match
//! set, and the conversation thread. The cross-match summary is memoized per
//! match set through a generation counter that is bumped whenever the matches
//! are replaced.

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::config::Prompts;
use crate::console::{Action, Choice, Console, Menu, MenuEntry};
use crate::conversation::ConversationThread;
use crate::error::Failure;
use crate::models::{DocumentFields, Hit, Message, Query};
use crate::summary_cache::flatten_for_prompt;
use crate::traits::{CompletionProvider, DocumentSource, VectorStore};

/// Every state the session can be in. `InitialSearch` is the entry point;
/// `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    InitialSearch,
    Searching,
    SearchResults,
    Summary,
    AskQuestion,
    AskingQuestions,
    GettingChatCompletion,
    SummariseAllIssues,
    SummarisedAllIssues,
    AskQuestionAboutSummary,
    GettingChatCompletionForSummary,
    AskFollowOnQuestionAboutSummary,
    FindRelated,
    Finished,
}

/// What the current conversation thread is grounded in. Switching focus
/// discards the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Focus {
    Issue(String),
    Matches(u64),
}

pub struct RetrievalSession<C: Console> {
    state: SessionState,
    query: Query,
    top_matches: Vec<Hit>,
    selected: Option<usize>,
    /// Bumped whenever `top_matches` is replaced; keys the memoized summary.
    generation: u64,
    matches_summary: Option<(u64, String)>,
    conversation: ConversationThread,
    conversation_focus: Option<Focus>,
    page_size: usize,
    prompts: Prompts,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn CompletionProvider>,
    source: Arc<dyn DocumentSource>,
    console: C,
}

impl<C: Console> RetrievalSession<C> {
    pub fn new(
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn CompletionProvider>,
        source: Arc<dyn DocumentSource>,
        console: C,
        page_size: usize,
        prompts: Prompts,
    ) -> Self {
        let conversation = ConversationThread::new(prompts.system_questions.clone());
        Self {
            state: SessionState::InitialSearch,
            query: Query::new(""),
            top_matches: Vec::new(),
            selected: None,
            generation: 0,
            matches_summary: None,
            conversation,
            conversation_focus: None,
            page_size: page_size.max(1),
            prompts,
            store,
            llm,
            source,
            console,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    /// Driver loop: advance until the session finishes. A store query
    /// failure propagates out of here and ends the session.
    pub async fn run(&mut self) -> Result<()> {
        while !self.is_finished() {
            self.advance().await?;
        }
        Ok(())
    }

    /// Run the live state and install its successor.
    pub async fn advance(&mut self) -> Result<()> {
        let next = match self.state {
            SessionState::InitialSearch => self.initial_search()?,
            SessionState::Searching => self.search().await?,
            SessionState::SearchResults => self.show_search_results()?,
            SessionState::Summary => self.show_summary()?,
            SessionState::AskQuestion => self.ask_question()?,
            SessionState::AskingQuestions => self.ask_another_question()?,
            SessionState::GettingChatCompletion => self.chat_completion().await?,
            SessionState::SummariseAllIssues => self.summarise_matches().await?,
            SessionState::SummarisedAllIssues => self.show_matches_summary()?,
            SessionState::AskQuestionAboutSummary => self.ask_about_summary().await?,
            SessionState::GettingChatCompletionForSummary => self.summary_chat_completion().await?,
            SessionState::AskFollowOnQuestionAboutSummary => self.ask_follow_on_about_summary()?,
            SessionState::FindRelated => self.find_related()?,
            SessionState::Finished => SessionState::Finished,
        };
        self.state = next;
        Ok(())
    }

    fn initial_search(&mut self) -> Result<SessionState> {
        let text = self
            .console
            .read_line("Search the issue database or hit enter to close:")?;
        if text.trim().is_empty() {
            return Ok(SessionState::Finished);
        }
        self.query = Query::new(text);
        Ok(SessionState::Searching)
    }

    async fn search(&mut self) -> Result<SessionState> {
        self.console.line("");
        self.console.line("Searching, please wait..");
        let hits = self
            .store
            .search(&self.query.text, self.query.offset)
            .await
            .map_err(|cause| Failure::Query { cause })?;
        self.console.line("");

        self.set_matches(hits);
        Ok(if self.top_matches.is_empty() {
            SessionState::InitialSearch
        } else {
            SessionState::SearchResults
        })
    }

    fn show_search_results(&mut self) -> Result<SessionState> {
        let block = matches_menu_block(&self.top_matches);
        self.console.markdown(&block);
        if self.query.offset > 0 {
            self.console
                .line(&format!("Page {}", self.query.offset / self.page_size + 1));
        }

        let mut entries = vec![
            MenuEntry {
                trigger: 'n',
                action: Action::NextPage,
                description: "view the next page",
            },
            MenuEntry {
                trigger: 's',
                action: Action::SummariseIssues,
                description: "display a summary of these issues",
            },
        ];
        if self.query.offset > 0 {
            entries.push(MenuEntry {
                trigger: 'p',
                action: Action::PreviousPage,
                description: "go back to the previous page",
            });
        }
        let menu = Menu::new(entries)
            .with_numbers(self.top_matches.len())
            .with_default("start a new search");

        match self.console.choose(&menu)? {
            Choice::Pick(index) => {
                self.selected = Some(index);
                Ok(SessionState::Summary)
            }
            Choice::Action(Action::SummariseIssues) => Ok(SessionState::SummariseAllIssues),
            Choice::Action(Action::NextPage) => {
                self.query.offset += self.page_size;
                Ok(SessionState::Searching)
            }
            Choice::Action(Action::PreviousPage) => {
                self.query.offset = self.query.offset.saturating_sub(self.page_size);
                Ok(SessionState::Searching)
            }
            _ => Ok(SessionState::InitialSearch),
        }
    }

    fn show_summary(&mut self) -> Result<SessionState> {
        let Some(index) = self.selected else {
            return Ok(SessionState::SearchResults);
        };
        let (id, block) = {
            let issue = &self.top_matches[index];
            (issue.id.clone(), summary_block(issue))
        };
        let url = self.source.resolve_url(&id);

        self.console.markdown(&block);
        if let Some(url) = url {
            self.console.line(&format!("Location: {url}"));
            self.console.line("");
        }

        let menu = Menu::new(vec![
            MenuEntry {
                trigger: 'q',
                action: Action::Question,
                description: "ask a question about the current issue",
            },
            MenuEntry {
                trigger: 'n',
                action: Action::QuestionInNewConversation,
                description: "ask a question about the current issue in a new conversation",
            },
            MenuEntry {
                trigger: 'r',
                action: Action::Related,
                description: "search for related issues",
            },
            MenuEntry {
                trigger: 'c',
                action: Action::Return,
                description: "continue searching issues",
            },
        ]);

        match self.console.choose(&menu)? {
            Choice::Action(Action::Question) => Ok(SessionState::AskQuestion),
            Choice::Action(Action::QuestionInNewConversation) => {
                self.conversation =
                    ConversationThread::new(self.prompts.system_questions.clone());
                self.conversation_focus = Some(Focus::Issue(id));
                Ok(SessionState::AskQuestion)
            }
            Choice::Action(Action::Related) => Ok(SessionState::FindRelated),
            _ => Ok(SessionState::SearchResults),
        }
    }

    fn ask_question(&mut self) -> Result<SessionState> {
        let question = self
            .console
            .read_line("Ask a question about this issue, enter to return:")?;
        if question.trim().is_empty() {
            return Ok(SessionState::Summary);
        }

        let Some(index) = self.selected else {
            return Ok(SessionState::SearchResults);
        };
        let (id, body) = {
            let issue = &self.top_matches[index];
            (issue.id.clone(), issue.content.clone())
        };
        self.ensure_issue_focus(&id);

        let content = format!(
            "{}: {}\n Document: {}",
            self.prompts.question_about_document,
            question,
            flatten_for_prompt(&body)
        );
        self.conversation.ask(content);
        Ok(SessionState::GettingChatCompletion)
    }

    fn ask_another_question(&mut self) -> Result<SessionState> {
        let question = self
            .console
            .read_line("Ask another question or enter to return:")?;
        if question.trim().is_empty() {
            return Ok(SessionState::Summary);
        }
        self.conversation.ask(question);
        Ok(SessionState::GettingChatCompletion)
    }

    async fn chat_completion(&mut self) -> Result<SessionState> {
        let reply = self.converse().await;
        if !reply.is_empty() {
            self.console.markdown(&reply);
            self.console.line("");
        }
        Ok(SessionState::AskingQuestions)
    }

    async fn summary_chat_completion(&mut self) -> Result<SessionState> {
        let reply = self.converse().await;
        if !reply.is_empty() {
            self.console.markdown(&reply);
            self.console.line("");
        }
        Ok(SessionState::AskFollowOnQuestionAboutSummary)
    }

    async fn converse(&mut self) -> String {
        self.console.line("Querying, please wait..");
        self.console.line("");
        self.conversation.completion(self.llm.as_ref()).await
    }

    async fn summarise_matches(&mut self) -> Result<SessionState> {
        self.console.line("Summarising, please wait..");
        let summary = self.summary_of_matches().await;
        if !summary.is_empty() {
            self.console.markdown(&summary);
        }
        Ok(SessionState::SummarisedAllIssues)
    }

    fn show_matches_summary(&mut self) -> Result<SessionState> {
        let menu = Menu::new(vec![
            MenuEntry {
                trigger: 'q',
                action: Action::Question,
                description: "ask a question about the summary",
            },
            MenuEntry {
                trigger: 'n',
                action: Action::QuestionInNewConversation,
                description: "ask a question about the summary in a new conversation",
            },
        ])
        .with_default("continue looking through the search results");

        match self.console.choose(&menu)? {
            Choice::Action(Action::Question) => Ok(SessionState::AskQuestionAboutSummary),
            Choice::Action(Action::QuestionInNewConversation) => {
                self.conversation =
                    ConversationThread::new(self.prompts.system_summary_questions.clone());
                self.conversation_focus = Some(Focus::Matches(self.generation));
                Ok(SessionState::AskQuestionAboutSummary)
            }
            _ => Ok(SessionState::SearchResults),
        }
    }

    async fn ask_about_summary(&mut self) -> Result<SessionState> {
        let question = self.console.read_line("Ask question or enter to return:")?;
        if question.trim().is_empty() {
            return Ok(SessionState::SummarisedAllIssues);
        }

        self.ensure_summary_focus();
        let summary = self.summary_of_matches().await;
        let content = format!(
            "{}: {}\n Documents: {}",
            self.prompts.question_about_summary,
            question,
            flatten_for_prompt(&summary)
        );
        self.conversation.ask(content);
        Ok(SessionState::GettingChatCompletionForSummary)
    }

    fn ask_follow_on_about_summary(&mut self) -> Result<SessionState> {
        let question = self
            .console
            .read_line("Ask another question or enter to return:")?;
        if question.trim().is_empty() {
            return Ok(SessionState::SummarisedAllIssues);
        }
        self.conversation.ask(question);
        Ok(SessionState::GettingChatCompletionForSummary)
    }

    fn find_related(&mut self) -> Result<SessionState> {
        let Some(index) = self.selected else {
            return Ok(SessionState::SearchResults);
        };
        let issue = &self.top_matches[index];
        self.query = Query::new(format!("{} {}", issue.title, issue.summary));
        Ok(SessionState::Searching)
    }

    fn set_matches(&mut self, hits: Vec<Hit>) {
        self.top_matches = hits;
        self.selected = None;
        self.generation += 1;
    }

    fn ensure_issue_focus(&mut self, id: &str) {
        let focus = Focus::Issue(id.to_string());
        if self.conversation_focus.as_ref() != Some(&focus) {
            self.conversation = ConversationThread::new(self.prompts.system_questions.clone());
            self.conversation_focus = Some(focus);
        }
    }

    fn ensure_summary_focus(&mut self) {
        let focus = Focus::Matches(self.generation);
        if self.conversation_focus.as_ref() != Some(&focus) {
            self.conversation =
                ConversationThread::new(self.prompts.system_summary_questions.clone());
            self.conversation_focus = Some(focus);
        }
    }

    /// The cross-match summary for the current match set, computed through
    /// the completion provider at most once per generation. A provider
    /// failure memoizes an empty summary; the next search recomputes.
    async fn summary_of_matches(&mut self) -> String {
        if let Some((generation, cached)) = &self.matches_summary {
            if *generation == self.generation {
                return cached.clone();
            }
        }

        let mut messages = vec![Message::system(self.prompts.system_matches_summary.as_str())];
        for hit in &self.top_matches {
            messages.push(Message::user(hit.summary.as_str()));
        }
        messages.push(Message::user(format!(
            "{}: {}",
            self.prompts.matches_summary_request, self.query.text
        )));

        let computed = match self.llm.complete(&messages).await {
            Ok(reply) => reply,
            Err(cause) => {
                warn!("{}", Failure::Completion { cause });
                String::new()
            }
        };
        self.matches_summary = Some((self.generation, computed.clone()));
        computed
    }
}

/// The numbered match list shown above the results menu.
fn matches_menu_block(matches: &[impl DocumentFields]) -> String {
    let mut block = String::from("## Top matches:\n");
    for (index, doc) in matches.iter().enumerate() {
        block.push_str(&format!("{}: **{}**: {}\n\n", index + 1, doc.id(), doc.title()));
    }
    block
}

/// Title and summary of one document as a markdown block.
fn summary_block(doc: &impl DocumentFields) -> String {
    format!("## {}\n\n{}", doc.title(), doc.summary())
}
