//! Multi-turn conversation state for interactive Q&A.
//!
//! A thread is an ordered, append-only message log. The first message is
//! always the single system message that frames the assistant; after a
//! [`ConversationThread::reset`] the log is empty until the next append or
//! read re-seeds it. Nothing is ever edited or removed in place.

use tracing::warn;

use crate::error::Failure;
use crate::models::{Message, Role};
use crate::traits::CompletionProvider;

#[derive(Debug, Clone)]
pub struct ConversationThread {
    system_prompt: String,
    messages: Vec<Message>,
}

impl ConversationThread {
    /// A new, empty thread framed by `system_prompt` once it is first used.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    fn seed(&mut self) {
        if self.messages.is_empty() {
            self.messages.push(Message::system(&self.system_prompt));
        }
    }

    /// Append a message, seeding the system framing first if the thread is
    /// empty.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.seed();
        self.messages.push(Message {
            role,
            content: content.into(),
        });
    }

    /// Append a user turn.
    pub fn ask(&mut self, content: impl Into<String>) {
        self.append(Role::User, content);
    }

    /// Discard every turn. The thread stays empty until the next append or
    /// read.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// True between a reset and the next re-seed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Read-only snapshot of the thread, seeding the system framing if
    /// needed.
    pub fn messages(&mut self) -> &[Message] {
        self.seed();
        &self.messages
    }

    /// Send the whole thread to the provider. On success the reply is
    /// appended and returned; on failure the reply is empty and the thread is
    /// left exactly as it was.
    pub async fn completion(&mut self, provider: &dyn CompletionProvider) -> String {
        self.seed();
        match provider.complete(&self.messages).await {
            Ok(reply) => {
                self.messages.push(Message::assistant(&reply));
                reply
            }
            Err(cause) => {
                warn!("{}", Failure::Completion { cause });
                String::new()
            }
        }
    }
}
