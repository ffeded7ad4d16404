use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// Ordered chat history of one session.
///
/// Committed messages never change. A streamed model reply lives in a
/// separate in-progress buffer until [`Transcript::commit_turn`] turns it
/// into exactly one model message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    in_progress: Option<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::model(greeting)],
            in_progress: None,
        }
    }

    /// Committed messages only.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Committed messages followed by the in-progress reply, if any.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        let mut all = self.messages.clone();
        if let Some(text) = &self.in_progress {
            all.push(ChatMessage::model(text.clone()));
        }
        all
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn is_turn_open(&self) -> bool {
        self.in_progress.is_some()
    }

    /// Open an empty model reply. Any reply still open is committed first.
    pub fn begin_model_turn(&mut self) {
        if self.in_progress.is_some() {
            self.commit_turn();
        }
        self.in_progress = Some(String::new());
    }

    /// Append a streamed fragment and return the reply text so far.
    /// Opens a turn if none is open.
    pub fn append_to_turn(&mut self, fragment: &str) -> &str {
        let buffer = self.in_progress.get_or_insert_with(String::new);
        buffer.push_str(fragment);
        buffer.as_str()
    }

    /// Close the open reply as a single model message. Returns its text, or
    /// `None` when no turn was open.
    pub fn commit_turn(&mut self) -> Option<String> {
        let text = self.in_progress.take()?;
        self.messages.push(ChatMessage::model(text.clone()));
        Some(text)
    }
}
