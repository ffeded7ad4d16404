//! Streaming conversational sessions.
//!
//! A [`ChatSession`] is an explicit handle owned by the caller: it is created
//! with [`ChatSession::create`], receives turns through
//! [`ChatSession::send_message`], and ends with [`ChatSession::close`]. Any
//! number of sessions can be alive at once; they share nothing but the model
//! client.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    backend::{GenerationRequest, LanguageModel},
    error::{MedsafeError, Result},
    models::ChatMessage,
    prompts::{CHAT_GREETING, CHAT_SYSTEM_INSTRUCTION},
    transcript::Transcript,
};

/// Settings fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub system_instruction: String,
    pub grounded: bool,
    /// Model message seeded into the transcript; `None` starts empty.
    pub greeting: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            system_instruction: CHAT_SYSTEM_INSTRUCTION.to_string(),
            grounded: true,
            greeting: Some(CHAT_GREETING.to_string()),
        }
    }
}

pub struct ChatSession {
    id: String,
    model: Arc<dyn LanguageModel>,
    options: ChatOptions,
    /// What the user sees, greeting and failed turns included.
    transcript: Transcript,
    /// What the model is sent: completed exchanges only.
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// Start a session with the medical-assistant defaults.
    pub fn create(model: Arc<dyn LanguageModel>) -> Self {
        Self::create_with(model, ChatOptions::default())
    }

    pub fn create_with(model: Arc<dyn LanguageModel>, options: ChatOptions) -> Self {
        let transcript = match &options.greeting {
            Some(greeting) => Transcript::with_greeting(greeting.clone()),
            None => Transcript::new(),
        };
        let id = Uuid::new_v4().to_string();
        info!(session_id = %id, model = model.name(), "chat session created");

        Self {
            id,
            model,
            options,
            transcript,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Send one user turn and stream the reply.
    ///
    /// `on_update` receives the full reply text accumulated so far after each
    /// fragment. On success the reply is committed as one model message and
    /// returned. If the stream fails part-way the partial reply is committed
    /// as-is and [`MedsafeError::ChatFailed`] is returned; nothing is rolled
    /// back.
    pub async fn send_message<F>(&mut self, text: &str, mut on_update: F) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        if text.trim().is_empty() {
            return Err(MedsafeError::InvalidInput(
                "Message cannot be empty.".to_string(),
            ));
        }

        self.transcript.push_user(text);

        let mut contents = self.history.clone();
        contents.push(ChatMessage::user(text));
        let request = GenerationRequest::conversation(contents)
            .with_system_instruction(self.options.system_instruction.clone())
            .with_grounding(self.options.grounded);

        let mut stream = self.model.stream(request).await.map_err(|e| {
            error!(session_id = %self.id, error = %e, "chat request failed");
            MedsafeError::ChatFailed
        })?;

        self.transcript.begin_model_turn();
        let mut fragments = 0usize;

        while let Some(next) = stream.next().await {
            match next {
                Ok(fragment) => {
                    fragments += 1;
                    on_update(self.transcript.append_to_turn(&fragment));
                }
                Err(e) => {
                    error!(session_id = %self.id, error = %e, fragments, "chat stream failed");
                    self.transcript.commit_turn();
                    return Err(MedsafeError::ChatFailed);
                }
            }
        }

        let reply = self.transcript.commit_turn().unwrap_or_default();
        self.history.push(ChatMessage::user(text));
        self.history.push(ChatMessage::model(reply.clone()));
        if reply.is_empty() {
            warn!(session_id = %self.id, "model streamed an empty reply");
        }
        info!(session_id = %self.id, fragments, reply_len = reply.len(), "chat turn completed");
        Ok(reply)
    }

    /// End the session, returning its transcript.
    pub fn close(mut self) -> Transcript {
        self.transcript.commit_turn();
        info!(session_id = %self.id, messages = self.transcript.len(), "chat session closed");
        self.transcript
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("messages", &self.transcript.len())
            .field("history", &self.history.len())
            .finish()
    }
}
