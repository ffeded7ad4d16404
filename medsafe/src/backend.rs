use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::{
    error::Result,
    models::{ChatMessage, Citation},
};

/// Ordered text fragments of one streamed reply.
pub type TextStream = BoxStream<'static, Result<String>>;

/// A single request to a hosted generative model
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    /// Conversation so far; a one-shot prompt is a single user message.
    pub contents: Vec<ChatMessage>,
    /// Declared output shape. When set the model is asked for JSON only.
    pub response_schema: Option<Value>,
    /// Enable web search augmentation.
    pub grounded: bool,
}

impl GenerationRequest {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            contents: vec![ChatMessage::user(text)],
            ..Default::default()
        }
    }

    pub fn conversation(contents: Vec<ChatMessage>) -> Self {
        Self {
            contents,
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_grounding(mut self, grounded: bool) -> Self {
        self.grounded = grounded;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// Complete (non-streamed) reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Sources reported in grounding metadata; empty when absent.
    pub citations: Vec<Citation>,
}

/// Seam between the requesters and a hosted language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, used in logs
    fn name(&self) -> &str;

    /// Send one request and wait for the whole reply.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation>;

    /// Send one request and receive the reply incrementally, in order.
    async fn stream(&self, request: GenerationRequest) -> Result<TextStream>;
}

/// Seam for generic hosted inference endpoints.
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    /// POST `input` to `model` and return its opaque JSON output.
    async fn infer(&self, model: &str, input: &str) -> Result<Value>;
}
