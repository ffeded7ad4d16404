pub mod analysis;
pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod gemini;
pub mod inference;
pub mod interactions;
pub mod models;
pub mod prompts;
pub mod render;
pub mod storage;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use analysis::{AnalysisReport, FlaggedMedication, PrescriptionAnalyzer, VerifiedMedication};
pub use backend::{Generation, GenerationRequest, InferenceEndpoint, LanguageModel, TextStream};
pub use chat::{ChatOptions, ChatSession};
pub use config::{GeminiConfig, HuggingFaceConfig, MedsafeConfig};
pub use error::{MedsafeError, Result};
pub use gemini::GeminiClient;
pub use inference::{HuggingFaceClient, ModelOutcome, SecondaryAnalyzer, SecondaryOutcome};
pub use interactions::InteractionChecker;
pub use models::*;
pub use storage::{ChatSessionStore, InMemoryChatSessionStore, SharedSession};
pub use transcript::Transcript;

use std::sync::Arc;

/// The four requesters wired to one set of clients.
#[derive(Clone)]
pub struct Medsafe {
    pub analyzer: PrescriptionAnalyzer,
    pub interactions: InteractionChecker,
    pub secondary: SecondaryAnalyzer,
    model: Arc<dyn LanguageModel>,
}

impl Medsafe {
    /// Build against the real Gemini and Hugging Face APIs.
    pub fn from_config(config: &MedsafeConfig) -> Result<Self> {
        let model: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(config.gemini.clone())?);
        let endpoint: Arc<dyn InferenceEndpoint> =
            Arc::new(HuggingFaceClient::new(&config.hugging_face)?);
        Ok(Self::with_backends(model, endpoint, &config.hugging_face))
    }

    pub fn with_backends(
        model: Arc<dyn LanguageModel>,
        endpoint: Arc<dyn InferenceEndpoint>,
        hugging_face: &HuggingFaceConfig,
    ) -> Self {
        Self {
            analyzer: PrescriptionAnalyzer::new(model.clone()),
            interactions: InteractionChecker::new(model.clone()),
            secondary: SecondaryAnalyzer::new(endpoint, hugging_face),
            model,
        }
    }

    /// Open a new chat session with the default medical-assistant settings.
    pub fn start_chat(&self) -> ChatSession {
        ChatSession::create(self.model.clone())
    }
}
