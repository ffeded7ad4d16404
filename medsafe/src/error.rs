use thiserror::Error;

/// Message shown when the structured analysis call fails for any reason.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze the prescription. The AI model could not process the request. Please check the input text and try again.";

/// Message shown when the grounded interaction call itself fails.
pub const INTERACTION_CHECK_FAILED_MESSAGE: &str =
    "Failed to check for interactions. The AI model could not process the request.";

/// Message shown when a model reply cannot be read as the expected structure.
pub const INTERPRETATION_FAILED_MESSAGE: &str =
    "Failed to interpret the AI response. The format may be invalid.";

/// Message shown when a chat turn fails before or during streaming.
pub const CHAT_FAILED_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Error, Debug)]
pub enum MedsafeError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request to {service} failed: {reason}")]
    Transport { service: String, reason: String },

    #[error("{service} returned {status}: {body}")]
    Provider {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{}", ANALYSIS_FAILED_MESSAGE)]
    AnalysisFailed,

    #[error("{}", INTERACTION_CHECK_FAILED_MESSAGE)]
    InteractionCheckFailed,

    #[error("{}", INTERPRETATION_FAILED_MESSAGE)]
    Interpretation(String),

    #[error("The model ({model}) is currently loading, please try again in a moment.")]
    WarmingUp { model: String },

    #[error("Hugging Face API error: {status} - {body}")]
    Endpoint { status: u16, body: String },

    #[error("{}", CHAT_FAILED_MESSAGE)]
    ChatFailed,

    #[error("Chat session not found: {0}")]
    SessionNotFound(String),

    #[error("Chat session {0} is already sending a message")]
    SessionBusy(String),
}

impl MedsafeError {
    pub(crate) fn transport(service: &str, reason: impl ToString) -> Self {
        Self::Transport {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures raised before any remote call was attempted.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Config(_) | Self::SessionNotFound(_) | Self::SessionBusy(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MedsafeError>;
