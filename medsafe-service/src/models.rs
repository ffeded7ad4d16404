use medsafe::{ChatMessage, Citation, InteractionRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzePrescriptionRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckInteractionsRequest {
    pub drugs: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InteractionsResponse {
    pub interactions: Vec<InteractionRecord>,
    /// Only sources with a uri.
    pub sources: Vec<Citation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SecondaryResponse {
    pub granite: medsafe::ModelOutcome,
    pub biobert: medsafe::ModelOutcome,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatSessionResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}
