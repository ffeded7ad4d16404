//! Secondary analysis through two hosted Hugging Face inference endpoints.
//!
//! The two calls run concurrently and settle independently: one endpoint
//! failing (or still warming up) never hides the other's output. Outputs are
//! opaque JSON and are not reconciled with the structured analysis.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    backend::InferenceEndpoint,
    config::HuggingFaceConfig,
    error::{MedsafeError, Result},
};

const SERVICE: &str = "huggingface";
const LOADING_MARKER: &str = "currently loading";

/// Map a failed endpoint response onto the error taxonomy.
pub fn classify_failure(model: &str, status: u16, body: &str) -> MedsafeError {
    if status == StatusCode::SERVICE_UNAVAILABLE.as_u16() && body.contains(LOADING_MARKER) {
        MedsafeError::WarmingUp {
            model: model.to_string(),
        }
    } else {
        MedsafeError::Endpoint {
            status,
            body: body.to_string(),
        }
    }
}

/// Bearer-authenticated client for `POST {base_url}/{model}`.
#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(config: &HuggingFaceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| MedsafeError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn bearer(&self) -> Result<HeaderValue> {
        let token = self.token.as_deref().ok_or_else(|| {
            MedsafeError::Config("HF_API_TOKEN environment variable not set".to_string())
        })?;
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| MedsafeError::Config(format!("invalid Hugging Face token: {e}")))
    }
}

#[async_trait]
impl InferenceEndpoint for HuggingFaceClient {
    async fn infer(&self, model: &str, input: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, model);
        let bearer = self.bearer()?;

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, bearer)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "inputs": input }))
            .send()
            .await
            .map_err(|e| MedsafeError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(model, status = status.as_u16(), body = %body, "Hugging Face API error");
            return Err(classify_failure(model, status.as_u16(), &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| MedsafeError::transport(SERVICE, format!("invalid JSON response: {e}")))
    }
}

/// Output of one endpoint: its data or the message explaining why not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModelOutcome {
    Ok { model: String, data: Value },
    Error { model: String, message: String },
}

impl ModelOutcome {
    fn settle(model: &str, result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self::Ok {
                model: model.to_string(),
                data,
            },
            Err(e) => Self::Error {
                model: model.to_string(),
                message: e.to_string(),
            },
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Ok { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { message, .. } => Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecondaryOutcome {
    pub granite: ModelOutcome,
    pub biobert: ModelOutcome,
}

impl SecondaryOutcome {
    /// One line per failed endpoint, `None` when both succeeded.
    pub fn error_summary(&self) -> Option<String> {
        let lines: Vec<String> = [("Granite", &self.granite), ("BioBERT", &self.biobert)]
            .into_iter()
            .filter_map(|(label, outcome)| {
                outcome
                    .error()
                    .map(|message| format!("{label} Model Error: {message}"))
            })
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Runs the Granite and BioBERT endpoints side by side.
#[derive(Clone)]
pub struct SecondaryAnalyzer {
    endpoint: Arc<dyn InferenceEndpoint>,
    granite_model: String,
    biobert_model: String,
}

impl SecondaryAnalyzer {
    pub fn new(endpoint: Arc<dyn InferenceEndpoint>, config: &HuggingFaceConfig) -> Self {
        Self {
            endpoint,
            granite_model: config.granite_model.clone(),
            biobert_model: config.biobert_model.clone(),
        }
    }

    pub async fn analyze(&self, text: &str) -> Result<SecondaryOutcome> {
        if text.trim().is_empty() {
            return Err(MedsafeError::InvalidInput(
                "Please enter prescription text to analyze.".to_string(),
            ));
        }

        info!(
            granite = %self.granite_model,
            biobert = %self.biobert_model,
            "Running secondary inference"
        );

        let (granite, biobert) = tokio::join!(
            self.endpoint.infer(&self.granite_model, text),
            self.endpoint.infer(&self.biobert_model, text)
        );

        let outcome = SecondaryOutcome {
            granite: ModelOutcome::settle(&self.granite_model, granite),
            biobert: ModelOutcome::settle(&self.biobert_model, biobert),
        };

        info!(
            granite_ok = outcome.granite.data().is_some(),
            biobert_ok = outcome.biobert.data().is_some(),
            "Secondary inference settled"
        );

        Ok(outcome)
    }
}
