use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{error, info};

use crate::{
    backend::{GenerationRequest, LanguageModel},
    error::{MedsafeError, Result},
    models::{InteractionRecord, InteractionReport},
    prompts::interaction_prompt,
};

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```$").expect("valid regex"));

/// Remove one leading and one trailing markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let start = LEADING_FENCE.find(trimmed).map_or(0, |m| m.end());
    let body = &trimmed[start..];
    let end = TRAILING_FENCE.find(body).map_or(body.len(), |m| m.start());
    body[..end].trim()
}

/// Parse a grounded reply as interaction records.
pub fn parse_interactions(text: &str) -> Result<Vec<InteractionRecord>> {
    serde_json::from_str(strip_code_fences(text))
        .map_err(|e| MedsafeError::Interpretation(e.to_string()))
}

/// Search-grounded drug interaction check.
#[derive(Clone)]
pub struct InteractionChecker {
    model: Arc<dyn LanguageModel>,
}

impl InteractionChecker {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Check a comma separated drug list.
    ///
    /// A failed call is [`MedsafeError::InteractionCheckFailed`]; a reply that
    /// is not a JSON array of interactions is [`MedsafeError::Interpretation`].
    /// Missing grounding metadata just yields no sources.
    pub async fn check(&self, drug_list: &str) -> Result<InteractionReport> {
        if drug_list.trim().is_empty() {
            return Err(MedsafeError::InvalidInput(
                "Please enter at least two drug names to check for interactions.".to_string(),
            ));
        }

        info!(model = self.model.name(), drugs = %drug_list, "Checking drug interactions");

        let request = GenerationRequest::prompt(interaction_prompt(drug_list)).with_grounding(true);
        let generation = self.model.generate(request).await.map_err(|e| {
            error!(error = %e, "Error checking drug interactions");
            MedsafeError::InteractionCheckFailed
        })?;

        let interactions = parse_interactions(&generation.text).inspect_err(|e| {
            if let MedsafeError::Interpretation(detail) = e {
                error!(detail = %detail, "Interaction response was not a JSON array");
            }
        })?;

        info!(
            interactions = interactions.len(),
            sources = generation.citations.len(),
            "Interaction check completed"
        );

        Ok(InteractionReport {
            interactions,
            sources: generation.citations,
        })
    }
}
