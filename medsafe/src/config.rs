use crate::error::{MedsafeError, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_HF_BASE_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_GRANITE_MODEL: &str = "ibm-granite/granite-8b-code-instruct";
pub const DEFAULT_BIOBERT_MODEL: &str = "Jean-Baptiste/roberta-large-ner-english";

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Connection settings for the two Hugging Face inference endpoints.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    /// Bearer token. `None` when not provisioned for this deployment.
    pub token: Option<String>,
    pub base_url: String,
    pub granite_model: String,
    pub biobert_model: String,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_HF_BASE_URL.to_string(),
            granite_model: DEFAULT_GRANITE_MODEL.to_string(),
            biobert_model: DEFAULT_BIOBERT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MedsafeConfig {
    pub gemini: GeminiConfig,
    pub hugging_face: HuggingFaceConfig,
}

impl MedsafeConfig {
    /// Reads configuration from the process environment.
    ///
    /// `GEMINI_API_KEY` (or `API_KEY`) is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("API_KEY"))
            .ok_or_else(|| {
                MedsafeError::Config("GEMINI_API_KEY environment variable not set".to_string())
            })?;

        let mut gemini = GeminiConfig::new(api_key);
        if let Some(model) = non_empty("GEMINI_MODEL") {
            gemini.model = model;
        }
        if let Some(base_url) = non_empty("GEMINI_BASE_URL") {
            gemini.base_url = base_url;
        }

        let defaults = HuggingFaceConfig::default();
        let hugging_face = HuggingFaceConfig {
            token: non_empty("HF_API_TOKEN"),
            base_url: non_empty("HF_BASE_URL").unwrap_or(defaults.base_url),
            granite_model: non_empty("HF_GRANITE_MODEL").unwrap_or(defaults.granite_model),
            biobert_model: non_empty("HF_BIOBERT_MODEL").unwrap_or(defaults.biobert_model),
        };

        Ok(Self {
            gemini,
            hugging_face,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_gemini_key_is_fatal() {
        let err = MedsafeConfig::from_lookup(lookup_from(&[("HF_API_TOKEN", "hf_x")])).unwrap_err();
        assert!(matches!(err, MedsafeError::Config(_)));
    }

    #[test]
    fn legacy_api_key_variable_is_accepted() {
        let config = MedsafeConfig::from_lookup(lookup_from(&[("API_KEY", "k")])).unwrap();
        assert_eq!(config.gemini.api_key, "k");
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert!(config.hugging_face.token.is_none());
    }

    #[test]
    fn overrides_replace_defaults() {
        let config = MedsafeConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "g"),
            ("GEMINI_MODEL", "gemini-2.0-pro"),
            ("HF_API_TOKEN", "hf_token"),
            ("HF_BASE_URL", "http://127.0.0.1:9000/models"),
            ("HF_GRANITE_MODEL", ""),
        ]))
        .unwrap();

        assert_eq!(config.gemini.model, "gemini-2.0-pro");
        assert_eq!(config.hugging_face.token.as_deref(), Some("hf_token"));
        assert_eq!(config.hugging_face.base_url, "http://127.0.0.1:9000/models");
        assert_eq!(config.hugging_face.granite_model, DEFAULT_GRANITE_MODEL);
    }
}
