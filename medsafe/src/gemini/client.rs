use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, error, warn};

use super::{
    SERVICE,
    sse::SseDecoder,
    types::{GenerateContentRequest, GenerateContentResponse},
};
use crate::{
    backend::{Generation, GenerationRequest, LanguageModel, TextStream},
    config::GeminiConfig,
    error::{MedsafeError, Result},
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// REST client for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: Arc<GeminiConfig>,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| MedsafeError::Config(format!("invalid Gemini API key: {e}")))?;
        headers.insert(API_KEY_HEADER, key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| MedsafeError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            method
        )
    }

    async fn post(
        &self,
        url: &str,
        body: &GenerateContentRequest,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        debug!(url = %url, grounded = !body.tools.is_empty(), "sending Gemini request");

        let response = self
            .http
            .post(url)
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|e| MedsafeError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Gemini request rejected");
            return Err(MedsafeError::Provider {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let body = GenerateContentRequest::from(request);
        let url = self.endpoint("generateContent");
        let response = self.post(&url, &body, &[]).await?;

        let text = response
            .text()
            .await
            .map_err(|e| MedsafeError::transport(SERVICE, format!("failed to read body: {e}")))?;
        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            MedsafeError::transport(SERVICE, format!("invalid JSON response: {e}"))
        })?;

        if parsed.candidates.is_empty() {
            return Err(MedsafeError::Provider {
                service: SERVICE.to_string(),
                status: 200,
                body: format!(
                    "no candidates returned (prompt feedback: {})",
                    parsed
                        .prompt_feedback
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| "none".to_string())
                ),
            });
        }

        let text = parsed.text();
        if text.is_empty() {
            warn!(
                finish_reason = parsed.finish_reason().unwrap_or("unknown"),
                "Gemini returned a candidate without text"
            );
        }

        Ok(Generation {
            text,
            citations: parsed.citations(),
        })
    }

    async fn stream(&self, request: GenerationRequest) -> Result<TextStream> {
        let body = GenerateContentRequest::from(request);
        let url = self.endpoint("streamGenerateContent");
        let response = self.post(&url, &body, &[("alt", "sse")]).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(decode_stream(bytes))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turns the raw SSE byte stream into ordered text fragments. The first
/// error ends the stream.
fn decode_stream(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TextStream {
    let state = StreamState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }

            let decoded = match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.feed(&chunk),
                Some(Err(e)) => Err(MedsafeError::transport(SERVICE, e)),
                None => {
                    state.finished = true;
                    state.decoder.finish()
                }
            };

            match decoded {
                Ok(fragments) => state.pending.extend(fragments),
                Err(e) => {
                    state.finished = true;
                    state.pending.clear();
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}
