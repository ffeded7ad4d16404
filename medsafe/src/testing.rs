//! Scripted fakes for the model seams.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde_json::Value;

use crate::{
    backend::{Generation, GenerationRequest, InferenceEndpoint, LanguageModel, TextStream},
    error::{MedsafeError, Result},
    models::Citation,
};

pub enum Scripted {
    Text(String, Vec<Citation>),
    Chunks(Vec<String>, bool),
    Fail,
}

impl Scripted {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string(), Vec::new())
    }

    pub fn text_with_citations(text: &str, citations: Vec<Citation>) -> Self {
        Self::Text(text.to_string(), citations)
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::Chunks(chunks.iter().map(|c| c.to_string()).collect(), false)
    }

    pub fn chunks_then_fail(chunks: &[&str]) -> Self {
        Self::Chunks(chunks.iter().map(|c| c.to_string()).collect(), true)
    }
}

/// Replays scripted replies in order and records every request.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next(&self, request: GenerationRequest) -> Scripted {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.script.lock().unwrap().pop_front().unwrap_or(Scripted::Fail)
    }
}

fn scripted_failure() -> MedsafeError {
    MedsafeError::Transport {
        service: "scripted".to_string(),
        reason: "scripted failure".to_string(),
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        match self.next(request) {
            Scripted::Text(text, citations) => Ok(Generation { text, citations }),
            Scripted::Chunks(chunks, false) => Ok(Generation {
                text: chunks.concat(),
                citations: Vec::new(),
            }),
            _ => Err(scripted_failure()),
        }
    }

    async fn stream(&self, request: GenerationRequest) -> Result<TextStream> {
        let (chunks, fail) = match self.next(request) {
            Scripted::Text(text, _) => (vec![text], false),
            Scripted::Chunks(chunks, fail) => (chunks, fail),
            Scripted::Fail => return Err(scripted_failure()),
        };

        let mut items: Vec<Result<String>> = chunks.into_iter().map(Ok).collect();
        if fail {
            items.push(Err(scripted_failure()));
        }
        Ok(stream::iter(items).boxed())
    }
}

/// Inference fake keyed by model name; unknown models fail.
#[derive(Default)]
pub struct ScriptedEndpoint {
    replies: Mutex<HashMap<String, Result<Value>>>,
    calls: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn reply(self, model: &str, reply: Result<Value>) -> Self {
        self.replies.lock().unwrap().insert(model.to_string(), reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceEndpoint for ScriptedEndpoint {
    async fn infer(&self, model: &str, _input: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .remove(model)
            .unwrap_or_else(|| Err(scripted_failure()))
    }
}
