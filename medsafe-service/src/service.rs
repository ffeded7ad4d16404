use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{
        Json,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt, channel::mpsc};
use medsafe::{
    AnalysisReport, ChatSessionStore, InMemoryChatSessionStore, Medsafe, MedsafeConfig,
    MedsafeError, renderable_citations,
};
use serde_json::{Value, json};
use std::{convert::Infallible, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::models::{
    AnalyzePrescriptionRequest, ChatMessageRequest, ChatSessionResponse, CheckInteractionsRequest,
    InteractionsResponse, SecondaryResponse,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Map a library error onto an HTTP status and a displayable message.
fn api_error(err: MedsafeError) -> ApiError {
    let (status, kind) = match &err {
        MedsafeError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        MedsafeError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
        MedsafeError::SessionBusy(_) => (StatusCode::CONFLICT, "session_busy"),
        MedsafeError::WarmingUp { .. } => (StatusCode::SERVICE_UNAVAILABLE, "warming_up"),
        MedsafeError::Interpretation(_) => (StatusCode::BAD_GATEWAY, "interpretation"),
        MedsafeError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
        _ => (StatusCode::BAD_GATEWAY, "upstream"),
    };

    if !err.is_local() {
        error!(kind, error = %err, "Request failed");
    }

    (
        status,
        Json(json!({
            "error": err.to_string(),
            "kind": kind
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub medsafe: Medsafe,
    pub sessions: Arc<dyn ChatSessionStore>,
}

impl AppState {
    pub fn new(medsafe: Medsafe) -> Self {
        Self {
            medsafe,
            sessions: Arc::new(InMemoryChatSessionStore::new()),
        }
    }
}

pub fn create_app(config: &MedsafeConfig) -> anyhow::Result<Router> {
    let medsafe = Medsafe::from_config(config)?;
    if config.hugging_face.token.is_none() {
        warn!("HF_API_TOKEN not set; secondary analysis will report a configuration error");
    }
    Ok(build_router(AppState::new(medsafe)))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/prescriptions/analyze", post(analyze_prescription))
        .route("/prescriptions/secondary", post(analyze_secondary))
        .route("/interactions/check", post(check_interactions))
        .route("/chat/sessions", post(create_chat_session))
        .route(
            "/chat/sessions/{session_id}",
            get(get_chat_session).delete(close_chat_session),
        )
        .route("/chat/sessions/{session_id}/messages", post(send_chat_message))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "MedSafe AI Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-assisted prescription analysis, grounded interaction checks and medical chat",
        "endpoints": {
            "POST /prescriptions/analyze": "Structured prescription analysis",
            "POST /prescriptions/secondary": "Granite and BioBERT inference side by side",
            "POST /interactions/check": "Search-grounded drug interaction check",
            "POST /chat/sessions": "Open a chat session",
            "GET /chat/sessions/{session_id}": "Chat transcript (409 while a reply is streaming)",
            "POST /chat/sessions/{session_id}/messages": "Send a message; reply streams as server-sent events",
            "DELETE /chat/sessions/{session_id}": "Close a chat session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn analyze_prescription(
    State(state): State<AppState>,
    Json(request): Json<AnalyzePrescriptionRequest>,
) -> ApiResult<AnalysisReport> {
    info!(input_len = request.text.len(), "Analyze prescription request");

    let result = state
        .medsafe
        .analyzer
        .analyze(&request.text)
        .await
        .map_err(api_error)?;

    Ok(Json(AnalysisReport::from_result(result)))
}

async fn check_interactions(
    State(state): State<AppState>,
    Json(request): Json<CheckInteractionsRequest>,
) -> ApiResult<InteractionsResponse> {
    info!(drugs = %request.drugs, "Check interactions request");

    let report = state
        .medsafe
        .interactions
        .check(&request.drugs)
        .await
        .map_err(api_error)?;

    Ok(Json(InteractionsResponse {
        sources: renderable_citations(&report.sources),
        interactions: report.interactions,
    }))
}

async fn analyze_secondary(
    State(state): State<AppState>,
    Json(request): Json<AnalyzePrescriptionRequest>,
) -> ApiResult<SecondaryResponse> {
    info!(input_len = request.text.len(), "Secondary analysis request");

    let outcome = state
        .medsafe
        .secondary
        .analyze(&request.text)
        .await
        .map_err(api_error)?;

    let error = outcome.error_summary();
    Ok(Json(SecondaryResponse {
        granite: outcome.granite,
        biobert: outcome.biobert,
        error,
    }))
}

async fn create_chat_session(State(state): State<AppState>) -> ApiResult<ChatSessionResponse> {
    let session = state.medsafe.start_chat();
    let messages = session.transcript().snapshot();
    let session_id = state.sessions.insert(session).await.map_err(api_error)?;

    info!(session_id = %session_id, "Chat session opened");
    Ok(Json(ChatSessionResponse {
        session_id,
        messages,
    }))
}

/// Reading a session while a turn is streaming is a 409; the reply in
/// progress is delivered on the message stream.
async fn get_chat_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ChatSessionResponse> {
    let messages = state
        .sessions
        .checkout(&session_id)
        .await
        .map_err(api_error)?
        .transcript()
        .snapshot();

    Ok(Json(ChatSessionResponse {
        session_id,
        messages,
    }))
}

async fn close_chat_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ChatSessionResponse> {
    let transcript = state.sessions.close(&session_id).await.map_err(api_error)?;
    info!(session_id = %session_id, "Chat session closed");

    Ok(Json(ChatSessionResponse {
        session_id,
        messages: transcript.messages().to_vec(),
    }))
}

fn sse_event(kind: &str, payload: Value) -> Event {
    Event::default()
        .event(kind)
        .json_data(payload)
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to encode SSE payload");
            Event::default().event("error")
        })
}

/// Streams `update` events carrying the reply so far, then one `done` or
/// `error` event.
async fn send_chat_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(bad_request_error("Message cannot be empty."));
    }

    let mut session = state
        .sessions
        .checkout(&session_id)
        .await
        .map_err(api_error)?;

    info!(session_id = %session_id, message_len = request.message.len(), "Chat message received");

    let (tx, rx) = mpsc::unbounded::<Event>();
    let span = tracing::Span::current();

    tokio::spawn(
        async move {
            let updates = tx.clone();
            let result = session
                .send_message(&request.message, |text| {
                    let _ = updates.unbounded_send(sse_event("update", json!({ "text": text })));
                })
                .await;
            drop(session);

            let last = match result {
                Ok(reply) => sse_event("done", json!({ "text": reply })),
                Err(e) => sse_event("error", json!({ "error": e.to_string() })),
            };
            if tx.unbounded_send(last).is_err() {
                warn!("Client disconnected before the chat turn finished");
            }
        }
        .instrument(span),
    );

    Ok(Sse::new(rx.map(Ok::<_, Infallible>)).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use futures::stream;
    use medsafe::{
        Generation, GenerationRequest, HuggingFaceConfig, InferenceEndpoint, LanguageModel,
        Result as MedsafeResult, TextStream,
    };
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use tower::ServiceExt;

    /// Answers `generate` with fixed text and `stream` with fixed chunks.
    struct FakeModel {
        text: String,
        citations: Vec<medsafe::Citation>,
        chunks: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeModel {
        fn new(text: &str, chunks: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                citations: vec![
                    medsafe::Citation {
                        uri: Some("https://example.org/source".to_string()),
                        title: Some("Source".to_string()),
                    },
                    medsafe::Citation {
                        uri: None,
                        title: Some("No link".to_string()),
                    },
                ],
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for FakeModel {
        fn name(&self) -> &str {
            "fake"
        }

        async fn generate(&self, _request: GenerationRequest) -> MedsafeResult<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Generation {
                text: self.text.clone(),
                citations: self.citations.clone(),
            })
        }

        async fn stream(&self, _request: GenerationRequest) -> MedsafeResult<TextStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<MedsafeResult<String>> = self.chunks.iter().cloned().map(Ok).collect();
            Ok(stream::iter(items).boxed())
        }
    }

    /// Granite succeeds, everything else is warming up.
    #[derive(Default)]
    struct FakeEndpoint {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InferenceEndpoint for FakeEndpoint {
        async fn infer(&self, model: &str, _input: &str) -> MedsafeResult<Value> {
            self.seen.lock().unwrap().push(model.to_string());
            if model.contains("granite") {
                Ok(json!([{ "generated_text": "ok" }]))
            } else {
                Err(MedsafeError::WarmingUp {
                    model: model.to_string(),
                })
            }
        }
    }

    fn app(model: Arc<FakeModel>) -> Router {
        let medsafe = Medsafe::with_backends(
            model,
            Arc::new(FakeEndpoint::default()),
            &HuggingFaceConfig::default(),
        );
        build_router(AppState::new(medsafe))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn empty_prescription_is_rejected_locally() {
        let model = FakeModel::new("{}", &[]);
        let response = app(model.clone())
            .oneshot(post_json("/prescriptions/analyze", json!({ "text": "  " })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "invalid_input");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn analysis_report_is_returned() {
        let analysis = json!({
            "summary": "ok",
            "interactions": [],
            "medications": [{
                "name": "Metformin",
                "dosage": "1000mg",
                "frequency": "twice daily",
                "dosageAnalysis": { "status": "Correct", "recommendation": "Fine." },
                "alternatives": []
            }]
        });
        let model = FakeModel::new(&analysis.to_string(), &[]);
        let response = app(model)
            .oneshot(post_json("/prescriptions/analyze", json!({ "text": "Metformin" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["medications"][0]["status"], "Correct");
        assert_eq!(body["flagged"], json!([]));
    }

    #[tokio::test]
    async fn interactions_drop_sources_without_uri() {
        let model = FakeModel::new(
            "```json\n[{\"drugs\":[\"Aspirin\",\"Warfarin\"],\"severity\":\"High\",\"description\":\"Bleeding.\"}]\n```",
            &[],
        );
        let response = app(model)
            .oneshot(post_json("/interactions/check", json!({ "drugs": "Aspirin, Warfarin" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["interactions"][0]["severity"], "High");
        assert_eq!(body["sources"].as_array().unwrap().len(), 1);
        assert_eq!(body["sources"][0]["uri"], "https://example.org/source");
    }

    #[tokio::test]
    async fn unreadable_interactions_are_a_bad_gateway() {
        let model = FakeModel::new("I could not find any.", &[]);
        let response = app(model)
            .oneshot(post_json("/interactions/check", json!({ "drugs": "A, B" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "interpretation");
    }

    #[tokio::test]
    async fn secondary_reports_each_model() {
        let response = app(FakeModel::new("", &[]))
            .oneshot(post_json("/prescriptions/secondary", json!({ "text": "Warfarin" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["granite"]["status"], "ok");
        assert_eq!(body["biobert"]["status"], "error");
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("BioBERT Model Error: The model")
        );
    }

    #[tokio::test]
    async fn chat_turn_streams_and_commits_one_reply() {
        let router = app(FakeModel::new("", &["Hi", " there", "!"]));

        let created = router
            .clone()
            .oneshot(post_json("/chat/sessions", json!({})))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);
        let created = body_json(created).await;
        let session_id = created["session_id"].as_str().unwrap().to_string();
        assert_eq!(created["messages"].as_array().unwrap().len(), 1);

        let streamed = router
            .clone()
            .oneshot(post_json(
                &format!("/chat/sessions/{session_id}/messages"),
                json!({ "message": "Hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(streamed.status(), StatusCode::OK);
        let bytes = to_bytes(streamed.into_body(), usize::MAX).await.unwrap();
        let events = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(events.contains("update"));
        assert!(events.contains(r#"{"text":"Hi there"}"#));
        assert!(events.contains("done"));
        assert!(events.contains(r#"{"text":"Hi there!"}"#));

        let transcript = router
            .oneshot(
                Request::builder()
                    .uri(format!("/chat/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let transcript = body_json(transcript).await;
        let messages = transcript["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], json!({ "role": "model", "text": "Hi there!" }));
    }

    #[tokio::test]
    async fn reading_a_session_mid_turn_is_a_conflict() {
        let medsafe = Medsafe::with_backends(
            FakeModel::new("", &[]),
            Arc::new(FakeEndpoint::default()),
            &HuggingFaceConfig::default(),
        );
        let state = AppState::new(medsafe);
        let session_id = state
            .sessions
            .insert(state.medsafe.start_chat())
            .await
            .unwrap();
        let router = build_router(state.clone());
        let get = || {
            Request::builder()
                .uri(format!("/chat/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap()
        };

        let in_flight = state.sessions.checkout(&session_id).await.unwrap();
        let busy = router.clone().oneshot(get()).await.unwrap();
        assert_eq!(busy.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(busy).await["kind"], "session_busy");

        drop(in_flight);
        let free = router.oneshot(get()).await.unwrap();
        assert_eq!(free.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let response = app(FakeModel::new("", &[]))
            .oneshot(post_json(
                "/chat/sessions/does-not-exist/messages",
                json!({ "message": "Hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn closing_returns_the_transcript() {
        let router = app(FakeModel::new("", &[]));
        let created = body_json(
            router
                .clone()
                .oneshot(post_json("/chat/sessions", json!({})))
                .await
                .unwrap(),
        )
        .await;
        let session_id = created["session_id"].as_str().unwrap();

        let closed = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/chat/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(closed.status(), StatusCode::OK);

        let again = router
            .oneshot(
                Request::builder()
                    .uri(format!("/chat/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }
}
