use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use movie_night_api::{
    api::{create_router, AppState},
    error::{AppError, AppResult},
    models::{CandidateMovie, EmbeddingVector, TraceRecord, EMBEDDING_DIMENSIONS},
    services::{
        embedding::Embedder,
        generation::{ChatCompletion, ChatModel, ChatRequest, TokenUsage, NO_MATCH_SENTINEL},
        observability::TraceSink,
        retrieval::Retriever,
        PipelineSettings, RecommendationPipeline,
    },
};

const ALLOWED_ORIGIN: &str = "http://localhost:5173";

#[derive(Clone, Default)]
struct FakeEmbedder {
    fail: bool,
    inputs: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> AppResult<EmbeddingVector> {
        self.inputs.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(AppError::ExternalApi("embedding gateway unreachable".to_string()));
        }
        Ok(vec![0.02; EMBEDDING_DIMENSIONS])
    }

    fn model(&self) -> &'static str {
        "text-embedding-3-small"
    }
}

#[derive(Clone, Default)]
struct FakeRetriever {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Retriever for FakeRetriever {
    async fn search(
        &self,
        _vector: &[f32],
        match_threshold: f32,
        match_count: usize,
    ) -> AppResult<Vec<CandidateMovie>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(match_threshold, 0.2);
        assert_eq!(match_count, 6);
        Ok(candidates())
    }
}

#[derive(Clone)]
struct FakeChatModel {
    reply: &'static str,
    prompts: Arc<Mutex<Vec<ChatRequest>>>,
}

#[async_trait::async_trait]
impl ChatModel for FakeChatModel {
    async fn complete(&self, request: ChatRequest) -> AppResult<ChatCompletion> {
        self.prompts.lock().unwrap().push(request);
        Ok(ChatCompletion {
            text: self.reply.to_string(),
            usage: TokenUsage {
                prompt_tokens: 800,
                completion_tokens: 300,
                total_tokens: 1100,
            },
        })
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    traces: Arc<Mutex<Vec<TraceRecord>>>,
}

#[async_trait::async_trait]
impl TraceSink for RecordingSink {
    async fn flush(&self, trace: &TraceRecord) -> AppResult<()> {
        self.traces.lock().unwrap().push(trace.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct Harness {
    app: Router,
    embedder: FakeEmbedder,
    retriever: FakeRetriever,
    chat_model: FakeChatModel,
    sink: RecordingSink,
}

fn candidates() -> Vec<CandidateMovie> {
    vec![
        CandidateMovie {
            id: "101".to_string(),
            content: "Mad Max: Fury Road (2015). Relentless action in the desert.".to_string(),
            score: 0.81,
        },
        CandidateMovie {
            id: "102".to_string(),
            content: "The Nice Guys (2016). Buddy action comedy.".to_string(),
            score: 0.64,
        },
        CandidateMovie {
            id: "103".to_string(),
            content: "Hot Fuzz (2007). Police comedy with big action.".to_string(),
            score: 0.42,
        },
    ]
}

fn harness(embedder_fails: bool, reply: &'static str) -> Harness {
    let embedder = FakeEmbedder {
        fail: embedder_fails,
        ..FakeEmbedder::default()
    };
    let retriever = FakeRetriever::default();
    let chat_model = FakeChatModel {
        reply,
        prompts: Arc::default(),
    };
    let sink = RecordingSink::default();

    let pipeline = RecommendationPipeline::new(
        Arc::new(embedder.clone()),
        Arc::new(retriever.clone()),
        Arc::new(chat_model.clone()),
        Arc::new(sink.clone()),
        PipelineSettings::default(),
    );
    let state = AppState::new(pipeline, HashSet::from([ALLOWED_ORIGIN.to_string()]));

    Harness {
        app: create_router(state),
        embedder,
        retriever,
        chat_model,
        sink,
    }
}

fn request_body() -> Value {
    json!({
        "movieSetUpPreferences": { "numberOfPeople": "2", "time": "120 minutes" },
        "peopleResponses": [
            {
                "userResponses": "I like action movies",
                "stringifiedQueryAndResponses": "What do you feel like? I like action movies"
            },
            {
                "userResponses": "I like comedies",
                "stringifiedQueryAndResponses": "What do you feel like? I like comedies"
            }
        ]
    })
}

fn post(origin: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_cors_headers(response: &Response, expected_origin: &str) {
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], expected_origin);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn test_health_check() {
    let h = harness(false, "unused");
    let response = h
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_preflight_returns_no_content() {
    let h = harness(false, "unused");
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .body(Body::empty())
        .unwrap();

    let response = h.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_cors_headers(&response, ALLOWED_ORIGIN);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_preflight_from_disallowed_origin_gets_empty_allow_origin() {
    let h = harness(false, "unused");
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, "https://not-ours.example.com")
        .body(Body::empty())
        .unwrap();

    let response = h.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_cors_headers(&response, "");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
    assert!(h.embedder.inputs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_disallowed_origin_is_forbidden() {
    let h = harness(false, "unused");
    let response = h
        .app
        .oneshot(post(Some("https://not-ours.example.com"), request_body().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_cors_headers(&response, "");
    assert_eq!(body_json(response).await["error"], "Origin not allowed");
    assert!(h.embedder.inputs.lock().unwrap().is_empty());
    assert!(h.sink.traces.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_origin_is_forbidden() {
    let h = harness(false, "unused");
    let response = h
        .app
        .oneshot(post(None, request_body().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "");
}

#[tokio::test]
async fn test_other_methods_not_allowed() {
    for method in ["GET", "PUT", "DELETE", "PATCH"] {
        let h = harness(false, "unused");
        let request = Request::builder()
            .method(method)
            .uri("/")
            .header(header::ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap();

        let response = h.app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_cors_headers(&response, ALLOWED_ORIGIN);
        assert_eq!(body_json(response).await["error"], "Method not allowed");
    }
}

#[tokio::test]
async fn test_malformed_request_is_bad_request() {
    let h = harness(false, "unused");
    let body = json!({ "movieSetUpPreferences": { "numberOfPeople": "2" } });

    let response = h
        .app
        .oneshot(post(Some(ALLOWED_ORIGIN), body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_cors_headers(&response, ALLOWED_ORIGIN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].is_string());

    assert!(h.embedder.inputs.lock().unwrap().is_empty());
    assert!(h.sink.traces.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_recommendation_end_to_end() {
    let h = harness(false, "Mad Max for the action fan, Hot Fuzz for everyone.");

    let response = h
        .app
        .oneshot(post(Some(ALLOWED_ORIGIN), request_body().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors_headers(&response, ALLOWED_ORIGIN);
    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();

    let body = body_json(response).await;
    assert_eq!(body["noMatchFromLLM"], false);
    assert_eq!(
        body["content"],
        "Mad Max for the action fan, Hot Fuzz for everyone."
    );
    let movies = body["movieRecommendations"].as_array().unwrap();
    assert_eq!(movies.len(), 3);
    assert_eq!(movies[0]["id"], "101");
    assert_eq!(movies[2]["content"], candidates()[2].content);

    assert_eq!(
        *h.embedder.inputs.lock().unwrap(),
        vec!["120 minutes\nI like action movies\nI like comedies".to_string()]
    );
    assert_eq!(h.retriever.calls.load(Ordering::SeqCst), 1);

    let prompts = h.chat_model.prompts.lock().unwrap();
    let user = &prompts[0].messages[1].content;
    assert!(user.contains("What do you feel like? I like action movies"));
    assert!(user.contains("What do you feel like? I like comedies"));
    for candidate in candidates() {
        assert!(user.contains(&candidate.content));
    }

    let traces = h.sink.traces.lock().unwrap();
    assert_eq!(traces.len(), 1);
    assert!(traces[0].success);
    assert_eq!(traces[0].request_id, request_id);
    assert_ne!(traces[0].trace_id, request_id);
    assert_eq!(traces[0].spans.len(), 3);
}

#[tokio::test]
async fn test_no_match_returns_null_recommendations() {
    let h = harness(false, NO_MATCH_SENTINEL);

    let response = h
        .app
        .oneshot(post(Some(ALLOWED_ORIGIN), request_body().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["noMatchFromLLM"], true);
    assert!(body["movieRecommendations"].is_null());
    assert_eq!(body["content"], NO_MATCH_SENTINEL);
}

#[tokio::test]
async fn test_upstream_failure_is_single_500_with_flushed_trace() {
    let h = harness(true, "unused");

    let response = h
        .app
        .oneshot(post(Some(ALLOWED_ORIGIN), request_body().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors_headers(&response, ALLOWED_ORIGIN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to generate embedding");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("embedding gateway unreachable"));

    assert_eq!(h.retriever.calls.load(Ordering::SeqCst), 0);
    assert!(h.chat_model.prompts.lock().unwrap().is_empty());

    let traces = h.sink.traces.lock().unwrap();
    assert_eq!(traces.len(), 1);
    assert!(!traces[0].success);
}
