//! HTTP surface tests: the router is driven in-process with `oneshot`.

#![cfg(feature = "server")]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use bytes::Bytes;
use chrono::Utc;
use futures_util::stream;
use serde_json::{Value, json};
use tower::ServiceExt;

use hermod::ledger::{MemoryLedger, UsageTracker, year_month};
use hermod::server::config::LimitsConfig;
use hermod::server::router;
use hermod::server::service::{CACHE_HEADER, CATEGORY_HEADER, MODEL_HEADER};
use hermod::upstream::{Completion, CompletionProvider, CompletionRequest, Gateway};
use hermod::{ByteStream, ChatProxy, HermodError, ModelTiers, PolicyTable, Result};

const CHEAP: &str = "cheap/model";
const HEAVY: &str = "heavy/model";

// ============================================================================
// Mock provider
// ============================================================================

struct EchoProvider {
    fail_stream_after_first_chunk: bool,
}

#[async_trait]
impl CompletionProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let question = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(Completion {
            text: format!("resposta: {question}"),
            model: request.model.clone(),
        })
    }

    async fn complete_stream(&self, _request: &CompletionRequest) -> Result<ByteStream> {
        let mut items = vec![Ok(Bytes::from_static(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Era uma vez\"}}]}\n\n",
        ))];
        if self.fail_stream_after_first_chunk {
            items.push(Err(HermodError::Stream("connection reset".into())));
        } else {
            items.push(Ok(Bytes::from_static(b"data: [DONE]\n\n")));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn app_with(provider: EchoProvider, usage: UsageTracker) -> Router {
    let tiers = ModelTiers::new().cheap(CHEAP).heavy(HEAVY);
    let proxy = ChatProxy::new(
        Gateway::new(Arc::new(provider), tiers.clone()),
        PolicyTable::new(tiers),
    )
    .usage(usage);
    router(Arc::new(proxy), &LimitsConfig::default())
}

fn app_with_limit(max_concurrent_requests: usize) -> Router {
    let tiers = ModelTiers::new().cheap(CHEAP).heavy(HEAVY);
    let provider = EchoProvider {
        fail_stream_after_first_chunk: false,
    };
    let proxy = ChatProxy::new(
        Gateway::new(Arc::new(provider), tiers.clone()),
        PolicyTable::new(tiers),
    );
    let limits = LimitsConfig {
        max_concurrent_requests,
    };
    router(Arc::new(proxy), &limits)
}

fn app() -> Router {
    app_with(
        EchoProvider {
            fail_stream_after_first_chunk: false,
        },
        UsageTracker::disabled(),
    )
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

// ============================================================================
// Successful requests
// ============================================================================

#[tokio::test]
async fn factual_request_returns_json_reply() {
    let response = app()
        .oneshot(chat_request(json!({"message": "Qual a capital do Brasil?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[MODEL_HEADER], CHEAP);
    assert_eq!(response.headers()[CATEGORY_HEADER], "factual");
    assert_eq!(response.headers()[CACHE_HEADER], "miss");

    let body = body_json(response).await;
    assert_eq!(body["text"], "resposta: Qual a capital do Brasil?");
    assert_eq!(body["model"], CHEAP);
    assert_eq!(body["cls"], "factual");
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let app = app();
    let request = json!({"message": "Qual a capital do Brasil?"});

    let first = app.clone().oneshot(chat_request(request.clone())).await.unwrap();
    assert_eq!(first.headers()[CACHE_HEADER], "miss");
    let _ = body_text(first).await;

    let second = app.oneshot(chat_request(request)).await.unwrap();
    assert_eq!(second.headers()[CACHE_HEADER], "hit");
    assert_eq!(body_json(second).await["cached"], true);
}

#[tokio::test]
async fn creative_request_streams_sse() {
    let response = app()
        .oneshot(chat_request(json!({"message": "crie um poema", "userId": "u1"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()[CATEGORY_HEADER], "creative");
    assert_eq!(response.headers()[MODEL_HEADER], HEAVY);

    let body = body_text(response).await;
    assert!(body.contains("Era uma vez"));
    assert!(body.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn mid_stream_failure_ends_with_error_event() {
    let app = app_with(
        EchoProvider {
            fail_stream_after_first_chunk: true,
        },
        UsageTracker::disabled(),
    );

    let response = app
        .oneshot(chat_request(json!({"message": "crie um poema"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.starts_with("data: "));
    assert!(body.ends_with("event: error\ndata: {\"error\":\"erro ao consultar o modelo\"}\n\n"));
}

#[tokio::test]
async fn health_reports_version() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], hermod::PKG_VERSION);
}

// ============================================================================
// Concurrency limit
// ============================================================================

#[tokio::test]
async fn open_stream_holds_its_slot() {
    let app = app_with_limit(1);

    let streaming = app
        .clone()
        .oneshot(chat_request(json!({"message": "crie um poema"})))
        .await
        .unwrap();
    assert_eq!(streaming.headers()[header::CONTENT_TYPE], "text/event-stream");

    let health = || Request::get("/health").body(Body::empty()).unwrap();
    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        app.clone().oneshot(health()),
    )
    .await;
    assert!(blocked.is_err(), "second request admitted while the stream is open");

    body_text(streaming).await;
    let response = tokio::time::timeout(Duration::from_secs(2), app.oneshot(health()))
        .await
        .expect("slot released once the stream finished")
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn json_replies_release_their_slot() {
    let app = app_with_limit(1);

    for _ in 0..3 {
        let response = tokio::time::timeout(
            Duration::from_secs(2),
            app.clone()
                .oneshot(chat_request(json!({"message": "Qual a capital do Brasil?"}))),
        )
        .await
        .expect("request admitted")
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn empty_message_is_bad_request() {
    let response = app()
        .oneshot(chat_request(json!({"message": ""})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("requisição inválida"));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn missing_message_field_is_bad_request() {
    let response = app()
        .oneshot(chat_request(json!({"history": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_method_is_not_allowed() {
    let response = app()
        .oneshot(Request::get("/api/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"], "método não permitido");
}

#[tokio::test]
async fn preflight_is_answered() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn over_quota_is_too_many_requests() {
    let store = Arc::new(MemoryLedger::new());
    store.set_usage("u1", &year_month(Utc::now()), 50).await;
    let app = app_with(
        EchoProvider {
            fail_stream_after_first_chunk: false,
        },
        UsageTracker::new(store).monthly_cap(50),
    );

    let response = app
        .oneshot(chat_request(json!({"message": "oi", "userId": "u1"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"], "limite mensal de uso atingido");
}
