//! HTTP surface: `POST /api/chat` and `GET /health`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use super::config::LimitsConfig;
use crate::HermodError;
use crate::proxy::{ChatProxy, Reply, StreamReply};
use crate::stream::in_band_errors;
use crate::types::{Category, ChatRequest, ErrorBody};

/// Model that served (or would have served) the answer.
pub const MODEL_HEADER: &str = "x-hermod-model";
/// Category the message was classified as.
pub const CATEGORY_HEADER: &str = "x-hermod-category";
/// `hit` or `miss`.
pub const CACHE_HEADER: &str = "x-hermod-cache";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    proxy: Arc<ChatProxy>,
}

/// Build the router with CORS, request tracing and the concurrency limit.
pub fn router(proxy: Arc<ChatProxy>, limits: &LimitsConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/chat",
            post(chat)
                .options(|| async { StatusCode::OK })
                .fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .with_state(AppState { proxy })
        // Router::layer wraps outward, so this is (outer → inner):
        // cors → trace → concurrency limit.
        .layer(middleware::from_fn_with_state(
            Arc::new(Semaphore::new(limits.max_concurrent_requests.max(1))),
            limit_concurrency,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Admit at most `max_concurrent_requests` requests at a time.
///
/// Event-stream bodies keep their permit until the body is finished or
/// dropped, so open streams count against the limit.
async fn limit_concurrency(
    State(permits): State<Arc<Semaphore>>,
    request: Request,
    next: Next,
) -> Response {
    let Ok(permit) = permits.acquire_owned().await else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let response = next.run(request).await;
    let streaming = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"text/event-stream"));
    if !streaming {
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = body.into_data_stream().map(move |chunk| {
        let _held = &permit;
        chunk
    });
    Response::from_parts(parts, Body::from_stream(body))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(&HermodError::InvalidInput(rejection.body_text()));
        }
    };

    match state.proxy.handle(request).await {
        Ok(Reply::Json(reply)) => {
            let headers = reply_headers(&reply.model, reply.cls, reply.cached);
            (headers, Json(reply)).into_response()
        }
        Ok(Reply::Stream(reply)) => stream_response(reply),
        Err(e) => error_response(&e),
    }
}

fn stream_response(reply: StreamReply) -> Response {
    let mut headers = reply_headers(&reply.model, reply.category, reply.cached);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    let body = Body::from_stream(in_band_errors(reply.body));
    (StatusCode::OK, headers, body).into_response()
}

fn reply_headers(model: &str, category: Category, cached: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(model) {
        headers.insert(HeaderName::from_static(MODEL_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(CATEGORY_HEADER),
        HeaderValue::from_static(category.as_str()),
    );
    headers.insert(
        HeaderName::from_static(CACHE_HEADER),
        HeaderValue::from_static(if cached { "hit" } else { "miss" }),
    );
    headers
}

/// Map an error to its status and `{"error": ...}` body.
pub fn error_response(err: &HermodError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    if status.is_server_error() {
        match err {
            HermodError::Configuration(_) => error!(error = %err, "request failed"),
            _ => warn!(error = %err, "request failed"),
        }
    } else {
        debug!(error = %err, status = status.as_u16(), "request rejected");
    }
    (status, Json(ErrorBody::from(err))).into_response()
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            error: "método não permitido".to_string(),
        }),
    )
        .into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
