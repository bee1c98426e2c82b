//! HTTP server and daemon configuration.
//!
//! This module provides:
//! - The axum service exposing `POST /api/chat` and `GET /health` (`service`)
//! - Configuration and secrets loading (`config`)
//!
//! Errors raised before a response starts are mapped to their HTTP status
//! with a `{"error": ...}` body. Once a stream has started, failures are
//! reported in-band as an SSE `error` event.

pub mod config;
pub mod service;

pub use config::{Config, Secrets};
pub use service::{AppState, error_response, router};
