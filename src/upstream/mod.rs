//! Upstream LLM access.
//!
//! - [`CompletionProvider`] is the seam to the inference API;
//!   [`OpenAiCompatClient`] is the HTTP implementation.
//! - [`Gateway`] turns a [`RoutingDecision`](crate::routing::RoutingDecision)
//!   into an upstream call, adding the optional two-tier race, retry on the
//!   cheapest tier and per-call timeouts.

mod client;
mod gateway;
mod payload;
mod race;
mod retry;
mod traits;

pub use client::{DEFAULT_BASE_URL, OpenAiCompatClient};
pub use gateway::{DEFAULT_TIMEOUT, Dispatched, Gateway, GatewayConfig, UpstreamStream};
pub use payload::{Completion, CompletionRequest, DEFAULT_HISTORY_TURNS, parse_completion};
pub use race::Winner;
pub use retry::RetryConfig;
pub use traits::CompletionProvider;
