//! Upstream provider trait.

use async_trait::async_trait;

use super::payload::{Completion, CompletionRequest};
use crate::Result;
use crate::stream::ByteStream;

/// An OpenAI-compatible chat-completions backend.
///
/// Implementations perform exactly one HTTP exchange per call. Retries,
/// racing and timeouts are applied above this trait by the gateway.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Run a buffered completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Start a streaming completion and return the raw response body.
    ///
    /// Errors before the first byte (connection, non-2xx status) are
    /// returned here; later failures surface as stream items.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<ByteStream>;
}
