//! Hermod - classifying, caching, streaming proxy for LLM chat APIs
//!
//! Every request runs through one pipeline:
//!
//! 1. **classify** the user message into a [`Category`]
//! 2. **route** the category to a system prompt, sampling parameters and
//!    model tier ([`PolicyTable`])
//! 3. **cache** probe on `(message, category)` ([`ResponseCache`])
//! 4. **dispatch** upstream with optional racing, retry and timeouts
//!    ([`Gateway`]), after a best-effort monthly quota check
//!    ([`UsageTracker`])
//! 5. **stream** the answer back through an [`InterceptedStream`] that
//!    commits it to the cache once the upstream finishes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hermod::{ChatProxy, ChatRequest, Gateway, ModelTiers, OpenAiCompatClient, PolicyTable, Reply};
//!
//! #[tokio::main]
//! async fn main() -> hermod::Result<()> {
//!     let tiers = ModelTiers::new()
//!         .cheap("mistralai/Mistral-7B-Instruct-v0.2")
//!         .heavy("meta-llama/Meta-Llama-3.1-70B-Instruct");
//!     let client = OpenAiCompatClient::new(std::env::var("DEEPINFRA_API_KEY").ok())?;
//!     let proxy = ChatProxy::new(
//!         Gateway::new(Arc::new(client), tiers.clone()),
//!         PolicyTable::new(tiers),
//!     );
//!
//!     match proxy.handle(ChatRequest::new("Qual a capital do Brasil?")).await? {
//!         Reply::Json(reply) => println!("{}", reply.text),
//!         Reply::Stream(_) => unreachable!("factual answers are buffered"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod classify;
pub mod error;
pub mod ledger;
pub mod proxy;
pub mod routing;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;
pub mod telemetry;
pub mod types;
pub mod upstream;

/// Crate version, as reported by `hermodd --version` and `/health`.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use error::{HermodError, Result};
pub use proxy::{ChatProxy, Reply, StreamReply};

pub use cache::{CacheConfig, CacheKey, CachedAnswer, CachedValue, ResponseCache, compute_key};
pub use classify::{Classifier, FixedClassifier, KeywordClassifier, classify};
#[cfg(feature = "redis")]
pub use ledger::RedisLedger;
pub use ledger::{MemoryLedger, UsageLedger, UsageTracker, estimate_tokens};
pub use routing::{ModelTiers, PolicyEntry, PolicyTable, RoutingDecision, Tier};
pub use stream::{ByteStream, Captured, CommitHook, InterceptedStream};
pub use types::{Category, ChatReply, ChatRequest, ErrorBody, Message, Role};
pub use upstream::{
    Completion, CompletionProvider, CompletionRequest, Dispatched, Gateway, GatewayConfig,
    OpenAiCompatClient, RetryConfig, UpstreamStream,
};
