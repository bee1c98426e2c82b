//! Telemetry metric name constants.
//!
//! Centralised metric names for hermod operations. The daemon (or an
//! embedding application) installs its own `metrics` recorder; without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `hermod_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `category` — classifier output (e.g. "factual", "creative")
//! - `mode` — "buffered" or "streaming"
//! - `status` — outcome: "ok" or "error"
//! - `outcome` — stream end state: "completed", "failed", "disconnected"

/// Total upstream dispatches.
///
/// Labels: `mode`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "hermod_requests_total";

/// Upstream dispatch duration in seconds (until the first byte for streams).
///
/// Labels: `mode`.
pub const REQUEST_DURATION_SECONDS: &str = "hermod_request_duration_seconds";

/// Total retry attempts on the fallback tier (not counting the initial request).
pub const RETRIES_TOTAL: &str = "hermod_retries_total";

/// Total two-candidate races, labelled by the winning tier.
///
/// Labels: `winner` ("primary" | "cheap" | "none").
pub const RACE_TOTAL: &str = "hermod_race_total";

/// Total response cache hits.
///
/// Labels: `category`.
pub const CACHE_HITS_TOTAL: &str = "hermod_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `category`.
pub const CACHE_MISSES_TOTAL: &str = "hermod_cache_misses_total";

/// Estimated tokens credited to the usage ledger.
pub const TOKENS_ESTIMATED_TOTAL: &str = "hermod_tokens_estimated_total";

/// Total intercepted streams by end state.
///
/// Labels: `outcome`.
pub const STREAMS_TOTAL: &str = "hermod_streams_total";
