//! Per-identifier monthly usage accounting.
//!
//! The ledger is an external counter store addressed by
//! `usage:{identifier}:{YYYY-MM}`. [`UsageTracker`] sits in front of it and
//! enforces an optional monthly token cap:
//!
//! - [`UsageTracker::check`] runs before any upstream call and rejects
//!   identifiers at or above the cap.
//! - [`UsageTracker::record`] runs after a successful response and credits
//!   the estimated token count.
//!
//! The store is best effort. Any store failure, a store that does not
//! answer within the tracker's timeout, or an unconfigured store lets the
//! request through; read-then-write races may overshoot the cap
//! slightly. Token counts are estimates ([`estimate_tokens`]), not billing.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryLedger;
#[cfg(feature = "redis")]
pub use self::redis::RedisLedger;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::telemetry;
use crate::{HermodError, Result};

/// Identifier used for requests that carry no `userId`.
pub const ANONYMOUS: &str = "anonymous";

/// How long a monthly counter is kept after its last increment.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(40 * 24 * 60 * 60);

/// Time budget for a single ledger call.
pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_millis(500);

/// External usage counter store.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Current count for an identifier and month; absent counters read as 0.
    async fn get_usage(&self, identifier: &str, year_month: &str) -> Result<u64>;

    /// Add `delta` to the counter, returning the new value.
    async fn increment_usage(&self, identifier: &str, year_month: &str, delta: u64) -> Result<u64>;

    /// (Re)set the counter's expiry.
    async fn set_expiry(&self, identifier: &str, year_month: &str, ttl: Duration) -> Result<()>;
}

/// Store key for a counter.
pub fn usage_key(identifier: &str, year_month: &str) -> String {
    format!("usage:{identifier}:{year_month}")
}

/// `YYYY-MM` bucket for a point in time (UTC).
pub fn year_month(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Heuristic token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(chars: usize) -> u64 {
    (chars as u64).div_ceil(4)
}

/// Normalise an optional client identifier.
pub fn identifier(user_id: Option<&str>) -> &str {
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ => ANONYMOUS,
    }
}

/// Quota guard over an optional ledger.
#[derive(Clone, Default)]
pub struct UsageTracker {
    ledger: Option<Arc<dyn UsageLedger>>,
    monthly_cap: Option<u64>,
    retention: Option<Duration>,
    timeout: Option<Duration>,
}

impl UsageTracker {
    pub fn new(ledger: Arc<dyn UsageLedger>) -> Self {
        Self {
            ledger: Some(ledger),
            monthly_cap: None,
            retention: None,
            timeout: None,
        }
    }

    /// Tracker with no store: every check passes and nothing is recorded.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Monthly cap in estimated tokens. Without a cap usage is only recorded.
    pub fn monthly_cap(mut self, cap: u64) -> Self {
        self.monthly_cap = Some(cap);
        self
    }

    /// Counter expiry. Default: 40 days.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Upper bound on each ledger call. Default: 500 ms.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.ledger.is_some()
    }

    /// Reject the identifier if its usage this month is at or above the cap.
    ///
    /// Fails open: store errors are logged and the request is allowed.
    pub async fn check(&self, identifier: &str) -> Result<()> {
        let (Some(ledger), Some(cap)) = (&self.ledger, self.monthly_cap) else {
            return Ok(());
        };
        let month = year_month(Utc::now());
        match self.bounded(ledger.get_usage(identifier, &month)).await {
            Ok(used) if used >= cap => {
                debug!(identifier, used, cap, "monthly quota exceeded");
                Err(HermodError::QuotaExceeded {
                    identifier: identifier.to_string(),
                    used,
                    cap,
                })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(ledger = ledger.name(), identifier, error = %e, "usage lookup failed, allowing request");
                Ok(())
            }
        }
    }

    /// Credit `ceil(payload/4) + ceil(response/4)` tokens to the identifier.
    ///
    /// Returns the estimate. Store errors are logged, never returned.
    pub async fn record(&self, identifier: &str, payload_chars: usize, response_chars: usize) -> u64 {
        let tokens = estimate_tokens(payload_chars) + estimate_tokens(response_chars);
        metrics::counter!(telemetry::TOKENS_ESTIMATED_TOTAL).increment(tokens);

        let Some(ledger) = &self.ledger else {
            return tokens;
        };
        let month = year_month(Utc::now());
        if let Err(e) = self
            .bounded(ledger.increment_usage(identifier, &month, tokens))
            .await
        {
            warn!(ledger = ledger.name(), identifier, error = %e, "usage increment failed");
            return tokens;
        }
        let retention = self.retention.unwrap_or(DEFAULT_RETENTION);
        if let Err(e) = self
            .bounded(ledger.set_expiry(identifier, &month, retention))
            .await
        {
            warn!(ledger = ledger.name(), identifier, error = %e, "usage expiry failed");
        }
        debug!(identifier, tokens, "usage recorded");
        tokens
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.timeout.unwrap_or(DEFAULT_LEDGER_TIMEOUT);
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(HermodError::Ledger(format!("no answer within {limit:?}"))))
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("ledger", &self.ledger.as_ref().map(|l| l.name().to_string()))
            .field("monthly_cap", &self.monthly_cap)
            .field("timeout", &self.timeout)
            .finish()
    }
}
