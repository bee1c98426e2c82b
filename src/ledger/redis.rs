//! Redis ledger backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use super::{UsageLedger, usage_key};
use crate::{HermodError, Result};

/// Counters stored as plain redis integers (`INCRBY` + `EXPIRE`).
///
/// All calls share one [`ConnectionManager`], opened on first use and
/// reconnected by redis-rs when the server drops it.
#[derive(Clone)]
pub struct RedisLedger {
    client: redis::Client,
    manager: Arc<OnceCell<ConnectionManager>>,
}

impl RedisLedger {
    /// Open a client for `redis_url`. No connection is made until first use.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| HermodError::Configuration(format!("invalid redis url: {e}")))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: redis::Client) -> Self {
        Self {
            client,
            manager: Arc::new(OnceCell::new()),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        self.manager
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .cloned()
            .map_err(|e| HermodError::Ledger(format!("redis connection failed: {e}")))
    }
}

#[async_trait]
impl UsageLedger for RedisLedger {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get_usage(&self, identifier: &str, year_month: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        let count: Option<u64> = redis::cmd("GET")
            .arg(usage_key(identifier, year_month))
            .query_async(&mut conn)
            .await
            .map_err(|e| HermodError::Ledger(format!("GET failed: {e}")))?;
        Ok(count.unwrap_or(0))
    }

    async fn increment_usage(&self, identifier: &str, year_month: &str, delta: u64) -> Result<u64> {
        let mut conn = self.connection().await?;
        redis::cmd("INCRBY")
            .arg(usage_key(identifier, year_month))
            .arg(delta)
            .query_async(&mut conn)
            .await
            .map_err(|e| HermodError::Ledger(format!("INCRBY failed: {e}")))
    }

    async fn set_expiry(&self, identifier: &str, year_month: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("EXPIRE")
            .arg(usage_key(identifier, year_month))
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| HermodError::Ledger(format!("EXPIRE failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::UsageTracker;

    #[test]
    fn rejects_malformed_url() {
        assert!(matches!(
            RedisLedger::new("not a url"),
            Err(HermodError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_fails_open() {
        // nothing listens on port 1
        let ledger = RedisLedger::new("redis://127.0.0.1:1/").unwrap();
        let tracker = UsageTracker::new(Arc::new(ledger))
            .monthly_cap(1)
            .timeout(Duration::from_millis(100));

        let checked = tokio::time::timeout(Duration::from_secs(2), tracker.check("u1")).await;
        assert!(matches!(checked, Ok(Ok(()))));
    }
}
