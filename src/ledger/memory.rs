//! Process-local ledger backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::Op;

use super::{UsageLedger, usage_key};
use crate::Result;

/// Default number of counters kept before the least recently used is dropped.
pub const DEFAULT_MAX_COUNTERS: u64 = 100_000;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    ttl: Option<Duration>,
    /// Set by `set_expiry`; increments leave the running clock alone.
    restart_clock: bool,
}

struct CounterExpiry;

impl Expiry<String, Counter> for CounterExpiry {
    fn expire_after_create(&self, _key: &String, value: &Counter, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Counter,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        if value.restart_clock {
            value.ttl
        } else {
            duration_until_expiry
        }
    }
}

/// In-memory counters for tests and single-node deployments.
///
/// Counters expire like their redis counterparts and the number of live
/// counters is bounded; past the bound the least recently used counter is
/// forgotten and its identifier starts again from zero.
pub struct MemoryLedger {
    counters: Cache<String, Counter>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_COUNTERS)
    }

    pub fn with_capacity(max_counters: u64) -> Self {
        let counters = Cache::builder()
            .max_capacity(max_counters)
            .expire_after(CounterExpiry)
            .build();
        Self { counters }
    }

    /// Seed a counter directly. The counter does not expire.
    pub async fn set_usage(&self, identifier: &str, year_month: &str, count: u64) {
        let counter = Counter {
            count,
            ttl: None,
            restart_clock: true,
        };
        self.counters
            .insert(usage_key(identifier, year_month), counter)
            .await;
    }

    /// The last expiry set for a live counter.
    pub async fn expiry(&self, identifier: &str, year_month: &str) -> Option<Duration> {
        self.counters
            .get(&usage_key(identifier, year_month))
            .await?
            .ttl
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("counters", &self.counters.entry_count())
            .finish()
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_usage(&self, identifier: &str, year_month: &str) -> Result<u64> {
        Ok(self
            .counters
            .get(&usage_key(identifier, year_month))
            .await
            .map_or(0, |counter| counter.count))
    }

    async fn increment_usage(&self, identifier: &str, year_month: &str, delta: u64) -> Result<u64> {
        let entry = self
            .counters
            .entry(usage_key(identifier, year_month))
            .and_upsert_with(|existing| {
                let counter = match existing {
                    Some(entry) => {
                        let current = entry.into_value();
                        Counter {
                            count: current.count.saturating_add(delta),
                            ttl: current.ttl,
                            restart_clock: false,
                        }
                    }
                    None => Counter {
                        count: delta,
                        ttl: None,
                        restart_clock: false,
                    },
                };
                std::future::ready(counter)
            })
            .await;
        Ok(entry.into_value().count)
    }

    /// Missing counters are left alone, as with redis `EXPIRE`.
    async fn set_expiry(&self, identifier: &str, year_month: &str, ttl: Duration) -> Result<()> {
        self.counters
            .entry(usage_key(identifier, year_month))
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) => Op::Put(Counter {
                        ttl: Some(ttl),
                        restart_clock: true,
                        ..entry.into_value()
                    }),
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_counter_reads_zero() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.get_usage("u1", "2024-01").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn increments_accumulate_per_month() {
        let ledger = MemoryLedger::new();
        ledger.increment_usage("u1", "2024-01", 5).await.unwrap();
        assert_eq!(ledger.increment_usage("u1", "2024-01", 3).await.unwrap(), 8);
        assert_eq!(ledger.get_usage("u1", "2024-02").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expiry_on_missing_counter_is_ignored() {
        let ledger = MemoryLedger::new();
        ledger
            .set_expiry("u1", "2024-01", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(ledger.expiry("u1", "2024-01").await, None);
        assert_eq!(ledger.get_usage("u1", "2024-01").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn increment_keeps_expiry() {
        let ledger = MemoryLedger::new();
        ledger.increment_usage("u1", "2024-01", 1).await.unwrap();
        ledger
            .set_expiry("u1", "2024-01", Duration::from_secs(60))
            .await
            .unwrap();
        ledger.increment_usage("u1", "2024-01", 1).await.unwrap();
        assert_eq!(
            ledger.expiry("u1", "2024-01").await,
            Some(Duration::from_secs(60))
        );
    }
}
