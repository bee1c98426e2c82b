//! Caching subsystem.
//!
//! - [`compute_key`] derives a stable [`CacheKey`] from message text and
//!   category.
//! - [`ResponseCache`] holds completed answers under those keys with LRU
//!   and TTL eviction. See the [`response`] module docs.

mod key;
pub mod response;

pub use key::{CacheKey, compute_key};
pub use response::{CacheConfig, CachedAnswer, CachedValue, ResponseCache};
