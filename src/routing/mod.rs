//! Routing: category → system prompt, sampling parameters and model.
//!
//! [`PolicyTable`] is total over [`Category`](crate::types::Category).
//! Model identifiers come from [`ModelTiers`], which resolves a missing tier
//! through a fallback chain instead of producing an empty id.

mod policy;
mod tiers;

pub use policy::{DEFAULT_ESCALATION_CHARS, PolicyEntry, PolicyTable, RoutingDecision};
pub use tiers::{ModelTiers, Tier};
