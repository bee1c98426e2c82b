//! Model tiers and the fallback chain between them.

use serde::{Deserialize, Serialize};

/// Cost/quality level of an upstream model, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cheap,
    Heavy,
    Ultra,
}

impl Tier {
    /// All tiers, cheapest first.
    pub const ALL: [Tier; 3] = [Tier::Cheap, Tier::Heavy, Tier::Ultra];

    /// The next more expensive tier, saturating at [`Tier::Ultra`].
    pub fn escalate(self) -> Tier {
        match self {
            Tier::Cheap => Tier::Heavy,
            Tier::Heavy | Tier::Ultra => Tier::Ultra,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Cheap => "cheap",
            Tier::Heavy => "heavy",
            Tier::Ultra => "ultra",
        }
    }
}

/// Configured upstream model identifiers per tier.
///
/// Every tier is optional. Lookups fall back to the next cheaper configured
/// tier, and only when nothing cheaper exists to the next more expensive
/// one, so a lookup never yields an empty id while any tier is set.
///
/// ```toml
/// [models]
/// cheap = "mistralai/Mistral-7B-Instruct-v0.2"
/// heavy = "meta-llama/Meta-Llama-3.1-70B-Instruct"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTiers {
    #[serde(default)]
    pub cheap: Option<String>,
    #[serde(default)]
    pub heavy: Option<String>,
    #[serde(default)]
    pub ultra: Option<String>,
}

impl ModelTiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cheap(mut self, model: impl Into<String>) -> Self {
        self.cheap = Some(model.into());
        self
    }

    pub fn heavy(mut self, model: impl Into<String>) -> Self {
        self.heavy = Some(model.into());
        self
    }

    pub fn ultra(mut self, model: impl Into<String>) -> Self {
        self.ultra = Some(model.into());
        self
    }

    /// The model configured for exactly this tier, ignoring blanks.
    pub fn get(&self, tier: Tier) -> Option<&str> {
        let slot = match tier {
            Tier::Cheap => &self.cheap,
            Tier::Heavy => &self.heavy,
            Tier::Ultra => &self.ultra,
        };
        slot.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }

    /// Resolve a tier through the fallback chain.
    ///
    /// Returns the resolved tier alongside its model id.
    pub fn resolve(&self, tier: Tier) -> Option<(Tier, &str)> {
        let cheaper_or_equal = Tier::ALL.iter().rev().filter(|t| **t <= tier);
        let more_expensive = Tier::ALL.iter().filter(|t| **t > tier);
        cheaper_or_equal
            .chain(more_expensive)
            .find_map(|t| self.get(*t).map(|model| (*t, model)))
    }

    /// The cheapest configured model.
    pub fn cheapest(&self) -> Option<&str> {
        self.resolve(Tier::Cheap).map(|(_, model)| model)
    }

    pub fn is_empty(&self) -> bool {
        Tier::ALL.iter().all(|t| self.get(*t).is_none())
    }
}
