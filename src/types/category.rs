//! Message categories produced by the classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse intent label for a user message.
///
/// Drives system prompt, sampling parameters and model tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Factual,
    Technical,
    Creative,
    Unrestricted,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 4] = [
        Category::Factual,
        Category::Technical,
        Category::Creative,
        Category::Unrestricted,
    ];

    /// Stable tag used in cache keys, headers and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Factual => "factual",
            Category::Technical => "technical",
            Category::Creative => "creative",
            Category::Unrestricted => "unrestricted",
        }
    }

    /// Whether requests in this category may race two model tiers.
    pub fn is_raceable(&self) -> bool {
        matches!(self, Category::Technical | Category::Creative)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_matches_tag() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn only_technical_and_creative_race() {
        let raceable: Vec<_> = Category::ALL
            .into_iter()
            .filter(Category::is_raceable)
            .collect();
        assert_eq!(raceable, vec![Category::Technical, Category::Creative]);
    }
}
