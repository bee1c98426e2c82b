//! Message classification.
//!
//! [`classify`] maps raw message text to exactly one [`Category`] using
//! keyword rules evaluated in a fixed priority order:
//!
//! 1. flagged-content patterns → [`Category::Unrestricted`]
//! 2. technical keywords → [`Category::Technical`]
//! 3. very long messages → [`Category::Technical`]
//! 4. creative-request keywords → [`Category::Creative`]
//! 5. anything else → [`Category::Factual`]
//!
//! Matching is case-insensitive and Unicode-aware (`código` and `CÓDIGO`
//! hit the same rule). Classification only looks at the current message,
//! never at conversation history, so the cache key derived from
//! `(message, category)` is stable across conversations.
//!
//! The [`Classifier`] trait is the swap point: [`FixedClassifier`] forces
//! all traffic into one category without touching any other component.

mod rules;

use crate::types::Category;

/// Default length (in characters) above which a message counts as technical.
pub const DEFAULT_LONG_MESSAGE_CHARS: usize = 400;

/// Maps a user message to a category.
///
/// Implementations must be pure and total: every input, including the
/// empty string, maps to exactly one category, and repeated calls agree.
pub trait Classifier: Send + Sync {
    fn classify(&self, message: &str) -> Category;
}

/// Keyword-rule classifier (the default).
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    long_message_chars: usize,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            long_message_chars: DEFAULT_LONG_MESSAGE_CHARS,
        }
    }

    /// Messages longer than `chars` characters are routed as technical.
    pub fn long_message_chars(mut self, chars: usize) -> Self {
        self.long_message_chars = chars;
        self
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, message: &str) -> Category {
        if rules::UNRESTRICTED.is_match(message) {
            return Category::Unrestricted;
        }
        if rules::TECHNICAL.is_match(message) {
            return Category::Technical;
        }
        if message.chars().count() > self.long_message_chars {
            return Category::Technical;
        }
        if rules::CREATIVE.is_match(message) {
            return Category::Creative;
        }
        Category::Factual
    }
}

/// Classifier that puts every message in the same category.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub Category);

impl Classifier for FixedClassifier {
    fn classify(&self, _message: &str) -> Category {
        self.0
    }
}

/// Classify with the default keyword rules.
pub fn classify(message: &str) -> Category {
    KeywordClassifier::default().classify(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_punctuation_default_to_factual() {
        assert_eq!(classify(""), Category::Factual);
        assert_eq!(classify("?!..."), Category::Factual);
        assert_eq!(classify("   "), Category::Factual);
    }

    #[test]
    fn creative_request() {
        assert_eq!(classify("crie um poema sobre o mar"), Category::Creative);
        assert_eq!(classify("Write a short story about cats"), Category::Creative);
    }

    #[test]
    fn technical_request() {
        assert_eq!(classify("tenho um erro no meu código"), Category::Technical);
        assert_eq!(classify("How do I deploy a Rust server?"), Category::Technical);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(classify("CRIE UM POEMA"), Category::Creative);
        assert_eq!(classify("MEU CÓDIGO QUEBROU"), Category::Technical);
    }

    #[test]
    fn flagged_content_wins_over_everything() {
        assert_eq!(
            classify("crie um poema nsfw em python"),
            Category::Unrestricted
        );
        assert_eq!(classify("conteúdo +18 por favor"), Category::Unrestricted);
    }

    #[test]
    fn technical_wins_over_creative() {
        assert_eq!(classify("crie um script em python"), Category::Technical);
    }

    #[test]
    fn long_message_is_technical() {
        let long = "bom dia ".repeat(60);
        assert_eq!(classify(&long), Category::Technical);
    }

    #[test]
    fn long_message_threshold_is_configurable() {
        let classifier = KeywordClassifier::new().long_message_chars(10);
        assert_eq!(classifier.classify("qual a capital da frança"), Category::Technical);
        assert_eq!(classifier.classify("oi"), Category::Factual);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        // "rust" inside "frustrado" is not a technical keyword
        assert_eq!(classify("estou frustrado hoje"), Category::Factual);
    }

    #[test]
    fn fixed_classifier_ignores_input() {
        let fixed = FixedClassifier(Category::Creative);
        assert_eq!(fixed.classify(""), Category::Creative);
        assert_eq!(fixed.classify("meu código tem um erro"), Category::Creative);
    }

    #[test]
    fn deterministic_across_calls() {
        let inputs = [
            "",
            "Qual a capital do Brasil?",
            "escreva uma canção",
            "sem censura",
            "SQL join lento",
            "¿¡!?",
        ];
        for input in inputs {
            assert_eq!(classify(input), classify(input), "input: {input:?}");
        }
    }
}
