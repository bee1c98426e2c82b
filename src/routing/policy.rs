//! Category → prompt/parameters/model policy table.

use std::collections::HashMap;

use super::tiers::{ModelTiers, Tier};
use crate::types::{Category, Message};
use crate::{HermodError, Result};

/// History length (characters) above which the model is bumped one tier.
pub const DEFAULT_ESCALATION_CHARS: usize = 2000;

const FACTUAL_PROMPT: &str = "Você é uma assistente virtual em Português (pt-BR), educada, objetiva e profissional. Responda de forma clara, neutra e informativa. Use emojis de forma leve quando apropriado.";

const TECHNICAL_PROMPT: &str = "Você é uma assistente técnica em Português (pt-BR), precisa e objetiva. Para perguntas técnicas, entregue passos claros e exemplos de código quando possível. Não gere conteúdo ilegal.";

const CREATIVE_PROMPT: &str = "Você é uma assistente criativa em Português (pt-BR). Escreva com imaginação, ritmo e imagens vívidas, mantendo o conteúdo apropriado para todos os públicos.";

const UNRESTRICTED_PROMPT: &str = "Você é uma IA educada, séria e profissional. Não deve usar conteúdo sexual, provocativo ou romântico. Recuse com gentileza pedidos desse tipo e ofereça uma alternativa apropriada.";

/// Per-category routing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyEntry {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tier: Tier,
    pub stop_sequences: Vec<String>,
    pub streaming: bool,
}

impl PolicyEntry {
    fn new(system_prompt: &str, temperature: f32, max_tokens: u32, tier: Tier, streaming: bool) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            temperature,
            max_tokens,
            tier,
            stop_sequences: default_stop_sequences(),
            streaming,
        }
    }
}

fn default_stop_sequences() -> Vec<String> {
    vec!["\nUsuário:".to_string(), "\nUser:".to_string()]
}

/// Everything the gateway needs to call upstream for one request.
///
/// Derived deterministically from the category and configured tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub category: Category,
    pub system_prompt: String,
    /// Sampling temperature, always within `[0, 2]`.
    pub temperature: f32,
    /// Maximum output tokens, always positive.
    pub max_tokens: u32,
    pub model_id: String,
    /// Tier the model id was resolved from (after fallback).
    pub tier: Tier,
    pub stop_sequences: Vec<String>,
    pub streaming: bool,
}

impl RoutingDecision {
    /// Override the streaming mode (client preference).
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// Static, total mapping from [`Category`] to routing parameters.
///
/// Every category has an entry; a category without one (only possible
/// through [`PolicyTable::without_entry`]) resolves with the factual entry.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: HashMap<Category, PolicyEntry>,
    tiers: ModelTiers,
    escalation_chars: usize,
}

impl PolicyTable {
    /// Build the default table over the given model tiers.
    pub fn new(tiers: ModelTiers) -> Self {
        let entries = HashMap::from([
            (
                Category::Factual,
                PolicyEntry::new(FACTUAL_PROMPT, 0.7, 400, Tier::Cheap, false),
            ),
            (
                Category::Technical,
                PolicyEntry::new(TECHNICAL_PROMPT, 0.3, 1200, Tier::Heavy, true),
            ),
            (
                Category::Creative,
                PolicyEntry::new(CREATIVE_PROMPT, 1.1, 800, Tier::Heavy, true),
            ),
            (
                Category::Unrestricted,
                PolicyEntry::new(UNRESTRICTED_PROMPT, 0.5, 300, Tier::Cheap, false),
            ),
        ]);
        Self {
            entries,
            tiers,
            escalation_chars: DEFAULT_ESCALATION_CHARS,
        }
    }

    /// Replace the entry for one category.
    pub fn with_entry(mut self, category: Category, entry: PolicyEntry) -> Self {
        self.entries.insert(category, entry);
        self
    }

    /// Drop the entry for one category so it resolves like factual.
    ///
    /// The factual entry itself cannot be removed.
    pub fn without_entry(mut self, category: Category) -> Self {
        if category != Category::Factual {
            self.entries.remove(&category);
        }
        self
    }

    /// History size (characters) above which the model tier is escalated.
    pub fn escalation_chars(mut self, chars: usize) -> Self {
        self.escalation_chars = chars;
        self
    }

    pub fn tiers(&self) -> &ModelTiers {
        &self.tiers
    }

    /// The entry used for a category.
    pub fn entry(&self, category: Category) -> &PolicyEntry {
        self.entries
            .get(&category)
            .or_else(|| self.entries.get(&Category::Factual))
            .unwrap_or_else(|| unreachable!("factual policy entry is always present"))
    }

    /// Resolve a category into a routing decision.
    ///
    /// Fails with [`HermodError::Configuration`] only when no model tier is
    /// configured at all.
    pub fn resolve(&self, category: Category) -> Result<RoutingDecision> {
        self.decide(category, self.entry(category).tier)
    }

    /// Resolve, bumping the model one tier when the history is long.
    ///
    /// The category (and therefore the cache key) is unaffected.
    pub fn resolve_with_history(
        &self,
        category: Category,
        history: &[Message],
    ) -> Result<RoutingDecision> {
        let base = self.entry(category).tier;
        let history_chars: usize = history.iter().map(Message::char_len).sum();
        let tier = if history_chars > self.escalation_chars {
            base.escalate()
        } else {
            base
        };
        self.decide(category, tier)
    }

    fn decide(&self, category: Category, tier: Tier) -> Result<RoutingDecision> {
        let entry = self.entry(category);
        let (resolved, model) = self.tiers.resolve(tier).ok_or_else(|| {
            HermodError::Configuration("no upstream model tier configured".to_string())
        })?;
        Ok(RoutingDecision {
            category,
            system_prompt: entry.system_prompt.clone(),
            temperature: entry.temperature.clamp(0.0, 2.0),
            max_tokens: entry.max_tokens.max(1),
            model_id: model.to_string(),
            tier: resolved,
            stop_sequences: entry.stop_sequences.clone(),
            streaming: entry.streaming,
        })
    }
}
