//! Generation settings derived from intent and complexity
//!
//! Everything here is a pure function of `(intent, complexity)` plus the
//! thresholds in [`GenerationPolicy`]. The same inputs always yield the same
//! [`GenerationConfig`].

use crate::router::Intent;
use serde::{Deserialize, Serialize};

/// Capability tier of the backing model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Lightweight, low-latency model
    #[default]
    Standard,
    /// Higher-capability model with extended reasoning support
    Extended,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Extended => "extended",
        }
    }
}

/// Sampling settings for one provider call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    pub use_extended_reasoning: bool,
}

impl GenerationConfig {
    /// Drop extended reasoning unless the request landed on the extended tier
    pub fn for_tier(mut self, tier: Tier) -> Self {
        if tier == Tier::Standard {
            self.use_extended_reasoning = false;
        }
        self
    }

    /// Apply a model's hard output ceiling
    pub fn capped_at(mut self, ceiling: u32) -> Self {
        self.max_tokens = self.max_tokens.min(ceiling).max(1);
        self
    }
}

/// Per-intent sampling temperature (coding lowest, general highest)
pub fn temperature_for(intent: Intent) -> f64 {
    match intent {
        Intent::Coding => 0.15,
        Intent::Math => 0.2,
        Intent::Research => 0.3,
        Intent::Live => 0.3,
        Intent::Reasoning => 0.4,
        Intent::General => 0.7,
    }
}

/// Inclusive `[min, max]` output-token range per intent
///
/// `general` keeps a deliberately low ceiling so simple questions cannot
/// turn into long answers.
pub fn token_bounds(intent: Intent) -> (u32, u32) {
    match intent {
        Intent::General => (512, 1024),
        Intent::Live => (1024, 2048),
        Intent::Math => (1024, 4096),
        Intent::Research => (2048, 8192),
        Intent::Reasoning => (2048, 8192),
        Intent::Coding => (2048, 8192),
    }
}

/// Interpolate the token budget for an intent, `complexity` clamped to `[0, 1]`
pub fn token_budget(intent: Intent, complexity: f64) -> u32 {
    let (min, max) = token_bounds(intent);
    let factor = if complexity.is_nan() {
        0.0
    } else {
        complexity.clamp(0.0, 1.0)
    };
    let span = f64::from(max - min);
    let budget = f64::from(min) + (span * factor).round();
    (budget as u32).clamp(min, max)
}

pub const DEFAULT_EXTENDED_REASONING_THRESHOLD: f64 = 0.6;
pub const DEFAULT_EXTENDED_TIER_THRESHOLD: f64 = 0.6;

/// Thresholds for escalating to the extended tier and extended reasoning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationPolicy {
    extended_reasoning_threshold: f64,
    extended_tier_threshold: f64,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            extended_reasoning_threshold: DEFAULT_EXTENDED_REASONING_THRESHOLD,
            extended_tier_threshold: DEFAULT_EXTENDED_TIER_THRESHOLD,
        }
    }
}

impl GenerationPolicy {
    pub fn new(extended_reasoning_threshold: f64, extended_tier_threshold: f64) -> Self {
        Self {
            extended_reasoning_threshold,
            extended_tier_threshold,
        }
    }

    /// Only coding and reasoning requests escalate
    fn escalates(intent: Intent) -> bool {
        matches!(intent, Intent::Coding | Intent::Reasoning)
    }

    /// Pick the engine tier for a request
    pub fn select_tier(&self, intent: Intent, complexity: f64) -> Tier {
        if Self::escalates(intent) && complexity > self.extended_tier_threshold {
            Tier::Extended
        } else {
            Tier::Standard
        }
    }

    /// Build the generation config for a request
    ///
    /// `use_extended_reasoning` is a request, not a guarantee: callers pass the
    /// result through [`GenerationConfig::for_tier`] once the tier is known.
    pub fn build(&self, intent: Intent, complexity: f64) -> GenerationConfig {
        GenerationConfig {
            temperature: temperature_for(intent),
            max_tokens: token_budget(intent, complexity),
            use_extended_reasoning: Self::escalates(intent)
                && complexity > self.extended_reasoning_threshold,
        }
    }
}

/// Build a config with the default thresholds
pub fn build_config(intent: Intent, complexity: f64) -> GenerationConfig {
    GenerationPolicy::default().build(intent, complexity)
}
