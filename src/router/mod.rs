//! Routing logic for promptroute
//!
//! Turns a prompt into a [`RoutingDecision`]: which engine family answers it,
//! what kind of help it needs ([`Intent`]) and how deep the answer should go
//! (complexity). Classification and complexity estimation are pure functions
//! in [`classifier`] and [`complexity`].

pub mod classifier;
pub mod complexity;

pub use classifier::{Classification, classify, classify_detailed, is_product_query};
pub use complexity::estimate;

use crate::types::{ModelOverride, PromptRequest};
use serde::{Deserialize, Serialize};

/// What kind of help a prompt needs
///
/// Exactly one intent is assigned per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Reasoning,
    Coding,
    Research,
    Live,
    General,
    /// Reserved. The classifier has no rule that produces it.
    Math,
}

impl Intent {
    /// Every variant, in declaration order
    pub const ALL: [Intent; 6] = [
        Intent::Reasoning,
        Intent::Coding,
        Intent::Research,
        Intent::Live,
        Intent::General,
        Intent::Math,
    ];

    /// Convert to string representation for logging and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Coding => "coding",
            Self::Research => "research",
            Self::Live => "live",
            Self::General => "general",
            Self::Math => "math",
        }
    }
}

/// Engine family a request is sent to
///
/// The family decides the provider-side tooling (web grounding) and the
/// reason shown to the user. The capability tier within a family is chosen
/// separately by [`GenerationPolicy`](crate::generation::GenerationPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Deterministic, code-focused output
    Technical,
    /// Web-grounded answers about current events, prices and products
    Realtime,
    /// Multi-step analysis
    Analytical,
    /// Web-grounded factual depth
    Research,
    /// Everyday questions
    Balanced,
}

impl Engine {
    /// Engine family that serves an intent
    pub fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::Coding => Self::Technical,
            Intent::Live => Self::Realtime,
            Intent::Reasoning | Intent::Math => Self::Analytical,
            Intent::Research => Self::Research,
            Intent::General => Self::Balanced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Realtime => "realtime",
            Self::Analytical => "analytical",
            Self::Research => "research",
            Self::Balanced => "balanced",
        }
    }

    /// Short label for the routing reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Technical => "Technical Precision",
            Self::Realtime => "Real-Time Grounding",
            Self::Analytical => "Deep Analysis",
            Self::Research => "Grounded Research",
            Self::Balanced => "Balanced",
        }
    }

    /// Human-readable sentence explaining the routing choice
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::Technical => {
                "Coding or debugging request, sent to the technical-precision engine for deterministic output."
            }
            Self::Realtime => {
                "Request depends on current information, sent to the web-grounded real-time engine."
            }
            Self::Analytical => {
                "Request calls for multi-step reasoning, sent to the deep-analysis engine."
            }
            Self::Research => {
                "Request asks for factual depth, sent to the grounded research engine."
            }
            Self::Balanced => "General request, sent to the balanced engine.",
        }
    }

    /// Whether the provider should enable its web-grounding tool
    pub fn web_grounding(&self) -> bool {
        matches!(self, Self::Realtime | Self::Research)
    }
}

/// Reason label used when the caller picked the model
pub const MANUAL_OVERRIDE_REASON: &str = "Manual Override";

/// Result of a routing decision
///
/// Created once per request and attached to the final result. Fields are
/// private so a decision cannot be edited after the fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    engine: Engine,
    intent: Intent,
    complexity: f64,
    confidence: f64,
    reason: String,
    explanation: String,
    /// Model named by a manual override; takes precedence over `engine`
    #[serde(skip_serializing_if = "Option::is_none")]
    manual_model: Option<String>,
}

impl RoutingDecision {
    /// Decision made by the classifier
    pub fn automatic(intent: Intent, complexity: f64, confidence: f64) -> Self {
        let engine = Engine::for_intent(intent);
        Self {
            engine,
            intent,
            complexity: complexity.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            reason: engine.reason().to_string(),
            explanation: engine.explanation().to_string(),
            manual_model: None,
        }
    }

    /// Decision forced by the caller naming a model
    ///
    /// Intent and complexity still come from the classifier so generation
    /// settings and instructions adapt to the prompt.
    pub fn manual(model: impl Into<String>, intent: Intent, complexity: f64) -> Self {
        let model = model.into();
        Self {
            engine: Engine::for_intent(intent),
            intent,
            complexity: complexity.clamp(0.0, 1.0),
            confidence: 1.0,
            reason: MANUAL_OVERRIDE_REASON.to_string(),
            explanation: format!("Model {model} was selected manually."),
            manual_model: Some(model),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn manual_model(&self) -> Option<&str> {
        self.manual_model.as_deref()
    }

    pub fn is_manual(&self) -> bool {
        self.manual_model.is_some()
    }
}

/// Stateless router combining the classifier, the estimator and overrides
#[derive(Debug, Clone, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// Route from bare prompt features (used for previews before a request exists)
    pub fn route(&self, prompt: &str, has_image: bool, has_docs: bool) -> RoutingDecision {
        let classification = classify_detailed(prompt, has_image, has_docs);
        let complexity = estimate(prompt, classification.intent, has_docs);

        tracing::debug!(
            intent = classification.intent.as_str(),
            rule = classification.rule,
            complexity = complexity,
            "Prompt classified"
        );

        RoutingDecision::automatic(classification.intent, complexity, classification.confidence)
    }

    /// Route a full request, honouring a manual model override
    pub fn route_request(&self, request: &PromptRequest) -> RoutingDecision {
        let decision = self.route(&request.prompt, request.has_image(), request.has_documents());

        match &request.model_override {
            ModelOverride::Auto => decision,
            ModelOverride::Named(model) => {
                RoutingDecision::manual(model.clone(), decision.intent(), decision.complexity())
            }
        }
    }
}
