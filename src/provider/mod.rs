//! Outbound provider capability
//!
//! The pipeline talks to exactly one trait, [`Provider`]. It either answers
//! in one shot or hands back a stream of [`StreamChunk`]s. Concrete backends
//! live in submodules.

pub mod open_agent;

pub use open_agent::OpenAgentProvider;

use crate::error::ProviderError;
use crate::generation::GenerationConfig;
use crate::types::{Citation, ImageInput};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

/// Turn author as the provider sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Prior output of the model (history `assistant` turns map here)
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One turn sent to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    pub role: Role,
    pub text: String,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Token accounting reported by the provider
///
/// Providers report cumulative totals, so the latest value replaces the
/// previous one instead of being added to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    /// Estimate usage from character counts (~4 chars per token)
    ///
    /// For backends that report no token counts. Under/overestimates for
    /// non-English text and code.
    pub fn estimate(prompt_chars: usize, completion_chars: usize) -> Self {
        Self::new((prompt_chars / 4) as u64, (completion_chars / 4) as u64)
    }

    /// Sum usage across separate provider calls
    pub fn combine(self, other: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

/// Everything one provider call needs
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system_instruction: String,
    /// Oldest first; the last entry is the turn being answered
    pub contents: Vec<Content>,
    pub config: GenerationConfig,
    /// Enable the provider's web search tool
    pub web_grounding: bool,
    pub image: Option<ImageInput>,
}

/// One-shot provider answer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub text: String,
    pub citations: Vec<Citation>,
    pub usage: Option<Usage>,
}

/// One streamed fragment
///
/// A chunk may carry only citations or only usage with empty text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub text: String,
    pub citations: Vec<Citation>,
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

pub type FragmentStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// Capability interface the pipeline invokes
#[async_trait]
pub trait Provider: Send + Sync {
    /// Blocking call returning the whole answer
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Start a streamed call
    ///
    /// Errors before the first chunk are returned here; later failures
    /// arrive as `Err` items in the stream.
    async fn stream(&self, request: &ProviderRequest) -> Result<FragmentStream, ProviderError>;
}
