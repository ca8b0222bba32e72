//! Request-side data model
//!
//! These types are what the surrounding application hands to the
//! [`Generator`](crate::generate::Generator). They are built once and never
//! mutated by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Author of a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Source reference attached to an answer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Citation {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Citation {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// One turn of conversation history, owned by the external store
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            citations: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            citations: None,
            timestamp: Utc::now(),
        }
    }
}

/// Inline image attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Attached document with pre-extracted text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Document {
    pub title: String,
    pub text: String,
    /// Document type as reported by the uploader (e.g. "pdf", "csv")
    pub kind: String,
}

/// Manual model selection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelOverride {
    /// Let the router decide
    #[default]
    Auto,
    /// Use the configured model with this name
    Named(String),
}

impl From<&str> for ModelOverride {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Named(trimmed.to_string())
        }
    }
}

/// Everything the pipeline needs to answer one prompt
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    pub prompt: String,
    /// Oldest first
    pub history: Vec<Message>,
    pub image: Option<ImageInput>,
    pub documents: Vec<Document>,
    pub model_override: ModelOverride,
    /// Injected verbatim at the end of the instruction set
    pub user_preference: String,
    pub cancel: CancellationToken,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_model_override(mut self, model_override: impl Into<ModelOverride>) -> Self {
        self.model_override = model_override.into();
        self
    }

    pub fn with_user_preference(mut self, preference: impl Into<String>) -> Self {
        self.user_preference = preference.into();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn has_documents(&self) -> bool {
        !self.documents.is_empty()
    }
}
