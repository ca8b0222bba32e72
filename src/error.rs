//! Error types for promptroute
//!
//! Two layers: [`ProviderError`] describes what went wrong talking to a
//! backing model, and [`AppError`] is what callers of the library see.
//! Only the retry guard translates between them.

use thiserror::Error;

/// Failure reported by a [`Provider`](crate::provider::Provider)
///
/// Variants split into transient (worth retrying after a backoff) and
/// fatal (retrying cannot help). See [`ProviderError::is_transient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider throttled the request (HTTP 429 / quota exhausted)
    #[error("rate limited by provider")]
    RateLimited,

    /// Provider temporarily unavailable (HTTP 503 and friends)
    #[error("provider unavailable (status {status})")]
    Unavailable { status: u16 },

    /// Provider reported it is overloaded
    #[error("provider overloaded")]
    Overloaded,

    /// Connection-level failure before or during the response
    #[error("network failure: {0}")]
    Network(String),

    /// Provider did not answer in time
    #[error("provider request timed out")]
    Timeout,

    /// Request was rejected as malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Credentials missing or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Anything the provider adapter could not classify further
    #[error("provider error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Other {
        status: Option<u16>,
        message: String,
    },
}

/// Lowercase substrings that mark an unclassified error as transient
const TRANSIENT_SIGNATURES: &[&str] = &[
    "429",
    "503",
    "unavailable",
    "overloaded",
    "rate limit",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
    "fetch failed",
    "network",
    "connection reset",
    "connection refused",
    "timed out",
];

impl ProviderError {
    /// Returns true if this error is worth retrying
    ///
    /// Typed variants are classified directly. For [`ProviderError::Other`],
    /// a 5xx status or 429 counts as transient, a 4xx status is fatal, and
    /// without a status the message is matched case-insensitively against
    /// known transient signatures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited
            | Self::Unavailable { .. }
            | Self::Overloaded
            | Self::Network(_)
            | Self::Timeout => true,
            Self::InvalidRequest(_) | Self::Unauthorized(_) => false,
            Self::Other { status, message } => match status {
                Some(429) => true,
                Some(s) if *s >= 500 => true,
                Some(_) => false,
                None => {
                    let lower = message.to_lowercase();
                    TRANSIENT_SIGNATURES.iter().any(|sig| lower.contains(sig))
                }
            },
        }
    }

    /// Build an error from a bare message, classifying by signature
    ///
    /// Used by adapters whose underlying client only exposes display strings.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("401") || lower.contains("403") || lower.contains("api key") {
            Self::Unauthorized(message)
        } else if lower.contains("429") || lower.contains("rate limit") {
            Self::RateLimited
        } else if lower.contains("503") || lower.contains("unavailable") {
            Self::Unavailable { status: 503 }
        } else if lower.contains("overloaded") {
            Self::Overloaded
        } else if lower.contains("400") || lower.contains("bad request") {
            Self::InvalidRequest(message)
        } else {
            Self::Other {
                status: None,
                message,
            }
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        if self.is_transient() {
            "transient"
        } else {
            "fatal"
        }
    }
}

/// Main error type for the library
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    /// Fatal provider failure, passed through untouched
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Transient provider failures persisted through every retry attempt
    #[error("The model is temporarily overloaded. Please try again shortly. ({attempts} attempts)")]
    Overloaded { attempts: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message safe to show an end user (no config paths or upstream bodies)
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Overloaded { .. } => {
                "The model is temporarily overloaded. Please try again shortly.".to_string()
            }
            Self::Provider(ProviderError::Unauthorized(_)) => {
                "The model provider rejected the configured credentials.".to_string()
            }
            Self::Provider(ProviderError::InvalidRequest(_)) => {
                "The model provider rejected the request.".to_string()
            }
            Self::Provider(_) => "The model provider returned an error.".to_string(),
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Internal(_) => "Internal error.".to_string(),
        }
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
