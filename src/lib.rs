//! promptroute - intent-aware prompt routing and generation pipeline
//!
//! Classifies each prompt, picks an engine family and model tier, derives
//! generation settings, assembles instructions and history, then drives a
//! [`Provider`](provider::Provider) with retry, continuation and
//! cancellation handling. Output goes through a deterministic cleanup pass
//! before it reaches the caller.
//!
//! ```no_run
//! use promptroute::{Config, GenerateHooks, Generator, OpenAgentProvider, PromptRequest};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), promptroute::AppError> {
//! let config = Arc::new(Config::from_file("config.toml")?);
//! let provider = Arc::new(OpenAgentProvider::new(config.clone()));
//! let generator = Generator::new(config, provider);
//!
//! let result = generator
//!     .generate(&PromptRequest::new("Why is the sky blue?"), GenerateHooks::new())
//!     .await?;
//! println!("{}", result.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod generate;
pub mod generation;
pub mod metrics;
pub mod postprocess;
pub mod prompt;
pub mod provider;
pub mod router;
pub mod stream;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use error::{AppError, AppResult, ProviderError};
pub use generate::{FinalResult, GenerateHooks, Generator};
pub use generation::{GenerationConfig, Tier};
pub use metrics::Metrics;
pub use provider::{OpenAgentProvider, Provider};
pub use router::{Engine, Intent, RoutingDecision, Router};
pub use types::{Citation, Document, ImageInput, Message, MessageRole, ModelOverride, PromptRequest};
