//! Provider call pipeline
//!
//! `RequestGuard` wraps `ContinuationLoop`, which wraps `Orchestrator`,
//! which calls the [`Provider`](crate::provider::Provider).

pub mod continuation;
pub mod guard;
pub mod orchestrator;

pub use continuation::{
    CONTINUE_DIRECTIVE, ContinuationLoop, ContinuationOutcome, PunctuationHeuristic,
    TruncationDetector,
};
pub use guard::{InFlightPermit, RequestGuard, calculate_backoff};
pub use orchestrator::{FragmentSink, Interrupted, Orchestrator, PassOutcome, StreamState};
