//! Continuation loop
//!
//! Re-invokes the provider while a pass looks truncated, up to a fixed
//! ceiling. Each extra pass sees the previous output as a model turn
//! followed by a short user directive to carry on.
//!
//! ```text
//! Idle -> Generating -> Complete
//!              |
//!              +-> Truncated -> Generating   (while continuations < ceiling)
//!                          \-> Complete     (ceiling reached)
//! ```

use super::orchestrator::{FragmentSink, Interrupted, Orchestrator, StreamState};
use crate::metrics::Metrics;
use crate::provider::{Content, ProviderRequest};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const CONTINUE_DIRECTIVE: &str = "Continue exactly from where you left off. Do not repeat anything you already wrote and do not add a preamble.";

/// Decides whether a pass ended mid-answer
///
/// Swappable so the heuristic can be tuned without touching the loop.
pub trait TruncationDetector: Send + Sync {
    fn is_truncated(&self, text: &str) -> bool;
}

impl<F> TruncationDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_truncated(&self, text: &str) -> bool {
        self(text)
    }
}

const TRUNCATION_MARKERS: [&str; 3] = ["[truncated]", "[continued]", "[...]"];

/// Default heuristic: looks at how the text ends
///
/// Treats ellipses, dashes and explicit markers as truncated; sentence
/// punctuation, closing brackets/quotes and code fences as complete.
/// Short unpunctuated answers ("Paris") are reported as truncated, which
/// costs one extra pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationHeuristic;

impl TruncationDetector for PunctuationHeuristic {
    fn is_truncated(&self, text: &str) -> bool {
        let trimmed = text.trim_end();
        let Some(last) = trimmed.chars().last() else {
            return false;
        };

        if trimmed.ends_with("...") || matches!(last, '…' | '-' | '—' | '–') {
            return true;
        }

        let lowered = trimmed.to_lowercase();
        if TRUNCATION_MARKERS.iter().any(|m| lowered.ends_with(m)) {
            return true;
        }

        if matches!(
            last,
            '.' | '!' | '?' | '"' | '\'' | '”' | '’' | ')' | ']' | '}' | '`' | '*' | '|' | '>'
        ) {
            return false;
        }

        last.is_alphanumeric() || last.is_ascii_punctuation()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Generating,
    Truncated,
    Complete,
}

/// Aggregate result of all passes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuationOutcome {
    pub state: StreamState,
    /// Extra passes performed after the first
    pub continuations: usize,
    pub cancelled: bool,
}

impl ContinuationOutcome {
    /// Fold one pass into the running total
    fn absorb(&mut self, pass: StreamState) {
        self.state.text.push_str(&pass.text);
        self.state.fragments += pass.fragments;
        self.state.add_citations(pass.citations);
        self.state.usage = match (self.state.usage, pass.usage) {
            (Some(total), Some(usage)) => Some(total.combine(usage)),
            (total, usage) => total.or(usage),
        };
    }
}

/// Bounded re-invocation around the orchestrator
#[derive(Clone)]
pub struct ContinuationLoop {
    orchestrator: Orchestrator,
    max_continuations: usize,
    detector: Arc<dyn TruncationDetector>,
    metrics: Option<Metrics>,
}

impl ContinuationLoop {
    pub fn new(orchestrator: Orchestrator, max_continuations: usize) -> Self {
        Self {
            orchestrator,
            max_continuations,
            detector: Arc::new(PunctuationHeuristic),
            metrics: None,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn TruncationDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn max_continuations(&self) -> usize {
        self.max_continuations
    }

    /// Run passes until the output looks complete or the ceiling is hit
    ///
    /// Performs at most `1 + max_continuations` provider calls. Usage is
    /// summed across passes; each pass reports its own cumulative totals.
    /// A failed pass returns the error with everything accumulated so far.
    pub async fn run(
        &self,
        request: &ProviderRequest,
        sink: Option<&dyn FragmentSink>,
        cancel: &CancellationToken,
    ) -> Result<ContinuationOutcome, Interrupted<ContinuationOutcome>> {
        let mut outcome = ContinuationOutcome::default();
        let mut pass_request = request.clone();
        let mut loop_state = LoopState::Generating;

        loop {
            match loop_state {
                LoopState::Generating => {
                    let pass = match self.orchestrator.run(&pass_request, sink, cancel).await {
                        Ok(pass) => pass,
                        Err(Interrupted { partial, error }) => {
                            outcome.absorb(partial);
                            return Err(Interrupted {
                                partial: outcome,
                                error,
                            });
                        }
                    };
                    let pass_text = pass.state.text.clone();
                    outcome.absorb(pass.state);

                    if pass.cancelled {
                        outcome.cancelled = true;
                        loop_state = LoopState::Complete;
                    } else if self.detector.is_truncated(&outcome.state.text) {
                        pass_request.contents.push(Content::model(pass_text));
                        loop_state = LoopState::Truncated;
                    } else {
                        loop_state = LoopState::Complete;
                    }
                }
                LoopState::Truncated => {
                    if outcome.continuations >= self.max_continuations {
                        tracing::info!(
                            iteration = outcome.continuations,
                            max_continuations = self.max_continuations,
                            "Continuation ceiling reached, returning output as is"
                        );
                        loop_state = LoopState::Complete;
                        continue;
                    }

                    outcome.continuations += 1;
                    pass_request.contents.push(Content::user(CONTINUE_DIRECTIVE));
                    if let Some(metrics) = &self.metrics {
                        metrics.continuation();
                    }

                    tracing::debug!(
                        iteration = outcome.continuations,
                        max_continuations = self.max_continuations,
                        accumulated_length = outcome.state.text.len(),
                        "Output looks truncated, continuing"
                    );
                    loop_state = LoopState::Generating;
                }
                LoopState::Complete => return Ok(outcome),
            }
        }
    }
}
