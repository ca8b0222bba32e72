//! Prometheus metrics for the generation pipeline
//!
//! Tracks:
//! - Requests by intent and engine family
//! - Routing decision latency
//! - Provider dispatches by tier, retries, continuations and cancellations
//! - Provider errors by kind (transient / fatal)
//!
//! All metrics live in a private [`Registry`]; render them with
//! [`Metrics::gather_text`]. Recording never fails a request: label sets are
//! closed enums, and the only fallible recorder is logged and skipped by
//! callers.

use crate::generation::Tier;
use crate::router::{Engine, Intent};
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: CounterVec,
    routing_duration: Histogram,
    provider_calls: IntCounterVec,
    retries: IntCounter,
    continuations: IntCounter,
    provider_errors: IntCounterVec,
    cancellations: IntCounter,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 6 intents x 5 engines at most
        let requests_total = CounterVec::new(
            Opts::new(
                "promptroute_requests_total",
                "Total number of generate requests by intent and engine family",
            ),
            &["intent", "engine"],
        )?;

        let routing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "promptroute_routing_duration_ms",
                "Routing decision latency in milliseconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0]),
        )?;

        let provider_calls = IntCounterVec::new(
            Opts::new(
                "promptroute_provider_calls_total",
                "Total guarded provider dispatches by model tier, retries included",
            ),
            &["tier"],
        )?;

        let retries = IntCounter::with_opts(Opts::new(
            "promptroute_retries_total",
            "Total retries after transient provider errors",
        ))?;

        let continuations = IntCounter::with_opts(Opts::new(
            "promptroute_continuations_total",
            "Total continuation passes issued for truncated output",
        ))?;

        let provider_errors = IntCounterVec::new(
            Opts::new(
                "promptroute_provider_errors_total",
                "Total provider errors by kind (transient, fatal)",
            ),
            &["kind"],
        )?;

        let cancellations = IntCounter::with_opts(Opts::new(
            "promptroute_cancellations_total",
            "Total requests stopped early by caller cancellation",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(routing_duration.clone()))?;
        registry.register(Box::new(provider_calls.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(continuations.clone()))?;
        registry.register(Box::new(provider_errors.clone()))?;
        registry.register(Box::new(cancellations.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            routing_duration,
            provider_calls,
            retries,
            continuations,
            provider_errors,
            cancellations,
        })
    }

    /// Record a routed request
    pub fn record_request(&self, intent: Intent, engine: Engine) {
        self.requests_total
            .with_label_values(&[intent.as_str(), engine.as_str()])
            .inc();
    }

    /// Record routing decision duration
    ///
    /// # Errors
    ///
    /// Rejects NaN, infinite and negative values; they would corrupt every
    /// percentile of the histogram.
    pub fn record_routing_duration(&self, duration_ms: f64) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite (not NaN or Infinity), got: {duration_ms}"
            )));
        }

        if duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be non-negative, got: {duration_ms}"
            )));
        }

        self.routing_duration.observe(duration_ms);
        Ok(())
    }

    /// Record one provider call attempt on a tier
    pub fn provider_call(&self, tier: Tier) {
        self.provider_calls.with_label_values(&[tier.as_str()]).inc();
    }

    pub fn retry(&self) {
        self.retries.inc();
    }

    pub fn continuation(&self) {
        self.continuations.inc();
    }

    /// Record a provider error; `kind` comes from `ProviderError::kind`
    pub fn provider_error(&self, kind: &'static str) {
        self.provider_errors.with_label_values(&[kind]).inc();
    }

    pub fn cancellation(&self) {
        self.cancellations.inc();
    }

    /// Gather all metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                "Prometheus text encoder failed"
            );
            e
        })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                e.utf8_error().valid_up_to(),
                e
            ))
        })
    }
}
