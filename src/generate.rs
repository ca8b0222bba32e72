//! Inbound facade
//!
//! [`Generator::generate`] runs one request end to end:
//!
//! validate -> route -> `on_routing` -> tier -> generation config ->
//! instructions -> history window -> guard(continuation(orchestrator)) ->
//! post-process -> [`FinalResult`]
//!
//! [`Generator::route_preview`] exposes routing alone, for showing the
//! chosen engine before generation starts.

use crate::config::{Config, ModelEndpoint};
use crate::error::{AppError, AppResult};
use crate::generation::{GenerationPolicy, Tier};
use crate::metrics::Metrics;
use crate::postprocess::post_process;
use crate::prompt::{InstructionContext, assemble, window};
use crate::provider::{Content, Provider, ProviderRequest, Usage};
use crate::router::{RoutingDecision, Router, is_product_query};
use crate::stream::{
    ContinuationLoop, ContinuationOutcome, FragmentSink, Interrupted, Orchestrator, RequestGuard,
    TruncationDetector,
};
use crate::types::{Citation, PromptRequest};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Callback receiving the routing decision before generation starts
pub type RoutingCallback<'a> = &'a (dyn Fn(&RoutingDecision) + Send + Sync);

/// Optional per-request callbacks
#[derive(Default, Clone, Copy)]
pub struct GenerateHooks<'a> {
    pub on_routing: Option<RoutingCallback<'a>>,
    /// Streams fragments as they arrive; without a sink the provider is
    /// called in blocking mode. A retry after a transient failure calls
    /// [`FragmentSink::on_restart`] before streaming the answer again.
    pub sink: Option<&'a dyn FragmentSink>,
}

impl<'a> GenerateHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_routing(mut self, callback: RoutingCallback<'a>) -> Self {
        self.on_routing = Some(callback);
        self
    }

    pub fn sink(mut self, sink: &'a dyn FragmentSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

/// What the caller gets back
#[derive(Debug, Clone, Serialize)]
pub struct FinalResult {
    /// Post-processed answer (partial when `cancelled`)
    pub content: String,
    /// Model that served the request
    pub model: String,
    pub tier: Tier,
    pub usage: Option<Usage>,
    /// `None` when the provider returned no sources
    pub citations: Option<Vec<Citation>>,
    pub routing: RoutingDecision,
    pub request_id: Uuid,
    /// Extra passes issued for truncated output
    pub continuations: usize,
    pub cancelled: bool,
}

/// Combine documents and the prompt into the final user turn
pub fn user_turn(request: &PromptRequest) -> String {
    if request.documents.is_empty() {
        return request.prompt.clone();
    }

    let mut turn = String::new();
    for document in &request.documents {
        turn.push_str(&format!(
            "[Document: {} ({})]\n{}\n\n",
            document.title, document.kind, document.text
        ));
    }
    turn.push_str(&request.prompt);
    turn
}

/// Entry point tying routing, prompting and the provider pipeline together
///
/// Cheap to share behind an `Arc`; the retry guard is shared by every
/// request going through the same generator.
pub struct Generator {
    config: Arc<Config>,
    router: Router,
    policy: GenerationPolicy,
    continuation: ContinuationLoop,
    guard: Arc<RequestGuard>,
    metrics: Option<Metrics>,
}

impl Generator {
    pub fn new(config: Arc<Config>, provider: Arc<dyn Provider>) -> Self {
        let continuation = ContinuationLoop::new(
            Orchestrator::new(provider),
            config.continuation.max_continuations,
        );

        Self {
            router: Router::new(),
            policy: config.routing.policy(),
            continuation,
            guard: Arc::new(RequestGuard::new(config.guard.clone())),
            metrics: None,
            config,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.continuation = self.continuation.with_metrics(metrics.clone());
        self.guard = Arc::new(RequestGuard::new(self.config.guard.clone()).with_metrics(metrics.clone()));
        self.metrics = Some(metrics);
        self
    }

    /// Replace the default punctuation heuristic
    pub fn with_truncation_detector(mut self, detector: Arc<dyn TruncationDetector>) -> Self {
        self.continuation = self.continuation.with_detector(detector);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Route without generating
    pub fn route_preview(&self, prompt: &str, has_image: bool, has_docs: bool) -> RoutingDecision {
        self.router.route(prompt, has_image, has_docs)
    }

    fn resolve_model(&self, routing: &RoutingDecision) -> AppResult<(Tier, &ModelEndpoint)> {
        match routing.manual_model() {
            Some(name) => self.config.find_model(name).ok_or_else(|| {
                AppError::Validation(format!("model '{name}' is not configured"))
            }),
            None => {
                let tier = self
                    .policy
                    .select_tier(routing.intent(), routing.complexity());
                Ok((tier, self.config.endpoint_for_tier(tier)))
            }
        }
    }

    /// Answer one prompt
    ///
    /// Cancellation through `request.cancel` is not an error: the result
    /// carries whatever text arrived, with `cancelled` set.
    pub async fn generate(
        &self,
        request: &PromptRequest,
        hooks: GenerateHooks<'_>,
    ) -> AppResult<FinalResult> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("generate", request_id = %request_id);
        self.run(request, hooks, request_id).instrument(span).await
    }

    async fn run(
        &self,
        request: &PromptRequest,
        hooks: GenerateHooks<'_>,
        request_id: Uuid,
    ) -> AppResult<FinalResult> {
        if request.prompt.trim().is_empty() {
            return Err(AppError::Validation("prompt must not be empty".to_string()));
        }

        let routing_start = Instant::now();
        let routing = self.router.route_request(request);
        let routing_ms = routing_start.elapsed().as_secs_f64() * 1000.0;
        let intent = routing.intent();

        tracing::info!(
            intent = intent.as_str(),
            engine = routing.engine().as_str(),
            complexity = routing.complexity(),
            confidence = routing.confidence(),
            reason = routing.reason(),
            "Routing decision"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_request(intent, routing.engine());
            if let Err(e) = metrics.record_routing_duration(routing_ms) {
                tracing::warn!(error = %e, routing_ms, "Metrics recording failed");
            }
        }

        if let Some(on_routing) = hooks.on_routing {
            on_routing(&routing);
        }

        let (tier, endpoint) = self.resolve_model(&routing)?;
        let generation_config = self
            .policy
            .build(intent, routing.complexity())
            .for_tier(tier)
            .capped_at(endpoint.max_output_tokens());

        let system_instruction = assemble(&InstructionContext {
            intent,
            is_product_query: is_product_query(&request.prompt),
            user_preference: &request.user_preference,
            now: Utc::now(),
        });

        let mut contents = window(
            &request.history,
            intent,
            self.config.history.max_message_chars,
        );
        contents.push(Content::user(user_turn(request)));

        let provider_request = ProviderRequest {
            model: endpoint.name().to_string(),
            system_instruction,
            contents,
            config: generation_config,
            web_grounding: routing.engine().web_grounding(),
            image: request.image.clone(),
        };

        tracing::debug!(
            model = %provider_request.model,
            tier = tier.as_str(),
            temperature = generation_config.temperature,
            max_tokens = generation_config.max_tokens,
            extended_reasoning = generation_config.use_extended_reasoning,
            web_grounding = provider_request.web_grounding,
            history_turns = provider_request.contents.len() - 1,
            "Dispatching to provider"
        );

        let _permit = self.guard.admit().await;
        // Output of the latest failed attempt, returned if a backoff is cancelled
        let interrupted = Mutex::new(ContinuationOutcome::default());
        let outcome = self
            .guard
            .execute(&request.cancel, |attempt| {
                let interrupted = &interrupted;
                let provider_request = &provider_request;
                async move {
                    if attempt > 1 {
                        if request.cancel.is_cancelled() {
                            let mut partial = std::mem::take(
                                &mut *interrupted.lock().unwrap_or_else(PoisonError::into_inner),
                            );
                            partial.cancelled = true;
                            return Ok(partial);
                        }
                        if let Some(sink) = hooks.sink {
                            sink.on_restart();
                        }
                    }

                    if let Some(metrics) = &self.metrics {
                        metrics.provider_call(tier);
                    }
                    self.continuation
                        .run(provider_request, hooks.sink, &request.cancel)
                        .await
                        .map_err(|Interrupted { partial, error }| {
                            *interrupted.lock().unwrap_or_else(PoisonError::into_inner) = partial;
                            error
                        })
                }
            })
            .await?;

        let ContinuationOutcome {
            state,
            continuations,
            cancelled,
        } = outcome;

        if cancelled {
            tracing::info!(
                partial_length = state.text.len(),
                "Request cancelled, returning partial output"
            );
            if let Some(metrics) = &self.metrics {
                metrics.cancellation();
            }
        }

        let content = post_process(&state.text, intent);
        let citations = (!state.citations.is_empty()).then_some(state.citations);

        tracing::info!(
            model = %provider_request.model,
            tier = tier.as_str(),
            continuations,
            raw_length = state.text.len(),
            response_length = content.len(),
            cancelled,
            "Generation complete"
        );

        Ok(FinalResult {
            content,
            model: provider_request.model,
            tier,
            usage: state.usage,
            citations,
            routing,
            request_id,
            continuations,
            cancelled,
        })
    }
}
