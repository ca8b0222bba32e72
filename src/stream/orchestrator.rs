//! Streaming orchestrator
//!
//! Drives a single provider call. With a sink attached, each fragment is
//! forwarded before it is accumulated; without one the provider is called
//! once in blocking mode. Cancellation ends the read loop but keeps the
//! text received so far, and so does a provider error mid-stream.

use crate::error::ProviderError;
use crate::provider::{Provider, ProviderRequest, Usage};
use crate::types::Citation;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Receives text fragments in provider order
pub trait FragmentSink: Send + Sync {
    fn on_fragment(&self, text: &str);

    /// The answer is being regenerated from the start after a transient
    /// failure; every fragment received so far is void.
    fn on_restart(&self) {}
}

impl<F> FragmentSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_fragment(&self, text: &str) {
        self(text)
    }
}

impl FragmentSink for UnboundedSender<String> {
    fn on_fragment(&self, text: &str) {
        // A dropped receiver means the caller stopped listening
        let _ = self.send(text.to_string());
    }
}

/// Text, citations and usage accumulated over one or more passes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    pub text: String,
    pub citations: Vec<Citation>,
    pub usage: Option<Usage>,
    pub fragments: usize,
}

impl StreamState {
    /// Add citations, skipping any URI already present
    pub fn add_citations(&mut self, citations: impl IntoIterator<Item = Citation>) {
        for citation in citations {
            if !self.citations.iter().any(|c| c.uri == citation.uri) {
                self.citations.push(citation);
            }
        }
    }

    /// Latest reported totals replace earlier ones
    pub fn record_usage(&mut self, usage: Option<Usage>) {
        if usage.is_some() {
            self.usage = usage;
        }
    }
}

/// A provider failure together with the output received before it
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupted<T> {
    pub partial: T,
    pub error: ProviderError,
}

impl<T: Default> From<ProviderError> for Interrupted<T> {
    fn from(error: ProviderError) -> Self {
        Self {
            partial: T::default(),
            error,
        }
    }
}

/// Result of one orchestrated pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    pub state: StreamState,
    pub cancelled: bool,
}

/// Runs one provider call and accumulates its output
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Drive a single call
    ///
    /// Provider errors are returned untouched, along with any text already
    /// streamed; only the guard retries.
    pub async fn run(
        &self,
        request: &ProviderRequest,
        sink: Option<&dyn FragmentSink>,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, Interrupted<StreamState>> {
        if cancel.is_cancelled() {
            return Ok(PassOutcome {
                state: StreamState::default(),
                cancelled: true,
            });
        }

        let outcome = match sink {
            Some(sink) => self.run_streaming(request, sink, cancel).await?,
            None => self.run_blocking(request, cancel).await?,
        };

        tracing::debug!(
            model = %request.model,
            fragments = outcome.state.fragments,
            response_length = outcome.state.text.len(),
            cancelled = outcome.cancelled,
            "Provider pass finished"
        );

        Ok(outcome)
    }

    async fn run_streaming(
        &self,
        request: &ProviderRequest,
        sink: &dyn FragmentSink,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, Interrupted<StreamState>> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(PassOutcome { state: StreamState::default(), cancelled: true });
            }
            stream = self.provider.stream(request) => stream?,
        };

        let mut state = StreamState::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(
                        fragments = state.fragments,
                        partial_length = state.text.len(),
                        "Stream read cancelled"
                    );
                    return Ok(PassOutcome { state, cancelled: true });
                }
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };

            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    tracing::warn!(
                        fragments = state.fragments,
                        partial_length = state.text.len(),
                        error = %error,
                        "Stream failed mid-response"
                    );
                    return Err(Interrupted {
                        partial: state,
                        error,
                    });
                }
            };

            if !chunk.text.is_empty() {
                sink.on_fragment(&chunk.text);
                state.text.push_str(&chunk.text);
                state.fragments += 1;
            }
            state.add_citations(chunk.citations);
            state.record_usage(chunk.usage);
        }

        Ok(PassOutcome {
            state,
            cancelled: false,
        })
    }

    async fn run_blocking(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, Interrupted<StreamState>> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(PassOutcome { state: StreamState::default(), cancelled: true });
            }
            response = self.provider.complete(request) => response?,
        };

        let mut state = StreamState {
            fragments: usize::from(!response.text.is_empty()),
            text: response.text,
            ..Default::default()
        };
        state.add_citations(response.citations);
        state.record_usage(response.usage);

        Ok(PassOutcome {
            state,
            cancelled: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::build_config;
    use crate::provider::{FragmentStream, ProviderResponse, StreamChunk};
    use crate::router::Intent;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ChunkProvider {
        chunks: Vec<Result<StreamChunk, ProviderError>>,
    }

    #[async_trait]
    impl Provider for ChunkProvider {
        async fn complete(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let text = self
                .chunks
                .iter()
                .filter_map(|c| c.as_ref().ok())
                .map(|c| c.text.as_str())
                .collect();
            Ok(ProviderResponse {
                text,
                citations: vec![Citation::new("https://example.com")],
                usage: Some(Usage::new(10, 4)),
            })
        }

        async fn stream(&self, _request: &ProviderRequest) -> Result<FragmentStream, ProviderError> {
            Ok(futures::stream::iter(self.chunks.clone()).boxed())
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "flash-model".to_string(),
            system_instruction: String::new(),
            contents: vec![],
            config: build_config(Intent::General, 0.3),
            web_grounding: false,
            image: None,
        }
    }

    fn chunk(text: &str, uri: Option<&str>, usage: Option<Usage>) -> StreamChunk {
        StreamChunk {
            text: text.to_string(),
            citations: uri.map(Citation::new).into_iter().collect(),
            usage,
        }
    }

    #[tokio::test]
    async fn test_streaming_forwards_fragments_in_order() {
        let provider = ChunkProvider {
            chunks: vec![
                Ok(chunk("Hello", None, None)),
                Ok(chunk(", ", None, None)),
                Ok(chunk("world.", None, None)),
            ],
        };
        let orchestrator = Orchestrator::new(Arc::new(provider));
        let seen = Mutex::new(Vec::new());
        let sink = |text: &str| seen.lock().unwrap().push(text.to_string());

        let outcome = orchestrator
            .run(&request(), Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["Hello", ", ", "world."]);
        assert_eq!(outcome.state.text, "Hello, world.");
        assert_eq!(outcome.state.fragments, 3);
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn test_citations_deduplicated_and_usage_overwritten() {
        let provider = ChunkProvider {
            chunks: vec![
                Ok(chunk("a", Some("https://a.example"), Some(Usage::new(10, 1)))),
                Ok(chunk("b", Some("https://a.example"), Some(Usage::new(10, 2)))),
                Ok(chunk("", Some("https://b.example"), Some(Usage::new(10, 3)))),
            ],
        };
        let orchestrator = Orchestrator::new(Arc::new(provider));
        let sink = |_: &str| {};

        let outcome = orchestrator
            .run(&request(), Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        let uris: Vec<_> = outcome.state.citations.iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(uris, vec!["https://a.example", "https://b.example"]);
        assert_eq!(outcome.state.usage, Some(Usage::new(10, 3)));
        assert_eq!(outcome.state.fragments, 2);
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_partial_text() {
        let provider = ChunkProvider {
            chunks: vec![
                Ok(chunk("partial", Some("https://a.example"), None)),
                Err(ProviderError::Overloaded),
            ],
        };
        let orchestrator = Orchestrator::new(Arc::new(provider));
        let sink = |_: &str| {};

        let err = orchestrator
            .run(&request(), Some(&sink), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error, ProviderError::Overloaded);
        assert_eq!(err.partial.text, "partial");
        assert_eq!(err.partial.fragments, 1);
        assert_eq!(err.partial.citations.len(), 1);
    }

    #[test]
    fn test_closure_sink_ignores_restart() {
        let seen = Mutex::new(Vec::new());
        let sink = |text: &str| seen.lock().unwrap().push(text.to_string());
        sink.on_fragment("one");
        sink.on_restart();
        assert_eq!(*seen.lock().unwrap(), vec!["one"]);
    }

    #[tokio::test]
    async fn test_blocking_mode_without_sink() {
        let provider = ChunkProvider {
            chunks: vec![Ok(chunk("Paris.", None, None))],
        };
        let orchestrator = Orchestrator::new(Arc::new(provider));

        let outcome = orchestrator
            .run(&request(), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.state.text, "Paris.");
        assert_eq!(outcome.state.citations.len(), 1);
        assert_eq!(outcome.state.usage.unwrap().total_tokens, 14);
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_provider() {
        let provider = ChunkProvider {
            chunks: vec![Ok(chunk("never", None, None))],
        };
        let orchestrator = Orchestrator::new(Arc::new(provider));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orchestrator.run(&request(), None, &cancel).await.unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.state.text.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        drop(rx);
        tx.on_fragment("ignored");
    }

    #[tokio::test]
    async fn test_channel_sink_receives_fragments() {
        let provider = ChunkProvider {
            chunks: vec![Ok(chunk("one ", None, None)), Ok(chunk("two", None, None))],
        };
        let orchestrator = Orchestrator::new(Arc::new(provider));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

        orchestrator
            .run(&request(), Some(&tx), &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);

        let mut received = Vec::new();
        while let Some(fragment) = rx.recv().await {
            received.push(fragment);
        }
        assert_eq!(received, vec!["one ", "two"]);
    }
}
