//! Shared test fixtures: a scripted provider and config builders

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use promptroute::config::{Config, ModelEndpoint};
use promptroute::provider::{
    FragmentStream, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use promptroute::types::Citation;
use promptroute::ProviderError;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

pub const STANDARD_MODEL: &str = "flash-model";
pub const EXTENDED_MODEL: &str = "pro-model";

/// Two-tier config with every other section defaulted
pub fn test_config() -> Config {
    Config::with_models(
        ModelEndpoint::new(STANDARD_MODEL, "http://localhost:1234/v1", 8192),
        ModelEndpoint::new(EXTENDED_MODEL, "http://localhost:1234/v1", 32768),
    )
}

/// One scripted provider reaction
pub enum Step {
    /// Answer with these fragments (joined for blocking calls)
    Reply(Vec<&'static str>),
    /// Answer with text and citations
    Cited(&'static str, Vec<Citation>),
    /// Fail before the first fragment
    Fail(ProviderError),
    /// Yield these fragments, then never finish
    Hang(Vec<&'static str>),
    /// Yield these fragments, then fail (blocking calls just fail)
    Interrupt(Vec<&'static str>, ProviderError),
}

impl Step {
    pub fn text(text: &'static str) -> Self {
        Self::Reply(vec![text])
    }
}

/// Provider that plays back [`Step`]s in order and records every call
///
/// Once the script runs out it answers "Done." forever.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(Instant, ProviderRequest)>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    fn next_step(&self, request: &ProviderRequest) -> Step {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::text("Done."))
    }
}

fn usage_for(text: &str) -> Usage {
    Usage::new(100, text.len() as u64)
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_step(request) {
            Step::Reply(fragments) => {
                let text = fragments.concat();
                Ok(ProviderResponse {
                    usage: Some(usage_for(&text)),
                    text,
                    citations: vec![],
                })
            }
            Step::Cited(text, citations) => Ok(ProviderResponse {
                text: text.to_string(),
                citations,
                usage: Some(usage_for(text)),
            }),
            Step::Fail(error) | Step::Interrupt(_, error) => Err(error),
            Step::Hang(_) => futures::future::pending().await,
        }
    }

    async fn stream(&self, request: &ProviderRequest) -> Result<FragmentStream, ProviderError> {
        match self.next_step(request) {
            Step::Reply(fragments) => {
                let text = fragments.concat();
                let mut chunks: Vec<_> = fragments
                    .into_iter()
                    .map(|f| Ok(StreamChunk::text(f)))
                    .collect();
                chunks.push(Ok(StreamChunk {
                    usage: Some(usage_for(&text)),
                    ..Default::default()
                }));
                Ok(futures::stream::iter(chunks).boxed())
            }
            Step::Cited(text, citations) => Ok(futures::stream::iter(vec![Ok(StreamChunk {
                text: text.to_string(),
                citations,
                usage: Some(usage_for(text)),
            })])
            .boxed()),
            Step::Fail(error) => Err(error),
            Step::Hang(fragments) => {
                let chunks: Vec<_> = fragments
                    .into_iter()
                    .map(|f| Ok(StreamChunk::text(f)))
                    .collect();
                Ok(futures::stream::iter(chunks)
                    .chain(futures::stream::pending())
                    .boxed())
            }
            Step::Interrupt(fragments, error) => {
                let mut chunks: Vec<_> = fragments
                    .into_iter()
                    .map(|f| Ok(StreamChunk::text(f)))
                    .collect();
                chunks.push(Err(error));
                Ok(futures::stream::iter(chunks).boxed())
            }
        }
    }
}
