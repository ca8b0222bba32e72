//! Provider backed by an OpenAI-compatible endpoint through `open-agent-sdk`
//!
//! The SDK takes a single prompt string, so the system instruction and the
//! conversation are flattened into one. It reports no token counts; usage is
//! estimated from character counts.

use super::{
    Content, FragmentStream, Provider, ProviderRequest, ProviderResponse, Role, StreamChunk, Usage,
};
use crate::config::Config;
use crate::error::ProviderError;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

/// Flatten a request into the single prompt string the SDK expects
pub fn render_prompt(system_instruction: &str, contents: &[Content]) -> String {
    let mut sections = Vec::with_capacity(contents.len() + 1);
    if !system_instruction.is_empty() {
        sections.push(format!("System: {system_instruction}"));
    }
    for content in contents {
        let label = match content.role {
            Role::User => "User",
            Role::Model => "Assistant",
        };
        sections.push(format!("{label}: {}", content.text));
    }
    sections.join("\n\n")
}

/// Provider that sends requests to the configured model endpoints
#[derive(Debug, Clone)]
pub struct OpenAgentProvider {
    config: Arc<Config>,
}

impl OpenAgentProvider {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn options(&self, request: &ProviderRequest) -> Result<open_agent::AgentOptions, ProviderError> {
        let (_, endpoint) = self.config.find_model(&request.model).ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "model '{}' is not configured",
                request.model
            ))
        })?;

        open_agent::AgentOptions::builder()
            .model(endpoint.name())
            .base_url(endpoint.base_url())
            .max_tokens(request.config.max_tokens)
            .temperature(request.config.temperature as f32)
            .build()
            .map_err(|e| {
                tracing::error!(
                    endpoint_name = %endpoint.name(),
                    endpoint_url = %endpoint.base_url(),
                    error = %e,
                    "Failed to build AgentOptions from endpoint configuration"
                );
                ProviderError::InvalidRequest(format!("failed to configure model: {e}"))
            })
    }
}

#[async_trait]
impl Provider for OpenAgentProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut stream = self.stream(request).await?;
        let mut response = ProviderResponse::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            response.text.push_str(&chunk.text);
            if chunk.usage.is_some() {
                response.usage = chunk.usage;
            }
        }

        Ok(response)
    }

    async fn stream(&self, request: &ProviderRequest) -> Result<FragmentStream, ProviderError> {
        let options = self.options(request)?;

        if request.image.is_some() {
            tracing::warn!(
                model = %request.model,
                "Image attachments are not supported by this backend, sending text only"
            );
        }
        if request.web_grounding {
            tracing::debug!(
                model = %request.model,
                "Web grounding requested but not available on this backend"
            );
        }

        let prompt = render_prompt(&request.system_instruction, &request.contents);
        let prompt_chars = prompt.chars().count();

        tracing::debug!(
            model = %request.model,
            prompt_length = prompt.len(),
            max_tokens = request.config.max_tokens,
            temperature = request.config.temperature,
            "Starting model query"
        );

        let stream = open_agent::query(&prompt, &options).await.map_err(|e| {
            tracing::error!(model = %request.model, error = %e, "Failed to query model");
            ProviderError::from_message(e.to_string())
        })?;

        let chunks = stream
            .scan(0usize, move |completion_chars, item| {
                let chunk = match item {
                    Ok(open_agent::ContentBlock::Text(block)) => {
                        *completion_chars += block.text.chars().count();
                        Some(Ok(StreamChunk {
                            text: block.text,
                            citations: Vec::new(),
                            usage: Some(Usage::estimate(prompt_chars, *completion_chars)),
                        }))
                    }
                    Ok(other_block) => {
                        tracing::warn!(
                            block_type = ?other_block,
                            "Received non-text content block, skipping"
                        );
                        None
                    }
                    Err(e) => Some(Err(ProviderError::from_message(e.to_string()))),
                };
                futures::future::ready(Some(chunk))
            })
            .filter_map(futures::future::ready)
            .boxed();

        Ok(chunks)
    }
}
