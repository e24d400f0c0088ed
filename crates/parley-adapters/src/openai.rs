//! OpenAI-compatible chat-completion adapter
//!
//! Together AI, OpenAI, DeepSeek and xAI all accept the same
//! `/chat/completions` request shape, so one adapter serves them all; only
//! the base URL, key and model list differ.

use crate::selection::{is_plausible_model_id, select_model};
use crate::streaming::TextStream;
use crate::{ensure_success, ChatProvider, ChatRequest, ProviderError, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use parley_core::{ProviderConfig, Role};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
const MAX_TOKENS_LIMIT: u32 = 4096;
const DONE_MARKER: &str = "[DONE]";

pub struct OpenAiCompatibleProvider {
    name: String,
    model: String,
    base_url: String,
    api_key: Secret<String>,
    http: Client,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiCompatibleProvider {
    /// Build the adapter from configuration.
    ///
    /// Returns `None` when no API key is configured or no candidate model
    /// can be initialized; the caller treats that as "not configured".
    pub fn from_config(config: &ProviderConfig, http: Client) -> Option<Self> {
        let Some(api_key) = config.api_key() else {
            info!(provider = %config.name, "No API key configured, adapter disabled");
            return None;
        };
        let base_url = config.base_url.trim_end_matches('/').to_string();

        select_model(&config.name, &config.models, |model| {
            is_plausible_model_id(model).then(|| Self {
                name: config.name.clone(),
                model: model.to_string(),
                base_url: base_url.clone(),
                api_key: Secret::new(api_key.to_string()),
                http: http.clone(),
            })
        })
        .map(|(_, provider)| provider)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body<'a>(&'a self, request: &'a ChatRequest<'_>, stream: bool) -> CompletionBody<'a> {
        let params = request.params.clamp_for_backend(
            TEMPERATURE_RANGE,
            MAX_TOKENS_LIMIT,
            self.tuned_params().temperature,
        );

        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system_instructions.trim().is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: request.system_instructions,
            });
        }
        messages.extend(request.turns.iter().map(|turn| WireMessage {
            role: match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &turn.content,
        }));

        CompletionBody {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_output_tokens,
            stream,
        }
    }

    async fn post(&self, body: &CompletionBody<'_>) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    #[instrument(skip(self, request), fields(provider = %self.name, model = %self.model), level = "debug")]
    async fn send(&self, request: &ChatRequest<'_>) -> Result<String> {
        let body = self.build_body(request, false);
        let response = self.post(&body).await?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        debug!(chars = text.len(), "Received completion");
        Ok(text.to_string())
    }

    #[instrument(skip(self, request), fields(provider = %self.name, model = %self.model), level = "debug")]
    async fn send_stream(&self, request: &ChatRequest<'_>) -> Result<TextStream> {
        let body = self.build_body(request, true);
        let response = self.post(&body).await?;
        let mut events = Box::pin(response.bytes_stream().eventsource());

        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(ProviderError::Connection(format!("Stream error: {}", e)));
                        break;
                    }
                };

                let data = event.data.trim();
                if data == DONE_MARKER {
                    break;
                }
                if data.is_empty() {
                    continue;
                }

                match serde_json::from_str::<StreamResponse>(data) {
                    Ok(chunk) => {
                        if let Some(content) = chunk.into_content() {
                            yield Ok(content);
                        }
                    }
                    Err(e) => debug!(error = %e, "Skipping unparsable stream event"),
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl StreamResponse {
    fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
    }
}
