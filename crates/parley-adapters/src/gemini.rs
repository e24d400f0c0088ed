//! Gemini (Google Generative Language) adapter
//!
//! Request/response only; the conversation layer emulates streaming for it.

use crate::selection::{is_plausible_model_id, select_model};
use crate::{ensure_success, ChatProvider, ChatRequest, ProviderError, Result};
use async_trait::async_trait;
use parley_core::{ProviderConfig, Role};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
const MAX_TOKENS_LIMIT: u32 = 8192;
const MODEL_PREFIX: &str = "gemini-";

pub struct GeminiProvider {
    name: String,
    model: String,
    base_url: String,
    api_key: Secret<String>,
    http: Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiProvider {
    /// Build the adapter from configuration, or `None` when it cannot be used
    pub fn from_config(config: &ProviderConfig, http: Client) -> Option<Self> {
        let Some(api_key) = config.api_key() else {
            info!(provider = %config.name, "No API key configured, adapter disabled");
            return None;
        };
        let base_url = config.base_url.trim_end_matches('/').to_string();

        select_model(&config.name, &config.models, |model| {
            let valid = is_plausible_model_id(model) && model.starts_with(MODEL_PREFIX);
            valid.then(|| Self {
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
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_body<'a>(&self, request: &'a ChatRequest<'_>) -> GenerateBody<'a> {
        let params = request.params.clamp_for_backend(
            TEMPERATURE_RANGE,
            MAX_TOKENS_LIMIT,
            self.tuned_params().temperature,
        );

        let contents = request
            .turns
            .iter()
            .map(|turn| Content {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: vec![Part {
                    text: &turn.content,
                }],
            })
            .collect();

        let system_instruction = (!request.system_instructions.trim().is_empty()).then(|| {
            SystemInstruction {
                parts: vec![Part {
                    text: request.system_instructions,
                }],
            }
        });

        GenerateBody {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(provider = %self.name, model = %self.model), level = "debug")]
    async fn send(&self, request: &ChatRequest<'_>) -> Result<String> {
        let body = self.build_body(request);

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = generated.into_text();
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        debug!(chars = text.len(), "Received generation");
        Ok(text.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}
