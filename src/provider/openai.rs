use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{build_system_prompt, build_user_prompt, clean_translation};
use super::{ensure_text, ProviderConfig, ProviderError, TranslationProvider};
use crate::i18n::{is_valid_tag, LanguageRegistry};

const MAX_COMPLETION_TOKENS: u32 = 1000;
const REASONING_MAX_COMPLETION_TOKENS: u32 = 8000;

/// OpenAI Chat Completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

/// Chat-completions client for OpenAI and OpenAI-compatible local servers
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    name: &'static str,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            name: "openai",
        }
    }

    /// Same wire protocol, pointed at a local server; the API key is optional
    pub fn local(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            name: "local",
        }
    }

    fn build_request(&self, text: &str, target_language: &str, context: Option<&str>) -> ChatRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.config.model);

        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_system_prompt(
                        &self.config.source_language,
                        target_language,
                        self.config.preserve_formatting,
                    ),
                },
                Message {
                    role: "user".to_string(),
                    content: build_user_prompt(text, context),
                },
            ],
            max_completion_tokens: if is_reasoning {
                REASONING_MAX_COMPLETION_TOKENS
            } else {
                MAX_COMPLETION_TOKENS
            },
            temperature: if is_reasoning {
                None
            } else {
                Some(self.config.temperature)
            },
            reasoning_effort: is_reasoning.then(|| "low".to_string()),
        }
    }
}

#[async_trait]
impl TranslationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        context: Option<&str>,
    ) -> Result<String, ProviderError> {
        ensure_text(text)?;
        if !is_valid_tag(target_language) {
            return Err(ProviderError::UnsupportedLanguage(target_language.to_string()));
        }

        let request = self.build_request(text, target_language, context);
        debug!(provider = self.name, model = %self.config.model, target_language, "Sending translation request");

        let mut builder = self
            .client
            .post(&self.config.api_url)
            .header("Content-Type", "application/json");
        if let Some(key) = self.config.api_key() {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: self.name,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::Api {
                provider: self.name,
                status,
                body,
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|source| ProviderError::Http {
                provider: self.name,
                source,
            })?;

        let translated = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse {
                provider: self.name,
            })?;

        Ok(clean_translation(text, &translated))
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.is_complete()
    }

    fn supported_languages(&self) -> Vec<String> {
        LanguageRegistry::get().codes()
    }
}
