use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{build_system_prompt, build_user_prompt, clean_translation};
use super::{ensure_text, ProviderConfig, ProviderError, TranslationProvider};
use crate::i18n::{is_valid_tag, LanguageRegistry};

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1000;

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    fn build_request(&self, text: &str, target_language: &str, context: Option<&str>) -> MessagesRequest {
        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: MAX_TOKENS,
            system: build_system_prompt(
                &self.config.source_language,
                target_language,
                self.config.preserve_formatting,
            ),
            messages: vec![Message {
                role: "user",
                content: build_user_prompt(text, context),
            }],
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl TranslationProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
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
        debug!(provider = PROVIDER, model = %self.config.model, target_language, "Sending translation request");

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", self.config.api_key().unwrap_or_default())
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::Api {
                provider: PROVIDER,
                status,
                body,
            });
        }

        let messages_response: MessagesResponse =
            response.json().await.map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;

        let translated: String = messages_response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if translated.trim().is_empty() {
            return Err(ProviderError::EmptyResponse { provider: PROVIDER });
        }
        Ok(clean_translation(text, &translated))
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.is_complete()
    }

    fn supported_languages(&self) -> Vec<String> {
        LanguageRegistry::get().codes()
    }
}
