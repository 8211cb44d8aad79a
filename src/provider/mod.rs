//! Translation providers.
//!
//! A provider turns one source string into one translated string. The set of
//! providers is closed: a [`ProviderKind`] tag selects one of the bundled
//! HTTP clients through [`create`]. Providers never retry on their own; the
//! orchestrator owns retry and rate limiting.

mod anthropic;
mod openai;
mod prompt;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use prompt::{build_system_prompt, build_user_prompt, clean_translation};

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::error::{Error, Result};

/// Capability the orchestrator needs from a translation backend
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Short provider name recorded on every response
    fn name(&self) -> &str;

    /// Translate `text` into `target_language`.
    ///
    /// Blank `text` is a caller error and yields [`ProviderError::EmptyText`].
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        context: Option<&str>,
    ) -> std::result::Result<String, ProviderError>;

    /// Whether `config` is complete enough for this provider to run
    fn validate_config(&self, config: &ProviderConfig) -> bool;

    /// Language codes this provider accepts
    fn supported_languages(&self) -> Vec<String>;
}

/// Per-request failures
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Cannot translate empty text")]
    EmptyText,

    #[error("Unsupported target language '{0}'")]
    UnsupportedLanguage(String),

    /// Non-success HTTP status from the provider API
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} response contained no translation")]
    EmptyResponse { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Determine if an error is retryable (5xx errors, 429 rate limit, network errors)
    /// Other 4xx client errors and caller errors are not retried
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::EmptyText | ProviderError::UnsupportedLanguage(_) => false,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Http { .. }
            | ProviderError::EmptyResponse { .. }
            | ProviderError::Other(_) => true,
        }
    }
}

/// Provider selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
    /// OpenAI-compatible server on the local machine (Ollama, LM Studio)
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Local => "local",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::Local => "llama3.1",
        }
    }

    pub fn default_api_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages",
            ProviderKind::Local => "http://localhost:11434/v1/chat/completions",
        }
    }

    /// Whether the provider refuses to run without an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Local)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "local" | "ollama" => Ok(ProviderKind::Local),
            _ => Err(Error::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Settings shared by every provider client
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub temperature: f32,
    pub timeout: Duration,
    /// Language every source string is written in
    pub source_language: String,
    /// Ask the model to keep placeholders, markup and spacing untouched
    pub preserve_formatting: bool,
}

impl ProviderConfig {
    /// Defaults for `kind`
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            model: kind.default_model().to_string(),
            api_url: kind.default_api_url().to_string(),
            temperature: 0.3,
            timeout: Duration::from_secs(60),
            source_language: "en".to_string(),
            preserve_formatting: true,
        }
    }

    /// API key if set and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Checks shared by all bundled providers
    pub fn is_complete(&self) -> bool {
        let has_key = !self.kind.requires_api_key() || self.api_key().is_some();
        has_key
            && !self.model.trim().is_empty()
            && (self.api_url.starts_with("http://") || self.api_url.starts_with("https://"))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(ProviderKind::default())
    }
}

/// Build the provider selected by `config.kind`
pub fn create(config: &ProviderConfig) -> Result<Arc<dyn TranslationProvider>> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

    let provider: Arc<dyn TranslationProvider> = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client, config.clone())),
        ProviderKind::Local => Arc::new(OpenAiProvider::local(client, config.clone())),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(client, config.clone())),
    };
    Ok(provider)
}

/// Reject blank input before any network call
pub(crate) fn ensure_text(text: &str) -> std::result::Result<(), ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyText)
    } else {
        Ok(())
    }
}
