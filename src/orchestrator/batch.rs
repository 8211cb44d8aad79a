use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::tree::KeyPath;

/// One key to translate into one target language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationRequest {
    pub key: KeyPath,
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Outcome of one request; every request yields exactly one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResponse {
    pub key: KeyPath,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
}

impl TranslationResponse {
    pub fn succeeded(request: &TranslationRequest, translated_text: String, provider: &str) -> Self {
        Self {
            key: request.key.clone(),
            original_text: request.text.clone(),
            translated_text,
            source_language: request.source_language.clone(),
            target_language: request.target_language.clone(),
            success: true,
            error: None,
            provider: provider.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Failed responses carry an empty translation
    pub fn failed(request: &TranslationRequest, error: String, provider: &str) -> Self {
        Self {
            key: request.key.clone(),
            original_text: request.text.clone(),
            translated_text: String::new(),
            source_language: request.source_language.clone(),
            target_language: request.target_language.clone(),
            success: false,
            error: Some(error),
            provider: provider.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// A bounded group of requests executed back to back.
///
/// Responses are appended in request order. `end_time` is set once every
/// request has resolved and the batch is not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationBatch {
    /// Language of every request; empty for an empty batch
    pub target_language: String,
    /// File the results belong to, unset for ad-hoc batches
    pub target_file: Option<PathBuf>,
    pub requests: Vec<TranslationRequest>,
    pub responses: Vec<TranslationResponse>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub success_count: usize,
    pub error_count: usize,
}

impl TranslationBatch {
    pub fn new(requests: Vec<TranslationRequest>) -> Self {
        Self {
            target_language: requests
                .first()
                .map(|r| r.target_language.clone())
                .unwrap_or_default(),
            target_file: None,
            requests,
            responses: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            success_count: 0,
            error_count: 0,
        }
    }

    pub(crate) fn record(&mut self, response: TranslationResponse) {
        if self.is_complete() {
            return;
        }
        if response.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.responses.push(response);
        if self.responses.len() == self.requests.len() {
            self.end_time = Some(Utc::now());
        }
    }

    /// Whether every request has a response
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn for_target(mut self, target_file: &Path) -> Self {
        self.target_file = Some(target_file.to_path_buf());
        self
    }

    pub fn successful(&self) -> impl Iterator<Item = &TranslationResponse> {
        self.responses.iter().filter(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TranslationResponse> {
        self.responses.iter().filter(|r| !r.success)
    }
}

/// Everything one orchestrator run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationRun {
    pub batches: Vec<TranslationBatch>,
    /// Target files that could not be read or resolved
    pub failed_targets: Vec<PathBuf>,
    /// Run was cancelled before every batch was executed
    pub stopped: bool,
}

impl TranslationRun {
    /// No failed response, failed target or cancellation
    pub fn is_complete(&self) -> bool {
        !self.stopped
            && self.failed_targets.is_empty()
            && self.batches.iter().all(|b| b.error_count == 0)
    }
}
