//! Batching and retry around a translation provider.
//!
//! A run reads the base file, then for each target file in turn selects the
//! keys whose target value is missing or blank, splits them into batches of
//! `batch_size`, and executes the batches one after another with a
//! `rate_limit_delay` pause between consecutive batches. Requests inside a
//! batch run sequentially and always produce a response.

mod batch;
mod context;
mod stats;

pub use batch::{TranslationBatch, TranslationRequest, TranslationResponse, TranslationRun};
pub use context::extract_context;
pub use stats::TranslationStats;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::config::Config;
use crate::diff::DiffDetector;
use crate::error::{Error, Result};
use crate::events::{EventBus, TranslationEvent};
use crate::format;
use crate::i18n::{language_from_path, TranslationValidator};
use crate::provider::{ProviderError, TranslationProvider};
use crate::retry::with_retry_if;
use crate::sync::{lock, RunGuard, RunSlot};
use crate::tree::{self, KeyPath, TranslationTree};
use stats::StatsCounters;

pub struct TranslationOrchestrator {
    config: Arc<Config>,
    detector: DiffDetector,
    provider: Mutex<Option<Arc<dyn TranslationProvider>>>,
    runs: RunSlot,
    current_batch: Mutex<Option<TranslationBatch>>,
    stats: StatsCounters,
    events: EventBus<TranslationEvent>,
    span: Span,
}

impl TranslationOrchestrator {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_span(config, info_span!("orchestrator"))
    }

    /// Build an orchestrator that logs inside `span`
    pub fn with_span(config: Arc<Config>, span: Span) -> Self {
        Self {
            config,
            detector: DiffDetector::default(),
            provider: Mutex::new(None),
            runs: RunSlot::default(),
            current_batch: Mutex::new(None),
            stats: StatsCounters::default(),
            events: EventBus::new(),
            span,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Event bus carrying batch progress and provider changes
    pub fn events(&self) -> &EventBus<TranslationEvent> {
        &self.events
    }

    /// Install a provider after it accepts the configured provider settings
    pub fn set_provider(&self, provider: Arc<dyn TranslationProvider>) -> Result<()> {
        let _enter = self.span.enter();
        let name = provider.name().to_string();

        if !provider.validate_config(&self.config.provider) {
            warn!(provider = %name, "Provider rejected its configuration");
            return Err(Error::InvalidProviderConfig { provider: name });
        }

        *lock(&self.provider) = Some(provider);
        info!(provider = %name, "Translation provider set");
        self.events
            .emit(TranslationEvent::ProviderChanged { provider: name });
        Ok(())
    }

    pub fn provider(&self) -> Option<Arc<dyn TranslationProvider>> {
        lock(&self.provider).clone()
    }

    /// Translate every missing or blank key of each target file
    pub async fn process_file_changes(
        &self,
        base_path: &Path,
        target_paths: &[PathBuf],
    ) -> Result<Vec<TranslationBatch>> {
        self.process_file_changes_with(base_path, target_paths, None)
            .await
    }

    /// Like [`process_file_changes`](Self::process_file_changes), restricted
    /// to `only_keys` when given
    pub async fn process_file_changes_with(
        &self,
        base_path: &Path,
        target_paths: &[PathBuf],
        only_keys: Option<&HashSet<KeyPath>>,
    ) -> Result<Vec<TranslationBatch>> {
        let run = self
            .process(base_path, None, target_paths, only_keys)
            .await?;
        Ok(run.batches)
    }

    /// Translate against a base tree the caller already read from
    /// `base_path`, reporting failed targets and cancellation as well
    pub async fn process_base_tree(
        &self,
        base_path: &Path,
        base: &TranslationTree,
        target_paths: &[PathBuf],
        only_keys: Option<&HashSet<KeyPath>>,
    ) -> Result<TranslationRun> {
        self.process(base_path, Some(base), target_paths, only_keys)
            .await
    }

    async fn process(
        &self,
        base_path: &Path,
        base: Option<&TranslationTree>,
        target_paths: &[PathBuf],
        only_keys: Option<&HashSet<KeyPath>>,
    ) -> Result<TranslationRun> {
        let provider = self.provider().ok_or(Error::NoProvider)?;
        let run = self.runs.acquire().ok_or(Error::AlreadyInProgress)?;

        let result = self
            .run(provider, &run, base_path, base, target_paths, only_keys)
            .instrument(self.span.clone())
            .await;
        self.stats.record_run();
        result
    }

    async fn run(
        &self,
        provider: Arc<dyn TranslationProvider>,
        run: &RunGuard<'_>,
        base_path: &Path,
        preloaded: Option<&TranslationTree>,
        target_paths: &[PathBuf],
        only_keys: Option<&HashSet<KeyPath>>,
    ) -> Result<TranslationRun> {
        let parsed;
        let base = match preloaded {
            Some(tree) => tree,
            None => {
                parsed = format::parse_file(base_path).await?.tree;
                &parsed
            }
        };
        tree::validate_structure(base).map_err(|source| Error::Structure {
            path: base_path.to_path_buf(),
            source,
        })?;

        info!(
            base = %base_path.display(),
            keys = tree::leaf_count(base),
            targets = target_paths.len(),
            "Processing file changes"
        );

        let mut outcome = TranslationRun::default();
        for target_path in target_paths {
            if run.is_cancelled() {
                info!("Stop requested, skipping remaining target files");
                break;
            }

            if let Err(e) = self
                .process_target(
                    provider.as_ref(),
                    run,
                    base,
                    target_path,
                    only_keys,
                    &mut outcome.batches,
                )
                .await
            {
                warn!(target = %target_path.display(), error = %e, "Failed to process target file");
                self.events.emit(TranslationEvent::TranslationFailed {
                    target_file: target_path.clone(),
                    error: e.to_string(),
                });
                outcome.failed_targets.push(target_path.clone());
            }
        }
        outcome.stopped = run.is_cancelled();

        info!(
            batches = outcome.batches.len(),
            stopped = outcome.stopped,
            "Finished processing file changes"
        );
        Ok(outcome)
    }

    async fn process_target(
        &self,
        provider: &dyn TranslationProvider,
        run: &RunGuard<'_>,
        base: &TranslationTree,
        target_path: &Path,
        only_keys: Option<&HashSet<KeyPath>>,
        batches: &mut Vec<TranslationBatch>,
    ) -> Result<()> {
        let target_language = language_from_path(target_path)
            .ok_or_else(|| Error::UnknownLanguage(target_path.to_path_buf()))?;
        let target = load_target(target_path).await?;

        let mut keys = self
            .detector
            .keys_needing_incremental_translation(base, &target);
        if let Some(only) = only_keys {
            keys.retain(|key| only.contains(key));
        }

        let requests = self.build_requests(base, keys, &target_language);
        if requests.is_empty() {
            debug!(target = %target_path.display(), "Nothing to translate");
            return Ok(());
        }

        let batch_size = self.config.batch_size.max(1);
        let total_batches = requests.len().div_ceil(batch_size);
        info!(
            target = %target_path.display(),
            language = %target_language,
            keys = requests.len(),
            batches = total_batches,
            "Translating target file"
        );

        for (index, chunk) in requests.chunks(batch_size).enumerate() {
            if !batches.is_empty() {
                sleep(self.config.rate_limit_delay).await;
            }
            if run.is_cancelled() {
                info!("Stop requested, skipping remaining batches");
                break;
            }

            self.events.emit(TranslationEvent::BatchStarted {
                target_language: target_language.clone(),
                batch_index: index,
                total_batches,
                size: chunk.len(),
            });

            let batch = TranslationBatch::new(chunk.to_vec()).for_target(target_path);
            let batch = self.execute_batch(provider, batch, Some(run)).await;
            info!(
                language = %target_language,
                batch = index + 1,
                total = total_batches,
                success = batch.success_count,
                errors = batch.error_count,
                "Batch completed"
            );
            self.events.emit(TranslationEvent::TranslationCompleted {
                target_language: target_language.clone(),
                target_file: target_path.to_path_buf(),
                success_count: batch.success_count,
                error_count: batch.error_count,
            });
            batches.push(batch);
        }

        Ok(())
    }

    /// One request per selected key with non-blank base text
    fn build_requests(
        &self,
        base: &TranslationTree,
        keys: Vec<KeyPath>,
        target_language: &str,
    ) -> Vec<TranslationRequest> {
        keys.into_iter()
            .filter_map(|key| {
                let text = tree::get(base, &key)?;
                if text.trim().is_empty() {
                    return None;
                }
                let context = if self.config.include_context {
                    extract_context(base, &key)
                } else {
                    None
                };
                Some(TranslationRequest {
                    text: text.to_string(),
                    key,
                    source_language: self.config.base_language.clone(),
                    target_language: target_language.to_string(),
                    context,
                })
            })
            .collect()
    }

    /// Execute `requests` as one batch with the current provider
    pub async fn process_batch(&self, requests: Vec<TranslationRequest>) -> Result<TranslationBatch> {
        let provider = self.provider().ok_or(Error::NoProvider)?;
        Ok(self
            .execute_batch(provider.as_ref(), TranslationBatch::new(requests), None)
            .instrument(self.span.clone())
            .await)
    }

    /// Run every request of `batch`; a cancelled run stops publishing
    /// progress but still resolves the batch it started
    async fn execute_batch(
        &self,
        provider: &dyn TranslationProvider,
        mut batch: TranslationBatch,
        run: Option<&RunGuard<'_>>,
    ) -> TranslationBatch {
        let is_live = || run.map_or(true, |run| !run.is_cancelled());
        if is_live() {
            self.set_current_batch(Some(batch.clone()));
        }

        for index in 0..batch.requests.len() {
            let response = self.translate_request(provider, &batch.requests[index]).await;
            batch.record(response);
            if is_live() {
                self.set_current_batch(Some(batch.clone()));
            }
        }

        if is_live() {
            self.set_current_batch(None);
        }
        self.stats
            .record_batch(batch.success_count, batch.error_count);
        batch
    }

    async fn translate_request(
        &self,
        provider: &dyn TranslationProvider,
        request: &TranslationRequest,
    ) -> TranslationResponse {
        let operation = format!("Translate '{}' to {}", request.key, request.target_language);
        let result = with_retry_if(
            &self.config.retry_config(),
            &operation,
            || {
                self.stats.record_provider_call();
                provider.translate(
                    &request.text,
                    &request.target_language,
                    request.context.as_deref(),
                )
            },
            ProviderError::is_retryable,
        )
        .await;

        match result {
            Ok(translated) => {
                let report = TranslationValidator::validate(&request.text, &translated);
                if !report.is_clean() {
                    warn!(
                        key = %request.key,
                        language = %request.target_language,
                        errors = ?report.errors,
                        warnings = ?report.warnings,
                        "Translation failed validation checks"
                    );
                }
                TranslationResponse::succeeded(request, translated, provider.name())
            }
            Err(e) => {
                warn!(key = %request.key, language = %request.target_language, error = %e, "Translation failed");
                TranslationResponse::failed(request, e.to_string(), provider.name())
            }
        }
    }

    fn set_current_batch(&self, batch: Option<TranslationBatch>) {
        *lock(&self.current_batch) = batch;
    }

    pub fn stats(&self) -> TranslationStats {
        self.stats.snapshot()
    }

    /// Snapshot of the batch currently executing
    pub fn current_batch(&self) -> Option<TranslationBatch> {
        lock(&self.current_batch).clone()
    }

    pub fn is_translating(&self) -> bool {
        self.runs.is_occupied()
    }

    /// Return to idle and cancel the current run, which finishes its
    /// in-flight batch and then halts. A new run may start immediately.
    pub fn stop(&self) {
        let _enter = self.span.enter();
        if self.runs.cancel() {
            self.set_current_batch(None);
            info!("Translation stop requested");
        }
    }
}

/// A target file that does not exist yet is an empty tree
async fn load_target(path: &Path) -> Result<TranslationTree> {
    if !fs::try_exists(path).await? {
        return Ok(TranslationTree::new());
    }
    Ok(format::parse_file(path).await?.tree)
}
