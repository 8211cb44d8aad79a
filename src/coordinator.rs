//! Glue between the watcher, the orchestrator and the target files.
//!
//! The coordinator is `Stopped` or `Running`, and independently `Idle` or
//! `Busy` while a translation is in flight. Manual calls and watcher-driven
//! runs go through the same translation path.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::config::Config;
use crate::diff::DiffDetector;
use crate::error::{Error, Result};
use crate::events::{EventBus, FileChangeEvent, FileEventKind, TranslationEvent, WatchEvent};
use crate::format::{self, FileStyle, Format, ParsedFile};
use crate::i18n::{language_from_path, sibling_path, LanguageRegistry};
use crate::orchestrator::{
    TranslationBatch, TranslationOrchestrator, TranslationResponse, TranslationRun,
};
use crate::provider::{self, TranslationProvider};
use crate::snapshot::SnapshotStore;
use crate::sync::{lock, BusyGuard};
use crate::tree::{self, KeyPath, TranslationTree};
use crate::watcher::{scan_in_background, FilePattern, FileWatcher};

/// Outcome of translating one base file
#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub base_file: PathBuf,
    pub batches: Vec<TranslationBatch>,
    /// Target files written (or that would be written in dry-run mode)
    pub updated_files: Vec<PathBuf>,
    pub translated_keys: usize,
    pub failed_keys: usize,
    pub dry_run: bool,
}

impl TranslationReport {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

struct Inner {
    config: Arc<Config>,
    orchestrator: TranslationOrchestrator,
    watcher: FileWatcher,
    snapshots: SnapshotStore,
    detector: DiffDetector,
    running: AtomicBool,
    busy: AtomicBool,
    events: EventBus<TranslationEvent>,
    span: Span,
}

pub struct AutoTranslator {
    inner: Arc<Inner>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl AutoTranslator {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Self::with_span(config, info_span!("autotranslate"))
    }

    /// Build a coordinator whose components log inside `span`
    pub fn with_span(config: Arc<Config>, span: Span) -> Result<Self> {
        config.validate()?;
        {
            let _enter = span.enter();
            let registry = LanguageRegistry::get();
            let unknown = config.target_languages.iter().filter(|l| !registry.is_known(l));
            for language in unknown {
                warn!(%language, "Language not in registry, prompts will use the bare tag");
            }
        }

        let orchestrator = TranslationOrchestrator::with_span(
            config.clone(),
            tracing::info_span!(parent: &span, "orchestrator"),
        );
        let watcher = FileWatcher::with_span(
            config.clone(),
            tracing::info_span!(parent: &span, "watcher"),
        )?;
        let snapshots = SnapshotStore::new(config.snapshot_dir(), config.watch_path.clone());
        let events = orchestrator.events().clone();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                orchestrator,
                watcher,
                snapshots,
                detector: DiffDetector::default(),
                running: AtomicBool::new(false),
                busy: AtomicBool::new(false),
                events,
                span,
            }),
            dispatch: Mutex::new(None),
        })
    }

    /// Install the provider named by the configuration
    pub fn use_configured_provider(&self) -> Result<()> {
        let provider = provider::create(&self.inner.config.provider)?;
        self.set_provider(provider)
    }

    pub fn set_provider(&self, provider: Arc<dyn TranslationProvider>) -> Result<()> {
        self.inner.orchestrator.set_provider(provider)
    }

    pub fn events(&self) -> &EventBus<TranslationEvent> {
        &self.inner.events
    }

    pub fn watch_events(&self) -> &EventBus<WatchEvent> {
        self.inner.watcher.events()
    }

    pub fn orchestrator(&self) -> &TranslationOrchestrator {
        &self.inner.orchestrator
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Start watching and translating base-language changes
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.running.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyRunning);
        }

        let mut watch_events = inner.watcher.events().subscribe();
        if let Err(e) = inner.watcher.start().await {
            inner.running.store(false, Ordering::Release);
            return Err(e);
        }

        let dispatcher = inner.clone();
        let handle = tokio::spawn(
            async move {
                loop {
                    match watch_events.recv().await {
                        Ok(WatchEvent::FileChange(event)) => {
                            tokio::spawn(dispatcher.clone().on_file_change(event));
                        }
                        Ok(WatchEvent::Error { message }) => {
                            error!(%message, "File watcher error");
                            dispatcher.events.emit(TranslationEvent::Error { message });
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Dropped file events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            .instrument(inner.span.clone()),
        );
        *lock(&self.dispatch) = Some(handle);

        let _enter = inner.span.enter();
        info!(path = %inner.config.watch_path.display(), "Auto-translate started");
        inner.events.emit(TranslationEvent::Started {
            watch_path: inner.config.watch_path.clone(),
        });
        Ok(())
    }

    /// Stop watching and ask any in-flight run to wind down
    pub fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.running.swap(false, Ordering::AcqRel) {
            return Err(Error::NotRunning);
        }

        inner.watcher.stop();
        inner.orchestrator.stop();
        if let Some(handle) = lock(&self.dispatch).take() {
            handle.abort();
        }

        let _enter = inner.span.enter();
        info!("Auto-translate stopped");
        inner.events.emit(TranslationEvent::Stopped);
        Ok(())
    }

    /// Translate one base file now; requires a running instance
    pub async fn translate_file(&self, base_path: &Path) -> Result<TranslationReport> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }
        self.inner.run_translation(base_path).await
    }

    /// Translate one base file without starting the watcher
    pub async fn translate_once(&self, base_path: &Path) -> Result<TranslationReport> {
        self.inner.run_translation(base_path).await
    }

    /// Every base-language file under the watch path, sorted
    pub async fn discover_base_files(&self) -> Result<Vec<PathBuf>> {
        let inner = &self.inner;
        let root = &inner.config.watch_path;
        let metadata = fs::metadata(root).await.map_err(|e| Error::WatchPath {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(Error::WatchPath {
                path: root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        let pattern = FilePattern::new(&inner.config.file_pattern)?;
        let files = scan_in_background(inner.config.clone(), pattern).await?;
        Ok(files
            .into_iter()
            .filter(|file| file.language == inner.config.base_language)
            .map(|file| file.path)
            .collect())
    }
}

impl Drop for AutoTranslator {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.dispatch).take() {
            handle.abort();
        }
    }
}

impl Inner {
    async fn on_file_change(self: Arc<Self>, event: FileChangeEvent) {
        let span = self.span.clone();
        async move {
            if !self.running.load(Ordering::Acquire) {
                return;
            }
            if event.kind == FileEventKind::Unlink {
                info!(path = %event.file_path.display(), "Base file removed, nothing to translate");
                return;
            }
            if self.busy.load(Ordering::Acquire) {
                info!(path = %event.file_path.display(), "Translation in progress, skipping change");
                return;
            }

            self.events
                .emit(TranslationEvent::BaseLanguageChanged(event.clone()));

            match self.run_translation(&event.file_path).await {
                Ok(report) => info!(
                    path = %event.file_path.display(),
                    translated = report.translated_keys,
                    failed = report.failed_keys,
                    "Automatic translation finished"
                ),
                Err(e) if e.is_guard_rejection() => {
                    info!(path = %event.file_path.display(), error = %e, "Skipping change");
                }
                Err(e) => {
                    error!(path = %event.file_path.display(), error = %e, "Automatic translation failed");
                    self.events.emit(TranslationEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Shared by manual and automatic translation
    async fn run_translation(&self, base_path: &Path) -> Result<TranslationReport> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(Error::TranslationInProgress)?;
        self.translate(base_path).instrument(self.span.clone()).await
    }

    async fn translate(&self, base_path: &Path) -> Result<TranslationReport> {
        let targets = self.target_files(base_path)?;
        let base = format::parse_file(base_path).await?;

        let only_keys = self.changed_keys(base_path, &base.tree).await?;
        let run = self
            .orchestrator
            .process_base_tree(base_path, &base.tree, &targets, only_keys.as_ref())
            .await?;

        let (updated_files, write_failures) = self.write_back(&base, &run).await;
        if !self.config.dry_run {
            if run.is_complete() && write_failures == 0 {
                if let Err(e) = self.snapshots.save(base_path, &base.tree).await {
                    warn!(error = %e, "Failed to save base snapshot");
                }
            } else {
                // Failed keys must count as changed on the next run
                info!(
                    base = %base_path.display(),
                    failed_targets = run.failed_targets.len(),
                    write_failures,
                    stopped = run.stopped,
                    "Run incomplete, keeping previous snapshot"
                );
            }
        }

        let translated_keys = run.batches.iter().map(|b| b.success_count).sum();
        let failed_keys = run.batches.iter().map(|b| b.error_count).sum();
        info!(
            base = %base_path.display(),
            translated_keys,
            failed_keys,
            files = updated_files.len(),
            "Translation run complete"
        );

        Ok(TranslationReport {
            base_file: base_path.to_path_buf(),
            batches: run.batches,
            updated_files,
            translated_keys,
            failed_keys,
            dry_run: self.config.dry_run,
        })
    }

    /// Target file per configured language, in configuration order
    fn target_files(&self, base_path: &Path) -> Result<Vec<PathBuf>> {
        let base_language = &self.config.base_language;
        if language_from_path(base_path).as_deref() != Some(base_language.as_str()) {
            return Err(Error::UnknownLanguage(base_path.to_path_buf()));
        }

        self.config
            .target_languages
            .iter()
            .map(|language| {
                sibling_path(base_path, base_language, language)
                    .ok_or_else(|| Error::UnknownLanguage(base_path.to_path_buf()))
            })
            .collect()
    }

    /// Keys changed since the last recorded run, when narrowing is enabled
    async fn changed_keys(
        &self,
        base_path: &Path,
        current: &TranslationTree,
    ) -> Result<Option<HashSet<KeyPath>>> {
        if !self.config.only_changed_keys {
            return Ok(None);
        }
        let Some(previous) = self.snapshots.load(base_path).await? else {
            debug!(base = %base_path.display(), "No snapshot yet, considering every key");
            return Ok(None);
        };
        let changed: HashSet<KeyPath> = self
            .detector
            .changed_keys(current, &previous)
            .into_iter()
            .collect();
        debug!(changed = changed.len(), "Narrowing to keys changed since last run");
        Ok(Some(changed))
    }

    /// Apply successful responses to each target file.
    ///
    /// Returns the files written and the number of writes that failed.
    async fn write_back(&self, base: &ParsedFile, run: &TranslationRun) -> (Vec<PathBuf>, usize) {
        let mut by_target: Vec<(&Path, Vec<&TranslationResponse>)> = Vec::new();
        for batch in &run.batches {
            let Some(path) = batch.target_file.as_deref() else {
                continue;
            };
            let responses: Vec<&TranslationResponse> = batch.successful().collect();
            if responses.is_empty() {
                continue;
            }
            match by_target.iter_mut().find(|(target, _)| *target == path) {
                Some((_, existing)) => existing.extend(responses),
                None => by_target.push((path, responses)),
            }
        }

        let mut updated = Vec::new();
        let mut failures = 0;
        for (path, responses) in by_target {
            match self.write_target(base, path, &responses).await {
                Ok(()) => updated.push(path.to_path_buf()),
                Err(e) => {
                    failures += 1;
                    warn!(target = %path.display(), error = %e, "Failed to write translations");
                    self.events.emit(TranslationEvent::TranslationFailed {
                        target_file: path.to_path_buf(),
                        error: e.to_string(),
                    });
                }
            }
        }
        (updated, failures)
    }

    async fn write_target(
        &self,
        base: &ParsedFile,
        path: &Path,
        responses: &[&TranslationResponse],
    ) -> Result<()> {
        // Re-read so edits made during the run are kept
        let (mut target, format, style) = if fs::try_exists(path).await? {
            let parsed = format::parse_file(path).await?;
            let style = parsed.style();
            (parsed.tree, parsed.format, style)
        } else {
            let format =
                Format::from_path(path).ok_or_else(|| Error::UnsupportedFormat(path.into()))?;
            (TranslationTree::new(), format, FileStyle::detect(&base.raw_content))
        };

        for response in responses {
            tree::set(&mut target, &response.key, response.translated_text.clone());
        }

        if self.config.dry_run {
            info!(target = %path.display(), keys = responses.len(), "Dry run, not writing");
            return Ok(());
        }
        format::write_file(path, &target, format, &style).await?;
        info!(target = %path.display(), keys = responses.len(), "Wrote translations");
        Ok(())
    }
}
