//! Base-language file watcher.
//!
//! ```text
//! notify backend --(unbounded channel)--> pump task
//!                                            |
//!                                  handle_raw_event(kind, path)
//!                                            |
//!                      pattern / extension / language / base-language filter
//!                                            |
//!                         debounce timer per (kind, path), restarted
//!                                            |
//!                     WatchEvent::FileChange + Added/Changed/Removed
//! ```

mod pattern;
mod scan;

pub use pattern::FilePattern;
pub use scan::{scan_translation_files, TrackedFile};
pub(crate) use scan::scan_in_background;

use chrono::Utc;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventBus, FileChangeEvent, FileEventKind, WatchEvent};
use crate::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Starting,
    Watching,
    Stopping,
}

type DebounceKey = (FileEventKind, PathBuf);

/// State shared with the pump task and debounce timers
struct Shared {
    config: Arc<Config>,
    pattern: FilePattern,
    state: Mutex<WatcherState>,
    pending: Mutex<HashMap<DebounceKey, (u64, JoinHandle<()>)>>,
    generation: AtomicU64,
    events: EventBus<WatchEvent>,
    span: Span,
}

pub struct FileWatcher {
    shared: Arc<Shared>,
    backend: Mutex<Option<RecommendedWatcher>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl FileWatcher {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Self::with_span(config, info_span!("watcher"))
    }

    /// Build a watcher that logs inside `span`
    pub fn with_span(config: Arc<Config>, span: Span) -> Result<Self> {
        let pattern = FilePattern::new(&config.file_pattern)?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                pattern,
                state: Mutex::new(WatcherState::Stopped),
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                events: EventBus::new(),
                span,
            }),
            backend: Mutex::new(None),
            pump: Mutex::new(None),
        })
    }

    pub fn events(&self) -> &EventBus<WatchEvent> {
        &self.shared.events
    }

    pub fn state(&self) -> WatcherState {
        *lock(&self.shared.state)
    }

    pub fn is_watching(&self) -> bool {
        self.state() == WatcherState::Watching
    }

    /// Begin watching the configured directory recursively.
    ///
    /// Emits `WatchEvent::Ready` once the initial scan has counted the
    /// translation files already present.
    pub async fn start(&self) -> Result<()> {
        let root = self.shared.config.watch_path.clone();
        {
            let mut state = lock(&self.shared.state);
            if *state != WatcherState::Stopped {
                return Err(Error::AlreadyWatching(root));
            }
            *state = WatcherState::Starting;
        }

        match self.start_backend(&root).instrument(self.shared.span.clone()).await {
            Ok(tracked_files) => {
                *lock(&self.shared.state) = WatcherState::Watching;
                let _enter = self.shared.span.enter();
                info!(path = %root.display(), tracked_files, "Watching for translation file changes");
                self.shared.events.emit(WatchEvent::Ready { tracked_files });
                Ok(())
            }
            Err(e) => {
                self.release_backend();
                *lock(&self.shared.state) = WatcherState::Stopped;
                Err(e)
            }
        }
    }

    async fn start_backend(&self, root: &Path) -> Result<usize> {
        let metadata = fs::metadata(root).await.map_err(|e| Error::WatchPath {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(Error::WatchPath {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Receiver is gone once the watcher stops
            let _ = tx.send(res);
        })?;
        backend.watch(root, RecursiveMode::Recursive)?;
        *lock(&self.backend) = Some(backend);

        let shared = self.shared.clone();
        let pump = tokio::spawn(
            async move {
                while let Some(res) = rx.recv().await {
                    match res {
                        Ok(event) => {
                            for (kind, path) in classify(&event) {
                                shared.handle_raw_event(kind, path);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Watch backend error");
                            shared.events.emit(WatchEvent::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
            .instrument(self.shared.span.clone()),
        );
        *lock(&self.pump) = Some(pump);

        Ok(self.scan().await)
    }

    /// Count translation files already under the watch root
    async fn scan(&self) -> usize {
        match scan_in_background(self.shared.config.clone(), self.shared.pattern.clone()).await {
            Ok(files) => files.len(),
            Err(e) => {
                warn!(error = %e, "Initial scan failed");
                0
            }
        }
    }

    /// Feed one raw file event through filtering and debounce
    pub fn handle_raw_event(&self, kind: FileEventKind, path: PathBuf) {
        self.shared.handle_raw_event(kind, path);
    }

    /// Stop watching; pending debounce timers are dropped without firing
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared.state);
            if *state == WatcherState::Stopped {
                return;
            }
            *state = WatcherState::Stopping;
        }

        self.release_backend();
        let cancelled = self.shared.cancel_pending();
        *lock(&self.shared.state) = WatcherState::Stopped;

        let _enter = self.shared.span.enter();
        info!(cancelled, "File watcher stopped");
    }

    fn release_backend(&self) {
        lock(&self.backend).take();
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
    }

    /// Number of debounce timers waiting to fire
    pub fn pending_events(&self) -> usize {
        lock(&self.shared.pending).len()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.release_backend();
        self.shared.cancel_pending();
    }
}

impl Shared {
    /// Language of a translation file the watcher cares about, if any
    fn resolve_language(&self, path: &Path) -> Option<String> {
        scan::resolve_language(&self.config, &self.pattern, path)
    }

    fn handle_raw_event(self: &Arc<Self>, kind: FileEventKind, path: PathBuf) {
        let _enter = self.span.enter();

        if !matches!(
            *lock(&self.state),
            WatcherState::Starting | WatcherState::Watching
        ) {
            debug!(path = %path.display(), "Ignoring event while stopped");
            return;
        }

        let Some(language) = self.resolve_language(&path) else {
            debug!(path = %path.display(), "Ignoring non-translation file");
            return;
        };
        if language != self.config.base_language {
            debug!(path = %path.display(), %language, "Ignoring non-base language file");
            return;
        }

        let key = (kind, path);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut pending = lock(&self.pending);

        if let Some((_, previous)) = pending.remove(&key) {
            previous.abort();
        }

        let shared = self.clone();
        let timer_key = key.clone();
        let handle = tokio::spawn(
            async move {
                tokio::time::sleep(shared.config.debounce).await;
                shared.fire(timer_key, generation, language);
            }
            .instrument(self.span.clone()),
        );
        pending.insert(key, (generation, handle));
    }

    /// Emit the coalesced event unless a newer event superseded this timer
    fn fire(&self, key: DebounceKey, generation: u64, language: String) {
        {
            let mut pending = lock(&self.pending);
            match pending.get(&key) {
                Some((current, _)) if *current == generation => {
                    pending.remove(&key);
                }
                _ => return,
            }
        }

        let (kind, file_path) = key;
        info!(kind = kind.as_str(), path = %file_path.display(), "Base language file changed");

        let event = FileChangeEvent {
            kind,
            file_path,
            language,
            timestamp: Utc::now(),
        };
        self.events.emit(WatchEvent::FileChange(event.clone()));
        self.events.emit(match kind {
            FileEventKind::Add => WatchEvent::Added(event),
            FileEventKind::Change => WatchEvent::Changed(event),
            FileEventKind::Unlink => WatchEvent::Removed(event),
        });
    }

    fn cancel_pending(&self) -> usize {
        let mut pending = lock(&self.pending);
        let cancelled = pending.len();
        for (_, (_, handle)) in pending.drain() {
            handle.abort();
        }
        cancelled
    }
}

/// Map a backend event onto add/change/unlink per path
fn classify(event: &notify::Event) -> Vec<(FileEventKind, PathBuf)> {
    let all = |kind: FileEventKind| event.paths.iter().map(|p| (kind, p.clone())).collect();

    match &event.kind {
        EventKind::Create(_) => all(FileEventKind::Add),
        EventKind::Remove(_) => all(FileEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(FileEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(FileEventKind::Add),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut classified = Vec::new();
            if let Some(from) = event.paths.first() {
                classified.push((FileEventKind::Unlink, from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                classified.push((FileEventKind::Add, to.clone()));
            }
            classified
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => all(FileEventKind::Change),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    fn test_config(dir: &Path) -> Arc<Config> {
        Arc::new(Config::new(dir, "en", vec!["fr".to_string()]))
    }

    fn drain(rx: &mut broadcast::Receiver<WatchEvent>) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn file_changes(events: &[WatchEvent]) -> Vec<&FileChangeEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                WatchEvent::FileChange(ev) => Some(ev),
                _ => None,
            })
            .collect()
    }

    // ==================== Lifecycle Tests ====================

    #[tokio::test]
    async fn test_start_missing_path() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(test_config(&dir.path().join("missing"))).unwrap();

        let err = watcher.start().await.unwrap_err();
        assert!(matches!(err, Error::WatchPath { .. }));
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_start_on_file_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("en.json");
        std::fs::write(&file, "{}").unwrap();
        let watcher = FileWatcher::new(test_config(&file)).unwrap();

        let err = watcher.start().await.unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test]
    async fn test_start_reports_ready_and_rejects_restart() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("en.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("locales/fr")).unwrap();
        std::fs::write(dir.path().join("locales/fr/common.yaml"), "a: b\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "docs").unwrap();
        std::fs::create_dir_all(dir.path().join(".autotranslate")).unwrap();
        std::fs::write(dir.path().join(".autotranslate/en.json"), "{}").unwrap();

        let watcher = FileWatcher::new(test_config(dir.path())).unwrap();
        let mut rx = watcher.events().subscribe();

        watcher.start().await.unwrap();
        assert!(watcher.is_watching());
        assert_eq!(
            rx.recv().await.unwrap(),
            WatchEvent::Ready { tracked_files: 2 }
        );

        let err = watcher.start().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyWatching(_)));

        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_stop_when_stopped_is_noop() {
        let watcher = FileWatcher::new(test_config(Path::new("/tmp"))).unwrap();
        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut config = Config::new("/tmp", "en", vec!["fr".to_string()]);
        config.file_pattern = " ".to_string();
        assert!(FileWatcher::new(Arc::new(config)).is_err());
    }

    // ==================== Debounce Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_rapid_events_coalesce() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(test_config(dir.path())).unwrap();
        watcher.start().await.unwrap();
        let mut rx = watcher.events().subscribe();
        let en = dir.path().join("en.json");

        for _ in 0..5 {
            watcher.handle_raw_event(FileEventKind::Change, en.clone());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(file_changes(&drain(&mut rx)).is_empty());
        assert_eq!(watcher.pending_events(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let events = drain(&mut rx);
        let changes = file_changes(&events);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, FileEventKind::Change);
        assert_eq!(changes[0].file_path, en);
        assert_eq!(changes[0].language, "en");
        assert!(matches!(events.last(), Some(WatchEvent::Changed(_))));
        assert_eq!(watcher.pending_events(), 0);

        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_keyed_by_kind_and_path() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(test_config(dir.path())).unwrap();
        watcher.start().await.unwrap();
        let mut rx = watcher.events().subscribe();

        watcher.handle_raw_event(FileEventKind::Add, dir.path().join("en.json"));
        watcher.handle_raw_event(FileEventKind::Change, dir.path().join("en.json"));
        watcher.handle_raw_event(FileEventKind::Change, dir.path().join("locales/en/app.yml"));
        tokio::time::sleep(Duration::from_millis(400)).await;

        let events = drain(&mut rx);
        assert_eq!(file_changes(&events).len(), 3);
        assert!(events.iter().any(|e| matches!(e, WatchEvent::Added(_))));
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_base_language_dropped() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(test_config(dir.path())).unwrap();
        watcher.start().await.unwrap();
        let mut rx = watcher.events().subscribe();

        watcher.handle_raw_event(FileEventKind::Change, dir.path().join("fr.json"));
        watcher.handle_raw_event(FileEventKind::Change, dir.path().join("en.txt"));
        watcher.handle_raw_event(FileEventKind::Change, dir.path().join("messages.json"));
        watcher.handle_raw_event(FileEventKind::Change, dir.path().join(".autotranslate/en.json"));
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(watcher.pending_events(), 0);
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_timers() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(test_config(dir.path())).unwrap();
        watcher.start().await.unwrap();
        let mut rx = watcher.events().subscribe();

        watcher.handle_raw_event(FileEventKind::Change, dir.path().join("en.json"));
        assert_eq!(watcher.pending_events(), 1);
        watcher.stop();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(watcher.pending_events(), 0);

        // Events after stop are ignored
        watcher.handle_raw_event(FileEventKind::Change, dir.path().join("en.json"));
        assert_eq!(watcher.pending_events(), 0);
    }

    #[tokio::test]
    async fn test_backend_change_detected() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(dir.path(), "en", vec!["fr".to_string()]);
        config.debounce = Duration::from_millis(50);
        let watcher = FileWatcher::new(Arc::new(config)).unwrap();
        let mut rx = watcher.events().subscribe();
        watcher.start().await.unwrap();

        std::fs::write(dir.path().join("en.json"), r#"{"hello": "Hello"}"#).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(WatchEvent::FileChange(ev)) = rx.recv().await {
                    return ev;
                }
            }
        })
        .await
        .expect("no file change observed");
        assert_eq!(event.language, "en");
        watcher.stop();
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_backend_events() {
        let path = PathBuf::from("/w/en.json");
        let event = |kind| notify::Event::new(kind).add_path(path.clone());

        assert_eq!(
            classify(&event(EventKind::Create(CreateKind::File))),
            vec![(FileEventKind::Add, path.clone())]
        );
        assert_eq!(
            classify(&event(EventKind::Modify(ModifyKind::Data(DataChange::Content)))),
            vec![(FileEventKind::Change, path.clone())]
        );
        assert_eq!(
            classify(&event(EventKind::Remove(RemoveKind::File))),
            vec![(FileEventKind::Unlink, path.clone())]
        );
        assert!(classify(&event(EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Any
        ))))
        .is_empty());

        let rename = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/en.json.tmp"))
            .add_path(path.clone());
        assert_eq!(
            classify(&rename),
            vec![
                (FileEventKind::Unlink, PathBuf::from("/w/en.json.tmp")),
                (FileEventKind::Add, path)
            ]
        );
    }
}
