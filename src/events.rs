//! Observations emitted by the watcher, orchestrator and coordinator.
//!
//! Each component publishes a closed set of event kinds on an [`EventBus`];
//! the CLI and the coordinator subscribe to the ones they care about.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Kind of file-system change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEventKind {
    Add,
    Change,
    Unlink,
}

impl FileEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileEventKind::Add => "add",
            FileEventKind::Change => "change",
            FileEventKind::Unlink => "unlink",
        }
    }
}

/// A debounced change to a base-language translation file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChangeEvent {
    pub kind: FileEventKind,
    pub file_path: PathBuf,
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

/// Observations published by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Any coalesced change, emitted before the type-specific variant
    FileChange(FileChangeEvent),
    Added(FileChangeEvent),
    Changed(FileChangeEvent),
    Removed(FileChangeEvent),
    /// Initial scan finished
    Ready { tracked_files: usize },
    /// Watch backend failure
    Error { message: String },
}

/// Observations published by the orchestrator and coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationEvent {
    /// Auto-translator entered the running state
    Started { watch_path: PathBuf },
    /// Auto-translator (or an in-flight run) was stopped
    Stopped,
    ProviderChanged {
        provider: String,
    },
    BatchStarted {
        target_language: String,
        batch_index: usize,
        total_batches: usize,
        size: usize,
    },
    /// A batch resolved every request
    TranslationCompleted {
        target_language: String,
        target_file: PathBuf,
        success_count: usize,
        error_count: usize,
    },
    /// A target file could not be processed
    TranslationFailed {
        target_file: PathBuf,
        error: String,
    },
    BaseLanguageChanged(FileChangeEvent),
    Error {
        message: String,
    },
}

/// Broadcast channel shared by publishers and subscribers
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
