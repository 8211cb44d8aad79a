use std::path::PathBuf;
use thiserror::Error;

use crate::tree::TreeError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the translation pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// `process_file_changes` was called before a provider was set
    #[error("No translation provider configured")]
    NoProvider,

    /// Provider rejected its own configuration
    #[error("Invalid configuration for provider '{provider}'")]
    InvalidProviderConfig { provider: String },

    /// Provider tag does not name a known provider
    #[error("Unsupported provider type '{0}'. Expected one of: openai, anthropic, local")]
    UnsupportedProvider(String),

    /// Watch path is missing or not a directory
    #[error("Watch path {path} is not usable: {reason}")]
    WatchPath { path: PathBuf, reason: String },

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content could not be parsed into a translation tree
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Tree could not be serialized back into its file format
    #[error("Failed to serialize {format}: {reason}")]
    Serialize {
        format: &'static str,
        reason: String,
    },

    /// File extension is not a supported translation format
    #[error("Unsupported translation file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Tree contains values that are neither strings nor objects
    #[error("Invalid structure in {path}: {source}")]
    Structure {
        path: PathBuf,
        #[source]
        source: TreeError,
    },

    /// No language tag could be resolved for a file
    #[error("Could not determine language for {0}")]
    UnknownLanguage(PathBuf),

    /// Orchestrator is already processing a run
    #[error("Translation run already in progress")]
    AlreadyInProgress,

    /// Coordinator is busy translating another file
    #[error("Translation already in progress")]
    TranslationInProgress,

    /// Coordinator operation requires a running instance
    #[error("Auto-translator is not running")]
    NotRunning,

    /// Coordinator was started twice
    #[error("Auto-translator is already running")]
    AlreadyRunning,

    /// Watcher was started twice
    #[error("Watcher is already watching {0}")]
    AlreadyWatching(PathBuf),

    /// Watch backend failure
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Helper for parse failures
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Helper for serialization failures
    pub fn serialize(format: crate::format::Format, reason: impl ToString) -> Self {
        Error::Serialize {
            format: format.as_str(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error rejects an operation because of concurrent state
    pub fn is_guard_rejection(&self) -> bool {
        matches!(
            self,
            Error::AlreadyInProgress
                | Error::TranslationInProgress
                | Error::NotRunning
                | Error::AlreadyRunning
                | Error::AlreadyWatching(_)
        )
    }
}
