//! Watch localization files and keep target-language files translated.
//!
//! A [`watcher::FileWatcher`] reports debounced changes to base-language
//! files, the [`orchestrator::TranslationOrchestrator`] sends missing keys to
//! a [`provider::TranslationProvider`] in batches, and the
//! [`coordinator::AutoTranslator`] writes the results back.

pub mod config;
pub mod coordinator;
pub mod diff;
pub mod error;
pub mod events;
pub mod format;
pub mod i18n;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod snapshot;
pub mod tree;
pub mod watcher;

mod sync;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use coordinator::{AutoTranslator, TranslationReport};
pub use error::{Error, Result};
pub use events::{EventBus, FileChangeEvent, FileEventKind, TranslationEvent, WatchEvent};
pub use provider::{ProviderConfig, ProviderKind, TranslationProvider};
