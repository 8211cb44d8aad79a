//! Language handling shared by the watcher, orchestrator and providers.
//!
//! # Architecture
//!
//! - `language`: tag validation and language resolution from file paths
//! - `registry`: display names for prompts and supported-language lists
//! - `validator`: placeholder and markup preservation checks on translations

mod language;
mod registry;
mod validator;

pub use language::{is_valid_tag, language_from_path, sibling_path, LOCALE_DIRECTORIES};
pub use registry::{LanguageConfig, LanguageRegistry};
pub use validator::{TranslationValidator, ValidationReport};
