//! Language registry: display names for language tags.
//!
//! Providers need a human-readable language name for their prompts
//! ("Translate into Brazilian Portuguese") and a list of codes they accept.
//! The registry is a static table initialised once on first access.

use std::sync::OnceLock;

/// Metadata for a known language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Language tag (e.g., "en", "pt-BR")
    pub code: &'static str,

    /// English name of the language (e.g., "French")
    pub name: &'static str,

    /// Native name of the language (e.g., "Français")
    pub native_name: &'static str,
}

/// Table of languages the bundled providers know how to name.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code.
    ///
    /// Region-qualified tags fall back to their primary language when the
    /// exact tag is not listed (`fr-CA` resolves to French).
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages
            .iter()
            .find(|lang| lang.code == code)
            .or_else(|| {
                let primary = code.split('-').next()?;
                self.languages.iter().find(|lang| lang.code == primary)
            })
    }

    /// Prompt label for a tag: `French (fr, Français)`, or `xx (xx)` when unknown
    pub fn describe(&self, code: &str) -> String {
        match self.get_by_code(code) {
            Some(lang) if lang.native_name != lang.name => {
                format!("{} ({}, {})", lang.name, code, lang.native_name)
            }
            Some(lang) => format!("{} ({})", lang.name, code),
            None => format!("{} ({})", code, code),
        }
    }

    /// Whether the tag (or its primary language) is known
    pub fn is_known(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    /// All language codes in the registry.
    pub fn codes(&self) -> Vec<String> {
        self.languages
            .iter()
            .map(|lang| lang.code.to_string())
            .collect()
    }
}

/// Default language configurations.
fn default_languages() -> Vec<LanguageConfig> {
    const TABLE: &[(&str, &str, &str)] = &[
        ("ar", "Arabic", "العربية"),
        ("bg", "Bulgarian", "Български"),
        ("cs", "Czech", "Čeština"),
        ("da", "Danish", "Dansk"),
        ("de", "German", "Deutsch"),
        ("el", "Greek", "Ελληνικά"),
        ("en", "English", "English"),
        ("es", "Spanish", "Español"),
        ("fi", "Finnish", "Suomi"),
        ("fr", "French", "Français"),
        ("he", "Hebrew", "עברית"),
        ("hi", "Hindi", "हिन्दी"),
        ("hu", "Hungarian", "Magyar"),
        ("id", "Indonesian", "Bahasa Indonesia"),
        ("it", "Italian", "Italiano"),
        ("ja", "Japanese", "日本語"),
        ("ko", "Korean", "한국어"),
        ("nl", "Dutch", "Nederlands"),
        ("no", "Norwegian", "Norsk"),
        ("pl", "Polish", "Polski"),
        ("pt", "Portuguese", "Português"),
        ("pt-BR", "Brazilian Portuguese", "Português do Brasil"),
        ("ro", "Romanian", "Română"),
        ("ru", "Russian", "Русский"),
        ("sv", "Swedish", "Svenska"),
        ("th", "Thai", "ไทย"),
        ("tr", "Turkish", "Türkçe"),
        ("uk", "Ukrainian", "Українська"),
        ("vi", "Vietnamese", "Tiếng Việt"),
        ("zh", "Chinese", "中文"),
        ("zh-CN", "Simplified Chinese", "简体中文"),
        ("zh-TW", "Traditional Chinese", "繁體中文"),
    ];

    TABLE
        .iter()
        .map(|&(code, name, native_name)| LanguageConfig {
            code,
            name,
            native_name,
        })
        .collect()
}
