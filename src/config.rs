use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::i18n::is_valid_tag;
use crate::provider::{ProviderConfig, ProviderKind};
use crate::retry::RetryConfig;

/// Default file-name pattern for translation files
pub const DEFAULT_FILE_PATTERN: &str = "*.json,*.yaml,*.yml";

/// Directory (under the watch path) holding base snapshots by default
pub const DEFAULT_SNAPSHOT_DIR: &str = ".autotranslate";

/// Immutable run configuration, built once and shared behind an `Arc`
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Files
    pub watch_path: PathBuf,
    pub base_language: String,
    pub target_languages: Vec<String>,
    pub file_pattern: String,

    // Provider
    pub provider: ProviderConfig,

    // Batching
    pub batch_size: usize,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub rate_limit_delay: Duration,

    // Watching
    pub debounce: Duration,

    // Behaviour toggles
    pub include_context: bool,
    pub only_changed_keys: bool,
    pub dry_run: bool,
    pub snapshot_dir: Option<PathBuf>,
}

impl Config {
    /// Configuration with defaults for everything but the paths and languages
    pub fn new(
        watch_path: impl Into<PathBuf>,
        base_language: impl Into<String>,
        target_languages: Vec<String>,
    ) -> Self {
        let base_language = base_language.into();
        let mut provider = ProviderConfig::new(ProviderKind::default());
        provider.source_language = base_language.clone();

        Self {
            watch_path: watch_path.into(),
            base_language,
            target_languages,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            provider,
            batch_size: 10,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            rate_limit_delay: Duration::from_millis(1000),
            debounce: Duration::from_millis(300),
            include_context: true,
            only_changed_keys: false,
            dry_run: false,
            snapshot_dir: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let watch_path = std::env::var("WATCH_PATH").context("WATCH_PATH not set")?;
        let base_language = std::env::var("BASE_LANGUAGE").unwrap_or_else(|_| "en".to_string());
        let target_languages = parse_list(
            &std::env::var("TARGET_LANGUAGES").context("TARGET_LANGUAGES not set")?,
        );

        let kind: ProviderKind = std::env::var("TRANSLATION_PROVIDER")
            .unwrap_or_else(|_| "openai".to_string())
            .parse()
            .context("Invalid TRANSLATION_PROVIDER")?;

        let mut config = Self::new(watch_path, base_language, target_languages);

        // Provider
        let mut provider = ProviderConfig::new(kind);
        provider.source_language = config.base_language.clone();
        provider.api_key = std::env::var("PROVIDER_API_KEY")
            .ok()
            .or_else(|| match kind {
                ProviderKind::OpenAi => std::env::var("OPENAI_API_KEY").ok(),
                ProviderKind::Anthropic => std::env::var("ANTHROPIC_API_KEY").ok(),
                ProviderKind::Local => None,
            });
        if let Ok(model) = std::env::var("PROVIDER_MODEL") {
            provider.model = model;
        }
        if let Ok(api_url) = std::env::var("PROVIDER_API_URL") {
            provider.api_url = api_url;
        }
        provider.preserve_formatting = env_flag("PRESERVE_FORMATTING", true);
        config.provider = provider;

        // Batching
        config.file_pattern =
            std::env::var("FILE_PATTERN").unwrap_or_else(|_| DEFAULT_FILE_PATTERN.to_string());
        config.batch_size = env_parse("BATCH_SIZE", 10);
        config.retry_attempts = env_parse("RETRY_ATTEMPTS", 3);
        config.retry_delay = Duration::from_millis(env_parse("RETRY_DELAY_MS", 1000));
        config.rate_limit_delay = Duration::from_millis(env_parse("RATE_LIMIT_DELAY_MS", 1000));
        config.debounce = Duration::from_millis(env_parse("DEBOUNCE_MS", 300));

        // Behaviour toggles
        config.include_context = env_flag("INCLUDE_CONTEXT", true);
        config.only_changed_keys = env_flag("ONLY_CHANGED_KEYS", false);
        config.dry_run = env_flag("DRY_RUN", false);
        config.snapshot_dir = std::env::var("SNAPSHOT_DIR").ok().map(PathBuf::from);

        Ok(config)
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> crate::error::Result<()> {
        if !is_valid_tag(&self.base_language) {
            return Err(Error::Config(format!(
                "invalid base language tag '{}'",
                self.base_language
            )));
        }
        if self.target_languages.is_empty() {
            return Err(Error::Config("no target languages configured".to_string()));
        }
        for tag in &self.target_languages {
            if !is_valid_tag(tag) {
                return Err(Error::Config(format!("invalid target language tag '{}'", tag)));
            }
            if *tag == self.base_language {
                return Err(Error::Config(format!(
                    "target language '{}' is the base language",
                    tag
                )));
            }
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(Error::Config("retry attempts must be at least 1".to_string()));
        }
        if self.file_pattern.trim().is_empty() {
            return Err(Error::Config("file pattern is empty".to_string()));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.retry_attempts, self.retry_delay)
    }

    /// Where base snapshots live
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .unwrap_or_else(|| self.watch_path.join(DEFAULT_SNAPSHOT_DIR))
    }

    /// Whether `path` lies under the snapshot directory
    pub fn is_snapshot_path(&self, path: &Path) -> bool {
        path.starts_with(self.snapshot_dir())
    }
}

/// Split a comma-separated list, dropping blanks
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: &[&str] = &[
        "WATCH_PATH",
        "BASE_LANGUAGE",
        "TARGET_LANGUAGES",
        "FILE_PATTERN",
        "TRANSLATION_PROVIDER",
        "PROVIDER_API_KEY",
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
        "PROVIDER_MODEL",
        "PROVIDER_API_URL",
        "BATCH_SIZE",
        "RETRY_ATTEMPTS",
        "RETRY_DELAY_MS",
        "RATE_LIMIT_DELAY_MS",
        "DEBOUNCE_MS",
        "INCLUDE_CONTEXT",
        "PRESERVE_FORMATTING",
        "ONLY_CHANGED_KEYS",
        "SNAPSHOT_DIR",
        "DRY_RUN",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn valid_config() -> Config {
        Config::new("/tmp/locales", "en", vec!["fr".to_string(), "de".to_string()])
    }

    // ==================== from_env Tests ====================

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var("WATCH_PATH", "/srv/app/locales");
        std::env::set_var("TARGET_LANGUAGES", "fr, de ,,es");
        std::env::set_var("OPENAI_API_KEY", "sk-test");

        let config = Config::from_env().unwrap();

        assert_eq!(config.watch_path, PathBuf::from("/srv/app/locales"));
        assert_eq!(config.base_language, "en");
        assert_eq!(config.target_languages, vec!["fr", "de", "es"]);
        assert_eq!(config.file_pattern, DEFAULT_FILE_PATTERN);
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.rate_limit_delay, Duration::from_millis(1000));
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert!(config.include_context);
        assert!(config.provider.preserve_formatting);
        assert!(!config.only_changed_keys);
        assert!(!config.dry_run);
        assert_eq!(
            config.snapshot_dir(),
            PathBuf::from("/srv/app/locales/.autotranslate")
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("WATCH_PATH", "/data");
        std::env::set_var("BASE_LANGUAGE", "de");
        std::env::set_var("TARGET_LANGUAGES", "en");
        std::env::set_var("TRANSLATION_PROVIDER", "anthropic");
        std::env::set_var("ANTHROPIC_API_KEY", "ak-test");
        std::env::set_var("PROVIDER_MODEL", "claude-sonnet-4-5");
        std::env::set_var("BATCH_SIZE", "25");
        std::env::set_var("RETRY_DELAY_MS", "250");
        std::env::set_var("INCLUDE_CONTEXT", "false");
        std::env::set_var("DRY_RUN", "1");
        std::env::set_var("SNAPSHOT_DIR", "/var/cache/snapshots");

        let config = Config::from_env().unwrap();

        assert_eq!(config.base_language, "de");
        assert_eq!(config.provider.kind, ProviderKind::Anthropic);
        assert_eq!(config.provider.source_language, "de");
        assert_eq!(config.provider.api_key.as_deref(), Some("ak-test"));
        assert_eq!(config.provider.model, "claude-sonnet-4-5");
        assert_eq!(config.provider.api_url, "https://api.anthropic.com/v1/messages");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert!(!config.include_context);
        assert!(config.dry_run);
        assert_eq!(config.snapshot_dir(), PathBuf::from("/var/cache/snapshots"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_numbers_fall_back() {
        clear_env();
        std::env::set_var("WATCH_PATH", "/data");
        std::env::set_var("TARGET_LANGUAGES", "fr");
        std::env::set_var("BATCH_SIZE", "many");

        let config = Config::from_env().unwrap();
        assert_eq!(config.batch_size, 10);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_required() {
        clear_env();
        std::env::set_var("TARGET_LANGUAGES", "fr");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("WATCH_PATH"));

        clear_env();
        std::env::set_var("WATCH_PATH", "/data");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("TARGET_LANGUAGES"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_unknown_provider() {
        clear_env();
        std::env::set_var("WATCH_PATH", "/data");
        std::env::set_var("TARGET_LANGUAGES", "fr");
        std::env::set_var("TRANSLATION_PROVIDER", "deepl");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("TRANSLATION_PROVIDER"));
        clear_env();
    }

    // ==================== validate Tests ====================

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_languages() {
        let mut config = valid_config();
        config.base_language = "English".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = valid_config();
        config.target_languages = vec![];
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.target_languages = vec!["en".to_string()];
        assert!(config.validate().unwrap_err().to_string().contains("base language"));

        let mut config = valid_config();
        config.target_languages = vec!["fr_FR".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = valid_config();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.retry_attempts = 0;
        assert!(config.validate().is_err());
    }

    // ==================== Helper Tests ====================

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("fr,de"), vec!["fr", "de"]);
        assert_eq!(parse_list(" , "), Vec::<String>::new());
    }

    #[test]
    fn test_retry_config_from_settings() {
        let mut config = valid_config();
        config.retry_attempts = 5;
        config.retry_delay = Duration::from_millis(200);
        let retry = config.retry_config();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_is_snapshot_path() {
        let config = valid_config();
        assert!(config.is_snapshot_path(Path::new("/tmp/locales/.autotranslate/en.json")));
        assert!(!config.is_snapshot_path(Path::new("/tmp/locales/en.json")));
    }
}
