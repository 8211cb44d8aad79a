//! Locale auto-translate
//!
//! Usage:
//!   locale-autotranslate                      # Watch and translate base-language changes
//!   locale-autotranslate once                 # Translate every base file once and exit
//!   locale-autotranslate once locales/en.json # Translate one base file and exit
//!   locale-autotranslate --dry-run            # Translate without writing any file
//!
//! Required environment variables:
//! - WATCH_PATH
//! - TARGET_LANGUAGES (comma-separated, e.g. "fr,de,es")
//! - PROVIDER_API_KEY (or OPENAI_API_KEY / ANTHROPIC_API_KEY; not needed for local)
//!
//! Optional:
//! - BASE_LANGUAGE (defaults to en)
//! - TRANSLATION_PROVIDER (openai, anthropic or local; defaults to openai)
//! - PROVIDER_MODEL, PROVIDER_API_URL
//! - FILE_PATTERN (defaults to *.json,*.yaml,*.yml)
//! - BATCH_SIZE, RETRY_ATTEMPTS, RETRY_DELAY_MS, RATE_LIMIT_DELAY_MS, DEBOUNCE_MS
//! - INCLUDE_CONTEXT, ONLY_CHANGED_KEYS, DRY_RUN, SNAPSHOT_DIR

use anyhow::{Context, Result};
use locale_autotranslate::{AutoTranslator, Config, TranslationEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_autotranslate=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let mut config = Config::from_env()?;
    config.dry_run |= dry_run;
    let config = Arc::new(config);

    info!(
        path = %config.watch_path.display(),
        base = %config.base_language,
        targets = %config.target_languages.join(","),
        provider = %config.provider.kind,
        dry_run = config.dry_run,
        "Starting locale auto-translate"
    );

    let translator = AutoTranslator::new(config.clone()).context("Invalid configuration")?;
    translator
        .use_configured_provider()
        .context("Failed to configure translation provider")?;
    spawn_event_logger(&translator);

    match positional.first().map(|s| s.as_str()) {
        Some("once") => {
            let files: Vec<PathBuf> = if positional.len() > 1 {
                positional[1..].iter().map(PathBuf::from).collect()
            } else {
                translator.discover_base_files().await?
            };
            run_once(&translator, files).await
        }
        Some("watch") | None => watch(&translator).await,
        Some(other) => anyhow::bail!("Unknown command '{}'. Expected 'watch' or 'once'", other),
    }
}

/// Translate each file in turn, failing if any run failed
async fn run_once(translator: &AutoTranslator, files: Vec<PathBuf>) -> Result<()> {
    if files.is_empty() {
        info!("No base-language files found, nothing to translate");
        return Ok(());
    }

    let mut failures = 0;
    for file in &files {
        match translator.translate_once(file).await {
            Ok(report) => info!(
                file = %file.display(),
                translated = report.translated_keys,
                failed = report.failed_keys,
                updated_files = report.updated_files.len(),
                "Translated base file"
            ),
            Err(e) => {
                error!(file = %file.display(), error = %e, "Translation failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} base files failed to translate", failures, files.len());
    }
    Ok(())
}

async fn watch(translator: &AutoTranslator) -> Result<()> {
    translator.start().await?;
    info!("Watching for changes, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    translator.stop()?;
    Ok(())
}

fn spawn_event_logger(translator: &AutoTranslator) {
    let mut events = translator.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TranslationEvent::BaseLanguageChanged(event)) => {
                    info!(file = %event.file_path.display(), kind = event.kind.as_str(), "Base file changed");
                }
                Ok(TranslationEvent::BatchStarted {
                    target_language,
                    batch_index,
                    total_batches,
                    size,
                }) => {
                    info!(
                        language = %target_language,
                        batch = batch_index + 1,
                        total = total_batches,
                        size,
                        "Batch started"
                    );
                }
                Ok(TranslationEvent::TranslationFailed { target_file, error }) => {
                    warn!(file = %target_file.display(), %error, "Target file failed");
                }
                Ok(TranslationEvent::Error { message }) => {
                    error!(%message, "Auto-translate error");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}
