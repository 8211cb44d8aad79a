//! Shared test doubles.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

use crate::provider::{ensure_text, ProviderConfig, ProviderError, TranslationProvider};

/// One recorded `translate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub text: String,
    pub target_language: String,
    pub context: Option<String>,
    pub at: tokio::time::Instant,
}

/// Provider that answers `[<lang>] <text>` unless told to fail
#[derive(Debug, Default)]
pub struct MockProvider {
    calls: AtomicUsize,
    seen: Mutex<Vec<Call>>,
    fail_status: Option<u16>,
    fail_texts: Vec<String>,
    invalid_config: bool,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with this HTTP status
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    /// Calls for this exact text fail with a non-retryable error
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_texts.push(text.to_string());
        self
    }

    pub fn with_invalid_config(mut self) -> Self {
        self.invalid_config = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.seen.lock().unwrap().clone()
    }

    pub fn translation_of(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text)
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        context: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(Call {
            text: text.to_string(),
            target_language: target_language.to_string(),
            context: context.map(str::to_string),
            at: tokio::time::Instant::now(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        ensure_text(text)?;

        if let Some(status) = self.fail_status {
            return Err(ProviderError::Api {
                provider: "mock",
                status,
                body: "mock failure".to_string(),
            });
        }
        if self.fail_texts.iter().any(|t| t == text) {
            return Err(ProviderError::Api {
                provider: "mock",
                status: 400,
                body: format!("refused '{}'", text),
            });
        }
        Ok(Self::translation_of(text, target_language))
    }

    fn validate_config(&self, _config: &ProviderConfig) -> bool {
        !self.invalid_config
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["fr".to_string(), "de".to_string(), "es".to_string()]
    }
}

/// Log sink for asserting on emitted tracing output
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Write `value` as pretty JSON to `dir/name`
pub fn write_json(dir: &Path, name: &str, value: serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    path
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
