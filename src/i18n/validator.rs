//! Translation quality validation module.
//!
//! UI strings carry interpolation placeholders and markup that must survive
//! translation untouched. The validator compares what the source and the
//! translation contain and reports differences.

use regex::Regex;
use std::sync::OnceLock;

/// Validation report containing errors and warnings about a translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Critical errors that indicate translation issues
    pub errors: Vec<String>,

    /// Non-critical warnings about potential issues
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if the report has any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check if the report is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }
}

/// Validator for translation quality.
pub struct TranslationValidator;

// Regex patterns for extraction (cached for performance)
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
static PRINTF_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

impl TranslationValidator {
    /// Validate that a translation preserves placeholders and markup.
    ///
    /// This function checks that:
    /// - the translation is not blank
    /// - `{name}` / `{{name}}` interpolation placeholders are preserved
    /// - printf-style `%s`, `%d`, `%1$s` specifiers are preserved
    /// - HTML-like tags are preserved
    pub fn validate(original: &str, translated: &str) -> ValidationReport {
        let mut report = ValidationReport::new();

        if translated.trim().is_empty() {
            report.errors.push("Translation is empty".to_string());
            return report;
        }

        let orig_placeholders = Self::sorted(Self::extract_placeholders(original));
        let trans_placeholders = Self::sorted(Self::extract_placeholders(translated));
        if orig_placeholders != trans_placeholders {
            report.errors.push(format!(
                "Placeholder mismatch: original has {:?}, translation has {:?}",
                orig_placeholders, trans_placeholders
            ));
        }

        let orig_printf = Self::sorted(Self::extract_printf(original));
        let trans_printf = Self::sorted(Self::extract_printf(translated));
        if orig_printf != trans_printf {
            report.errors.push(format!(
                "Format specifier mismatch: original has {:?}, translation has {:?}",
                orig_printf, trans_printf
            ));
        }

        let orig_tags = Self::extract_tags(original);
        let trans_tags = Self::extract_tags(translated);
        if orig_tags.len() != trans_tags.len() {
            report.warnings.push(format!(
                "Markup tag count mismatch: original has {}, translation has {}",
                orig_tags.len(),
                trans_tags.len()
            ));
        }

        report
    }

    fn sorted(mut items: Vec<String>) -> Vec<String> {
        items.sort();
        items
    }

    /// Extract `{name}` and `{{name}}` placeholders
    fn extract_placeholders(text: &str) -> Vec<String> {
        let regex = PLACEHOLDER_REGEX
            .get_or_init(|| Regex::new(r"\{\{\s*[\w.\-]+\s*\}\}|\{\s*[\w.\-]+\s*\}").unwrap());

        regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Extract printf-style format specifiers
    fn extract_printf(text: &str) -> Vec<String> {
        let regex = PRINTF_REGEX.get_or_init(|| Regex::new(r"%(\d+\$)?[sdif@]").unwrap());

        regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Extract HTML-like tags
    fn extract_tags(text: &str) -> Vec<String> {
        let regex = TAG_REGEX.get_or_init(|| Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*[^<>]*>").unwrap());

        regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
