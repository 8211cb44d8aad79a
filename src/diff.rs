//! Key-level diffing between translation trees.
//!
//! The detector classifies every leaf key of two trees as added, modified,
//! removed or unchanged, and implements the selection policy that decides
//! which base keys still need translating into a target file.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use crate::tree::{extract_keys, get, get_value, KeyPath, TranslationTree};

/// Comparison options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Compare values case-insensitively
    pub ignore_case: bool,
    /// Trim values and collapse inner whitespace runs before comparing
    pub ignore_whitespace: bool,
    /// Informational only, comparison is always leaf-by-leaf
    pub deep_comparison: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
    Unchanged,
}

/// Old and new value of one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyChange {
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub total_keys: usize,
    pub added_count: usize,
    pub modified_count: usize,
    pub removed_count: usize,
    pub unchanged_count: usize,
}

/// Classification of every key across two trees.
///
/// The four lists are disjoint and together cover the union of both trees'
/// leaf keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub added: Vec<KeyPath>,
    pub modified: Vec<KeyPath>,
    pub removed: Vec<KeyPath>,
    pub unchanged: Vec<KeyPath>,
    pub details: BTreeMap<KeyPath, KeyChange>,
    pub summary: DiffSummary,
}

impl DiffResult {
    fn summarize(&mut self) {
        self.summary = DiffSummary {
            total_keys: self.added.len()
                + self.modified.len()
                + self.removed.len()
                + self.unchanged.len(),
            added_count: self.added.len(),
            modified_count: self.modified.len(),
            removed_count: self.removed.len(),
            unchanged_count: self.unchanged.len(),
        };
    }

    fn record(&mut self, key: KeyPath, change: KeyChange) {
        match change.change_type {
            ChangeType::Added => self.added.push(key.clone()),
            ChangeType::Modified => self.modified.push(key.clone()),
            ChangeType::Removed => self.removed.push(key.clone()),
            ChangeType::Unchanged => self.unchanged.push(key.clone()),
        }
        self.details.insert(key, change);
    }
}

/// Stateless tree comparator
#[derive(Debug, Clone, Default)]
pub struct DiffDetector {
    options: DiffOptions,
}

impl DiffDetector {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DiffOptions {
        self.options
    }

    /// Classify every key of `old` and `new`.
    ///
    /// A key present in `new` with an empty string is a present value: it is
    /// only `added` when absent from `old` altogether.
    pub fn detect_diff(&self, old: &TranslationTree, new: &TranslationTree) -> DiffResult {
        let mut result = DiffResult::default();
        let new_keys = extract_keys(new);
        let new_key_set: HashSet<&str> = new_keys.iter().map(String::as_str).collect();

        for key in &new_keys {
            let new_value = get(new, key).map(str::to_string);
            let change = match get_value(old, key) {
                None => KeyChange {
                    old_value: None,
                    new_value,
                    change_type: ChangeType::Added,
                },
                Some(old_value) => {
                    let change_type = match get_value(new, key) {
                        Some(new_raw) if self.values_are_different(old_value, new_raw) => {
                            ChangeType::Modified
                        }
                        _ => ChangeType::Unchanged,
                    };
                    KeyChange {
                        old_value: old_value.as_str().map(str::to_string),
                        new_value,
                        change_type,
                    }
                }
            };
            result.record(key.clone(), change);
        }

        for key in extract_keys(old) {
            if !new_key_set.contains(key.as_str()) {
                let change = KeyChange {
                    old_value: get(old, &key).map(str::to_string),
                    new_value: None,
                    change_type: ChangeType::Removed,
                };
                result.record(key, change);
            }
        }

        result.summarize();
        result
    }

    /// Keys of `new` that are absent from `old`
    pub fn detect_new_keys(&self, old: &TranslationTree, new: &TranslationTree) -> Vec<KeyPath> {
        extract_keys(new)
            .into_iter()
            .filter(|key| get_value(old, key).is_none())
            .collect()
    }

    /// Keys present in both trees whose values differ
    pub fn detect_modified_keys(
        &self,
        old: &TranslationTree,
        new: &TranslationTree,
    ) -> Vec<KeyPath> {
        extract_keys(new)
            .into_iter()
            .filter(|key| match (get_value(old, key), get_value(new, key)) {
                (Some(old_value), Some(new_value)) => {
                    self.values_are_different(old_value, new_value)
                }
                _ => false,
            })
            .collect()
    }

    /// Base keys whose target value is missing, not a string, or blank.
    ///
    /// Keys that already hold a non-blank translation are never selected,
    /// whether or not the base text changed since.
    pub fn keys_needing_incremental_translation(
        &self,
        base: &TranslationTree,
        target: &TranslationTree,
    ) -> Vec<KeyPath> {
        extract_keys(base)
            .into_iter()
            .filter(|key| match get(target, key) {
                None => true,
                Some(text) => text.trim().is_empty(),
            })
            .collect()
    }

    /// Keys of `current` that are new or differ from a previous snapshot of
    /// the same tree
    pub fn changed_keys(
        &self,
        current: &TranslationTree,
        previous: &TranslationTree,
    ) -> Vec<KeyPath> {
        extract_keys(current)
            .into_iter()
            .filter(|key| match (get_value(previous, key), get_value(current, key)) {
                (None, _) => true,
                (Some(before), Some(now)) => self.values_are_different(before, now),
                (Some(_), None) => false,
            })
            .collect()
    }

    /// Two values differ only when both are strings that still differ after
    /// normalization. A non-string on either side never counts as a change.
    fn values_are_different(&self, old: &Value, new: &Value) -> bool {
        match (old.as_str(), new.as_str()) {
            (Some(old), Some(new)) => self.normalize(old) != self.normalize(new),
            _ => false,
        }
    }

    fn normalize(&self, value: &str) -> String {
        let mut normalized = if self.options.ignore_whitespace {
            value.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            value.to_string()
        };
        if self.options.ignore_case {
            normalized = normalized.to_lowercase();
        }
        normalized
    }
}

/// Keep only key paths matching `pattern`, recomputing the summary
pub fn filter_diff_by_pattern(diff: &DiffResult, pattern: &Regex) -> DiffResult {
    let keep = |keys: &[KeyPath]| -> Vec<KeyPath> {
        keys.iter().filter(|k| pattern.is_match(k)).cloned().collect()
    };
    let mut filtered = DiffResult {
        added: keep(&diff.added),
        modified: keep(&diff.modified),
        removed: keep(&diff.removed),
        unchanged: keep(&diff.unchanged),
        details: diff
            .details
            .iter()
            .filter(|(k, _)| pattern.is_match(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        summary: DiffSummary::default(),
    };
    filtered.summarize();
    filtered
}

/// Same as [`filter_diff_by_pattern`] for an uncompiled pattern
pub fn filter_diff_by_pattern_str(
    diff: &DiffResult,
    pattern: &str,
) -> Result<DiffResult, regex::Error> {
    Ok(filter_diff_by_pattern(diff, &Regex::new(pattern)?))
}

pub fn has_changes(diff: &DiffResult) -> bool {
    diff.summary.added_count + diff.summary.modified_count + diff.summary.removed_count > 0
}

/// Render a diff as plain text
pub fn generate_report(diff: &DiffResult) -> String {
    let mut out = String::new();
    let s = &diff.summary;
    // Writing into a String cannot fail
    let _ = writeln!(out, "Translation Diff Report");
    let _ = writeln!(out, "=======================");
    let _ = writeln!(out);
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  Total keys: {}", s.total_keys);
    let _ = writeln!(out, "  Added: {}", s.added_count);
    let _ = writeln!(out, "  Modified: {}", s.modified_count);
    let _ = writeln!(out, "  Removed: {}", s.removed_count);
    let _ = writeln!(out, "  Unchanged: {}", s.unchanged_count);

    if !diff.added.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Added keys ({}):", diff.added.len());
        for key in &diff.added {
            let _ = writeln!(out, "  + {}", key);
        }
    }

    if !diff.modified.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Modified keys ({}):", diff.modified.len());
        for key in &diff.modified {
            let _ = writeln!(out, "  ~ {}", key);
            if let Some(KeyChange {
                old_value: Some(old),
                new_value: Some(new),
                ..
            }) = diff.details.get(key)
            {
                let _ = writeln!(out, "      old: {:?}", old);
                let _ = writeln!(out, "      new: {:?}", new);
            }
        }
    }

    if !diff.removed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Removed keys ({}):", diff.removed.len());
        for key in &diff.removed {
            let _ = writeln!(out, "  - {}", key);
        }
    }

    out
}
