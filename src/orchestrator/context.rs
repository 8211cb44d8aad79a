use serde_json::Value;

use crate::tree::{get, get_value, parent_path, split_path, TranslationTree};

const MAX_RELATED: usize = 3;

/// Hint sent with a key so the provider can disambiguate short strings.
///
/// The parent's value when the parent resolves to a string; otherwise up to
/// three sibling leaves as `key: value` pairs after `Related: `.
pub fn extract_context(tree: &TranslationTree, key: &str) -> Option<String> {
    let parent = parent_path(key);

    if let Some(parent_text) = parent.and_then(|p| get(tree, p)) {
        return Some(parent_text.to_string());
    }

    let siblings = match parent {
        Some(p) => get_value(tree, p).and_then(Value::as_object)?,
        None => tree,
    };
    let own_name = split_path(key).last().copied().unwrap_or_default();

    let related: Vec<String> = siblings
        .iter()
        .filter(|(name, _)| name.as_str() != own_name)
        .filter_map(|(name, value)| value.as_str().map(|text| format!("{}: {}", name, text)))
        .take(MAX_RELATED)
        .collect();

    if related.is_empty() {
        None
    } else {
        Some(format!("Related: {}", related.join(", ")))
    }
}
