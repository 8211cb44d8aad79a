//! Key-path utilities for nested translation trees.
//!
//! A translation file parses into a [`TranslationTree`]: a map whose values are
//! either string leaves or nested maps. Leaves are addressed by dot-joined key
//! paths (`"user.profile.title"`).

use serde_json::{Map, Value};
use thiserror::Error;

/// Nested key/value tree parsed from a translation file (insertion ordered)
pub type TranslationTree = Map<String, Value>;

/// Dot-joined address of a leaf
pub type KeyPath = String;

/// Separator between key path segments
pub const PATH_SEPARATOR: char = '.';

/// A value in the tree that is neither a string leaf nor a nested object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureViolation {
    pub path: KeyPath,
    pub found: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} invalid value(s): {}", .violations.len(), describe(.violations))]
pub struct TreeError {
    pub violations: Vec<StructureViolation>,
}

fn describe(violations: &[StructureViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("'{}' is {}", v.path, v.found))
        .collect::<Vec<_>>()
        .join(", ")
}

/// How `merge` combines two trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Top-level entries from the updates replace base entries wholesale
    Replace,
    /// Nested objects are merged recursively, update leaves win
    #[default]
    Merge,
    /// Only keys absent from the base are filled in
    Preserve,
}

pub fn split_path(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).collect()
}

pub fn join_path<S: AsRef<str>>(segments: &[S]) -> KeyPath {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

/// Parent key path of `path`, `None` for top-level keys
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| parent)
}

/// List every string leaf in depth-first pre-order.
///
/// Objects are descended into; values that are neither strings nor objects
/// are skipped here and reported by [`validate_structure`].
pub fn extract_keys(tree: &TranslationTree) -> Vec<KeyPath> {
    let mut keys = Vec::new();
    collect_keys(tree, None, &mut keys);
    keys
}

fn collect_keys(tree: &TranslationTree, prefix: Option<&str>, keys: &mut Vec<KeyPath>) {
    for (key, value) in tree {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };
        match value {
            Value::String(_) => keys.push(path),
            Value::Object(child) => collect_keys(child, Some(&path), keys),
            _ => {}
        }
    }
}

/// Number of string leaves in the tree
pub fn leaf_count(tree: &TranslationTree) -> usize {
    extract_keys(tree).len()
}

/// Raw value at `path`, whatever its type
pub fn get_value<'a>(tree: &'a TranslationTree, path: &str) -> Option<&'a Value> {
    let mut segments = path.split(PATH_SEPARATOR);
    let mut current = tree.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// String leaf at `path`
pub fn get<'a>(tree: &'a TranslationTree, path: &str) -> Option<&'a str> {
    get_value(tree, path)?.as_str()
}

/// Set the leaf at `path`, creating intermediate objects as needed.
///
/// Any non-object value standing where an intermediate object is required is
/// overwritten.
pub fn set(tree: &mut TranslationTree, path: &str, value: impl Into<String>) {
    if path.is_empty() {
        return;
    }
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = tree;
    for segment in parents {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    node.insert(last.to_string(), Value::String(value.into()));
}

/// Remove the value at `path`, returning it
pub fn remove(tree: &mut TranslationTree, path: &str) -> Option<Value> {
    match path.rsplit_once(PATH_SEPARATOR) {
        None => tree.remove(path),
        Some((parent, last)) => {
            let mut node = tree;
            for segment in parent.split(PATH_SEPARATOR) {
                node = node.get_mut(segment)?.as_object_mut()?;
            }
            node.remove(last)
        }
    }
}

/// Combine `updates` into `base` following `strategy`
pub fn merge(
    base: &TranslationTree,
    updates: &TranslationTree,
    strategy: MergeStrategy,
) -> TranslationTree {
    let mut result = base.clone();
    match strategy {
        MergeStrategy::Replace => {
            for (key, value) in updates {
                result.insert(key.clone(), value.clone());
            }
        }
        MergeStrategy::Merge => deep_merge(&mut result, updates, true),
        MergeStrategy::Preserve => deep_merge(&mut result, updates, false),
    }
    result
}

fn deep_merge(target: &mut TranslationTree, updates: &TranslationTree, overwrite: bool) {
    for (key, update) in updates {
        match (target.get_mut(key), update) {
            (Some(Value::Object(existing)), Value::Object(child)) => {
                deep_merge(existing, child, overwrite);
            }
            (Some(existing), _) => {
                if overwrite {
                    *existing = update.clone();
                }
            }
            (None, _) => {
                target.insert(key.clone(), update.clone());
            }
        }
    }
}

/// Check that every value is either a string or a nested object
pub fn validate_structure(tree: &TranslationTree) -> Result<(), TreeError> {
    let mut violations = Vec::new();
    collect_violations(tree, None, &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(TreeError { violations })
    }
}

fn collect_violations(
    tree: &TranslationTree,
    prefix: Option<&str>,
    violations: &mut Vec<StructureViolation>,
) {
    for (key, value) in tree {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };
        let found = match value {
            Value::String(_) => continue,
            Value::Object(child) => {
                collect_violations(child, Some(&path), violations);
                continue;
            }
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::Array(_) => "an array",
        };
        violations.push(StructureViolation { path, found });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn tree(value: Value) -> TranslationTree {
        match value {
            Value::Object(map) => map,
            _ => panic!("test tree must be an object"),
        }
    }

    // ==================== extract_keys Tests ====================

    #[test]
    fn test_extract_keys_preorder() {
        let t = tree(json!({
            "app": {"title": "App", "menu": {"open": "Open", "close": "Close"}},
            "hello": "Hello"
        }));
        assert_eq!(
            extract_keys(&t),
            vec!["app.title", "app.menu.open", "app.menu.close", "hello"]
        );
    }

    #[test]
    fn test_extract_keys_skips_non_string_leaves() {
        let t = tree(json!({"a": "x", "count": 3, "flag": true, "none": null}));
        assert_eq!(extract_keys(&t), vec!["a"]);
    }

    #[test]
    fn test_extract_keys_empty_tree() {
        assert!(extract_keys(&TranslationTree::new()).is_empty());
    }

    // ==================== get / set Tests ====================

    #[test]
    fn test_get_nested() {
        let t = tree(json!({"user": {"name": "Name"}}));
        assert_eq!(get(&t, "user.name"), Some("Name"));
        assert_eq!(get(&t, "user"), None);
        assert_eq!(get(&t, "user.name.first"), None);
        assert_eq!(get(&t, "missing.key"), None);
    }

    #[test]
    fn test_get_value_returns_non_string() {
        let t = tree(json!({"a": null}));
        assert_eq!(get_value(&t, "a"), Some(&Value::Null));
        assert_eq!(get(&t, "a"), None);
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut t = TranslationTree::new();
        set(&mut t, "a.b.c", "deep");
        assert_eq!(t, tree(json!({"a": {"b": {"c": "deep"}}})));
    }

    #[test]
    fn test_set_overwrites_leaf_in_the_way() {
        let mut t = tree(json!({"a": "leaf"}));
        set(&mut t, "a.b", "value");
        assert_eq!(get(&t, "a.b"), Some("value"));
    }

    #[test]
    fn test_set_keeps_key_position() {
        let mut t = tree(json!({"first": "1", "second": "2", "third": "3"}));
        set(&mut t, "second", "two");
        let keys: Vec<_> = t.keys().cloned().collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_set_empty_path_is_ignored() {
        let mut t = TranslationTree::new();
        set(&mut t, "", "x");
        assert!(t.is_empty());
    }

    #[test]
    fn test_remove_nested() {
        let mut t = tree(json!({"a": {"b": "1", "c": "2"}}));
        assert_eq!(remove(&mut t, "a.b"), Some(json!("1")));
        assert_eq!(t, tree(json!({"a": {"c": "2"}})));
        assert_eq!(remove(&mut t, "a.missing"), None);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(split_path("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(join_path(&["a", "b", "c"]), "a.b.c");
        assert_eq!(parent_path("a.b.c"), Some("a.b"));
        assert_eq!(parent_path("a"), None);
    }

    // ==================== merge Tests ====================

    #[test]
    fn test_merge_strategy_merge() {
        let base = tree(json!({"a": {"x": "1", "y": "2"}, "b": "keep"}));
        let updates = tree(json!({"a": {"y": "20", "z": "30"}}));
        let merged = merge(&base, &updates, MergeStrategy::Merge);
        assert_eq!(
            merged,
            tree(json!({"a": {"x": "1", "y": "20", "z": "30"}, "b": "keep"}))
        );
    }

    #[test]
    fn test_merge_strategy_replace() {
        let base = tree(json!({"a": {"x": "1", "y": "2"}, "b": "keep"}));
        let updates = tree(json!({"a": {"y": "20"}}));
        let merged = merge(&base, &updates, MergeStrategy::Replace);
        assert_eq!(merged, tree(json!({"a": {"y": "20"}, "b": "keep"})));
    }

    #[test]
    fn test_merge_strategy_preserve() {
        let base = tree(json!({"a": {"x": "1"}, "b": "keep"}));
        let updates = tree(json!({"a": {"x": "changed", "y": "new"}, "b": "changed"}));
        let merged = merge(&base, &updates, MergeStrategy::Preserve);
        assert_eq!(merged, tree(json!({"a": {"x": "1", "y": "new"}, "b": "keep"})));
    }

    // ==================== validate_structure Tests ====================

    #[test]
    fn test_validate_structure_ok() {
        let t = tree(json!({"a": {"b": "c"}, "d": ""}));
        assert!(validate_structure(&t).is_ok());
    }

    #[test]
    fn test_validate_structure_reports_every_violation() {
        let t = tree(json!({"a": {"n": 1}, "b": [1, 2], "c": null, "d": "ok"}));
        let err = validate_structure(&t).unwrap_err();
        assert_eq!(err.violations.len(), 3);
        assert_eq!(err.violations[0].path, "a.n");
        assert_eq!(err.violations[0].found, "a number");
        assert!(err.to_string().contains("'b' is an array"));
    }

    // ==================== Properties ====================

    fn arb_tree() -> impl Strategy<Value = TranslationTree> {
        prop::collection::vec(
            (
                prop::collection::vec("[a-c]{1,2}", 1..4),
                "[a-zA-Z ]{0,8}",
            ),
            0..12,
        )
        .prop_map(|entries| {
            let mut t = TranslationTree::new();
            for (segments, value) in entries {
                set(&mut t, &segments.join("."), value);
            }
            t
        })
    }

    proptest! {
        #[test]
        fn prop_set_get_round_trip(t in arb_tree()) {
            for key in extract_keys(&t) {
                let mut copy = t.clone();
                let value = get(&t, &key).map(str::to_string).unwrap_or_default();
                set(&mut copy, &key, value);
                prop_assert_eq!(&copy, &t);
            }
        }

        #[test]
        fn prop_get_after_set(t in arb_tree(), value in "[a-z]{0,6}") {
            let mut t = t;
            set(&mut t, "zz.yy", value.clone());
            prop_assert_eq!(get(&t, "zz.yy"), Some(value.as_str()));
        }

        #[test]
        fn prop_split_join_round_trip(segments in prop::collection::vec("[a-z]{1,4}", 1..5)) {
            let path = join_path(&segments);
            prop_assert_eq!(split_path(&path), segments.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
