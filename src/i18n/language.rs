//! Language tags and their resolution from translation file paths.
//!
//! A tag is two or three lowercase letters with an optional uppercase region
//! (`en`, `fil`, `pt-BR`). A file's language comes from its stem
//! (`locales/fr.json`) or, failing that, from the directory segment right
//! after a locale root (`locales/fr/common.json`).

use regex::Regex;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// Directory names whose child segment names a language
pub const LOCALE_DIRECTORIES: &[&str] = &["locales", "i18n", "translations", "lang"];

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| Regex::new(r"^[a-z]{2,3}(-[A-Z]{2})?$").unwrap())
}

/// Check a language tag against the `ll[-RR]` shape
pub fn is_valid_tag(tag: &str) -> bool {
    tag_regex().is_match(tag)
}

/// Resolve the language a translation file belongs to.
///
/// # Returns
/// * `Some(tag)` from the file stem when it is itself a tag
/// * `Some(tag)` from the segment following a locale directory
/// * `None` otherwise
pub fn language_from_path(path: &Path) -> Option<String> {
    if let Some(stem) = path.file_stem().and_then(OsStr::to_str) {
        if is_valid_tag(stem) {
            return Some(stem.to_string());
        }
    }

    let segments: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    segments
        .windows(2)
        .find(|pair| LOCALE_DIRECTORIES.contains(&pair[0]) && is_valid_tag(pair[1]))
        .map(|pair| pair[1].to_string())
}

/// Path of the sibling file holding `to` translations for the file at `path`
/// written in `from`.
///
/// `locales/en.json` maps to `locales/fr.json`; `locales/en/common.json` maps
/// to `locales/fr/common.json`. Returns `None` when `path` does not carry the
/// `from` tag in either position.
pub fn sibling_path(path: &Path, from: &str, to: &str) -> Option<PathBuf> {
    let stem = path.file_stem().and_then(OsStr::to_str)?;
    if stem == from {
        let file_name = match path.extension().and_then(OsStr::to_str) {
            Some(ext) => format!("{}.{}", to, ext),
            None => to.to_string(),
        };
        return Some(path.with_file_name(file_name));
    }

    let components: Vec<Component> = path.components().collect();
    let index = components.windows(2).position(|pair| {
        matches!(
            (pair[0], pair[1]),
            (Component::Normal(dir), Component::Normal(seg))
                if dir.to_str().is_some_and(|d| LOCALE_DIRECTORIES.contains(&d))
                    && seg == OsStr::new(from)
        )
    })?;

    let mut result = PathBuf::new();
    for (i, component) in components.iter().enumerate() {
        if i == index + 1 {
            result.push(to);
        } else {
            result.push(component.as_os_str());
        }
    }
    Some(result)
}
