use regex::Regex;
use std::path::Path;

use crate::error::{Error, Result};

/// Comma-separated glob list such as `*.json,locales/**/*.{yaml,yml}`.
///
/// Globs without a `/` match the file name; globs with one match the path
/// relative to the watch root. Supports `*`, `**`, `?` and `{a,b}`.
#[derive(Debug, Clone)]
pub struct FilePattern {
    globs: Vec<Glob>,
}

#[derive(Debug, Clone)]
struct Glob {
    regex: Regex,
    match_path: bool,
}

impl FilePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let globs = split_top_level(pattern)
            .into_iter()
            .map(str::trim)
            .filter(|glob| !glob.is_empty())
            .map(|glob| {
                let regex = Regex::new(&glob_to_regex(glob)).map_err(|e| {
                    Error::Config(format!("invalid file pattern '{}': {}", glob, e))
                })?;
                Ok(Glob {
                    regex,
                    match_path: glob.contains('/'),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if globs.is_empty() {
            return Err(Error::Config(format!("file pattern '{}' is empty", pattern)));
        }
        Ok(Self { globs })
    }

    /// Whether `path` (relative to `root` when possible) matches any glob
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.globs.iter().any(|glob| {
            if glob.match_path {
                glob.regex.is_match(&relative)
            } else {
                glob.regex.is_match(&file_name)
            }
        })
    }
}

/// Split on commas that are not inside `{...}`
fn split_top_level(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in pattern.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&pattern[start..]);
    parts
}

fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = glob.chars().peekable();
    let mut in_braces = false;

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // `**/` also matches zero directories
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '{' => {
                in_braces = true;
                regex.push_str("(?:");
            }
            '}' if in_braces => {
                in_braces = false;
                regex.push(')');
            }
            ',' if in_braces => regex.push('|'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }

    regex.push('$');
    regex
}
