//! Reading and writing translation files.
//!
//! JSON and YAML files parse into a [`TranslationTree`] tagged with their
//! [`Format`]. Writing a tree back keeps key order and, for JSON, the
//! indentation of the file it came from.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::Path;
use tokio::fs;

use crate::error::{Error, Result};
use crate::tree::TranslationTree;

/// Extensions recognised as translation files
pub const SUPPORTED_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

/// Layout details carried over when rewriting a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStyle {
    pub indent: String,
    pub trailing_newline: bool,
}

impl Default for FileStyle {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            trailing_newline: true,
        }
    }
}

impl FileStyle {
    /// Infer indentation from the first indented line of existing content
    pub fn detect(raw: &str) -> FileStyle {
        let indent = raw
            .lines()
            .map(|line| {
                let trimmed = line.trim_start_matches([' ', '\t']);
                &line[..line.len() - trimmed.len()]
            })
            .find(|indent| !indent.is_empty())
            .unwrap_or("  ")
            .to_string();

        FileStyle {
            indent,
            trailing_newline: raw.is_empty() || raw.ends_with('\n'),
        }
    }
}

/// A parsed translation file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub tree: TranslationTree,
    pub format: Format,
    pub raw_content: String,
}

impl ParsedFile {
    pub fn style(&self) -> FileStyle {
        FileStyle::detect(&self.raw_content)
    }
}

/// Parse file content in the given format.
///
/// An empty document is an empty tree; any other non-mapping root is an
/// error.
pub fn parse_str(content: &str, format: Format, path: &Path) -> Result<TranslationTree> {
    if content.trim().is_empty() {
        return Ok(TranslationTree::new());
    }

    let value: Value = match format {
        Format::Json => serde_json::from_str(content).map_err(|e| Error::parse(path, e))?,
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| Error::parse(path, e))?,
    };

    match value {
        Value::Object(tree) => Ok(tree),
        Value::Null => Ok(TranslationTree::new()),
        other => Err(Error::parse(
            path,
            format!("expected a mapping at the root, found {}", json_type(&other)),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read and parse a translation file
pub async fn parse_file(path: &Path) -> Result<ParsedFile> {
    let format = Format::from_path(path).ok_or_else(|| Error::UnsupportedFormat(path.into()))?;
    let raw_content = fs::read_to_string(path)
        .await
        .map_err(|source| Error::FileRead {
            path: path.into(),
            source,
        })?;
    let tree = parse_str(&raw_content, format, path)?;

    Ok(ParsedFile {
        tree,
        format,
        raw_content,
    })
}

/// Serialize a tree using the default style
pub fn stringify(tree: &TranslationTree, format: Format) -> Result<String> {
    stringify_with_style(tree, format, &FileStyle::default())
}

/// Serialize a tree, reproducing `style` where the format allows it
pub fn stringify_with_style(
    tree: &TranslationTree,
    format: Format,
    style: &FileStyle,
) -> Result<String> {
    let mut out = match format {
        Format::Json => {
            let mut buf = Vec::new();
            let formatter = PrettyFormatter::with_indent(style.indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            tree.serialize(&mut serializer)
                .map_err(|e| Error::serialize(format, e))?;
            String::from_utf8(buf).map_err(|e| Error::serialize(format, e))?
        }
        Format::Yaml => serde_yaml::to_string(tree).map_err(|e| Error::serialize(format, e))?,
    };

    match (style.trailing_newline, out.ends_with('\n')) {
        (true, false) => out.push('\n'),
        (false, true) => {
            out.pop();
        }
        _ => {}
    }
    Ok(out)
}

/// Write a tree to `path`, creating parent directories as needed
pub async fn write_file(
    path: &Path,
    tree: &TranslationTree,
    format: Format,
    style: &FileStyle,
) -> Result<()> {
    let content = stringify_with_style(tree, format, style)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, content).await?;
    Ok(())
}
