//! Descriptor loading with source-located parse errors

use std::fs;
use std::path::Path;

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Malformed JSON in an export descriptor
#[derive(Debug, Error, Diagnostic)]
#[error("malformed export descriptor: {message}")]
#[diagnostic(code(partmaster::bootstrap::parse))]
pub struct ImportParseError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    pub message: String,
}

impl ImportParseError {
    pub fn from_serde_error(err: &serde_json::Error, source: &str, filename: &str) -> Self {
        let offset = line_col_to_offset(source, err.line().max(1), err.column().max(1));
        let message = err.to_string();
        let help = generate_help(err);
        let width = source[offset..].chars().next().map_or(0, char::len_utf8);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset + width),
            help,
            message,
        }
    }
}

/// Why a descriptor could not be loaded
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(ImportParseError),
}

/// Read and deserialize a JSON descriptor
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let bytes = fs::read(path).map_err(LoadError::Io)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        LoadError::Parse(ImportParseError::from_serde_error(
            &e,
            &String::from_utf8_lossy(&bytes),
            &path.display().to_string(),
        ))
    })
}

/// Convert 1-based line/column to a byte offset
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start = source
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum::<usize>();
    let line_text = source[line_start..].lines().next().unwrap_or("");
    let col_offset = line_text
        .char_indices()
        .nth(column - 1)
        .map(|(i, _)| i)
        .unwrap_or(line_text.len());
    (line_start + col_offset).min(source.len())
}

fn generate_help(err: &serde_json::Error) -> Option<String> {
    use serde_json::error::Category;

    match err.classify() {
        Category::Eof => Some("the file ends early; it may have been truncated".to_string()),
        Category::Syntax => Some("check for a missing comma, quote or bracket".to_string()),
        Category::Data => Some("a field has the wrong type or a required field is missing".to_string()),
        Category::Io => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_points_at_error_location() {
        let source = "{\n  \"parts\": [,]\n}";
        let err = serde_json::from_str::<serde_json::Value>(source).unwrap_err();
        let parse = ImportParseError::from_serde_error(&err, source, "mapping.json");

        let offset = line_col_to_offset(source, err.line(), err.column());
        let line_two = 2..source.len() - 2;
        assert!(line_two.contains(&offset));
        assert!(parse.message.contains("line 2"));
        assert!(parse.help.is_some());
    }

    #[test]
    fn test_non_utf8_descriptor_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mapping.json");
        fs::write(&path, b"{\"parts\": [\"\xff\xfe\"]}").unwrap();

        match load_json::<serde_json::Value>(&path) {
            Err(LoadError::Parse(e)) => assert!(!e.message.is_empty()),
            Err(LoadError::Io(e)) => panic!("expected a parse error, got IO error: {}", e),
            Ok(v) => panic!("expected a parse error, got {}", v),
        }
    }

    #[test]
    fn test_offset_is_clamped() {
        assert_eq!(line_col_to_offset("abc", 1, 99), 3);
        assert_eq!(line_col_to_offset("", 1, 1), 0);
    }
}
