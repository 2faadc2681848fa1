//! Decoding of resource documents from YAML and JSON.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Document formats accepted by [`read_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Decode a value from YAML text.
///
/// # Errors
///
/// Returns `YamlParseFailed` when the text is not valid YAML for `T`.
pub fn from_yaml<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_yaml::from_str(text).map_err(|e| Error::yaml_parse_failed(e.to_string()))
}

/// Decode a value from JSON text.
///
/// # Errors
///
/// Returns `JsonParseFailed` when the text is not valid JSON for `T`.
pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::json_parse_failed(e.to_string()))
}

/// Decode text in the given format.
///
/// # Errors
///
/// Propagates the parse error of the chosen format.
pub fn decode<T: DeserializeOwned>(text: &str, format: Format) -> Result<T> {
    match format {
        Format::Yaml => from_yaml(text),
        Format::Json => from_json(text),
    }
}

/// Read and decode a document, choosing the format by file extension.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for unknown extensions, `FileReadFailed` when
/// the file cannot be read, and a parse error when decoding fails.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = Format::from_path(path).ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let text =
        std::fs::read_to_string(path).map_err(|e| Error::file_read_failed(path, e.to_string()))?;

    tracing::debug!(path = %path.display(), ?format, "Decoding document");
    decode(&text, format)
}
