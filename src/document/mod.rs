//! Loading a document from disk: existence checks, JSON parsing, validation
//! and finally deserialization into the typed model.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{LabelpressError, Result};
use crate::model::Document;
use crate::validate::validate;

/// A validated document and the directory its relative paths resolve
/// against.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    pub base_dir: PathBuf,
}

/// Read, validate and parse the document at `path`.
pub fn load(path: &Path) -> Result<LoadedDocument> {
    if !path.exists() {
        return Err(LabelpressError::MissingFile(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(LabelpressError::NotAFile(path.to_path_buf()));
    }

    let source = fs::read_to_string(path).map_err(|source| LabelpressError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = base_dir_of(path);
    let document = parse(&source, path, &base_dir)?;
    Ok(LoadedDocument { document, base_dir })
}

/// Parse and validate document source. `path` is only used in messages.
pub fn parse(source: &str, path: &Path, base_dir: &Path) -> Result<Document> {
    let value: Value = serde_json::from_str(source).map_err(|source| {
        LabelpressError::InvalidJson {
            path: path.to_path_buf(),
            source,
        }
    })?;
    validate(&value, base_dir)?;
    Ok(serde_json::from_value(value)?)
}

fn base_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
