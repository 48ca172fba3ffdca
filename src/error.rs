//! Structured error types for labelpress.
//!
//! Every failure is fatal for the batch: configuration problems are reported
//! with the JSON path that caused them, I/O and post-process failures with
//! the file or command involved.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A schema violation found while validating the input document.
///
/// Displayed as the message followed by the offending JSON path on its own
/// line, e.g. `Preset not found: "title"\nat json.files[0].text[2].preset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub path: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\nat {}", self.message, self.path)
    }
}

impl std::error::Error for ValidationError {}

/// The unified error type returned by all public labelpress functions.
#[derive(Debug, Error)]
pub enum LabelpressError {
    /// The document path does not exist.
    #[error("File does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    /// The document path exists but is a directory or something else.
    #[error("Path is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document is not syntactically valid JSON.
    #[error("The provided file is not valid JSON: {}", path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A validated document still failed to map onto the typed model.
    #[error("Document does not match the expected shape: {0}")]
    Schema(#[from] serde_json::Error),

    /// A label resolved without one of its required attributes.
    #[error("Text label {index} has no \"{field}\" after applying its preset")]
    MissingAttribute { index: usize, field: &'static str },

    /// A continuation label appeared before any opening label.
    #[error("Text label {index} is a continuation but no label precedes it")]
    OrphanContinuation { index: usize },

    /// Neither the file nor the document gives both page sides.
    #[error("No page format for output {output}")]
    MissingPageFormat { output: String },

    /// A font could not be loaded, parsed, or looked up.
    #[error("Font error: {0}")]
    Font(String),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The post-process command could not be started or exited non-zero.
    #[error("An error has occurred while postprocessing `{command}`: {reason}")]
    Postprocess { command: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LabelpressError>;
