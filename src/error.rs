//! Error types for yang-translate

use std::path::PathBuf;

use thiserror::Error;

use crate::compiler::OutputFormat;

/// Main error type for translation and spec generation
#[derive(Debug, Error)]
pub enum YangError {
    /// A module reference matched neither a file nor a glob
    #[error("{} invalid file path", .0.display())]
    InvalidModulePath(PathBuf),

    /// A search path segment is not an existing directory
    #[error("{} is invalid directory path", .0.display())]
    InvalidSearchPath(PathBuf),

    /// Document type other than `config` or `data`
    #[error("doctype value {0} is invalid, valid value are config, data")]
    InvalidDoctype(String),

    /// Input is neither a parseable document nor an existing file
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Caller supplied malformed JSON
    #[error("Failed to load json configuration: {0}")]
    InvalidJson(String),

    /// Caller supplied malformed XML
    #[error("Failed to load xml data: {0}")]
    InvalidXml(String),

    /// The schema compiler reported an error or could not be run
    #[error("Error while generating {format} output: {output}")]
    SchemaCompilation {
        format: OutputFormat,
        output: String,
    },

    /// An external executable or shared resource could not be located
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// XML produced by the toolchain is unusable
    #[error("Error while translating to xml: {0}")]
    XmlGeneration(String),

    /// JSON produced by the toolchain is unusable
    #[error("Error while translating to json: {0}")]
    JsonGeneration(String),

    /// Schema retrieval from a device failed
    #[error("Fail to fetch schema: {0}")]
    Fetch(String),

    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else escaping a caller-facing operation
    #[error("Unhandled exception from [{operation}]. Error: {message}")]
    Unhandled {
        operation: &'static str,
        message: String,
    },
}

impl YangError {
    /// Attribute an untyped failure to the operation it escaped from.
    ///
    /// Typed engine errors pass through unchanged.
    pub fn within(self, operation: &'static str) -> Self {
        match self {
            YangError::Io(e) => YangError::Unhandled {
                operation,
                message: e.to_string(),
            },
            YangError::Json(e) => YangError::Unhandled {
                operation,
                message: e.to_string(),
            },
            other => other,
        }
    }
}

/// Result type alias for yang-translate operations
pub type Result<T> = std::result::Result<T, YangError>;
