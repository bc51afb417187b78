//! Custom error types for the backup merger.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    MissingFile(String),

    #[error("Malformed document {path}: {source}")]
    MalformedDocument {
        path: String,
        #[source]
        source: xmltree::ParseError,
    },

    #[error("Element <{element}> not found in {path}")]
    MissingElement { path: String, element: String },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: xmltree::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed archive index: {0}")]
    MalformedIndex(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("{} still present after {attempts} removal attempts", path.display())]
    CleanupTimeout { path: PathBuf, attempts: u32 },
}

impl MergeError {
    pub fn missing_element(path: &str, element: &str) -> Self {
        MergeError::MissingElement {
            path: path.to_string(),
            element: element.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
