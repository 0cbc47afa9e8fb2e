//! Error types for loading persisted layers, data views and settings

use thiserror::Error;

/// Errors that can occur while loading documents from disk or text
#[derive(Debug, Error)]
pub enum ParseError {
    /// IO error reading file
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// YAML deserialization error
    #[error("Invalid YAML: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
    /// JSON deserialization error
    #[error("Invalid JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        ParseError::Io {
            path: String::new(),
            source: err,
        }
    }
}
