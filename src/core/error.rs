//! Error handling and error types for DRF Rust.
//!
//! Only conditions that abort a training run are errors. Shortfalls that the
//! build absorbs (missing remote chunks, rejected rows, under-filled quotas)
//! are reported through [`crate::dataset::BuildWarning`] and the log instead.

use std::io;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DrfError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The dataset cannot be used for classification.
    /// Raised eagerly, before any chunk task is scheduled.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Dataset descriptor or chunk layout errors
    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// A chunk required for local work is missing from the store
    #[error("Chunk not found: {key}")]
    ChunkNotFound { key: String },

    /// Remote task dispatch failed; the caller may retry
    #[error("Remote task to node {node} failed: {message}")]
    Remote { node: u16, message: String },

    /// Thread pool construction or task batch errors
    #[error("Threading error: {message}")]
    Threading { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Dimension mismatch errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Out of bounds access
    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },
}

/// Type alias for Results using DrfError
pub type Result<T> = std::result::Result<T, DrfError>;

impl DrfError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        DrfError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        DrfError::InvalidData {
            message: message.into(),
        }
    }

    /// Create a dataset error
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        DrfError::Dataset {
            message: message.into(),
        }
    }

    /// Create a chunk-not-found error
    pub fn chunk_not_found<S: Into<String>>(key: S) -> Self {
        DrfError::ChunkNotFound { key: key.into() }
    }

    /// Create a remote dispatch error
    pub fn remote<S: Into<String>>(node: u16, message: S) -> Self {
        DrfError::Remote {
            node,
            message: message.into(),
        }
    }

    /// Create a threading error
    pub fn threading<S: Into<String>>(message: S) -> Self {
        DrfError::Threading {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        DrfError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        DrfError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: usize, length: usize) -> Self {
        DrfError::IndexOutOfBounds { index, length }
    }

    /// Returns true if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DrfError::Remote { .. } | DrfError::IO { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            DrfError::Config { .. } => "config",
            DrfError::InvalidData { .. } => "invalid_data",
            DrfError::Dataset { .. } => "dataset",
            DrfError::ChunkNotFound { .. } => "chunk_not_found",
            DrfError::Remote { .. } => "remote",
            DrfError::Threading { .. } => "threading",
            DrfError::InvalidParameter { .. } => "invalid_parameter",
            DrfError::DimensionMismatch { .. } => "dimension_mismatch",
            DrfError::IndexOutOfBounds { .. } => "index_out_of_bounds",
            DrfError::IO { .. } => "io",
            DrfError::Json { .. } => "json",
            DrfError::Toml { .. } => "toml",
            DrfError::Bincode { .. } => "bincode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DrfError::invalid_data("Floating point class column is not supported.");
        assert!(matches!(err, DrfError::InvalidData { .. }));
        assert_eq!(err.category(), "invalid_data");
        assert_eq!(
            err.to_string(),
            "Invalid data: Floating point class column is not supported."
        );
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = DrfError::invalid_parameter("sample_fraction", "1.5", "must be in range [0.0, 1.0]");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: sample_fraction = 1.5, must be in range [0.0, 1.0]"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DrfError::remote(3, "timed out").is_retryable());
        assert!(!DrfError::invalid_data("bad").is_retryable());
        assert!(!DrfError::config("bad").is_retryable());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: DrfError = io_err.into();
        assert_eq!(err.category(), "io");
        assert!(err.is_retryable());
    }
}
