//! Error types for LexNet operations.
//!
//! Fatal conditions are split by how callers are expected to react:
//! configuration errors are raised before any I/O, missing preconditions
//! carry the complete list of absent artifacts, and integrity violations
//! surface data bugs instead of silently corrupting output.

use thiserror::Error;

/// Result type for LexNet operations.
pub type Result<T> = std::result::Result<T, LexnetError>;

/// Errors that can occur in the LexNet pipeline.
#[derive(Debug, Error)]
pub enum LexnetError {
    /// Invalid parameter configuration.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Required upstream artifacts are absent.
    #[error("Missing {kind}: {}", .missing.join(" "))]
    MissingPrecondition { kind: String, missing: Vec<String> },

    /// Structural inconsistency in the input data.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Graph-related errors.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tabular (CSV) input or output errors.
    #[error("Table error: {0}")]
    Table(String),
}

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Clustering method not recognized.
    #[error("Method {0} not allowed")]
    UnknownMethod(String),

    /// Co-occurrence type not recognized.
    #[error("{0} is not a valid co-occurrence type (use 'decision'|'paragraph')")]
    UnknownCooccurrenceType(String),

    /// Filename cannot be decoded into a configuration.
    #[error("Cannot decode filename {filename}: {reason}")]
    InvalidFilename { filename: String, reason: String },

    /// Invalid value for a field.
    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Graph-related errors.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// Node not found.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Containment edges do not form a tree.
    #[error("Node {node} has more than one containment parent ({first}, {second})")]
    MultipleParents {
        node: String,
        first: String,
        second: String,
    },

    /// Containment parent links loop back on themselves.
    #[error("Containment cycle through {0}")]
    CyclicHierarchy(String),
}

// Convenience constructors
impl LexnetError {
    pub fn node_not_found(key: impl Into<String>) -> Self {
        LexnetError::Graph(GraphError::NodeNotFound(key.into()))
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        LexnetError::Integrity(msg.into())
    }

    pub fn table(msg: impl std::fmt::Display) -> Self {
        LexnetError::Table(msg.to_string())
    }

    /// Build a missing-precondition error from an unsorted collection.
    pub fn missing(kind: impl Into<String>, missing: impl IntoIterator<Item = String>) -> Self {
        let mut missing: Vec<String> = missing.into_iter().collect();
        missing.sort();
        missing.dedup();
        LexnetError::MissingPrecondition {
            kind: kind.into(),
            missing,
        }
    }

    pub fn invalid_config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LexnetError::Config(ConfigError::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        })
    }
}
