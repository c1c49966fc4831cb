// src/error.rs

use thiserror::Error;

/// Core error types for pmquery
#[derive(Error, Debug)]
pub enum Error {
    /// An operation requiring at least one package found none
    #[error("Empty package set: {0}")]
    EmptySet(String),

    /// An operation requiring a single logical result found several
    #[error("Ambiguous package set: {0}")]
    AmbiguousSet(String),

    /// A keyword filter or grouping criterion names no package attribute
    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    /// Malformed dependency specification
    #[error("Invalid dependency expression: {0}")]
    InvalidExpression(String),

    /// Malformed package atom
    #[error("Invalid atom: {0}")]
    InvalidAtom(String),

    /// Malformed version string
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Invalid repository stack configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Repository index (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this is the empty-set kind, regardless of message
    pub fn is_empty_set(&self) -> bool {
        matches!(self, Error::EmptySet(_))
    }

    /// Whether this is the ambiguous-set kind, regardless of message
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Error::AmbiguousSet(_))
    }
}

/// Result type alias using pmquery's Error type
pub type Result<T> = std::result::Result<T, Error>;
