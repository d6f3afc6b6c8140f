//! Error handling for graphvis-rs
//!
//! This module defines the crate error type and a Result alias used by
//! the graph core, the event dispatcher and the proxy pipes.
//!
//! Structural errors (`IdAlreadyInUse`, `ElementNotFound`, `EdgeRejected`)
//! are only raised by graphs in strict mode; relaxed graphs absorb the same
//! situations and return `None` instead.

use thiserror::Error;

/// Main error type for graphvis-rs operations
#[derive(Error, Debug)]
pub enum GraphError {
    /// An element with this id already exists (strict mode)
    #[error("Id already in use: {0}")]
    IdAlreadyInUse(String),

    /// A node or edge the operation needs does not exist (strict mode)
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// An endpoint's incidence structure refused the edge
    #[error("Edge '{edge}' was rejected by node '{node}'")]
    EdgeRejected { edge: String, node: String },

    /// The operation is not available on this kind of graph
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors reported by a style sheet loader
    #[error("Style sheet error: {0}")]
    StyleSheet(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GraphError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &GraphError {
        match self {
            GraphError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}

/// Result type alias for graphvis-rs operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
