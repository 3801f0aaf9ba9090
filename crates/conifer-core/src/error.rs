//! Error types and result aliases for conifer.
//!
//! This module defines the shared error taxonomy used across the control
//! plane. Validation failures are always aggregated: a candidate document
//! is checked in full and every violation is reported in one error.

use std::fmt;

/// The result type used throughout conifer.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in control-plane operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A candidate configuration failed one or more structural checks.
    ///
    /// The message carries every violation, never just the first one.
    #[error("{}", .errors.join(", "))]
    ValidationFailed {
        /// All accumulated violation messages, in check order.
        errors: Vec<String>,
    },

    /// Invalid input was rejected before any storage access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested resource was not found.
    #[error("not found: {resource_type} with id {id}")]
    ResourceNotFound {
        /// The type of resource that was not found.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A document was not found (simple variant for storage).
    #[error("not found: {0}")]
    NotFound(String),

    /// A storage operation failed.
    ///
    /// Treated as transient; callers may retry. No partial state is left
    /// behind, writes are all-or-nothing at the document level.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a validation error from accumulated violation messages.
    #[must_use]
    pub fn validation(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Creates a new resource not found error.
    #[must_use]
    pub fn resource_not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Returns true if this error indicates a missing document or resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ResourceNotFound { .. })
    }
}
