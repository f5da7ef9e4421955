//! Error handling types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// A single field diagnostic inside an aggregated validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    /// Parameter name as the caller supplied it
    pub field: String,
    /// What went wrong with the field
    pub message: String,
    /// The received value, rendered for the diagnostic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
}

impl FieldError {
    /// Create a field diagnostic with the received value attached.
    pub fn new<F: Into<String>, M: Into<String>>(
        field: F,
        message: M,
        received: Option<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            received,
        }
    }
}

/// Main error type for the Security Testing Gateway
#[derive(Error, Debug)]
pub enum Error {
    /// Aggregated parameter validation failure; carries every offending field
    #[error("Validation failed: {message}")]
    Validation {
        /// Summary of the validation failure
        message: String,
        /// One diagnostic per offending field, never partial
        fields: Vec<FieldError>,
    },

    /// Addressed entity does not exist
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Concurrent modification lost the race; the caller may retry
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting modification
        message: String,
    },

    /// Library add rejected because an existing entry is too similar
    #[error("Duplicate of existing entry {existing_id}: {message}")]
    Duplicate {
        /// Description of the similarity hit
        message: String,
        /// Id of the conflicting entry
        existing_id: String,
    },

    /// Cookie file permissions are wider than 0600/0400 or owner mismatch
    #[error("Insecure permissions on {path}: {message}")]
    InsecurePermissions {
        /// Path of the offending file
        path: String,
        /// Observed mode / owner problem
        message: String,
    },

    /// A profile path resolved outside the configured data directory
    #[error("Path escapes data directory: {path}")]
    PathEscape {
        /// The offending resolved path
        path: String,
    },

    /// Malformed configuration or cookie file content
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parse failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// HTTP transfer exceeded its deadline
    #[error("Timeout: {message}")]
    Timeout {
        /// Description of what timed out
        message: String,
    },

    /// HTTP transfer failed with no response
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database disabled or unreachable
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Why the store cannot serve the operation
        message: String,
    },

    /// Database-related error
    #[error("Database error: {message}")]
    Database {
        /// Description of the database error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding provider operation error
    #[error("Embedding provider error: {message}")]
    Embedding {
        /// Description of the embedding error
        message: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O operation error
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Stable agent-visible error kind string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_failed",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Duplicate { .. } => "duplicate",
            Self::InsecurePermissions { .. } => "insecure_permissions",
            Self::PathEscape { .. } => "path_escape",
            Self::Parse { .. } => "parse_error",
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport_error",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Database { .. }
            | Self::Embedding { .. }
            | Self::Config { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => "internal",
        }
    }

    /// Field diagnostics if this is an aggregated validation failure.
    #[must_use]
    pub fn fields(&self) -> Option<&[FieldError]> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

// Basic error creation methods
impl Error {
    /// Create an aggregated validation error
    pub fn validation<S: Into<String>>(message: S, fields: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            fields,
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a duplicate error referencing the conflicting entry
    pub fn duplicate<S: Into<String>, I: Into<String>>(message: S, existing_id: I) -> Self {
        Self::Duplicate {
            message: message.into(),
            existing_id: existing_id.into(),
        }
    }

    /// Create an insecure permissions error
    pub fn insecure_permissions<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::InsecurePermissions {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a path escape error
    pub fn path_escape<P: Into<String>>(path: P) -> Self {
        Self::PathEscape { path: path.into() }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with source
    pub fn parse_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a store unavailable error
    pub fn store_unavailable<S: Into<String>>(message: S) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }
}

// Database error creation methods
impl Error {
    /// Create a database error
    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error with source
    pub fn database_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Infrastructure error creation methods
impl Error {
    /// Create an embedding provider error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Note: OS-specific and external crate error conversions are excluded for domain purity.
// The infrastructure layer is responsible for these conversions.
