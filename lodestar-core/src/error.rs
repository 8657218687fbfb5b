//! Error types for Lodestar operations

use thiserror::Error;

/// Request validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field} (item {index})")]
    RequiredFieldMissing { index: usize, field: String },

    #[error("Duplicate uuid in request: {uuid}")]
    DuplicateUuid { uuid: String },

    #[error("{first} and {second} together is not supported")]
    MutuallyExclusive { first: String, second: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// The uuid is already stored under a different engagement.
    #[error("Artifact {uuid} belongs to engagement {owner}")]
    ForeignUuid { uuid: String, owner: String },
}

/// Document store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Artifact not found: {uuid}")]
    NotFound { uuid: String },

    #[error("Artifact already exists: {uuid}")]
    DuplicateKey { uuid: String },

    #[error("Storage backend failed: {reason}")]
    Backend { reason: String },
}

/// Errors raised by remote collaborators (repository host, engagement directory).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote resource not found: {resource}")]
    NotFound { resource: String },

    /// Connection-level failure. Safe to retry.
    #[error("{service} unavailable: {reason}")]
    Transient { service: String, reason: String },

    #[error("{service} request failed: {reason}")]
    Fatal {
        service: String,
        status: Option<u16>,
        reason: String,
    },
}

impl RemoteError {
    /// Whether a retry policy may repeat the call.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Snapshot file encoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Malformed snapshot content: {reason}")]
    Malformed { reason: String },

    #[error("Snapshot serialization failed: {reason}")]
    Serialize { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Lodestar errors.
#[derive(Debug, Clone, Error)]
pub enum LodestarError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Lodestar operations.
pub type LodestarResult<T> = Result<T, LodestarError>;

// =============================================================================
// TESTS
// =============================================================================
