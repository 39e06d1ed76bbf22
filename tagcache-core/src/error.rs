//! Error types for cache operations

use thiserror::Error;

/// Input validation errors. Always raised before any storage I/O.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid cache entry identifier {identifier:?}: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("Invalid cache tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend {backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Corrupted record for {identifier:?}: {reason}")]
    Corrupted { identifier: String, reason: String },
}

impl StorageError {
    /// Shorthand for an unreachable or timed out backend.
    pub fn unavailable(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a record that failed to decode.
    pub fn corrupted(identifier: impl Into<String>, reason: impl ToString) -> Self {
        Self::Corrupted {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }
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

    #[error("Unable to read configuration from {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// The error kinds callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentifier,
    InvalidTag,
    Frozen,
    StorageUnavailable,
    SerializationFailure,
    Corrupted,
    Configuration,
}

/// Master error type for all cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache {namespace} is frozen and cannot be modified")]
    Frozen { namespace: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CacheError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(ValidationError::InvalidIdentifier { .. }) => {
                ErrorKind::InvalidIdentifier
            }
            Self::Validation(ValidationError::InvalidTag { .. }) => ErrorKind::InvalidTag,
            Self::Frozen { .. } => ErrorKind::Frozen,
            Self::Storage(StorageError::Unavailable { .. }) => ErrorKind::StorageUnavailable,
            Self::Storage(StorageError::Serialization { .. }) => ErrorKind::SerializationFailure,
            Self::Storage(StorageError::Corrupted { .. }) => ErrorKind::Corrupted,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Whether a caller may reasonably retry the call with backoff.
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StorageUnavailable
    }

    pub fn is_frozen(&self) -> bool {
        self.kind() == ErrorKind::Frozen
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidIdentifier {
            identifier: "a b".to_string(),
            reason: "contains a space".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid cache entry identifier"));
        assert!(msg.contains("contains a space"));
    }

    #[test]
    fn test_frozen_error_display() {
        let err = CacheError::Frozen {
            namespace: "compiled_metadata".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cache compiled_metadata is frozen and cannot be modified"
        );
    }

    #[test]
    fn test_kind_classification() {
        let cases = [
            (
                CacheError::from(ValidationError::InvalidTag {
                    tag: "".to_string(),
                    reason: "empty".to_string(),
                }),
                ErrorKind::InvalidTag,
            ),
            (
                CacheError::from(StorageError::unavailable("redis", "connection refused")),
                ErrorKind::StorageUnavailable,
            ),
            (
                CacheError::from(StorageError::Serialization {
                    reason: "bad marker".to_string(),
                }),
                ErrorKind::SerializationFailure,
            ),
            (
                CacheError::from(StorageError::corrupted("entry1", "short record")),
                ErrorKind::Corrupted,
            ),
            (
                CacheError::from(ConfigError::MissingRequired {
                    field: "dsn".to_string(),
                }),
                ErrorKind::Configuration,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "unexpected kind for {err}");
        }
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(CacheError::from(StorageError::unavailable("postgres", "timeout")).is_retryable());
        assert!(!CacheError::from(StorageError::corrupted("x", "bad")).is_retryable());
        assert!(!CacheError::Frozen {
            namespace: "ns".to_string()
        }
        .is_retryable());
    }
}
