//! Storage error types.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested document was not found.
    #[error("Document not found: {collection}/{id}")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// Id of the missing document.
        id: String,
    },

    /// `if_match` on a single-document update did not match.
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// The version the caller based its write on.
        expected: u64,
        /// The version currently stored.
        actual: u64,
    },

    /// Attempted to create a document whose id is taken.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists {
        /// Collection of the existing document.
        collection: String,
        /// Id of the existing document.
        id: String,
    },

    /// A batch condition did not hold; nothing was written.
    #[error("Precondition failed on {collection}/{id}: {reason}")]
    PreconditionFailed {
        /// Collection of the document whose condition failed.
        collection: String,
        /// Id of the document whose condition failed.
        id: String,
        /// Which condition failed.
        reason: String,
    },

    /// The document is not storable (not an object, missing id, ...).
    #[error("Invalid document: {message}")]
    InvalidDocument {
        /// Why the document was rejected.
        message: String,
    },

    /// The backend gave up after repeatedly losing commit races.
    #[error("Storage contention: {message}")]
    Contention {
        /// Details about the contended commit.
        message: String,
    },

    /// The backend cannot be reached.
    #[error("Storage unavailable: {message}")]
    Unavailable {
        /// Details about the connectivity failure.
        message: String,
    },

    /// A stored document could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(collection: impl ToString, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.into(),
        }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(expected: u64, actual: u64) -> Self {
        Self::VersionConflict { expected, actual }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(collection: impl ToString, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            collection: collection.to_string(),
            id: id.into(),
        }
    }

    /// Creates a new `PreconditionFailed` error.
    #[must_use]
    pub fn precondition_failed(
        collection: impl ToString,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PreconditionFailed {
            collection: collection.to_string(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidDocument` error.
    #[must_use]
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates a new `Contention` error.
    #[must_use]
    pub fn contention(message: impl Into<String>) -> Self {
        Self::Contention {
            message: message.into(),
        }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a condition or version check rejected the write.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::VersionConflict { .. } | Self::PreconditionFailed { .. } | Self::AlreadyExists { .. }
        )
    }

    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Unavailable { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. }
            | Self::AlreadyExists { .. }
            | Self::PreconditionFailed { .. } => ErrorCategory::Conflict,
            Self::InvalidDocument { .. } | Self::Serialization(_) => ErrorCategory::Validation,
            Self::Contention { .. } | Self::Unavailable { .. } => ErrorCategory::Transient,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Document not found.
    NotFound,
    /// Conflict (version, existence or condition).
    Conflict,
    /// Malformed document.
    Validation,
    /// Retryable infrastructure failure.
    Transient,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transient => write!(f, "transient"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("beds", "b1");
        assert_eq!(err.to_string(), "Document not found: beds/b1");

        let err = StorageError::version_conflict(3, 4);
        assert_eq!(err.to_string(), "Version conflict: expected 3, found 4");

        let err = StorageError::precondition_failed("beds", "b1", "/status != \"available\"");
        assert_eq!(
            err.to_string(),
            "Precondition failed on beds/b1: /status != \"available\""
        );
    }

    #[test]
    fn test_predicates() {
        assert!(StorageError::not_found("beds", "b1").is_not_found());
        assert!(StorageError::precondition_failed("beds", "b1", "x").is_conflict());
        assert!(StorageError::contention("retries exhausted").is_transient());
        assert!(StorageError::unavailable("down").is_transient());
        assert!(!StorageError::internal("bug").is_transient());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            StorageError::already_exists("users", "u1").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::unavailable("down").category().to_string(),
            "transient"
        );
        assert_eq!(
            StorageError::invalid_document("not an object").category(),
            ErrorCategory::Validation
        );
    }
}
