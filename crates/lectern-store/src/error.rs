//! Error types for lectern-store

use thiserror::Error;

/// Errors surfaced by a content repository collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Document (or release) does not exist
    #[error("document not found: {id}")]
    NotFound { id: String },

    /// Write collided with an existing document or release
    #[error("conflict on {id}: {detail}")]
    Conflict { id: String, detail: String },

    /// `ifRevisionId` guard did not match the stored revision
    #[error("revision mismatch on {id}: expected {expected}, found {actual}")]
    RevisionMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// Repository refused the request (precondition, unsupported op, ...)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Network / transport failure reported by the client
    #[error("transport failure: {0}")]
    Transport(String),

    /// Payload could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for repository operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_mismatch_names_both_revisions() {
        let err = StoreError::RevisionMismatch {
            id: "post-1".to_string(),
            expected: "rev-a".to_string(),
            actual: "rev-b".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("post-1"));
        assert!(msg.contains("rev-a"));
        assert!(msg.contains("rev-b"));
    }

    #[test]
    fn serde_errors_convert_to_serialization() {
        let err: StoreError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
