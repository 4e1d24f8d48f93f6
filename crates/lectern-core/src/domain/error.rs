//! Gateway error taxonomy.

use lectern_store::StoreError;

/// Errors produced by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Caller input is empty or malformed; raised before any network call
    #[error("validation error: {0}")]
    Validation(String),

    /// Neither the published nor the draft form of a document exists
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("release {release_id} has {count} documents, limit is {limit}")]
    LimitExceeded {
        release_id: String,
        count: usize,
        limit: usize,
    },

    /// Collaborator failure, with the operation that was running
    #[error("{context}: {source}")]
    Repository {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }

    /// Short machine-readable kind, used in response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::LimitExceeded { .. } => "limit_exceeded",
            GatewayError::Repository { .. } => "repository",
            GatewayError::Config(_) => "config",
            GatewayError::Serialization(_) => "serialization",
        }
    }
}

/// Attach operation context to collaborator failures.
pub trait RepositoryContext<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> RepositoryContext<T> for std::result::Result<T, StoreError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| GatewayError::Repository {
            context: context.into(),
            source,
        })
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
