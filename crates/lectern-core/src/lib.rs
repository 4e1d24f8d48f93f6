//! Lectern Core Library
//!
//! Content mutation, rich-text field editing and release lifecycle
//! operations over an external content repository.

pub mod config;
mod dispatch;
pub mod documents;
pub mod domain;
pub mod field_editor;
pub mod formatter;
pub mod gateway;
pub mod identity;
pub mod metrics;
pub mod mutation;
pub mod obs;
pub mod patch_sequencer;
pub mod release;
pub mod response;
pub mod subscription;
pub mod telemetry;

pub use config::{GatewayConfig, RELEASE_DOCUMENT_LIMIT};
pub use documents::DocumentService;
pub use domain::{GatewayError, OneOrMany, RepositoryContext, Result};
pub use field_editor::{
    FieldEditRequest, FieldEditResult, FieldEditor, FieldOperation, FieldValue, InsertAt,
};
pub use formatter::{ParagraphFormatter, TextFormatter};
pub use gateway::Gateway;
pub use identity::{draft_id, normalize_base_id, release_version_prefix, version_id};
pub use mutation::{build_transaction, Mutation, MutationService};
pub use patch_sequencer::{apply_patch_request, InsertRequest, PatchRequest};
pub use release::{
    AddedVersion, ReleaseDocument, ReleaseDocuments, ReleaseManager, ReleaseOptions,
};
pub use response::{ErrorBody, OperationResponse};
pub use subscription::{SubscriptionId, SubscriptionRegistry};
pub use telemetry::init_tracing;

pub use lectern_store::{
    Action, ActionDispatcher, ActionResult, ContentClient, DatasetRef, Document, StoreError,
    TransactionResult,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
