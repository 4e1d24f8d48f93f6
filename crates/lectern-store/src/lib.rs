//! Lectern-Store: content repository model for the Lectern gateway
//!
//! This crate describes what the gateway sends to and receives from the
//! content repository, and the collaborator traits through which it does
//! so. It performs no I/O of its own.
//!
//! ## Layer 0 - Repository model
//!
//! Focus: wire shapes, ordering guarantees, and the collaborator seams.
//!
//! ## Key Components
//!
//! - `Document`: a stored document (`_id`, `_type`, `_rev`, fields)
//! - `Patch` / `Transaction`: ordered partial updates and atomic batches
//! - `Action`: lifecycle instructions (publish, releases, versions)
//! - `ContentClient` / `ActionDispatcher`: the repository collaborator
//! - `fakes::MemoryContentLake`: in-memory implementation for tests

pub mod action;
pub mod client_traits;
mod document;
mod error;
pub mod fakes;
pub mod patch;
pub mod path;
pub mod release;
pub mod transaction;

pub use action::{Action, ActionResult, DatasetRef};
pub use client_traits::{ActionDispatcher, ChangeEvent, ContentClient, Listener, Transition};
pub use document::{Document, QueryParams};
pub use error::{StoreError, StoreResult};
pub use patch::{InsertPosition, Patch, PatchOp, PatchTarget};
pub use path::FieldPath;
pub use release::{
    ReleaseKind, ReleaseMetadata, ReleaseMetadataPatch, ReleaseRecord, ReleaseState,
    RELEASE_DOCUMENT_PREFIX, RELEASE_DOCUMENT_TYPE,
};
pub use transaction::{DeleteTarget, Transaction, TransactionOp, TransactionResult};

/// Id prefix of draft documents.
pub const DRAFTS_PREFIX: &str = "drafts.";

/// Id prefix of release-scoped version documents (`versions.<release>.<id>`).
pub const VERSIONS_PREFIX: &str = "versions.";
