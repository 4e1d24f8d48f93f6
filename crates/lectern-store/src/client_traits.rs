//! Collaborator trait definitions for Lectern
//!
//! These traits define the two capabilities the gateway depends on:
//! - `ContentClient`: document reads, queries, patches, transactions, listeners
//! - `ActionDispatcher`: lifecycle actions (publish, releases, versions)
//!
//! Both traits are async and transport-agnostic. HTTP, authentication and
//! retries belong to the implementor. In-memory fakes are provided for
//! testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::action::{Action, ActionResult, DatasetRef};
use crate::document::{Document, QueryParams};
use crate::error::StoreResult;
use crate::patch::Patch;
use crate::transaction::{Transaction, TransactionResult};

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// How a document's membership in a listened query changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Appear,
    Update,
    Disappear,
}

/// A change notification delivered to a listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub document_id: String,
    pub transition: Transition,
    /// Document body after the change; absent on `Disappear`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Live change feed for one query.
///
/// Dropping the listener closes the feed; the repository side stops
/// delivering once it observes the closed channel.
#[derive(Debug)]
pub struct Listener {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Listener {
    /// Create a connected sender/listener pair.
    pub fn channel() -> (mpsc::UnboundedSender<ChangeEvent>, Listener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Listener { events: rx })
    }

    /// Next event, waiting until one arrives or the feed closes.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Drain whatever is already buffered without waiting.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ContentClient
// ---------------------------------------------------------------------------

/// Read/write access to repository content.
///
/// Guarantees expected from implementors:
/// - `commit_transaction` is all-or-nothing.
/// - Patch operations apply in the order they appear in `Patch::ops`.
/// - `get_document` returns `Ok(None)` for a missing id, never `NotFound`.
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Run a query and return its raw JSON result.
    async fn fetch(&self, query: &str, params: &QueryParams) -> StoreResult<Value>;

    /// Read a single document by exact id.
    async fn get_document(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Apply a standalone patch, returning the patched document.
    async fn commit_patch(&self, patch: Patch) -> StoreResult<Document>;

    /// Commit every operation in `tx` atomically.
    async fn commit_transaction(&self, tx: Transaction) -> StoreResult<TransactionResult>;

    /// Open a change feed for documents matching `query`.
    async fn listen(&self, query: &str, params: &QueryParams) -> StoreResult<Listener>;
}

// ---------------------------------------------------------------------------
// ActionDispatcher
// ---------------------------------------------------------------------------

/// Executes lifecycle actions against one dataset.
///
/// A batch is applied in order; the first failing action aborts the batch.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn perform_actions(
        &self,
        target: &DatasetRef,
        actions: Vec<Action>,
    ) -> StoreResult<ActionResult>;
}
