//! Structured observability hooks for gateway operations.
//!
//! This module provides:
//! - Operation-scoped tracing spans via `OperationSpan` RAII guard (sync code)
//!   and `operation_span` for instrumenting futures
//! - Emission functions for key events: transaction commit, action dispatch,
//!   field edits, release publication, operation failure
//!
//! Events are emitted at `info!` level; failures at `warn!`.

use tracing::info;

/// RAII guard that enters an operation-scoped span for its lifetime.
///
/// Do not hold across `.await`; use [`operation_span`] with
/// `tracing::Instrument` for async code.
///
/// # Example
///
/// ```ignore
/// let _span = OperationSpan::enter("plan_mutations", "mutations.json");
/// ```
pub struct OperationSpan {
    _span: tracing::span::EnteredSpan,
}

impl OperationSpan {
    pub fn enter(operation: &str, target: &str) -> Self {
        Self {
            _span: operation_span(operation, target).entered(),
        }
    }
}

/// Span tagged with the operation name and its target (document, release, ...).
pub fn operation_span(operation: &str, target: &str) -> tracing::Span {
    tracing::info_span!("lectern.op", operation = %operation, target = %target)
}

/// Emit event: a transaction was committed.
pub fn emit_transaction_committed(transaction_id: &str, operations: usize, documents: usize) {
    info!(
        event = "transaction.committed",
        transaction_id = %transaction_id,
        operations = operations,
        documents = documents,
    );
}

/// Emit event: an action batch was accepted by the dispatcher.
pub fn emit_actions_dispatched(transaction_id: &str, action_types: &[&str]) {
    info!(
        event = "actions.dispatched",
        transaction_id = %transaction_id,
        actions = ?action_types,
    );
}

/// Emit event: a field edit was committed.
pub fn emit_field_edit_applied(document_id: &str, field: &str, operations: usize) {
    info!(
        event = "field_edit.applied",
        document_id = %document_id,
        field = %field,
        operations = operations,
    );
}

/// Emit event: a release was published.
pub fn emit_release_published(release_id: &str, documents: usize) {
    info!(event = "release.published", release_id = %release_id, documents = documents);
}

/// Emit event: an operation failed (warning level).
pub fn emit_operation_failed(operation: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "operation.failed", operation = %operation, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_span_enter() {
        let _span = OperationSpan::enter("modify_documents", "post-1");
    }

    #[test]
    fn emitters_do_not_panic_without_subscriber() {
        emit_transaction_committed("tx-1", 3, 2);
        emit_actions_dispatched("tx-2", &["release.publish"]);
        emit_field_edit_applied("post-1", "body", 2);
        emit_release_published("rel-1", 50);
        emit_operation_failed("publish_release", &"boom");
    }
}
