//! Atomic multi-document transactions.

use serde::{Deserialize, Serialize};

use crate::document::{Document, QueryParams};
use crate::patch::Patch;

/// Selects the documents a delete removes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeleteTarget {
    Id(String),
    Query {
        query: String,
        #[serde(default)]
        params: QueryParams,
    },
}

/// One step of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionOp {
    Create(Document),
    CreateOrReplace(Document),
    CreateIfNotExists(Document),
    Delete(DeleteTarget),
    Patch(Patch),
}

impl TransactionOp {
    pub fn name(&self) -> &'static str {
        match self {
            TransactionOp::Create(_) => "create",
            TransactionOp::CreateOrReplace(_) => "createOrReplace",
            TransactionOp::CreateIfNotExists(_) => "createIfNotExists",
            TransactionOp::Delete(_) => "delete",
            TransactionOp::Patch(_) => "patch",
        }
    }
}

/// Ordered batch committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub ops: Vec<TransactionOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, doc: Document) -> Self {
        self.ops.push(TransactionOp::Create(doc));
        self
    }

    pub fn create_or_replace(mut self, doc: Document) -> Self {
        self.ops.push(TransactionOp::CreateOrReplace(doc));
        self
    }

    pub fn create_if_not_exists(mut self, doc: Document) -> Self {
        self.ops.push(TransactionOp::CreateIfNotExists(doc));
        self
    }

    pub fn delete(mut self, target: DeleteTarget) -> Self {
        self.ops.push(TransactionOp::Delete(target));
        self
    }

    pub fn patch(mut self, patch: Patch) -> Self {
        self.ops.push(TransactionOp::Patch(patch));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn op_names(&self) -> Vec<&'static str> {
        self.ops.iter().map(TransactionOp::name).collect()
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub transaction_id: String,
    /// Ids of every document touched, in commit order
    pub document_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_mutation_order() {
        let tx = Transaction::new()
            .delete(DeleteTarget::Id("a".to_string()))
            .create(Document::new("b", "post"))
            .patch(Patch::by_id("c"));

        assert_eq!(tx.len(), 3);
        assert_eq!(tx.op_names(), vec!["delete", "create", "patch"]);
    }

    #[test]
    fn create_serializes_as_document_body() {
        let tx = Transaction::new().create(Document::new("b", "post"));
        let value = serde_json::to_value(&tx.ops[0]).unwrap();
        assert_eq!(value, serde_json::json!({"create": {"_id": "b", "_type": "post"}}));
    }
}
