//! Mutation Transaction Builder.
//!
//! Callers describe content changes as a list of [`Mutation`]s. The list is
//! validated, turned into one [`Transaction`] whose operation order matches
//! the input order, and committed atomically through the [`ContentClient`].

use std::sync::Arc;

use lectern_store::{
    ContentClient, DeleteTarget, Document, Patch, QueryParams, Transaction, TransactionResult,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{GatewayError, RepositoryContext, Result};
use crate::metrics::METRICS;
use crate::obs::{emit_operation_failed, emit_transaction_committed};
use crate::patch_sequencer::{apply_patch_request, PatchRequest};

/// A content-level change applied within a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMutation", into = "WireMutation")]
pub enum Mutation {
    Create(Document),
    CreateOrReplace(Document),
    CreateIfNotExists(Document),
    DeleteById {
        id: String,
    },
    DeleteByQuery {
        query: String,
        params: QueryParams,
    },
    PatchById {
        id: String,
        patch: PatchRequest,
    },
    PatchByQuery {
        query: String,
        params: QueryParams,
        patch: PatchRequest,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Create(_) => "create",
            Mutation::CreateOrReplace(_) => "createOrReplace",
            Mutation::CreateIfNotExists(_) => "createIfNotExists",
            Mutation::DeleteById { .. } => "deleteById",
            Mutation::DeleteByQuery { .. } => "deleteByQuery",
            Mutation::PatchById { .. } => "patchById",
            Mutation::PatchByQuery { .. } => "patchByQuery",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Mutation::Create(doc)
            | Mutation::CreateOrReplace(doc)
            | Mutation::CreateIfNotExists(doc) => {
                if doc.id.is_empty() || doc.doc_type.is_empty() {
                    return Err(GatewayError::validation(format!(
                        "{} requires a non-empty _id and _type",
                        self.name()
                    )));
                }
            }
            Mutation::DeleteById { id } | Mutation::PatchById { id, .. } if id.is_empty() => {
                return Err(GatewayError::validation(format!(
                    "{} requires a non-empty id",
                    self.name()
                )));
            }
            Mutation::DeleteByQuery { query, .. } | Mutation::PatchByQuery { query, .. }
                if query.trim().is_empty() =>
            {
                return Err(GatewayError::validation(format!(
                    "{} requires a non-empty query",
                    self.name()
                )));
            }
            _ => {}
        }
        match self {
            Mutation::PatchById { patch, .. } | Mutation::PatchByQuery { patch, .. }
                if patch.is_empty() =>
            {
                Err(GatewayError::validation(format!(
                    "{} carries no patch operations",
                    self.name()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Build one ordered transaction from `mutations`.
///
/// Rejects an empty list and malformed mutations before anything is sent.
pub fn build_transaction(mutations: &[Mutation]) -> Result<Transaction> {
    if mutations.is_empty() {
        return Err(GatewayError::validation("at least one mutation is required"));
    }

    let mut tx = Transaction::new();
    for mutation in mutations {
        mutation.validate()?;
        tx = match mutation {
            Mutation::Create(doc) => tx.create(doc.clone()),
            Mutation::CreateOrReplace(doc) => tx.create_or_replace(doc.clone()),
            Mutation::CreateIfNotExists(doc) => tx.create_if_not_exists(doc.clone()),
            Mutation::DeleteById { id } => tx.delete(DeleteTarget::Id(id.clone())),
            Mutation::DeleteByQuery { query, params } => tx.delete(DeleteTarget::Query {
                query: query.clone(),
                params: params.clone(),
            }),
            Mutation::PatchById { id, patch } => {
                tx.patch(apply_patch_request(Patch::by_id(id.clone()), patch))
            }
            Mutation::PatchByQuery {
                query,
                params,
                patch,
            } => tx.patch(apply_patch_request(
                Patch::by_query(query.clone(), params.clone()),
                patch,
            )),
        };
    }
    Ok(tx)
}

/// Commits mutation batches against the repository.
#[derive(Clone)]
pub struct MutationService {
    client: Arc<dyn ContentClient>,
}

impl MutationService {
    pub fn new(client: Arc<dyn ContentClient>) -> Self {
        Self { client }
    }

    /// Apply `mutations` as one atomic transaction.
    #[instrument(skip_all, fields(mutations = mutations.len()))]
    pub async fn modify_documents(&self, mutations: Vec<Mutation>) -> Result<TransactionResult> {
        let tx = build_transaction(&mutations)?;
        let op_count = tx.len();

        let result = match self.client.commit_transaction(tx).await {
            Ok(result) => result,
            Err(err) => {
                emit_operation_failed("modify_documents", &err);
                return Err(err).context("Failed to modify documents");
            }
        };

        METRICS.inc_transactions_committed();
        emit_transaction_committed(&result.transaction_id, op_count, result.document_ids.len());
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// `{id}` or `{query, params}`, exactly one of the two.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(default, skip_serializing_if = "QueryParams::is_empty")]
    params: QueryParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WirePatch {
    #[serde(flatten)]
    selector: WireSelector,
    #[serde(flatten)]
    request: PatchRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum WireMutation {
    Create(Document),
    CreateOrReplace(Document),
    CreateIfNotExists(Document),
    Delete(WireSelector),
    Patch(WirePatch),
}

enum Selector {
    Id(String),
    Query(String, QueryParams),
}

impl WireSelector {
    fn resolve(self, kind: &str) -> Result<Selector> {
        match (self.id, self.query) {
            (Some(id), None) => Ok(Selector::Id(id)),
            (None, Some(query)) => Ok(Selector::Query(query, self.params)),
            _ => Err(GatewayError::validation(format!(
                "{kind} requires exactly one of id or query"
            ))),
        }
    }
}

impl TryFrom<WireMutation> for Mutation {
    type Error = GatewayError;

    fn try_from(wire: WireMutation) -> Result<Self> {
        Ok(match wire {
            WireMutation::Create(doc) => Mutation::Create(doc),
            WireMutation::CreateOrReplace(doc) => Mutation::CreateOrReplace(doc),
            WireMutation::CreateIfNotExists(doc) => Mutation::CreateIfNotExists(doc),
            WireMutation::Delete(selector) => match selector.resolve("delete")? {
                Selector::Id(id) => Mutation::DeleteById { id },
                Selector::Query(query, params) => Mutation::DeleteByQuery { query, params },
            },
            WireMutation::Patch(WirePatch { selector, request }) => {
                match selector.resolve("patch")? {
                    Selector::Id(id) => Mutation::PatchById { id, patch: request },
                    Selector::Query(query, params) => Mutation::PatchByQuery {
                        query,
                        params,
                        patch: request,
                    },
                }
            }
        })
    }
}

impl From<Mutation> for WireMutation {
    fn from(mutation: Mutation) -> Self {
        let by_id = |id| WireSelector {
            id: Some(id),
            ..Default::default()
        };
        let by_query = |query, params| WireSelector {
            id: None,
            query: Some(query),
            params,
        };
        match mutation {
            Mutation::Create(doc) => WireMutation::Create(doc),
            Mutation::CreateOrReplace(doc) => WireMutation::CreateOrReplace(doc),
            Mutation::CreateIfNotExists(doc) => WireMutation::CreateIfNotExists(doc),
            Mutation::DeleteById { id } => WireMutation::Delete(by_id(id)),
            Mutation::DeleteByQuery { query, params } => {
                WireMutation::Delete(by_query(query, params))
            }
            Mutation::PatchById { id, patch } => WireMutation::Patch(WirePatch {
                selector: by_id(id),
                request: patch,
            }),
            Mutation::PatchByQuery {
                query,
                params,
                patch,
            } => WireMutation::Patch(WirePatch {
                selector: by_query(query, params),
                request: patch,
            }),
        }
    }
}
