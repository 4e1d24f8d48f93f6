//! Document lifecycle: publish, unpublish, discard drafts, create drafts.

use std::sync::Arc;

use lectern_store::{Action, ActionDispatcher, ActionResult, ContentClient, DatasetRef, Document};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::dispatch::dispatch_actions;
use crate::domain::{GatewayError, OneOrMany, RepositoryContext, Result};
use crate::identity::{draft_id, normalize_base_id};
use crate::metrics::METRICS;
use crate::mutation::{Mutation, MutationService};

#[derive(Clone)]
pub struct DocumentService {
    client: Arc<dyn ContentClient>,
    dispatcher: Arc<dyn ActionDispatcher>,
    mutations: MutationService,
    target: DatasetRef,
}

impl DocumentService {
    pub fn new(
        client: Arc<dyn ContentClient>,
        dispatcher: Arc<dyn ActionDispatcher>,
        target: DatasetRef,
    ) -> Self {
        Self {
            mutations: MutationService::new(client.clone()),
            client,
            dispatcher,
            target,
        }
    }

    /// Publish the drafts of `ids` in one batch.
    #[instrument(skip_all, fields(documents = ids.len()))]
    pub async fn publish_documents(&self, ids: OneOrMany<String>) -> Result<ActionResult> {
        let actions = base_ids(ids)?
            .into_iter()
            .map(|base| Action::Publish {
                draft_id: draft_id(&base),
                published_id: base,
            })
            .collect();
        self.dispatch("publish_documents", "Failed to publish documents", actions)
            .await
    }

    /// Move published documents back to draft in one batch.
    #[instrument(skip_all, fields(documents = ids.len()))]
    pub async fn unpublish_documents(&self, ids: OneOrMany<String>) -> Result<ActionResult> {
        let actions = base_ids(ids)?
            .into_iter()
            .map(|base| Action::Unpublish {
                draft_id: draft_id(&base),
                published_id: base,
            })
            .collect();
        self.dispatch(
            "unpublish_documents",
            "Failed to unpublish documents",
            actions,
        )
        .await
    }

    #[instrument(skip_all, fields(documents = ids.len()))]
    pub async fn discard_drafts(&self, ids: OneOrMany<String>) -> Result<ActionResult> {
        let actions = base_ids(ids)?
            .into_iter()
            .map(|base| Action::DiscardDraft {
                draft_id: draft_id(&base),
            })
            .collect();
        self.dispatch("discard_drafts", "Failed to discard drafts", actions)
            .await
    }

    /// Create a draft with a fresh base id. Returns the stored draft id.
    #[instrument(skip(self, fields))]
    pub async fn create_draft(&self, doc_type: &str, fields: Map<String, Value>) -> Result<String> {
        if doc_type.trim().is_empty() {
            return Err(GatewayError::validation("a document type is required"));
        }
        let id = draft_id(&uuid::Uuid::new_v4().to_string());
        let mut doc = Document::new(&id, doc_type);
        doc.fields = fields;
        doc.fields.remove("_id");
        doc.fields.remove("_type");
        doc.fields.remove("_rev");

        self.mutations
            .modify_documents(vec![Mutation::Create(doc)])
            .await?;
        Ok(id)
    }

    /// Read a document by base id. With `prefer_draft` the draft wins when
    /// both forms exist.
    #[instrument(skip(self))]
    pub async fn get_document(&self, id: &str, prefer_draft: bool) -> Result<Document> {
        let base = normalize_base_id(id);
        if base.is_empty() {
            return Err(GatewayError::validation("id must not be empty"));
        }
        let order = if prefer_draft {
            [draft_id(base), base.to_string()]
        } else {
            [base.to_string(), draft_id(base)]
        };
        for candidate in order {
            METRICS.inc_document_reads();
            if let Some(doc) = self
                .client
                .get_document(&candidate)
                .await
                .context("Failed to read document")?
            {
                return Ok(doc);
            }
        }
        Err(GatewayError::NotFound {
            id: base.to_string(),
        })
    }

    async fn dispatch(
        &self,
        operation: &str,
        context: &str,
        actions: Vec<Action>,
    ) -> Result<ActionResult> {
        dispatch_actions(
            self.dispatcher.as_ref(),
            &self.target,
            operation,
            context,
            actions,
        )
        .await
    }
}

fn base_ids(ids: OneOrMany<String>) -> Result<Vec<String>> {
    let ids: Vec<String> = ids
        .into_vec()
        .iter()
        .map(|id| normalize_base_id(id).to_string())
        .collect();
    if ids.is_empty() || ids.iter().any(String::is_empty) {
        return Err(GatewayError::validation(
            "at least one non-empty document id is required",
        ));
    }
    Ok(ids)
}
