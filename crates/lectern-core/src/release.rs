//! Release Lifecycle Manager.
//!
//! A release moves `created → published | archived → deleted`, with an
//! optional detour through `scheduled`. Documents join a release as
//! versions addressed `versions.<release>.<base id>`. State transitions are
//! enforced by the repository; the only check made here is the document
//! limit at publish time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lectern_store::{
    Action, ActionDispatcher, ActionResult, ContentClient, DatasetRef, Document, QueryParams,
    ReleaseKind, ReleaseMetadata, ReleaseMetadataPatch, ReleaseRecord, StoreError,
    RELEASE_DOCUMENT_PREFIX,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::dispatch::dispatch_actions;
use crate::domain::{GatewayError, OneOrMany, RepositoryContext, Result};
use crate::identity::{
    draft_id, is_version_id, normalize_base_id, parse_version_id, release_version_prefix,
    version_id,
};
use crate::metrics::METRICS;
use crate::obs::{emit_operation_failed, emit_release_published};

/// Documents whose id starts with `$prefix`.
pub const PREFIX_QUERY: &str = "*[string::startsWith(_id, $prefix)]{_id, _type, title}";

/// Release records, which live under `_.releases.`.
pub const RELEASES_QUERY: &str = "*[string::startsWith(_id, $prefix)]";

/// Optional settings for a new release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub release_type: ReleaseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intended_publish_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDocument {
    pub version_id: String,
    pub document_id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDocuments {
    pub release_id: String,
    pub document_count: usize,
    pub documents: Vec<ReleaseDocument>,
}

/// A version created by [`ReleaseManager::add_documents_to_release`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedVersion {
    pub document_id: String,
    pub version_id: String,
    pub transaction_id: String,
}

#[derive(Clone)]
pub struct ReleaseManager {
    client: Arc<dyn ContentClient>,
    dispatcher: Arc<dyn ActionDispatcher>,
    target: DatasetRef,
    document_limit: usize,
}

impl ReleaseManager {
    pub fn new(
        client: Arc<dyn ContentClient>,
        dispatcher: Arc<dyn ActionDispatcher>,
        target: DatasetRef,
        document_limit: usize,
    ) -> Self {
        Self {
            client,
            dispatcher,
            target,
            document_limit,
        }
    }

    pub fn document_limit(&self) -> usize {
        self.document_limit
    }

    /// Create a release. A taken id surfaces as a repository conflict.
    #[instrument(skip(self, options))]
    pub async fn create_release(
        &self,
        release_id: &str,
        title: &str,
        options: ReleaseOptions,
    ) -> Result<ActionResult> {
        require_release_id(release_id)?;
        if title.trim().is_empty() {
            return Err(GatewayError::validation("a release needs a title"));
        }
        let metadata = ReleaseMetadata {
            title: title.to_string(),
            description: options.description,
            release_type: options.release_type,
            intended_publish_at: options.intended_publish_at,
        };
        self.dispatch(
            "create_release",
            "Failed to create release",
            vec![Action::ReleaseCreate {
                release_id: release_id.to_string(),
                metadata,
            }],
        )
        .await
    }

    /// Attach one or more documents to a release as versions.
    ///
    /// With `content` the body is used as given and nothing is read.
    /// Otherwise the published document is copied, falling back to the
    /// draft. Ids are handled one at a time and the first failure ends
    /// the call.
    #[instrument(skip(self, ids, content), fields(documents = ids.len()))]
    pub async fn add_documents_to_release(
        &self,
        release_id: &str,
        ids: OneOrMany<String>,
        content: Option<Map<String, Value>>,
    ) -> Result<Vec<AddedVersion>> {
        require_release_id(release_id)?;
        let ids = ids.into_vec();
        if ids.is_empty() {
            return Err(GatewayError::validation("at least one document id is required"));
        }
        if content.is_some() && ids.len() > 1 {
            return Err(GatewayError::validation(
                "explicit content can only be attached to a single document",
            ));
        }

        let mut added = Vec::with_capacity(ids.len());
        for id in &ids {
            let base_id = normalize_base_id(id).to_string();
            require_document_id(&base_id)?;
            let version = version_id(release_id, &base_id);

            let source = match &content {
                Some(body) => document_from_content(&base_id, body)?,
                None => self.resolve_source(&base_id).await?,
            };

            debug!(%base_id, %version, "creating version");
            let result = self
                .dispatch(
                    "add_document_to_release",
                    "Failed to add document to release",
                    vec![Action::VersionCreate {
                        published_id: base_id.clone(),
                        attributes: source.with_id(version.clone()),
                    }],
                )
                .await?;
            added.push(AddedVersion {
                document_id: base_id,
                version_id: version,
                transaction_id: result.transaction_id,
            });
        }
        Ok(added)
    }

    /// Discard the versions of `ids` held by a release, in one batch.
    #[instrument(skip(self, ids))]
    pub async fn remove_documents_from_release(
        &self,
        release_id: &str,
        ids: OneOrMany<String>,
    ) -> Result<ActionResult> {
        require_release_id(release_id)?;
        let actions: Vec<Action> = ids
            .into_vec()
            .iter()
            .map(|id| Action::VersionDiscard {
                version_id: version_id(release_id, normalize_base_id(id)),
            })
            .collect();
        if actions.is_empty() {
            return Err(GatewayError::validation("at least one document id is required"));
        }
        self.dispatch(
            "remove_documents_from_release",
            "Failed to remove documents from release",
            actions,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_release_documents(&self, release_id: &str) -> Result<ReleaseDocuments> {
        require_release_id(release_id)?;
        let prefix = release_version_prefix(release_id);
        let rows = self
            .fetch_rows(PREFIX_QUERY, &prefix, "Failed to list release documents")
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let doc = Document::from_value(row)?;
            let document_id = match parse_version_id(&doc.id) {
                Some((owner, base_id)) if owner == release_id => base_id,
                _ => continue,
            };
            documents.push(ReleaseDocument {
                document_id: document_id.to_string(),
                doc_type: doc.doc_type.clone(),
                title: doc.title().map(str::to_string),
                version_id: doc.id,
            });
        }
        Ok(ReleaseDocuments {
            release_id: release_id.to_string(),
            document_count: documents.len(),
            documents,
        })
    }

    /// Publish a release unless it carries more documents than the limit.
    #[instrument(skip(self))]
    pub async fn publish_release(&self, release_id: &str) -> Result<ActionResult> {
        let listing = self.list_release_documents(release_id).await?;
        if listing.document_count > self.document_limit {
            let err = GatewayError::LimitExceeded {
                release_id: release_id.to_string(),
                count: listing.document_count,
                limit: self.document_limit,
            };
            emit_operation_failed("publish_release", &err);
            return Err(err);
        }

        let result = self
            .dispatch(
                "publish_release",
                "Failed to publish release",
                vec![Action::ReleasePublish {
                    release_id: release_id.to_string(),
                }],
            )
            .await?;
        emit_release_published(release_id, listing.document_count);
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn schedule_release(
        &self,
        release_id: &str,
        publish_at: DateTime<Utc>,
    ) -> Result<ActionResult> {
        require_release_id(release_id)?;
        self.dispatch(
            "schedule_release",
            "Failed to schedule release",
            vec![Action::ReleaseSchedule {
                release_id: release_id.to_string(),
                publish_at,
            }],
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn unschedule_release(&self, release_id: &str) -> Result<ActionResult> {
        require_release_id(release_id)?;
        self.dispatch(
            "unschedule_release",
            "Failed to unschedule release",
            vec![Action::ReleaseUnschedule {
                release_id: release_id.to_string(),
            }],
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn archive_release(&self, release_id: &str) -> Result<ActionResult> {
        require_release_id(release_id)?;
        self.dispatch(
            "archive_release",
            "Failed to archive release",
            vec![Action::ReleaseArchive {
                release_id: release_id.to_string(),
            }],
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn unarchive_release(&self, release_id: &str) -> Result<ActionResult> {
        require_release_id(release_id)?;
        self.dispatch(
            "unarchive_release",
            "Failed to unarchive release",
            vec![Action::ReleaseUnarchive {
                release_id: release_id.to_string(),
            }],
        )
        .await
    }

    /// Delete a release. The repository rejects releases that are not
    /// archived; that rejection comes back as a repository error.
    #[instrument(skip(self))]
    pub async fn delete_release(&self, release_id: &str) -> Result<ActionResult> {
        require_release_id(release_id)?;
        self.dispatch(
            "delete_release",
            "Failed to delete release",
            vec![Action::ReleaseDelete {
                release_id: release_id.to_string(),
            }],
        )
        .await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_release(
        &self,
        release_id: &str,
        patch: ReleaseMetadataPatch,
    ) -> Result<ActionResult> {
        require_release_id(release_id)?;
        if patch.is_empty() {
            return Err(GatewayError::validation("release update carries no changes"));
        }
        self.dispatch(
            "update_release",
            "Failed to update release",
            vec![Action::ReleaseEdit {
                release_id: release_id.to_string(),
                patch,
            }],
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_releases(&self) -> Result<Vec<ReleaseRecord>> {
        let rows = self
            .fetch_rows(RELEASES_QUERY, RELEASE_DOCUMENT_PREFIX, "Failed to list releases")
            .await?;
        rows.iter()
            .map(|row| ReleaseRecord::from_value(row).context("Failed to list releases"))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn get_release(&self, release_id: &str) -> Result<ReleaseRecord> {
        require_release_id(release_id)?;
        METRICS.inc_document_reads();
        let doc = self
            .client
            .get_document(&ReleaseRecord::document_id(release_id))
            .await
            .context("Failed to get release")?
            .ok_or_else(|| GatewayError::NotFound {
                id: release_id.to_string(),
            })?;
        ReleaseRecord::from_value(&doc.to_value()).context("Failed to get release")
    }

    /// Published form first, then the draft.
    async fn resolve_source(&self, base_id: &str) -> Result<Document> {
        for id in [base_id.to_string(), draft_id(base_id)] {
            METRICS.inc_document_reads();
            let found = self
                .client
                .get_document(&id)
                .await
                .context("Failed to read document")?;
            if let Some(doc) = found {
                return Ok(doc);
            }
        }
        Err(GatewayError::NotFound {
            id: base_id.to_string(),
        })
    }

    /// Rows of a `$prefix` query; anything but an array is a repository fault.
    async fn fetch_rows(&self, query: &str, prefix: &str, context: &str) -> Result<Vec<Value>> {
        let mut params = QueryParams::new();
        params.insert("prefix".to_string(), json!(prefix));
        let value = self.client.fetch(query, &params).await.context(context)?;
        match value {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(StoreError::Serialization(format!(
                "expected an array of documents, got {other}"
            )))
            .context(context),
        }
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

/// Release ids are non-empty and dot-free so a version id splits into
/// exactly one `(releaseId, baseId)` pair.
fn require_release_id(release_id: &str) -> Result<()> {
    if release_id.trim().is_empty() {
        return Err(GatewayError::validation("release id must not be empty"));
    }
    if release_id.contains('.') {
        return Err(GatewayError::validation(format!(
            "release id {release_id:?} must not contain '.'"
        )));
    }
    Ok(())
}

fn require_document_id(base_id: &str) -> Result<()> {
    if base_id.trim().is_empty() {
        return Err(GatewayError::validation("document id must not be empty"));
    }
    if is_version_id(base_id) {
        return Err(GatewayError::validation(format!(
            "{base_id} is already a release version"
        )));
    }
    Ok(())
}

/// Turn caller-supplied content into a document. `_type` is required.
fn document_from_content(base_id: &str, content: &Map<String, Value>) -> Result<Document> {
    if !content.get("_type").is_some_and(Value::is_string) {
        return Err(GatewayError::validation(format!(
            "content for {base_id} must carry a _type"
        )));
    }
    let mut body = content.clone();
    body.insert("_id".to_string(), json!(base_id));
    body.remove("_rev");
    Ok(Document::from_value(Value::Object(body))?)
}
