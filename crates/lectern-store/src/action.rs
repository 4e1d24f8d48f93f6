//! Lifecycle actions sent to the action dispatcher.
//!
//! Actions operate on identity and lifecycle (publish, release
//! bookkeeping); content changes go through `Transaction` instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::release::{ReleaseMetadata, ReleaseMetadataPatch};

/// Project/dataset pair an action batch is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub project_id: String,
    pub dataset: String,
}

impl DatasetRef {
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
        }
    }
}

impl std::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project_id, self.dataset)
    }
}

/// A single imperative lifecycle instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionType")]
pub enum Action {
    #[serde(rename = "document.publish", rename_all = "camelCase")]
    Publish { draft_id: String, published_id: String },

    #[serde(rename = "document.unpublish", rename_all = "camelCase")]
    Unpublish { draft_id: String, published_id: String },

    #[serde(rename = "document.discard", rename_all = "camelCase")]
    DiscardDraft { draft_id: String },

    #[serde(rename = "release.create", rename_all = "camelCase")]
    ReleaseCreate {
        release_id: String,
        metadata: ReleaseMetadata,
    },

    #[serde(rename = "release.edit", rename_all = "camelCase")]
    ReleaseEdit {
        release_id: String,
        patch: ReleaseMetadataPatch,
    },

    #[serde(rename = "document.version.create", rename_all = "camelCase")]
    VersionCreate {
        published_id: String,
        attributes: Document,
    },

    #[serde(rename = "document.version.discard", rename_all = "camelCase")]
    VersionDiscard { version_id: String },

    #[serde(rename = "release.publish", rename_all = "camelCase")]
    ReleasePublish { release_id: String },

    #[serde(rename = "release.schedule", rename_all = "camelCase")]
    ReleaseSchedule {
        release_id: String,
        publish_at: DateTime<Utc>,
    },

    #[serde(rename = "release.unschedule", rename_all = "camelCase")]
    ReleaseUnschedule { release_id: String },

    #[serde(rename = "release.archive", rename_all = "camelCase")]
    ReleaseArchive { release_id: String },

    #[serde(rename = "release.unarchive", rename_all = "camelCase")]
    ReleaseUnarchive { release_id: String },

    #[serde(rename = "release.delete", rename_all = "camelCase")]
    ReleaseDelete { release_id: String },
}

impl Action {
    /// Wire `actionType` of this action.
    pub fn action_type(&self) -> &'static str {
        match self {
            Action::Publish { .. } => "document.publish",
            Action::Unpublish { .. } => "document.unpublish",
            Action::DiscardDraft { .. } => "document.discard",
            Action::ReleaseCreate { .. } => "release.create",
            Action::ReleaseEdit { .. } => "release.edit",
            Action::VersionCreate { .. } => "document.version.create",
            Action::VersionDiscard { .. } => "document.version.discard",
            Action::ReleasePublish { .. } => "release.publish",
            Action::ReleaseSchedule { .. } => "release.schedule",
            Action::ReleaseUnschedule { .. } => "release.unschedule",
            Action::ReleaseArchive { .. } => "release.archive",
            Action::ReleaseUnarchive { .. } => "release.unarchive",
            Action::ReleaseDelete { .. } => "release.delete",
        }
    }
}

/// Outcome of a dispatched action batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub transaction_id: String,
}
