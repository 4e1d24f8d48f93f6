//! Release records as the repository stores them.
//!
//! Every release is persisted as a system document with id
//! `_.releases.<releaseId>` and type `system.release`, so releases are
//! listable through the same query path as ordinary documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::document::Document;
use crate::error::{StoreError, StoreResult};

/// Id prefix of the system documents that hold release records.
pub const RELEASE_DOCUMENT_PREFIX: &str = "_.releases.";

/// Document type of release records.
pub const RELEASE_DOCUMENT_TYPE: &str = "system.release";

/// How a release is meant to go out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    #[default]
    Asap,
    Scheduled,
}

/// Release lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseState {
    Created,
    Scheduled,
    Published,
    Archived,
    Deleted,
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReleaseState::Created => "created",
            ReleaseState::Scheduled => "scheduled",
            ReleaseState::Published => "published",
            ReleaseState::Archived => "archived",
            ReleaseState::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// User-facing release metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub release_type: ReleaseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intended_publish_at: Option<DateTime<Utc>>,
}

impl ReleaseMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            release_type: ReleaseKind::Asap,
            intended_publish_at: None,
        }
    }
}

/// Partial metadata update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<ReleaseKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intended_publish_at: Option<DateTime<Utc>>,
}

impl ReleaseMetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.release_type.is_none()
            && self.intended_publish_at.is_none()
    }

    pub fn apply_to(&self, metadata: &mut ReleaseMetadata) {
        if let Some(title) = &self.title {
            metadata.title = title.clone();
        }
        if let Some(description) = &self.description {
            metadata.description = Some(description.clone());
        }
        if let Some(kind) = self.release_type {
            metadata.release_type = kind;
        }
        if let Some(at) = self.intended_publish_at {
            metadata.intended_publish_at = Some(at);
        }
    }
}

/// A release as read back from the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    pub release_id: String,
    pub metadata: ReleaseMetadata,
    pub state: ReleaseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReleaseRecord {
    pub fn document_id(release_id: &str) -> String {
        format!("{}{}", RELEASE_DOCUMENT_PREFIX, release_id)
    }

    /// Encode as the system document that backs this release.
    pub fn to_document(&self) -> StoreResult<Document> {
        let mut doc = Document::new(Self::document_id(&self.release_id), RELEASE_DOCUMENT_TYPE);
        doc.fields
            .insert("name".to_string(), json!(self.release_id));
        doc.fields
            .insert("metadata".to_string(), serde_json::to_value(&self.metadata)?);
        doc.fields
            .insert("state".to_string(), serde_json::to_value(self.state)?);
        doc.fields
            .insert("createdAt".to_string(), serde_json::to_value(self.created_at)?);
        if let Some(at) = self.publish_at {
            doc.fields
                .insert("publishAt".to_string(), serde_json::to_value(at)?);
        }
        Ok(doc)
    }

    /// Decode a `system.release` document (or its JSON projection).
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        let field = |name: &str| {
            value
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::Serialization(format!("release is missing {name}")))
        };
        Ok(Self {
            release_id: serde_json::from_value(field("name")?)?,
            metadata: serde_json::from_value(field("metadata")?)?,
            state: serde_json::from_value(field("state")?)?,
            publish_at: value
                .get("publishAt")
                .map(|v| serde_json::from_value(v.clone()))
                .transpose()?,
            created_at: serde_json::from_value(field("createdAt")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_survives_document_encoding() {
        let record = ReleaseRecord {
            release_id: "rel-1".to_string(),
            metadata: ReleaseMetadata::titled("Spring Launch"),
            state: ReleaseState::Created,
            publish_at: None,
            created_at: Utc::now(),
        };
        let doc = record.to_document().unwrap();
        assert_eq!(doc.id, "_.releases.rel-1");
        assert_eq!(doc.doc_type, RELEASE_DOCUMENT_TYPE);

        let decoded = ReleaseRecord::from_value(&doc.to_value()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn metadata_patch_only_touches_present_fields() {
        let mut metadata = ReleaseMetadata::titled("Old");
        metadata.description = Some("keep".to_string());
        let patch = ReleaseMetadataPatch {
            title: Some("New".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut metadata);
        assert_eq!(metadata.title, "New");
        assert_eq!(metadata.description.as_deref(), Some("keep"));
        assert!(!patch.is_empty());
        assert!(ReleaseMetadataPatch::default().is_empty());
    }
}
