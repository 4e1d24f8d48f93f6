//! Identity derivation between base, draft and version document ids.
//!
//! A document at rest is addressed by its base id. Its draft lives at
//! `drafts.<baseId>` and a release-scoped version at
//! `versions.<releaseId>.<baseId>`. Release ids are refused when they
//! contain a dot, so a version id splits uniquely into `(releaseId, baseId)`.

pub use lectern_store::{DRAFTS_PREFIX, VERSIONS_PREFIX};

/// Strip a leading `drafts.` prefix; other ids are returned unchanged.
pub fn normalize_base_id(id: &str) -> &str {
    id.strip_prefix(DRAFTS_PREFIX).unwrap_or(id)
}

pub fn draft_id(base_id: &str) -> String {
    format!("{DRAFTS_PREFIX}{base_id}")
}

pub fn version_id(release_id: &str, base_id: &str) -> String {
    format!("{VERSIONS_PREFIX}{release_id}.{base_id}")
}

/// Prefix shared by every version document of a release.
pub fn release_version_prefix(release_id: &str) -> String {
    format!("{VERSIONS_PREFIX}{release_id}.")
}

pub fn is_version_id(id: &str) -> bool {
    id.starts_with(VERSIONS_PREFIX)
}

/// Split a version id into `(releaseId, baseId)`.
pub fn parse_version_id(version_id: &str) -> Option<(&str, &str)> {
    let rest = version_id.strip_prefix(VERSIONS_PREFIX)?;
    let (release_id, base_id) = rest.split_once('.')?;
    if release_id.is_empty() || base_id.is_empty() {
        return None;
    }
    Some((release_id, base_id))
}
