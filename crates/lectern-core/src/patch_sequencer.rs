//! Deterministic ordering of partial-update operations.
//!
//! A [`PatchRequest`] is an unordered bag of optional sub-operations.
//! [`apply_patch_request`] pushes them onto a [`Patch`] in the canonical
//! order `set → setIfMissing → unset → inc → dec → insert → diffMatchPatch`,
//! whatever order the caller wrote them in, so that e.g. an `inc` sees the
//! value written by a `set` in the same patch. The `ifRevisionID` guard,
//! when present, is pushed before everything else.

use lectern_store::{InsertPosition, Patch, PatchOp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::OneOrMany;

/// Array insertion relative to a selector such as `body[-1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRequest {
    pub items: OneOrMany<Value>,
    pub position: InsertPosition,
    pub at: String,
}

/// Bag of optional patch sub-operations, as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_if_missing: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unset: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inc: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<InsertRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_match_patch: Option<Map<String, Value>>,
    #[serde(
        rename = "ifRevisionID",
        alias = "ifRevisionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub if_revision_id: Option<String>,
}

impl PatchRequest {
    /// `true` when no content operation is present (the guard alone does not count).
    pub fn is_empty(&self) -> bool {
        self.set.is_none()
            && self.set_if_missing.is_none()
            && self.unset.is_none()
            && self.inc.is_none()
            && self.dec.is_none()
            && self.insert.is_none()
            && self.diff_match_patch.is_none()
    }
}

/// Content operations of `req` in canonical order, filtered to those present.
pub fn sequence(req: &PatchRequest) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    if let Some(set) = &req.set {
        ops.push(PatchOp::Set(set.clone()));
    }
    if let Some(attrs) = &req.set_if_missing {
        ops.push(PatchOp::SetIfMissing(attrs.clone()));
    }
    if let Some(unset) = &req.unset {
        ops.push(PatchOp::Unset(unset.clone().into_vec()));
    }
    if let Some(inc) = &req.inc {
        ops.push(PatchOp::Inc(inc.clone()));
    }
    if let Some(dec) = &req.dec {
        ops.push(PatchOp::Dec(dec.clone()));
    }
    if let Some(insert) = &req.insert {
        ops.push(PatchOp::Insert {
            position: insert.position,
            at: insert.at.clone(),
            items: insert.items.clone().into_vec(),
        });
    }
    if let Some(dmp) = &req.diff_match_patch {
        ops.push(PatchOp::DiffMatchPatch(dmp.clone()));
    }
    ops
}

/// Push the guard and then every operation of `req` onto `patch`.
pub fn apply_patch_request(mut patch: Patch, req: &PatchRequest) -> Patch {
    if let Some(rev) = &req.if_revision_id {
        patch = patch.if_revision_id(rev.clone());
    }
    patch.ops.extend(sequence(req));
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn caller_key_order_does_not_matter() {
        let req: PatchRequest = serde_json::from_value(json!({
            "inc": {"views": 1},
            "unset": ["legacy"],
            "set": {"views": 10}
        }))
        .unwrap();

        let patch = apply_patch_request(Patch::by_id("post-1"), &req);
        assert_eq!(patch.op_names(), vec!["set", "unset", "inc"]);
    }

    #[test]
    fn full_request_follows_canonical_order() {
        let req: PatchRequest = serde_json::from_value(json!({
            "diffMatchPatch": {"body": "@@ -1 +1 @@"},
            "insert": {"items": {"_type": "block"}, "position": "after", "at": "body[-1]"},
            "dec": {"stock": 1},
            "inc": {"views": 1},
            "unset": "legacy",
            "setIfMissing": {"tags": []},
            "set": {"title": "x"}
        }))
        .unwrap();

        let names = apply_patch_request(Patch::by_id("p"), &req).op_names();
        assert_eq!(
            names,
            vec!["set", "setIfMissing", "unset", "inc", "dec", "insert", "diffMatchPatch"]
        );
    }

    #[test]
    fn revision_guard_precedes_operations() {
        let req: PatchRequest = serde_json::from_value(json!({
            "set": {"title": "x"},
            "ifRevisionID": "rev-7"
        }))
        .unwrap();

        let patch = apply_patch_request(Patch::by_id("p"), &req);
        assert_eq!(patch.ops[0], PatchOp::IfRevisionId("rev-7".to_string()));
        assert_eq!(patch.op_names(), vec!["ifRevisionId", "set"]);
    }

    #[test]
    fn single_unset_and_insert_item_are_wrapped() {
        let req: PatchRequest = serde_json::from_value(json!({
            "unset": "legacy",
            "insert": {"items": "tag", "position": "before", "at": "tags[0]"}
        }))
        .unwrap();

        let ops = sequence(&req);
        assert_eq!(ops[0], PatchOp::Unset(vec!["legacy".to_string()]));
        assert_eq!(
            ops[1],
            PatchOp::Insert {
                position: InsertPosition::Before,
                at: "tags[0]".to_string(),
                items: vec![json!("tag")],
            }
        );
    }

    #[test]
    fn guard_alone_is_empty() {
        let req = PatchRequest {
            if_revision_id: Some("r".to_string()),
            ..Default::default()
        };
        assert!(req.is_empty());
        assert!(sequence(&req).is_empty());
    }
}
