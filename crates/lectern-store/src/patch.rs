//! Patch builder for partial document updates.
//!
//! A `Patch` is an ordered list of `PatchOp`s against one target. The
//! repository applies the operations in exactly the order they were
//! pushed, so later operations observe the effect of earlier ones.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::QueryParams;

/// Where `insert` places its items relative to the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    Before,
    After,
    Replace,
}

/// A single patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatchOp {
    /// Optimistic-concurrency guard; must precede every other operation
    IfRevisionId(String),
    Set(Map<String, Value>),
    SetIfMissing(Map<String, Value>),
    Unset(Vec<String>),
    Inc(Map<String, Value>),
    Dec(Map<String, Value>),
    Insert {
        position: InsertPosition,
        at: String,
        items: Vec<Value>,
    },
    DiffMatchPatch(Map<String, Value>),
}

impl PatchOp {
    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::IfRevisionId(_) => "ifRevisionId",
            PatchOp::Set(_) => "set",
            PatchOp::SetIfMissing(_) => "setIfMissing",
            PatchOp::Unset(_) => "unset",
            PatchOp::Inc(_) => "inc",
            PatchOp::Dec(_) => "dec",
            PatchOp::Insert { .. } => "insert",
            PatchOp::DiffMatchPatch(_) => "diffMatchPatch",
        }
    }
}

/// Documents a patch applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatchTarget {
    Id(String),
    Query {
        query: String,
        #[serde(default)]
        params: QueryParams,
    },
}

/// Ordered patch against a single target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub target: PatchTarget,
    pub ops: Vec<PatchOp>,
}

impl Patch {
    /// Patch a single document by id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            target: PatchTarget::Id(id.into()),
            ops: Vec::new(),
        }
    }

    /// Patch every document matched by `query`.
    pub fn by_query(query: impl Into<String>, params: QueryParams) -> Self {
        Self {
            target: PatchTarget::Query {
                query: query.into(),
                params,
            },
            ops: Vec::new(),
        }
    }

    pub fn if_revision_id(mut self, rev: impl Into<String>) -> Self {
        self.ops.push(PatchOp::IfRevisionId(rev.into()));
        self
    }

    pub fn set(mut self, attrs: Map<String, Value>) -> Self {
        self.ops.push(PatchOp::Set(attrs));
        self
    }

    pub fn set_if_missing(mut self, attrs: Map<String, Value>) -> Self {
        self.ops.push(PatchOp::SetIfMissing(attrs));
        self
    }

    pub fn unset(mut self, paths: Vec<String>) -> Self {
        self.ops.push(PatchOp::Unset(paths));
        self
    }

    pub fn inc(mut self, attrs: Map<String, Value>) -> Self {
        self.ops.push(PatchOp::Inc(attrs));
        self
    }

    pub fn dec(mut self, attrs: Map<String, Value>) -> Self {
        self.ops.push(PatchOp::Dec(attrs));
        self
    }

    pub fn insert(
        mut self,
        position: InsertPosition,
        at: impl Into<String>,
        items: Vec<Value>,
    ) -> Self {
        self.ops.push(PatchOp::Insert {
            position,
            at: at.into(),
            items,
        });
        self
    }

    pub fn diff_match_patch(mut self, patches: Map<String, Value>) -> Self {
        self.ops.push(PatchOp::DiffMatchPatch(patches));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operation names in application order.
    pub fn op_names(&self) -> Vec<&'static str> {
        self.ops.iter().map(PatchOp::name).collect()
    }

    /// Id of the target document, when patching by id.
    pub fn target_id(&self) -> Option<&str> {
        match &self.target {
            PatchTarget::Id(id) => Some(id),
            PatchTarget::Query { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn builder_preserves_push_order() {
        let patch = Patch::by_id("post-1")
            .inc(attrs(json!({"views": 1})))
            .set(attrs(json!({"title": "x"})))
            .unset(vec!["draft".to_string()]);

        assert_eq!(patch.op_names(), vec!["inc", "set", "unset"]);
        assert_eq!(patch.target_id(), Some("post-1"));
    }

    #[test]
    fn insert_serializes_with_position_and_selector() {
        let patch = Patch::by_id("p").insert(InsertPosition::After, "body[-1]", vec![json!(1)]);
        let value = serde_json::to_value(&patch.ops[0]).unwrap();
        assert_eq!(
            value,
            json!({"insert": {"position": "after", "at": "body[-1]", "items": [1]}})
        );
    }

    #[test]
    fn query_target_has_no_id() {
        let patch = Patch::by_query("*[_type == $t]", attrs(json!({"t": "post"})));
        assert!(patch.target_id().is_none());
        assert!(patch.is_empty());
    }
}
