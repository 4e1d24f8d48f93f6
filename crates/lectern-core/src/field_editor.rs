//! Portable Field Editor.
//!
//! Applies a list of positional edits to one array field of one document.
//! Every positional operation reads the document fresh before computing its
//! selector; all resulting patch operations are then committed as a single
//! patch. Without `if_revision_id` another writer can change the field
//! between those reads and the commit.

use std::sync::Arc;

use lectern_store::{ContentClient, FieldPath, InsertPosition, Patch, PatchOp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::domain::{GatewayError, RepositoryContext, Result};
use crate::formatter::TextFormatter;
use crate::metrics::METRICS;
use crate::obs::{emit_field_edit_applied, emit_operation_failed};

/// Where an `insert` lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertAt {
    Beginning,
    End,
    AtIndex,
}

/// Value carried by an insert or replace.
///
/// Plain text goes through the [`TextFormatter`]; anything else is taken
/// as already structured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Structured(Value),
}

impl FieldValue {
    /// Array items to splice in. A lone object becomes a one-item list.
    fn to_items(&self, formatter: &dyn TextFormatter) -> Vec<Value> {
        match self {
            FieldValue::Text(text) => formatter.to_blocks(text),
            FieldValue::Structured(Value::Array(items)) => items.clone(),
            FieldValue::Structured(other) => vec![other.clone()],
        }
    }

    /// Whole-field value.
    fn to_field(&self, formatter: &dyn TextFormatter) -> Value {
        match self {
            FieldValue::Text(text) => Value::Array(formatter.to_blocks(text)),
            FieldValue::Structured(value) => value.clone(),
        }
    }
}

/// One edit. Unknown `op` tags fail to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FieldOperation {
    Insert {
        position: InsertAt,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        value: FieldValue,
    },
    /// Without `index` the whole field is replaced.
    Replace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        value: FieldValue,
    },
    Remove { index: usize },
}

impl FieldOperation {
    pub fn name(&self) -> &'static str {
        match self {
            FieldOperation::Insert { .. } => "insert",
            FieldOperation::Replace { index: None, .. } => "replaceField",
            FieldOperation::Replace { .. } => "replace",
            FieldOperation::Remove { .. } => "remove",
        }
    }

    fn needs_read(&self) -> bool {
        !matches!(self, FieldOperation::Replace { index: None, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEditRequest {
    pub document_id: String,
    pub field: String,
    pub operations: Vec<FieldOperation>,
    /// Guards the committed patch against concurrent writers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_revision_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEditResult {
    pub document_id: String,
    pub field: String,
    pub operations_applied: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// Length of the field once the operations accumulated so far are applied.
///
/// Reads do not see uncommitted operations, so the read length is adjusted
/// by what this call has already queued.
#[derive(Debug, Default)]
struct PendingLength {
    replaced: Option<usize>,
    delta: i64,
    ensured: bool,
}

/// What a fresh read found at the field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldShape {
    Missing,
    Null,
    Array(usize),
}

impl FieldShape {
    fn len(self) -> usize {
        match self {
            FieldShape::Array(len) => len,
            FieldShape::Missing | FieldShape::Null => 0,
        }
    }
}

impl PendingLength {
    fn effective(&self, read_len: usize) -> usize {
        let base = self.replaced.unwrap_or(read_len) as i64;
        (base + self.delta).max(0) as usize
    }
}

#[derive(Clone)]
pub struct FieldEditor {
    client: Arc<dyn ContentClient>,
    formatter: Arc<dyn TextFormatter>,
}

impl FieldEditor {
    pub fn new(client: Arc<dyn ContentClient>, formatter: Arc<dyn TextFormatter>) -> Self {
        Self { client, formatter }
    }

    #[instrument(skip_all, fields(document_id = %request.document_id, field = %request.field))]
    pub async fn edit_field(&self, request: FieldEditRequest) -> Result<FieldEditResult> {
        if request.document_id.is_empty() || request.field.is_empty() {
            return Err(GatewayError::validation(
                "field edits require a document id and a field path",
            ));
        }
        if request.operations.is_empty() {
            return Err(GatewayError::validation(
                "at least one field operation is required",
            ));
        }
        let path = FieldPath::parse(&request.field).map_err(|e| {
            GatewayError::validation(format!("invalid field path {}: {e}", request.field))
        })?;

        let mut ops = Vec::new();
        let mut pending = PendingLength::default();
        for operation in &request.operations {
            let shape = if operation.needs_read() {
                Some(self.read_shape(&request.document_id, &path).await?)
            } else {
                None
            };
            debug!(op = operation.name(), shape = ?shape, "planning field operation");
            self.plan(&request.field, operation, shape, &mut pending, &mut ops)?;
        }

        let mut patch = Patch::by_id(&request.document_id);
        if let Some(rev) = &request.if_revision_id {
            patch = patch.if_revision_id(rev);
        }
        patch.ops.extend(ops);

        let committed = match self.client.commit_patch(patch).await {
            Ok(doc) => doc,
            Err(err) => {
                emit_operation_failed("edit_field", &err);
                return Err(err).context("Failed to edit field");
            }
        };

        emit_field_edit_applied(
            &request.document_id,
            &request.field,
            request.operations.len(),
        );
        Ok(FieldEditResult {
            document_id: request.document_id,
            field: request.field,
            operations_applied: request.operations.len(),
            revision: committed.rev,
        })
    }

    /// Fresh read of the field.
    async fn read_shape(&self, document_id: &str, path: &FieldPath) -> Result<FieldShape> {
        METRICS.inc_document_reads();
        let doc = self
            .client
            .get_document(document_id)
            .await
            .context("Failed to read document")?
            .ok_or_else(|| GatewayError::NotFound {
                id: document_id.to_string(),
            })?;

        match path.get(&doc.to_value()) {
            None => Ok(FieldShape::Missing),
            Some(Value::Null) => Ok(FieldShape::Null),
            Some(Value::Array(items)) => Ok(FieldShape::Array(items.len())),
            Some(_) => Err(GatewayError::validation(format!(
                "{path} on {document_id} is not an array"
            ))),
        }
    }

    fn plan(
        &self,
        field: &str,
        operation: &FieldOperation,
        shape: Option<FieldShape>,
        pending: &mut PendingLength,
        ops: &mut Vec<PatchOp>,
    ) -> Result<()> {
        // setIfMissing leaves an explicit null in place, so null is overwritten
        if let Some(shape @ (FieldShape::Missing | FieldShape::Null)) = shape {
            if pending.replaced.is_none() && !pending.ensured {
                let mut attrs = Map::new();
                attrs.insert(field.to_string(), Value::Array(Vec::new()));
                ops.push(match shape {
                    FieldShape::Null => PatchOp::Set(attrs),
                    _ => PatchOp::SetIfMissing(attrs),
                });
                pending.ensured = true;
            }
        }
        let len = pending.effective(shape.map_or(0, FieldShape::len));

        match operation {
            FieldOperation::Insert {
                position,
                index,
                value,
            } => {
                let items = value.to_items(self.formatter.as_ref());
                let (position, at) = match position {
                    InsertAt::Beginning => (InsertPosition::Before, FieldPath::element(field, 0)),
                    InsertAt::End => (InsertPosition::After, FieldPath::element(field, -1)),
                    InsertAt::AtIndex => {
                        let i = index.ok_or_else(|| {
                            GatewayError::validation("insert atIndex requires an index")
                        })?;
                        if i >= len {
                            (InsertPosition::After, FieldPath::element(field, -1))
                        } else {
                            (InsertPosition::Before, FieldPath::element(field, i as i64))
                        }
                    }
                };
                pending.delta += items.len() as i64;
                ops.push(PatchOp::Insert {
                    position,
                    at,
                    items,
                });
            }
            FieldOperation::Replace { index: None, value } => {
                let value = value.to_field(self.formatter.as_ref());
                pending.replaced = Some(value.as_array().map_or(0, Vec::len));
                pending.delta = 0;
                let mut attrs = Map::new();
                attrs.insert(field.to_string(), value);
                ops.push(PatchOp::Set(attrs));
            }
            FieldOperation::Replace {
                index: Some(i),
                value,
            } => {
                check_bounds(field, *i, len)?;
                let items = value.to_items(self.formatter.as_ref());
                pending.delta += items.len() as i64 - 1;
                ops.push(PatchOp::Insert {
                    position: InsertPosition::Replace,
                    at: FieldPath::element(field, *i as i64),
                    items,
                });
            }
            FieldOperation::Remove { index } => {
                check_bounds(field, *index, len)?;
                pending.delta -= 1;
                ops.push(PatchOp::Unset(vec![FieldPath::element(
                    field,
                    *index as i64,
                )]));
            }
        }
        Ok(())
    }
}

fn check_bounds(field: &str, index: usize, len: usize) -> Result<()> {
    if index < len {
        return Ok(());
    }
    Err(GatewayError::validation(format!(
        "index {index} is out of range for {field} (length {len})"
    )))
}
