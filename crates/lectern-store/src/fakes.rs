//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryContentLake`, which implements both `ContentClient` and
//! `ActionDispatcher` over a single in-process document map. Every call is
//! recorded so tests can assert on reads, fetches, transactions and action
//! batches, and writes can be made to fail on demand.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::action::{Action, ActionResult, DatasetRef};
use crate::client_traits::*;
use crate::document::{Document, QueryParams};
use crate::error::{StoreError, StoreResult};
use crate::patch::{InsertPosition, Patch, PatchOp, PatchTarget};
use crate::path::{position_by_key, resolve_index, FieldPath, Segment};
use crate::release::{ReleaseRecord, ReleaseState};
use crate::transaction::{DeleteTarget, Transaction, TransactionOp, TransactionResult};
use crate::VERSIONS_PREFIX;

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// Everything the fake has been asked to do, in call order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    /// Ids passed to `get_document`
    pub document_reads: Vec<String>,
    /// `(query, params)` passed to `fetch`
    pub fetches: Vec<(String, QueryParams)>,
    /// Patches passed to `commit_patch`
    pub patches: Vec<Patch>,
    /// Transactions passed to `commit_transaction`
    pub transactions: Vec<Transaction>,
    /// Batches passed to `perform_actions`
    pub action_batches: Vec<(DatasetRef, Vec<Action>)>,
}

impl CallLog {
    /// All dispatched actions, flattened across batches.
    pub fn actions(&self) -> Vec<Action> {
        self.action_batches
            .iter()
            .flat_map(|(_, batch)| batch.iter().cloned())
            .collect()
    }

    /// Number of dispatched actions with the given `actionType`.
    pub fn count_actions(&self, action_type: &str) -> usize {
        self.action_batches
            .iter()
            .flat_map(|(_, batch)| batch.iter())
            .filter(|a| a.action_type() == action_type)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Query filters
// ---------------------------------------------------------------------------

/// The subset of query semantics the fake understands, chosen by
/// parameter name: `$prefix` (id prefix), `$id` (exact id), `$type`.
#[derive(Debug, Clone)]
enum Filter {
    Prefix(String),
    Id(String),
    Type(String),
    All,
}

impl Filter {
    fn from_params(params: &QueryParams) -> Self {
        let param = |name: &str| params.get(name).and_then(Value::as_str).map(str::to_string);
        if let Some(prefix) = param("prefix") {
            Filter::Prefix(prefix)
        } else if let Some(id) = param("id") {
            Filter::Id(id)
        } else if let Some(doc_type) = param("type") {
            Filter::Type(doc_type)
        } else {
            Filter::All
        }
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Prefix(prefix) => doc.id.starts_with(prefix.as_str()),
            Filter::Id(id) => doc.id == *id,
            Filter::Type(doc_type) => doc.doc_type == *doc_type,
            Filter::All => true,
        }
    }
}

struct ListenerEntry {
    filter: Filter,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

// ---------------------------------------------------------------------------
// MemoryContentLake
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LakeState {
    documents: BTreeMap<String, Document>,
    revision_seq: u64,
}

impl LakeState {
    /// Store `doc`, stamping a fresh revision.
    fn write(&mut self, mut doc: Document) -> Document {
        self.revision_seq += 1;
        doc.rev = Some(revision_for(&doc, self.revision_seq));
        self.documents.insert(doc.id.clone(), doc.clone());
        doc
    }
}

/// In-memory repository backed by a `BTreeMap<id, Document>`.
///
/// Transactions and action batches run against a scratch copy that
/// replaces the live map only when every step succeeds.
#[derive(Default)]
pub struct MemoryContentLake {
    state: Mutex<LakeState>,
    calls: Mutex<CallLog>,
    listeners: Mutex<Vec<ListenerEntry>>,
    canned: Mutex<HashMap<String, Value>>,
    write_failure: Mutex<Option<StoreError>>,
}

impl MemoryContentLake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the lake with documents (not recorded in the call log).
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let lake = Self::new();
        for doc in docs {
            lake.insert_document(doc);
        }
        lake
    }

    /// Seed a single document, returning it with its assigned revision.
    pub fn insert_document(&self, doc: Document) -> Document {
        self.state.lock().unwrap().write(doc)
    }

    /// Peek at a stored document without recording a read.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.state.lock().unwrap().documents.get(id).cloned()
    }

    /// Snapshot of every stored document, ordered by id.
    pub fn documents(&self) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .documents
            .values()
            .cloned()
            .collect()
    }

    /// Peek at a release record.
    pub fn release(&self, release_id: &str) -> Option<ReleaseRecord> {
        let doc = self.document(&ReleaseRecord::document_id(release_id))?;
        ReleaseRecord::from_value(&doc.to_value()).ok()
    }

    /// Copy of the call log.
    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        *self.calls.lock().unwrap() = CallLog::default();
    }

    /// Answer `query` with `response` instead of evaluating it.
    pub fn respond_to(&self, query: impl Into<String>, response: Value) {
        self.canned.lock().unwrap().insert(query.into(), response);
    }

    /// Make every subsequent write (patch, transaction, action) fail.
    pub fn fail_writes_with(&self, err: StoreError) {
        *self.write_failure.lock().unwrap() = Some(err);
    }

    pub fn clear_failure(&self) {
        *self.write_failure.lock().unwrap() = None;
    }

    /// Number of listeners whose feed is still open.
    pub fn open_listeners(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|l| !l.sender.is_closed());
        listeners.len()
    }

    fn check_writable(&self) -> StoreResult<()> {
        match self.write_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run `apply` against a scratch copy of the state and swap it in on
    /// success, then notify listeners about every touched id.
    fn commit_scratch<T>(
        &self,
        apply: impl FnOnce(&mut LakeState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let (out, before, after) = {
            let mut state = self.state.lock().unwrap();
            let mut scratch = LakeState {
                documents: state.documents.clone(),
                revision_seq: state.revision_seq,
            };
            let out = apply(&mut scratch)?;
            let before = std::mem::replace(&mut *state, scratch);
            (out, before.documents, state.documents.clone())
        };
        self.notify(&before, &after);
        Ok(out)
    }

    fn notify(&self, before: &BTreeMap<String, Document>, after: &BTreeMap<String, Document>) {
        let touched: BTreeSet<&String> = before
            .keys()
            .chain(after.keys())
            .filter(|id| before.get(*id) != after.get(*id))
            .collect();
        if touched.is_empty() {
            return;
        }

        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|l| !l.sender.is_closed());
        for id in touched {
            let (old, new) = (before.get(id), after.get(id));
            let (transition, subject) = match (old, new) {
                (None, Some(doc)) => (Transition::Appear, doc),
                (Some(_), Some(doc)) => (Transition::Update, doc),
                (Some(doc), None) => (Transition::Disappear, doc),
                (None, None) => continue,
            };
            for listener in listeners.iter().filter(|l| l.filter.matches(subject)) {
                // A send error means the listener dropped mid-iteration.
                let _ = listener.sender.send(ChangeEvent {
                    document_id: id.clone(),
                    transition,
                    result: new.map(Document::to_value),
                });
            }
        }
    }
}

#[async_trait]
impl ContentClient for MemoryContentLake {
    async fn fetch(&self, query: &str, params: &QueryParams) -> StoreResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .fetches
            .push((query.to_string(), params.clone()));

        if let Some(response) = self.canned.lock().unwrap().get(query) {
            return Ok(response.clone());
        }

        let filter = Filter::from_params(params);
        let state = self.state.lock().unwrap();
        let mut matched = state
            .documents
            .values()
            .filter(|doc| filter.matches(doc))
            .map(Document::to_value);
        match &filter {
            Filter::Id(_) => Ok(matched.next().unwrap_or(Value::Null)),
            _ => Ok(Value::Array(matched.collect())),
        }
    }

    async fn get_document(&self, id: &str) -> StoreResult<Option<Document>> {
        self.calls
            .lock()
            .unwrap()
            .document_reads
            .push(id.to_string());
        Ok(self.document(id))
    }

    async fn commit_patch(&self, patch: Patch) -> StoreResult<Document> {
        self.calls.lock().unwrap().patches.push(patch.clone());
        self.check_writable()?;
        let id = patch
            .target_id()
            .ok_or_else(|| {
                StoreError::Rejected("standalone patches must target a document id".to_string())
            })?
            .to_string();
        self.commit_scratch(|state| {
            let current = state
                .documents
                .get(&id)
                .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
            let patched = apply_patch_ops(current, &patch.ops)?;
            Ok(state.write(patched))
        })
    }

    async fn commit_transaction(&self, tx: Transaction) -> StoreResult<TransactionResult> {
        self.calls.lock().unwrap().transactions.push(tx.clone());
        self.check_writable()?;
        let document_ids = self.commit_scratch(|state| {
            let mut touched = Vec::new();
            for op in &tx.ops {
                touched.extend(apply_transaction_op(state, op)?);
            }
            Ok(touched)
        })?;
        tracing::debug!(
            operations = tx.ops.len(),
            documents = document_ids.len(),
            "memory lake committed transaction"
        );
        Ok(TransactionResult {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            document_ids,
        })
    }

    async fn listen(&self, _query: &str, params: &QueryParams) -> StoreResult<Listener> {
        let (sender, listener) = Listener::channel();
        self.listeners.lock().unwrap().push(ListenerEntry {
            filter: Filter::from_params(params),
            sender,
        });
        Ok(listener)
    }
}

#[async_trait]
impl ActionDispatcher for MemoryContentLake {
    async fn perform_actions(
        &self,
        target: &DatasetRef,
        actions: Vec<Action>,
    ) -> StoreResult<ActionResult> {
        self.calls
            .lock()
            .unwrap()
            .action_batches
            .push((target.clone(), actions.clone()));
        self.check_writable()?;
        self.commit_scratch(|state| {
            for action in &actions {
                apply_action(state, action)?;
            }
            Ok(())
        })?;
        tracing::debug!(dataset = %target, actions = actions.len(), "memory lake applied actions");
        Ok(ActionResult {
            transaction_id: uuid::Uuid::new_v4().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction semantics
// ---------------------------------------------------------------------------

fn revision_for(doc: &Document, seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_be_bytes());
    hasher.update(doc.id.as_bytes());
    hasher.update(doc.to_value().to_string().as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

fn matching_ids(state: &LakeState, params: &QueryParams) -> Vec<String> {
    let filter = Filter::from_params(params);
    state
        .documents
        .values()
        .filter(|doc| filter.matches(doc))
        .map(|doc| doc.id.clone())
        .collect()
}

fn apply_transaction_op(state: &mut LakeState, op: &TransactionOp) -> StoreResult<Vec<String>> {
    match op {
        TransactionOp::Create(doc) => {
            if state.documents.contains_key(&doc.id) {
                return Err(StoreError::Conflict {
                    id: doc.id.clone(),
                    detail: "document already exists".to_string(),
                });
            }
            Ok(vec![state.write(doc.clone()).id])
        }
        TransactionOp::CreateOrReplace(doc) => Ok(vec![state.write(doc.clone()).id]),
        TransactionOp::CreateIfNotExists(doc) => {
            if !state.documents.contains_key(&doc.id) {
                state.write(doc.clone());
            }
            Ok(vec![doc.id.clone()])
        }
        TransactionOp::Delete(DeleteTarget::Id(id)) => {
            state.documents.remove(id);
            Ok(vec![id.clone()])
        }
        TransactionOp::Delete(DeleteTarget::Query { params, .. }) => {
            let ids = matching_ids(state, params);
            for id in &ids {
                state.documents.remove(id);
            }
            Ok(ids)
        }
        TransactionOp::Patch(patch) => {
            let ids = match &patch.target {
                PatchTarget::Id(id) => {
                    if !state.documents.contains_key(id) {
                        return Err(StoreError::NotFound { id: id.clone() });
                    }
                    vec![id.clone()]
                }
                PatchTarget::Query { params, .. } => matching_ids(state, params),
            };
            for id in &ids {
                let current = state
                    .documents
                    .get(id)
                    .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
                let patched = apply_patch_ops(current, &patch.ops)?;
                state.write(patched);
            }
            Ok(ids)
        }
    }
}

/// Apply patch operations in order to a copy of `doc`.
pub fn apply_patch_ops(doc: &Document, ops: &[PatchOp]) -> StoreResult<Document> {
    let mut value = doc.to_value();
    for op in ops {
        match op {
            PatchOp::IfRevisionId(expected) => {
                let actual = doc.rev.clone().unwrap_or_default();
                if actual != *expected {
                    return Err(StoreError::RevisionMismatch {
                        id: doc.id.clone(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
            PatchOp::Set(attrs) => {
                for (path, v) in attrs {
                    FieldPath::parse(path)?.set(&mut value, v.clone())?;
                }
            }
            PatchOp::SetIfMissing(attrs) => {
                for (path, v) in attrs {
                    let path = FieldPath::parse(path)?;
                    if path.get(&value).is_none() {
                        path.set(&mut value, v.clone())?;
                    }
                }
            }
            PatchOp::Unset(paths) => {
                for path in paths {
                    FieldPath::parse(path)?.remove(&mut value);
                }
            }
            PatchOp::Inc(attrs) => apply_arithmetic(&mut value, attrs, 1.0)?,
            PatchOp::Dec(attrs) => apply_arithmetic(&mut value, attrs, -1.0)?,
            PatchOp::Insert {
                position,
                at,
                items,
            } => apply_insert(&mut value, *position, at, items)?,
            PatchOp::DiffMatchPatch(_) => {
                return Err(StoreError::Rejected(
                    "diffMatchPatch is not supported by the in-memory lake".to_string(),
                ))
            }
        }
    }
    let mut patched = Document::from_value(value)?;
    patched.rev = doc.rev.clone();
    Ok(patched)
}

fn apply_arithmetic(value: &mut Value, attrs: &Map<String, Value>, sign: f64) -> StoreResult<()> {
    for (path, amount) in attrs {
        let path = FieldPath::parse(path)?;
        let current = path.get(value).cloned().unwrap_or(Value::from(0));
        let result = match (current.as_i64(), amount.as_i64()) {
            (Some(c), Some(a)) => Value::from(c + a * sign as i64),
            _ => {
                let c = current.as_f64().ok_or_else(|| {
                    StoreError::Rejected(format!("{path} is not numeric"))
                })?;
                let a = amount.as_f64().ok_or_else(|| {
                    StoreError::Rejected(format!("increment for {path} is not numeric"))
                })?;
                Value::from(c + a * sign)
            }
        };
        path.set(value, result)?;
    }
    Ok(())
}

fn apply_insert(
    value: &mut Value,
    position: InsertPosition,
    at: &str,
    items: &[Value],
) -> StoreResult<()> {
    let selector = FieldPath::parse(at)?;
    let (parent, last) = selector
        .split_last()
        .ok_or_else(|| StoreError::Rejected(format!("invalid insert selector {at}")))?;
    let parent = parent
        .ok_or_else(|| StoreError::Rejected(format!("insert selector {at} has no array")))?;
    let array = parent
        .get_mut(value)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| StoreError::Rejected(format!("{parent} is not an array")))?;

    if array.is_empty() {
        array.extend(items.iter().cloned());
        return Ok(());
    }

    let idx = match last {
        Segment::Index(i) => resolve_index(*i, array.len()),
        Segment::KeyMatch(k) => position_by_key(array, k),
        Segment::Key(_) => None,
    }
    .ok_or_else(|| StoreError::Rejected(format!("insert selector {at} does not resolve")))?;

    match position {
        InsertPosition::Before => {
            array.splice(idx..idx, items.iter().cloned());
        }
        InsertPosition::After => {
            array.splice(idx + 1..idx + 1, items.iter().cloned());
        }
        InsertPosition::Replace => {
            array.splice(idx..idx + 1, items.iter().cloned());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Action semantics
// ---------------------------------------------------------------------------

fn load_release(state: &LakeState, release_id: &str) -> StoreResult<ReleaseRecord> {
    let doc = state
        .documents
        .get(&ReleaseRecord::document_id(release_id))
        .ok_or_else(|| StoreError::NotFound {
            id: ReleaseRecord::document_id(release_id),
        })?;
    ReleaseRecord::from_value(&doc.to_value())
}

fn save_release(state: &mut LakeState, record: &ReleaseRecord) -> StoreResult<()> {
    state.write(record.to_document()?);
    Ok(())
}

fn require_state(
    record: &ReleaseRecord,
    allowed: &[ReleaseState],
    action: &str,
) -> StoreResult<()> {
    if allowed.contains(&record.state) {
        return Ok(());
    }
    Err(StoreError::Rejected(format!(
        "cannot {action} release {} in state {}",
        record.release_id, record.state
    )))
}

fn version_prefix(release_id: &str) -> String {
    format!("{VERSIONS_PREFIX}{release_id}.")
}

fn apply_action(state: &mut LakeState, action: &Action) -> StoreResult<()> {
    match action {
        Action::Publish {
            draft_id,
            published_id,
        } => {
            let draft = state
                .documents
                .remove(draft_id)
                .ok_or_else(|| StoreError::NotFound { id: draft_id.clone() })?;
            state.write(draft.with_id(published_id.clone()));
        }
        Action::Unpublish {
            draft_id,
            published_id,
        } => {
            let published = state
                .documents
                .remove(published_id)
                .ok_or_else(|| StoreError::NotFound {
                    id: published_id.clone(),
                })?;
            if !state.documents.contains_key(draft_id) {
                state.write(published.with_id(draft_id.clone()));
            }
        }
        Action::DiscardDraft { draft_id } => {
            state
                .documents
                .remove(draft_id)
                .ok_or_else(|| StoreError::NotFound { id: draft_id.clone() })?;
        }
        Action::ReleaseCreate {
            release_id,
            metadata,
        } => {
            if release_id.contains('.') {
                return Err(StoreError::Rejected(format!(
                    "release id {release_id} contains '.'"
                )));
            }
            let doc_id = ReleaseRecord::document_id(release_id);
            if state.documents.contains_key(&doc_id) {
                return Err(StoreError::Conflict {
                    id: release_id.clone(),
                    detail: "release already exists".to_string(),
                });
            }
            let record = ReleaseRecord {
                release_id: release_id.clone(),
                metadata: metadata.clone(),
                state: ReleaseState::Created,
                publish_at: None,
                created_at: Utc::now(),
            };
            save_release(state, &record)?;
        }
        Action::ReleaseEdit { release_id, patch } => {
            let mut record = load_release(state, release_id)?;
            patch.apply_to(&mut record.metadata);
            save_release(state, &record)?;
        }
        Action::VersionCreate {
            published_id,
            attributes,
        } => {
            let release_id = attributes
                .id
                .strip_prefix(VERSIONS_PREFIX)
                .and_then(|rest| rest.strip_suffix(published_id.as_str()))
                .and_then(|rest| rest.strip_suffix('.'))
                .ok_or_else(|| {
                    StoreError::Rejected(format!(
                        "{} is not a version id for {published_id}",
                        attributes.id
                    ))
                })?;
            let record = load_release(state, release_id)?;
            require_state(
                &record,
                &[ReleaseState::Created, ReleaseState::Scheduled],
                "add versions to",
            )?;
            if state.documents.contains_key(&attributes.id) {
                return Err(StoreError::Conflict {
                    id: attributes.id.clone(),
                    detail: "version already exists".to_string(),
                });
            }
            state.write(attributes.clone());
        }
        Action::VersionDiscard { version_id } => {
            state
                .documents
                .remove(version_id)
                .ok_or_else(|| StoreError::NotFound {
                    id: version_id.clone(),
                })?;
        }
        Action::ReleasePublish { release_id } => {
            let mut record = load_release(state, release_id)?;
            require_state(
                &record,
                &[ReleaseState::Created, ReleaseState::Scheduled],
                "publish",
            )?;
            let prefix = version_prefix(release_id);
            let versions: Vec<Document> = state
                .documents
                .range(prefix.clone()..)
                .take_while(|(id, _)| id.starts_with(&prefix))
                .map(|(_, doc)| doc.clone())
                .collect();
            for version in versions {
                state.documents.remove(&version.id);
                let base_id = version.id[prefix.len()..].to_string();
                state.write(version.with_id(base_id));
            }
            record.state = ReleaseState::Published;
            save_release(state, &record)?;
        }
        Action::ReleaseSchedule {
            release_id,
            publish_at,
        } => {
            let mut record = load_release(state, release_id)?;
            require_state(&record, &[ReleaseState::Created], "schedule")?;
            record.state = ReleaseState::Scheduled;
            record.publish_at = Some(*publish_at);
            save_release(state, &record)?;
        }
        Action::ReleaseUnschedule { release_id } => {
            let mut record = load_release(state, release_id)?;
            require_state(&record, &[ReleaseState::Scheduled], "unschedule")?;
            record.state = ReleaseState::Created;
            record.publish_at = None;
            save_release(state, &record)?;
        }
        Action::ReleaseArchive { release_id } => {
            let mut record = load_release(state, release_id)?;
            require_state(
                &record,
                &[ReleaseState::Created, ReleaseState::Published],
                "archive",
            )?;
            record.state = ReleaseState::Archived;
            save_release(state, &record)?;
        }
        Action::ReleaseUnarchive { release_id } => {
            let mut record = load_release(state, release_id)?;
            require_state(&record, &[ReleaseState::Archived], "unarchive")?;
            record.state = ReleaseState::Created;
            save_release(state, &record)?;
        }
        Action::ReleaseDelete { release_id } => {
            let mut record = load_release(state, release_id)?;
            require_state(&record, &[ReleaseState::Archived], "delete")?;
            let prefix = version_prefix(release_id);
            state.documents.retain(|id, _| !id.starts_with(&prefix));
            record.state = ReleaseState::Deleted;
            save_release(state, &record)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn patch_ops_apply_in_order() {
        let doc = Document::new("p", "post");
        let patched = apply_patch_ops(
            &doc,
            &[
                PatchOp::Set(attrs(json!({"views": 10}))),
                PatchOp::Inc(attrs(json!({"views": 5}))),
            ],
        )
        .unwrap();
        assert_eq!(patched.field("views"), Some(&json!(15)));
    }

    #[test]
    fn revision_guard_rejects_stale_token() {
        let mut doc = Document::new("p", "post");
        doc.rev = Some("current".to_string());
        let err = apply_patch_ops(&doc, &[PatchOp::IfRevisionId("stale".to_string())])
            .unwrap_err();
        assert!(matches!(err, StoreError::RevisionMismatch { .. }));
    }

    #[test]
    fn insert_into_empty_array_appends() {
        let doc = Document::new("p", "post").with_field("body", json!([]));
        let patched = apply_patch_ops(
            &doc,
            &[PatchOp::Insert {
                position: InsertPosition::Before,
                at: "body[0]".to_string(),
                items: vec![json!("a")],
            }],
        )
        .unwrap();
        assert_eq!(patched.field("body"), Some(&json!(["a"])));
    }

    #[test]
    fn insert_positions_splice_around_selector() {
        let doc = Document::new("p", "post").with_field("body", json!(["a", "b"]));
        let insert = |position, at: &str| PatchOp::Insert {
            position,
            at: at.to_string(),
            items: vec![json!("x")],
        };

        let before = apply_patch_ops(&doc, &[insert(InsertPosition::Before, "body[1]")]).unwrap();
        assert_eq!(before.field("body"), Some(&json!(["a", "x", "b"])));

        let after = apply_patch_ops(&doc, &[insert(InsertPosition::After, "body[-1]")]).unwrap();
        assert_eq!(after.field("body"), Some(&json!(["a", "b", "x"])));

        let replace = apply_patch_ops(&doc, &[insert(InsertPosition::Replace, "body[0]")]).unwrap();
        assert_eq!(replace.field("body"), Some(&json!(["x", "b"])));
    }

    #[tokio::test]
    async fn failed_transaction_leaves_state_untouched() {
        let lake = MemoryContentLake::with_documents([Document::new("a", "post")]);
        let tx = Transaction::new()
            .create(Document::new("b", "post"))
            .create(Document::new("a", "post"));

        let err = lake.commit_transaction(tx).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(lake.document("b").is_none());
    }

    #[tokio::test]
    async fn dotted_release_ids_are_rejected() {
        let lake = MemoryContentLake::new();
        let err = lake
            .perform_actions(
                &DatasetRef::new("p", "production"),
                vec![Action::ReleaseCreate {
                    release_id: "spring.x".to_string(),
                    metadata: crate::release::ReleaseMetadata::titled("Spring"),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(lake.release("spring.x").is_none());
    }

    #[tokio::test]
    async fn release_delete_requires_archive() {
        let lake = MemoryContentLake::new();
        let target = DatasetRef::new("p", "production");
        lake.perform_actions(
            &target,
            vec![Action::ReleaseCreate {
                release_id: "r1".to_string(),
                metadata: crate::release::ReleaseMetadata::titled("R1"),
            }],
        )
        .await
        .unwrap();

        let err = lake
            .perform_actions(
                &target,
                vec![Action::ReleaseDelete {
                    release_id: "r1".to_string(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(lake.release("r1").unwrap().state, ReleaseState::Created);
    }

    #[tokio::test]
    async fn listeners_receive_appear_events_for_matching_ids() {
        let lake = MemoryContentLake::new();
        let mut params = QueryParams::new();
        params.insert("type".to_string(), json!("post"));
        let mut listener = lake.listen("*[_type == $type]", &params).await.unwrap();

        lake.commit_transaction(
            Transaction::new()
                .create(Document::new("p1", "post"))
                .create(Document::new("a1", "author")),
        )
        .await
        .unwrap();

        let events = listener.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].document_id, "p1");
        assert_eq!(events[0].transition, Transition::Appear);
    }
}
