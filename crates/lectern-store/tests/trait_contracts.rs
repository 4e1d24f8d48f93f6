//! Trait contract tests for ContentClient and ActionDispatcher.
//!
//! These tests verify the behavioral contracts of the collaborator traits
//! using the in-memory lake. Any conforming implementation must pass these.

use lectern_store::fakes::MemoryContentLake;
use lectern_store::*;
use serde_json::{json, Map, Value};

fn attrs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn params(value: Value) -> QueryParams {
    attrs(value)
}

fn target() -> DatasetRef {
    DatasetRef::new("proj", "production")
}

// ===========================================================================
// ContentClient contract tests
// ===========================================================================

#[tokio::test]
async fn get_document_returns_none_for_missing_id() {
    let lake = MemoryContentLake::new();
    assert!(lake.get_document("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn writes_assign_new_revisions() {
    let lake = MemoryContentLake::new();
    lake.commit_transaction(Transaction::new().create(Document::new("a", "post")))
        .await
        .unwrap();
    let first = lake.get_document("a").await.unwrap().unwrap();

    lake.commit_patch(Patch::by_id("a").set(attrs(json!({"title": "T"}))))
        .await
        .unwrap();
    let second = lake.get_document("a").await.unwrap().unwrap();

    assert!(first.rev.is_some());
    assert_ne!(first.rev, second.rev);
}

#[tokio::test]
async fn transaction_is_all_or_nothing() {
    let lake = MemoryContentLake::new();
    let tx = Transaction::new()
        .create(Document::new("a", "post"))
        .patch(Patch::by_id("missing").set(attrs(json!({"x": 1}))));

    let err = lake.commit_transaction(tx).await.unwrap_err();

    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(lake.document("a").is_none());
}

#[tokio::test]
async fn transaction_reports_touched_ids_in_order() {
    let lake = MemoryContentLake::with_documents([Document::new("old", "post")]);
    let result = lake
        .commit_transaction(
            Transaction::new()
                .create_or_replace(Document::new("new", "post"))
                .delete(DeleteTarget::Id("old".to_string())),
        )
        .await
        .unwrap();

    assert_eq!(result.document_ids, vec!["new", "old"]);
    assert!(!result.transaction_id.is_empty());
}

#[tokio::test]
async fn create_if_not_exists_keeps_existing_body() {
    let lake = MemoryContentLake::with_documents([
        Document::new("a", "post").with_field("title", json!("original"))
    ]);
    lake.commit_transaction(
        Transaction::new()
            .create_if_not_exists(Document::new("a", "post").with_field("title", json!("new"))),
    )
    .await
    .unwrap();

    assert_eq!(lake.document("a").unwrap().title(), Some("original"));
}

#[tokio::test]
async fn patch_with_stale_revision_is_rejected() {
    let lake = MemoryContentLake::with_documents([Document::new("a", "post")]);
    let err = lake
        .commit_patch(
            Patch::by_id("a")
                .if_revision_id("stale")
                .set(attrs(json!({"title": "x"}))),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::RevisionMismatch { .. }));
    assert!(lake.document("a").unwrap().title().is_none());
}

#[tokio::test]
async fn fetch_by_prefix_returns_matching_documents() {
    let lake = MemoryContentLake::with_documents([
        Document::new("versions.r1.a", "post"),
        Document::new("versions.r1.b", "post"),
        Document::new("versions.r2.a", "post"),
    ]);
    let result = lake
        .fetch("*[]", &params(json!({"prefix": "versions.r1."})))
        .await
        .unwrap();

    let ids: Vec<&str> = result
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["versions.r1.a", "versions.r1.b"]);
}

#[tokio::test]
async fn canned_query_responses_take_precedence() {
    let lake = MemoryContentLake::new();
    lake.respond_to("count(*)", json!(42));
    let result = lake.fetch("count(*)", &QueryParams::new()).await.unwrap();
    assert_eq!(result, json!(42));
}

#[tokio::test]
async fn injected_failures_block_writes_but_not_reads() {
    let lake = MemoryContentLake::with_documents([Document::new("a", "post")]);
    lake.fail_writes_with(StoreError::Transport("offline".to_string()));

    assert!(lake.get_document("a").await.unwrap().is_some());
    let err = lake
        .commit_transaction(Transaction::new().create(Document::new("b", "post")))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Transport("offline".to_string()));

    lake.clear_failure();
    assert!(lake
        .commit_transaction(Transaction::new().create(Document::new("b", "post")))
        .await
        .is_ok());
}

#[tokio::test]
async fn dropped_listener_is_pruned() {
    let lake = MemoryContentLake::new();
    let listener = lake.listen("*", &QueryParams::new()).await.unwrap();
    assert_eq!(lake.open_listeners(), 1);

    drop(listener);
    assert_eq!(lake.open_listeners(), 0);
}

// ===========================================================================
// ActionDispatcher contract tests
// ===========================================================================

#[tokio::test]
async fn publish_moves_draft_to_published_id() {
    let lake = MemoryContentLake::with_documents([
        Document::new("drafts.a", "post").with_field("title", json!("Draft"))
    ]);
    lake.perform_actions(
        &target(),
        vec![Action::Publish {
            draft_id: "drafts.a".to_string(),
            published_id: "a".to_string(),
        }],
    )
    .await
    .unwrap();

    assert!(lake.document("drafts.a").is_none());
    assert_eq!(lake.document("a").unwrap().title(), Some("Draft"));
}

#[tokio::test]
async fn unpublish_keeps_existing_draft() {
    let lake = MemoryContentLake::with_documents([
        Document::new("a", "post").with_field("title", json!("Live")),
        Document::new("drafts.a", "post").with_field("title", json!("Editing")),
    ]);
    lake.perform_actions(
        &target(),
        vec![Action::Unpublish {
            draft_id: "drafts.a".to_string(),
            published_id: "a".to_string(),
        }],
    )
    .await
    .unwrap();

    assert!(lake.document("a").is_none());
    assert_eq!(lake.document("drafts.a").unwrap().title(), Some("Editing"));
}

#[tokio::test]
async fn duplicate_release_create_conflicts() {
    let lake = MemoryContentLake::new();
    let create = || Action::ReleaseCreate {
        release_id: "r1".to_string(),
        metadata: ReleaseMetadata::titled("R1"),
    };
    lake.perform_actions(&target(), vec![create()]).await.unwrap();
    let err = lake
        .perform_actions(&target(), vec![create()])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
}

#[tokio::test]
async fn release_publish_promotes_every_version() {
    let lake = MemoryContentLake::with_documents([
        Document::new("a", "post").with_field("title", json!("old"))
    ]);
    lake.perform_actions(
        &target(),
        vec![
            Action::ReleaseCreate {
                release_id: "r1".to_string(),
                metadata: ReleaseMetadata::titled("R1"),
            },
            Action::VersionCreate {
                published_id: "a".to_string(),
                attributes: Document::new("versions.r1.a", "post")
                    .with_field("title", json!("new")),
            },
            Action::VersionCreate {
                published_id: "b".to_string(),
                attributes: Document::new("versions.r1.b", "post"),
            },
        ],
    )
    .await
    .unwrap();

    lake.perform_actions(
        &target(),
        vec![Action::ReleasePublish {
            release_id: "r1".to_string(),
        }],
    )
    .await
    .unwrap();

    assert_eq!(lake.document("a").unwrap().title(), Some("new"));
    assert!(lake.document("b").is_some());
    assert!(lake.document("versions.r1.a").is_none());
    assert_eq!(lake.release("r1").unwrap().state, ReleaseState::Published);
}

#[tokio::test]
async fn version_create_rejects_mismatched_id() {
    let lake = MemoryContentLake::new();
    lake.perform_actions(
        &target(),
        vec![Action::ReleaseCreate {
            release_id: "r1".to_string(),
            metadata: ReleaseMetadata::titled("R1"),
        }],
    )
    .await
    .unwrap();

    let err = lake
        .perform_actions(
            &target(),
            vec![Action::VersionCreate {
                published_id: "a".to_string(),
                attributes: Document::new("versions.r1.b", "post"),
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
}

#[tokio::test]
async fn archive_then_delete_removes_versions() {
    let lake = MemoryContentLake::new();
    lake.perform_actions(
        &target(),
        vec![
            Action::ReleaseCreate {
                release_id: "r1".to_string(),
                metadata: ReleaseMetadata::titled("R1"),
            },
            Action::VersionCreate {
                published_id: "a".to_string(),
                attributes: Document::new("versions.r1.a", "post"),
            },
            Action::ReleaseArchive {
                release_id: "r1".to_string(),
            },
            Action::ReleaseDelete {
                release_id: "r1".to_string(),
            },
        ],
    )
    .await
    .unwrap();

    assert!(lake.document("versions.r1.a").is_none());
    assert_eq!(lake.release("r1").unwrap().state, ReleaseState::Deleted);
}

#[tokio::test]
async fn action_batches_are_recorded_with_target() {
    let lake = MemoryContentLake::new();
    let _ = lake
        .perform_actions(
            &target(),
            vec![Action::ReleasePublish {
                release_id: "missing".to_string(),
            }],
        )
        .await;

    let calls = lake.calls();
    assert_eq!(calls.action_batches.len(), 1);
    assert_eq!(calls.action_batches[0].0, target());
    assert_eq!(calls.count_actions("release.publish"), 1);
}
