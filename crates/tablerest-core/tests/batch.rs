//! Batch execution against the in-memory store.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use tablerest_core::batch::{run_batch, BatchError, BatchOp, BatchOptions};
use tablerest_core::settle::{JobFailure, Settled};
use tablerest_core::store::{MemoryStore, ResourceStore, StoreError, StoreTx};

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new(["users", "posts"]);
    store
        .seed(
            "users",
            vec![
                json!({"id": 1, "name": "ada"}),
                json!({"id": 2, "name": "grace"}),
            ],
        )
        .await
        .unwrap();
    store
}

fn ops(value: Value) -> Vec<BatchOp> {
    serde_json::from_value(value).unwrap()
}

fn options(concurrency: usize, atomic: bool) -> BatchOptions {
    BatchOptions {
        concurrency,
        debug: false,
        atomic,
    }
}

#[tokio::test]
async fn successful_batch_commits_every_op() {
    let store = seeded_store().await;
    let batch = ops(json!([
        {"op": "create", "resource": "posts", "body": {"title": "hello"}},
        {"op": "update", "resource": "users", "id": 1, "body": {"name": "ada l."}},
        {"op": "delete", "resource": "users", "id": 2}
    ]));

    let results = run_batch(Arc::new(store.clone()), batch, options(2, true)).await;

    assert!(results.iter().all(|r| r.is_fulfilled()), "{:?}", results);
    assert_eq!(results[0].value().unwrap()["title"], json!("hello"));
    assert_eq!(
        results[1].value(),
        Some(&json!({"id": 1, "name": "ada l."}))
    );
    assert_eq!(
        results[2].value(),
        Some(&json!({"id": 2, "name": "grace"}))
    );
    assert_eq!(store.list("posts").await.len(), 1);
    assert_eq!(
        store.list("users").await,
        vec![json!({"id": 1, "name": "ada l."})]
    );
}

#[tokio::test]
async fn atomic_batch_rolls_back_when_one_op_fails() {
    let store = seeded_store().await;
    let batch = ops(json!([
        {"op": "create", "resource": "posts", "body": {"title": "a"}},
        {"op": "update", "resource": "users", "id": 42, "body": {"name": "nobody"}},
        {"op": "delete", "resource": "users", "id": 1}
    ]));

    let results = run_batch(Arc::new(store.clone()), batch, options(3, true)).await;

    let aborted = Settled::Rejected {
        reason: JobFailure::Failed(BatchError::Aborted),
    };
    assert_eq!(results[0], aborted);
    assert_eq!(
        results[1],
        Settled::Rejected {
            reason: JobFailure::Failed(BatchError::Store(StoreError::NotFound {
                resource: "users".to_string(),
                id: 42,
            })),
        }
    );
    assert_eq!(results[2], aborted);
    assert!(store.list("posts").await.is_empty());
    assert_eq!(store.list("users").await.len(), 2);
}

#[tokio::test]
async fn non_atomic_batch_keeps_successful_ops() {
    let store = seeded_store().await;
    let batch = ops(json!([
        {"op": "delete", "resource": "users", "id": 1},
        {"op": "create", "resource": "comments", "body": {}},
        {"op": "create", "resource": "posts", "body": {"title": "kept"}}
    ]));

    let results = run_batch(Arc::new(store.clone()), batch, options(1, false)).await;

    assert!(results[0].is_fulfilled());
    assert_eq!(
        results[1].reason(),
        Some(&JobFailure::Failed(BatchError::Store(
            StoreError::UnknownResource("comments".to_string())
        )))
    );
    assert!(results[2].is_fulfilled());
    assert!(store.get("users", 1).await.is_none());
    assert_eq!(store.list("posts").await.len(), 1);
}

#[tokio::test]
async fn outcomes_follow_input_order_under_concurrency() {
    let store = MemoryStore::new(["items"]);
    let batch: Vec<BatchOp> = (0..10)
        .map(|n| BatchOp::Create {
            resource: "items".to_string(),
            body: json!({ "n": n }),
        })
        .collect();

    let results = run_batch(Arc::new(store.clone()), batch, options(4, true)).await;

    let ns: Vec<Value> = results
        .iter()
        .map(|r| r.value().unwrap()["n"].clone())
        .collect();
    assert_eq!(ns, (0..10).map(Value::from).collect::<Vec<_>>());
    assert_eq!(store.list("items").await.len(), 10);
}

#[tokio::test]
async fn conflicting_deletes_report_conflict_at_commit() {
    let store = seeded_store().await;
    let batch = ops(json!([
        {"op": "delete", "resource": "users", "id": 1},
        {"op": "delete", "resource": "users", "id": 1}
    ]));

    let results = run_batch(Arc::new(store.clone()), batch, options(2, true)).await;

    let fulfilled = results.iter().filter(|r| r.is_fulfilled()).count();
    let conflicts = results
        .iter()
        .filter(|r| {
            matches!(
                r.reason(),
                Some(JobFailure::Failed(BatchError::Store(StoreError::Conflict(_))))
            )
        })
        .count();
    assert_eq!((fulfilled, conflicts), (1, 1));
    assert!(store.get("users", 1).await.is_none());
}

#[tokio::test]
async fn works_through_a_trait_object() {
    let store = seeded_store().await;
    let dyn_store: Arc<dyn ResourceStore> = Arc::new(store.clone());
    let batch = ops(json!([{"op": "create", "resource": "users", "body": {"name": "linus"}}]));

    let results = run_batch(dyn_store, batch, BatchOptions::default()).await;

    assert!(results[0].is_fulfilled());
    assert_eq!(store.list("users").await.len(), 3);
}

#[tokio::test]
async fn empty_batch_yields_no_outcomes() {
    let store = MemoryStore::new(["users"]);
    let results = run_batch(Arc::new(store), Vec::new(), BatchOptions::default()).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn second_update_of_same_record_is_not_lost_silently() {
    let store = MemoryStore::new(["users"]);
    store
        .seed("users", vec![json!({"id": 1, "name": "a", "age": 1})])
        .await
        .unwrap();
    let batch = ops(json!([
        {"op": "update", "resource": "users", "id": 1, "body": {"name": "x"}},
        {"op": "update", "resource": "users", "id": 1, "body": {"age": 5}}
    ]));

    let results = run_batch(Arc::new(store.clone()), batch, BatchOptions::default()).await;

    let fulfilled: Vec<&Value> = results.iter().filter_map(|r| r.value()).collect();
    let conflicts = results
        .iter()
        .filter(|r| {
            matches!(
                r.reason(),
                Some(JobFailure::Failed(BatchError::Store(StoreError::Conflict(_))))
            )
        })
        .count();
    assert_eq!((fulfilled.len(), conflicts), (1, 1), "{:?}", results);
    assert_eq!(store.get("users", 1).await.as_ref(), Some(fulfilled[0]));
}

/// Store whose transactions fail to apply and then fail to roll back.
struct BrokenStore;

struct BrokenTx;

#[async_trait]
impl ResourceStore for BrokenStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(BrokenTx))
    }
}

#[async_trait]
impl StoreTx for BrokenTx {
    async fn apply(&mut self, op: &BatchOp) -> Result<Value, StoreError> {
        Err(StoreError::UnknownResource(op.resource().to_string()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Err(StoreError::Conflict("rollback failed".to_string()))
    }
}

#[tokio::test]
async fn apply_error_survives_failed_rollback() {
    let batch = ops(json!([{"op": "delete", "resource": "users", "id": 1}]));

    let results = run_batch(Arc::new(BrokenStore), batch, BatchOptions::default()).await;

    assert_eq!(
        results,
        vec![Settled::Rejected {
            reason: JobFailure::Failed(BatchError::Store(StoreError::UnknownResource(
                "users".to_string()
            ))),
        }]
    );
}
