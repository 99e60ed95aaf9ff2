//! In-memory resource store with staged, commit-time-checked transactions.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::batch::BatchOp;

use super::{RecordId, ResourceStore, StoreError, StoreTx};

type Record = Map<String, Value>;
type Tables = HashMap<String, BTreeMap<RecordId, Record>>;

struct Inner {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl Inner {
    fn allocate_id(&self) -> Result<RecordId, StoreError> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|_| StoreError::Conflict("record ids exhausted".to_string()))
    }
}

/// Resources are named collections of JSON objects keyed by id. The set of
/// resource names is fixed by `new` and `seed`.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = resources
            .into_iter()
            .map(|name| (name.into(), BTreeMap::new()))
            .collect();
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(tables),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `resource` (if new) and insert `records`. Records without a
    /// numeric `"id"` get one allocated.
    pub async fn seed(&self, resource: &str, records: Vec<Value>) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        let table = tables.entry(resource.to_string()).or_default();
        for record in records {
            let mut record = into_object(record)?;
            let id = match record.get("id").and_then(Value::as_u64) {
                Some(id) => {
                    let next = id.checked_add(1).ok_or_else(|| {
                        StoreError::InvalidBody(format!("record id {} is out of range", id))
                    })?;
                    self.inner.next_id.fetch_max(next, Ordering::Relaxed);
                    id
                }
                None => {
                    let id = self.inner.allocate_id()?;
                    record.insert("id".to_string(), Value::from(id));
                    id
                }
            };
            table.insert(id, record);
        }
        tracing::debug!(resource, rows = table.len(), "seeded resource");
        Ok(())
    }

    pub async fn get(&self, resource: &str, id: RecordId) -> Option<Value> {
        let tables = self.inner.tables.read().await;
        tables
            .get(resource)
            .and_then(|t| t.get(&id))
            .map(|r| Value::Object(r.clone()))
    }

    /// All records of `resource` in id order (empty if unknown).
    pub async fn list(&self, resource: &str) -> Vec<Value> {
        let tables = self.inner.tables.read().await;
        tables
            .get(resource)
            .map(|t| t.values().map(|r| Value::Object(r.clone())).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            inner: Arc::clone(&self.inner),
            staged: HashMap::new(),
        }))
    }
}

/// A staged write. `None` record means delete.
struct Staged {
    record: Option<Record>,
    /// Committed row this write was based on; commit fails if it changed.
    /// `None` for rows created by this transaction.
    read: Option<Record>,
}

struct MemoryTx {
    inner: Arc<Inner>,
    staged: HashMap<(String, RecordId), Staged>,
}

impl MemoryTx {
    /// Current view of a row: staged write first, then committed data.
    /// Also returns the committed snapshot when the row was read from it.
    async fn current(
        &self,
        resource: &str,
        id: RecordId,
    ) -> Result<(Record, Option<Record>), StoreError> {
        let not_found = || StoreError::NotFound {
            resource: resource.to_string(),
            id,
        };
        if let Some(staged) = self.staged.get(&(resource.to_string(), id)) {
            let record = staged.record.clone().ok_or_else(not_found)?;
            return Ok((record, None));
        }
        let tables = self.inner.tables.read().await;
        let table = tables
            .get(resource)
            .ok_or_else(|| StoreError::UnknownResource(resource.to_string()))?;
        let record = table.get(&id).cloned().ok_or_else(not_found)?;
        Ok((record.clone(), Some(record)))
    }

    async fn ensure_resource(&self, resource: &str) -> Result<(), StoreError> {
        if self.inner.tables.read().await.contains_key(resource) {
            Ok(())
        } else {
            Err(StoreError::UnknownResource(resource.to_string()))
        }
    }

    /// Stage a write. An earlier staged write to the same row keeps its
    /// original committed snapshot.
    fn stage(&mut self, resource: &str, id: RecordId, record: Option<Record>, read: Option<Record>) {
        let key = (resource.to_string(), id);
        let read = match self.staged.remove(&key) {
            Some(earlier) => earlier.read,
            None => read,
        };
        self.staged.insert(key, Staged { record, read });
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn apply(&mut self, op: &BatchOp) -> Result<Value, StoreError> {
        match op {
            BatchOp::Create { resource, body } => {
                self.ensure_resource(resource).await?;
                let mut record = into_object(body.clone())?;
                let id = self.inner.allocate_id()?;
                record.insert("id".to_string(), Value::from(id));
                self.stage(resource, id, Some(record.clone()), None);
                Ok(Value::Object(record))
            }
            BatchOp::Update { resource, id, body } => {
                let (mut record, read) = self.current(resource, *id).await?;
                let patch = into_object(body.clone())?;
                for (key, value) in patch {
                    if key != "id" {
                        record.insert(key, value);
                    }
                }
                self.stage(resource, *id, Some(record.clone()), read);
                Ok(Value::Object(record))
            }
            BatchOp::Delete { resource, id } => {
                let (record, read) = self.current(resource, *id).await?;
                self.stage(resource, *id, None, read);
                Ok(Value::Object(record))
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { inner, staged } = *self;
        let mut tables = inner.tables.write().await;
        for ((resource, id), write) in &staged {
            let table = tables
                .get(resource)
                .ok_or_else(|| StoreError::UnknownResource(resource.clone()))?;
            let Some(read) = &write.read else {
                continue;
            };
            if table.get(id) != Some(read) {
                return Err(StoreError::Conflict(format!(
                    "{} {} changed by a concurrent transaction",
                    resource, id
                )));
            }
        }
        for ((resource, id), write) in staged {
            if let Some(table) = tables.get_mut(&resource) {
                match write.record {
                    Some(record) => {
                        table.insert(id, record);
                    }
                    None => {
                        table.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

fn into_object(value: Value) -> Result<Record, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidBody(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}
