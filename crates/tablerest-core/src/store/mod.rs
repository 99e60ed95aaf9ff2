//! Resource store interface used by batch execution.
//!
//! The relational backend is an external collaborator; this crate only
//! defines the transaction surface a batch needs and ships an in-memory
//! implementation for the CLI and tests.

mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::batch::BatchOp;

pub use memory::MemoryStore;

/// Record identifier within a resource.
pub type RecordId = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: RecordId },
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// A store that hands out independent transactions.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One open transaction. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    /// Apply an operation inside the transaction and return the affected
    /// record (for deletes, the record as it was).
    async fn apply(&mut self, op: &BatchOp) -> Result<Value, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
