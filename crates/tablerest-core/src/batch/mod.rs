//! Batched multi-operation transactions.
//!
//! Each operation runs as one job of the phase-synced executor with its own
//! transaction:
//! phase 0 begins the transaction and applies the operation; after the
//! barrier, phase 1 commits, or rolls back when the batch is atomic and any
//! operation failed in phase 0.

mod op;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::settle::{phase_synced_settle, JobFailure, PhaseHandle, SettleOptions, Settled};
use crate::store::{ResourceStore, StoreError};

pub use op::BatchOp;

/// Batch execution options (the `[batch]` config section).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Maximum operations admitted to a phase at once.
    pub concurrency: usize,
    /// Trace executor lifecycle events.
    pub debug: bool,
    /// Roll back every operation if any fails to apply.
    pub atomic: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            debug: false,
            atomic: true,
        }
    }
}

impl BatchOptions {
    pub fn settle_options(&self) -> SettleOptions {
        SettleOptions {
            concurrency: self.concurrency,
            debug: self.debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("aborted: another operation in the batch failed")]
    Aborted,
}

/// Settled outcome of one batch operation.
pub type OpOutcome = Settled<Value, JobFailure<BatchError>>;

/// Run `ops` against `store`, returning one outcome per op in input order.
pub async fn run_batch<S>(store: Arc<S>, ops: Vec<BatchOp>, options: BatchOptions) -> Vec<OpOutcome>
where
    S: ResourceStore + ?Sized + 'static,
{
    let failed = Arc::new(AtomicBool::new(false));
    let count = ops.len();
    tracing::info!(
        ops = count,
        concurrency = options.concurrency,
        atomic = options.atomic,
        "running batch"
    );

    let jobs = ops.into_iter().map(|op| {
        let store = Arc::clone(&store);
        let failed = Arc::clone(&failed);
        let atomic = options.atomic;
        move |handle: PhaseHandle| run_op(handle, store, op, failed, atomic)
    });
    let outcomes = phase_synced_settle(jobs, options.settle_options()).await;

    let fulfilled = outcomes.iter().filter(|o| o.is_fulfilled()).count();
    tracing::info!(
        fulfilled,
        rejected = count - fulfilled,
        "batch settled"
    );
    outcomes
}

async fn run_op<S>(
    mut handle: PhaseHandle,
    store: Arc<S>,
    op: BatchOp,
    failed: Arc<AtomicBool>,
    atomic: bool,
) -> Result<Value, BatchError>
where
    S: ResourceStore + ?Sized,
{
    let mut tx = match store.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            failed.store(true, Ordering::SeqCst);
            return Err(e.into());
        }
    };
    let value = match tx.apply(&op).await {
        Ok(value) => value,
        Err(e) => {
            failed.store(true, Ordering::SeqCst);
            tracing::warn!(job = %handle.id(), op = %op, "apply failed: {}", e);
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(job = %handle.id(), op = %op, "rollback after failed apply: {}", rollback);
            }
            return Err(e.into());
        }
    };
    tracing::debug!(job = %handle.id(), op = %op, "applied");

    handle.phase_done().await;

    if atomic && failed.load(Ordering::SeqCst) {
        tx.rollback().await?;
        tracing::debug!(job = %handle.id(), op = %op, "rolled back");
        return Err(BatchError::Aborted);
    }
    tx.commit().await?;
    tracing::debug!(job = %handle.id(), op = %op, "committed");
    Ok(value)
}
