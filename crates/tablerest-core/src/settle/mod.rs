//! Phase-synchronized concurrent executor.
//!
//! Runs a set of independent async jobs, each split into sequential phases by
//! calls to [`PhaseHandle::phase_done`]. Every job still running finishes
//! phase N before any job starts phase N+1, and at most `concurrency` jobs
//! are admitted to a phase at a time; the rest queue and are admitted one by
//! one as admitted jobs finish the phase or terminate.
//!
//! The result is settle-all: one [`Settled`] per job, in input order, produced
//! only once every job has terminated. A failing or panicking job never
//! cancels the others.

mod coordinator;
mod handle;
mod outcome;
mod run;

use serde::{Deserialize, Serialize};

pub use handle::{JobId, PhaseHandle};
pub use outcome::{JobFailure, Settled};
pub use run::phase_synced_settle;

/// Executor options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleOptions {
    /// Maximum number of jobs admitted to a phase at once. 0 is treated as 1.
    pub concurrency: usize,
    /// Emit debug lines for phase starts, releases and job completions.
    pub debug: bool,
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            debug: false,
        }
    }
}

impl SettleOptions {
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }
}
