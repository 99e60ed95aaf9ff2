//! Entry point: spawn jobs, drive the coordinator, collect settled results.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::coordinator::Coordinator;
use super::handle::{DoneGuard, JobId, PhaseHandle};
use super::outcome::{JobFailure, Settled};
use super::SettleOptions;

/// Aborts every job task still running when dropped.
struct AbortOnDrop<R>(Vec<JoinHandle<R>>);

impl<R> Drop for AbortOnDrop<R> {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Run `jobs` with phase barriers and a per-phase admission cap, returning
/// every job's outcome in input order once all of them have terminated.
///
/// Each job receives its [`PhaseHandle`] and starts only when the coordinator
/// releases it into phase 0. Calling [`PhaseHandle::phase_done`] ends the
/// current phase; the call returns once every other active job has finished
/// that phase too and this job has been admitted to the next one.
///
/// Dropping the returned future aborts all job tasks.
pub async fn phase_synced_settle<I, F, Fut, T, E>(
    jobs: I,
    options: SettleOptions,
) -> Vec<Settled<T, JobFailure<E>>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(PhaseHandle) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut tasks = AbortOnDrop(Vec::new());
    let mut ready = Vec::new();

    for (index, job) in jobs.into_iter().enumerate() {
        let id = JobId(index);
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        ready.push((id, ready_tx));

        let mut handle = PhaseHandle::new(id, ready_rx, events_tx.clone());
        let done = DoneGuard {
            id,
            events: events_tx.clone(),
        };
        tasks.0.push(tokio::spawn(async move {
            let _done = done;
            handle.phase_done().await;
            job(handle).await
        }));
    }
    // Only jobs hold senders now, so a closed channel means every job is gone.
    drop(events_tx);

    if options.debug {
        tracing::debug!(
            jobs = ready.len(),
            concurrency = options.concurrency,
            "phase-synced settle start"
        );
    }
    Coordinator::new(ready, options.concurrency, options.debug)
        .drive(events_rx)
        .await;

    let mut results = Vec::with_capacity(tasks.0.len());
    for task in tasks.0.drain(..) {
        let settled = match task.await {
            Ok(Ok(value)) => Settled::Fulfilled { value },
            Ok(Err(e)) => Settled::Rejected {
                reason: JobFailure::Failed(e),
            },
            Err(err) => Settled::Rejected {
                reason: JobFailure::from_join_error(err),
            },
        };
        results.push(settled);
    }
    results
}
