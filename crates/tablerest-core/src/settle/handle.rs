//! Per-job handle: phase boundary crossing and completion notification.

use std::fmt;
use tokio::sync::mpsc;

/// Opaque identity of a job within one executor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub(super) usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Job -> coordinator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Event {
    /// The job finished `phase` and is now waiting to be released.
    PhaseDone { id: JobId, phase: u64 },
    /// The job terminated (returned, failed or panicked).
    JobDone { id: JobId },
}

/// Handed to every job; the only way a job interacts with the coordinator.
#[derive(Debug)]
pub struct PhaseHandle {
    id: JobId,
    /// Boundary crossings so far. The executor performs the first one (the
    /// phase-0 release) before the job body runs.
    crossings: u64,
    ready: mpsc::UnboundedReceiver<()>,
    events: mpsc::UnboundedSender<Event>,
}

impl PhaseHandle {
    pub(super) fn new(
        id: JobId,
        ready: mpsc::UnboundedReceiver<()>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            id,
            crossings: 0,
            ready,
            events,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Index of the phase the job is currently executing (0-based).
    pub fn phase(&self) -> u64 {
        self.crossings.saturating_sub(1)
    }

    /// Mark the end of the current phase and wait until the coordinator
    /// releases this job into the next one.
    ///
    /// The ready channel exists from construction, so a release sent before
    /// this call starts waiting is buffered rather than lost.
    pub async fn phase_done(&mut self) {
        if self.crossings > 0 {
            let _ = self.events.send(Event::PhaseDone {
                id: self.id,
                phase: self.phase(),
            });
        }
        self.crossings += 1;
        if self.ready.recv().await.is_none() {
            tracing::debug!(job = %self.id, "coordinator gone; proceeding without release");
        }
    }
}

/// Sends `JobDone` when dropped, whether the job returned or panicked.
pub(super) struct DoneGuard {
    pub(super) id: JobId,
    pub(super) events: mpsc::UnboundedSender<Event>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.events.send(Event::JobDone { id: self.id });
    }
}
