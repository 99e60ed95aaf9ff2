//! Coordinator state machine: admission within a phase and the phase barrier.
//!
//! All state is owned here and mutated only by [`Coordinator::handle`], which
//! the settle future calls once per incoming event. Jobs never touch it.

use std::collections::{BTreeMap, HashSet, VecDeque};
use tokio::sync::mpsc;

use super::handle::{Event, JobId};

pub(super) struct Coordinator {
    phase: u64,
    concurrency: usize,
    debug: bool,
    /// Jobs that have not terminated, with their private ready channels.
    /// Ordered by id, which is input order.
    jobs: BTreeMap<JobId, mpsc::UnboundedSender<()>>,
    /// Active jobs not yet released in this phase because the cap was reached.
    queued: VecDeque<JobId>,
    /// Active jobs (released or queued) that have not finished this phase.
    phase_pending: HashSet<JobId>,
}

impl Coordinator {
    pub(super) fn new(
        ready: Vec<(JobId, mpsc::UnboundedSender<()>)>,
        concurrency: usize,
        debug: bool,
    ) -> Self {
        Self {
            phase: 0,
            concurrency: concurrency.max(1),
            debug,
            jobs: ready.into_iter().collect(),
            queued: VecDeque::new(),
            phase_pending: HashSet::new(),
        }
    }

    pub(super) fn phase(&self) -> u64 {
        self.phase
    }

    pub(super) fn is_finished(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Process events until every job has terminated.
    pub(super) async fn drive(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        self.start_phase();
        while !self.is_finished() {
            match events.recv().await {
                Some(event) => self.handle(event),
                None => {
                    tracing::warn!(
                        active = self.jobs.len(),
                        "event channel closed before all jobs finished"
                    );
                    break;
                }
            }
        }
        if self.debug {
            tracing::debug!(phases = self.phase() + 1, "all jobs settled");
        }
    }

    pub(super) fn handle(&mut self, event: Event) {
        match event {
            Event::PhaseDone { id, phase } => self.on_phase_done(id, phase),
            Event::JobDone { id } => self.on_job_done(id),
        }
    }

    /// Snapshot the active jobs, release the first `concurrency` of them and
    /// queue the rest. Every active job is pending until it reports.
    pub(super) fn start_phase(&mut self) {
        if self.jobs.is_empty() {
            return;
        }
        let snapshot: Vec<JobId> = self.jobs.keys().copied().collect();
        self.phase_pending = snapshot.iter().copied().collect();
        self.queued.clear();
        if self.debug {
            tracing::debug!(
                phase = self.phase,
                active = snapshot.len(),
                concurrency = self.concurrency,
                "phase start"
            );
        }
        for (i, id) in snapshot.into_iter().enumerate() {
            if i < self.concurrency {
                self.release(id);
            } else {
                self.queued.push_back(id);
            }
        }
    }

    fn on_phase_done(&mut self, id: JobId, phase: u64) {
        if phase != self.phase {
            tracing::warn!(job = %id, phase, current = self.phase, "ignoring phase-done for another phase");
            return;
        }
        if !self.phase_pending.remove(&id) {
            tracing::warn!(job = %id, phase, "ignoring duplicate phase-done");
            return;
        }
        if self.debug {
            tracing::debug!(job = %id, phase, pending = self.phase_pending.len(), "phase done");
        }
        self.slot_freed();
    }

    fn on_job_done(&mut self, id: JobId) {
        self.jobs.remove(&id);
        self.queued.retain(|queued| *queued != id);
        let was_pending = self.phase_pending.remove(&id);
        if self.debug {
            tracing::debug!(job = %id, phase = self.phase, remaining = self.jobs.len(), "job done");
        }
        if was_pending {
            self.slot_freed();
        }
    }

    /// One admitted job left the phase: advance if nobody is pending,
    /// otherwise admit the next queued job.
    fn slot_freed(&mut self) {
        if self.phase_pending.is_empty() {
            if !self.jobs.is_empty() {
                self.phase += 1;
                self.start_phase();
            }
        } else if let Some(next) = self.queued.pop_front() {
            self.release(next);
        }
    }

    fn release(&self, id: JobId) {
        let Some(ready) = self.jobs.get(&id) else {
            return;
        };
        if self.debug {
            tracing::debug!(job = %id, phase = self.phase, "release");
        }
        let _ = ready.send(());
    }
}
