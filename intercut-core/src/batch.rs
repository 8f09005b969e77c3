//! Sequential batch execution.
//!
//! A [`BatchSequencer`] runs its requests one after another, never more than
//! one ffmpeg at a time, and moves on only after the current job reached a
//! terminal state. A failed item is reported and the batch carries on. The
//! [`BatchHandle`] steers whichever job is active; cancelling it stops
//! further dispatch and leaves finished items untouched.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{info, warn};
use serde::Serialize;

use crate::command::JobRequest;
use crate::error::{CoreError, CoreResult};
use crate::events::{JobEvent, JobEventKind};
use crate::supervisor::{JobController, JobOutcome, JobSupervisor, Toolchain};

/// Progress of a batch through its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchState {
    pub total: usize,
    /// Index of the job being run, or of the last one run.
    pub current: Option<usize>,
    pub terminal: bool,
}

/// Result of one batch item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
    /// `None` when the batch was cancelled before the item was dispatched.
    pub outcome: Option<JobOutcome>,
}

/// Totals for a finished or cancelled batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub not_started: usize,
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    fn from_items(items: Vec<BatchItem>) -> Self {
        let mut summary = Self {
            completed: 0,
            failed: 0,
            cancelled: 0,
            not_started: 0,
            items: Vec::new(),
        };
        for item in &items {
            match item.outcome {
                Some(JobOutcome::Completed { .. }) => summary.completed += 1,
                Some(JobOutcome::Failed { .. }) => summary.failed += 1,
                Some(JobOutcome::Cancelled) => summary.cancelled += 1,
                None => summary.not_started += 1,
            }
        }
        summary.items = items;
        summary
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// True when every item completed.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.completed == self.items.len()
    }
}

struct BatchShared {
    state: Mutex<BatchState>,
    active: Mutex<Option<JobController>>,
    cancel_requested: AtomicBool,
    /// Shared with each job as its pause gate, so a pause issued while the
    /// job is still probing takes effect once the encoder starts.
    pause_requested: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl BatchShared {
    fn cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    fn active(&self) -> Option<JobController> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active(&self, controller: Option<JobController>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = controller;
    }

    fn update_state(&self, update: impl FnOnce(&mut BatchState)) {
        update(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Sleeps up to `timeout`, returning early once the batch is cancelled.
    fn sleep(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !self.cancelled() {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            // Woken by any control request; stale wake-ups just loop again.
            let _ = self.wake_rx.recv_timeout(deadline - now);
        }
    }

    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }
}

/// Cloneable handle for steering a running batch.
#[derive(Clone)]
pub struct BatchHandle {
    shared: Arc<BatchShared>,
}

impl BatchHandle {
    /// Pauses the active job and holds back the next one until resumed.
    pub fn pause(&self) {
        self.shared.pause_requested.store(true, Ordering::SeqCst);
        if let Some(job) = self.shared.active() {
            job.pause();
        }
    }

    pub fn resume(&self) {
        self.shared.pause_requested.store(false, Ordering::SeqCst);
        if let Some(job) = self.shared.active() {
            job.resume();
        }
        self.shared.wake();
    }

    /// Cancels the active job and stops dispatching new ones.
    pub fn cancel(&self) {
        self.shared.cancel_requested.store(true, Ordering::SeqCst);
        if let Some(job) = self.shared.active() {
            job.cancel();
        }
        self.shared.wake();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled()
    }

    #[must_use]
    pub fn state(&self) -> BatchState {
        *self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Controller of the job currently running, if any.
    #[must_use]
    pub fn active_job(&self) -> Option<JobController> {
        self.shared.active()
    }
}

/// Runs a list of cut requests one at a time.
pub struct BatchSequencer {
    requests: Vec<JobRequest>,
    toolchain: Arc<Toolchain>,
    events: Sender<JobEvent>,
    shared: Arc<BatchShared>,
}

impl BatchSequencer {
    /// Creates a sequencer. Fails with `NoFilesFound` for an empty list.
    pub fn new(
        requests: Vec<JobRequest>,
        toolchain: Arc<Toolchain>,
        events: Sender<JobEvent>,
    ) -> CoreResult<Self> {
        if requests.is_empty() {
            return Err(CoreError::NoFilesFound);
        }
        let (wake_tx, wake_rx) = bounded(1);
        let shared = Arc::new(BatchShared {
            state: Mutex::new(BatchState {
                total: requests.len(),
                current: None,
                terminal: false,
            }),
            active: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            pause_requested: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        });
        Ok(Self {
            requests,
            toolchain,
            events,
            shared,
        })
    }

    #[must_use]
    pub fn handle(&self) -> BatchHandle {
        BatchHandle {
            shared: self.shared.clone(),
        }
    }

    fn emit(&self, job: usize, kind: JobEventKind) {
        let _ = self.events.send(JobEvent { job, kind });
    }

    /// Runs every request in order and returns the summary.
    ///
    /// Emits `BatchComplete` when every item ran, or `BatchCancelled` when a
    /// cancel cut the batch short.
    pub fn run(self) -> BatchSummary {
        let total = self.requests.len();
        let delay = self.toolchain.config().inter_job_delay;
        info!("Starting batch of {total} job(s)");
        self.emit(0, JobEventKind::BatchStarted { total });

        let mut outcomes: Vec<Option<JobOutcome>> = vec![None; total];
        for (index, request) in self.requests.iter().enumerate() {
            if index > 0 && !delay.is_zero() && !self.shared.cancelled() {
                self.shared.sleep(delay);
            }
            self.hold_while_paused();
            if self.shared.cancelled() {
                info!("Batch cancelled; {} job(s) not started", total - index);
                break;
            }

            self.shared.update_state(|state| state.current = Some(index));
            self.emit(
                index,
                JobEventKind::JobStarted {
                    input: request.input().to_path_buf(),
                    output: request.output().to_path_buf(),
                    total,
                },
            );
            outcomes[index] = Some(self.run_job(index, request));
        }

        let items = self
            .requests
            .iter()
            .zip(outcomes)
            .map(|(request, outcome)| BatchItem {
                input: request.input().to_path_buf(),
                output: request.output().to_path_buf(),
                outcome,
            })
            .collect();
        let summary = BatchSummary::from_items(items);
        self.shared.update_state(|state| state.terminal = true);

        let last = self.handle().state().current.unwrap_or(0);
        info!(
            "Batch finished: {} completed, {} failed, {} cancelled, {} not started",
            summary.completed, summary.failed, summary.cancelled, summary.not_started
        );
        if self.shared.cancelled() {
            self.emit(last, JobEventKind::BatchCancelled(summary.clone()));
        } else {
            self.emit(last, JobEventKind::BatchComplete(summary.clone()));
        }
        summary
    }

    fn run_job(&self, index: usize, request: &JobRequest) -> JobOutcome {
        let mut supervisor = JobSupervisor::new(
            index,
            request.clone(),
            self.toolchain.clone(),
            self.events.clone(),
        )
        .with_pause_gate(self.shared.pause_requested.clone());
        let controller = supervisor.controller();
        self.shared.set_active(Some(controller.clone()));

        let outcome = match supervisor.start() {
            Ok(()) => {
                // A cancel that raced the hand-over must still reach the job.
                if self.shared.cancelled() {
                    controller.cancel();
                }
                supervisor.wait().unwrap_or_else(|e| {
                    let outcome = JobOutcome::failed(e.to_string());
                    self.emit(index, outcome.event_kind(None));
                    outcome
                })
            }
            Err(e) => JobOutcome::failed(e.to_string()),
        };
        self.shared.set_active(None);

        if let JobOutcome::Failed { message, .. } = &outcome {
            warn!("Job {index} failed: {message}; continuing with the batch");
        }
        outcome
    }

    fn hold_while_paused(&self) {
        let poll = self.toolchain.config().pause_poll_interval;
        while self.shared.pause_requested.load(Ordering::SeqCst) && !self.shared.cancelled() {
            self.shared.sleep(poll);
        }
    }
}
