//! Lifecycle and progress events.
//!
//! Supervisors and the batch sequencer push [`JobEvent`]s into a crossbeam
//! channel in the order they happen. A front-end drains the channel through
//! an [`EventDispatcher`], which fans each event out to its handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::Serialize;

use crate::batch::BatchSummary;
use crate::encoder::EncoderChoice;
use crate::progress::ProgressSnapshot;
use crate::supervisor::JobState;

pub mod json_handler;

pub use json_handler::JsonEventHandler;

/// An event tagged with the zero-based index of the job it concerns.
///
/// Batch-level events carry the index of the job that was active (or next)
/// when they were produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job: usize,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    StateChanged {
        from: JobState,
        to: JobState,
    },

    EncoderSelected {
        choice: EncoderChoice,
        /// Shell-quoted command line that is about to run.
        command: String,
    },

    Progress(ProgressSnapshot),

    /// Informational frame counter, sent alongside progress changes.
    Frame {
        frame: u64,
    },

    // Terminal job events
    Completed {
        output: PathBuf,
        output_size: u64,
    },

    Failed {
        message: String,
        exit_code: Option<i32>,
        stderr_tail: Vec<String>,
    },

    Cancelled {
        /// Set when the partial output could not be removed.
        cleanup_warning: Option<String>,
    },

    // Batch events
    BatchStarted {
        total: usize,
    },

    JobStarted {
        input: PathBuf,
        output: PathBuf,
        total: usize,
    },

    BatchComplete(BatchSummary),

    BatchCancelled(BatchSummary),
}

impl JobEventKind {
    /// True for the events that end a single job.
    #[must_use]
    pub fn is_job_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &JobEvent);
}

pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: &JobEvent) {
        for handler in &self.handlers {
            handler.handle(event);
        }
    }

    /// Forwards events until every sender is gone. Returns how many were seen.
    pub fn pump(&self, events: &Receiver<JobEvent>) -> usize {
        let mut count = 0;
        for event in events.iter() {
            self.emit(&event);
            count += 1;
        }
        count
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
