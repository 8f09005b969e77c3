//! Progress tracking for a running cut.
//!
//! [`parser`] turns output lines into signals; [`ProgressTracker`] folds them
//! into a [`ProgressSnapshot`] and decides when a snapshot is worth emitting.
//! Elapsed time and percent never go backwards, and an emission happens only
//! when the whole-number percent strictly increases.

pub mod parser;

use serde::Serialize;

pub use parser::{LineSignal, parse_elapsed, parse_frame, parse_line};

/// Point-in-time view of a job's progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub elapsed_secs: f64,
    /// Probed input duration.
    pub total_secs: f64,
    /// 0..=100
    pub percent: u8,
    pub frame: Option<u64>,
}

/// `min(100, floor(elapsed / total * 100))`, with zero for a zero total.
#[must_use]
pub fn percent_of(elapsed_secs: f64, total_secs: f64) -> u8 {
    if total_secs.is_nan() || total_secs <= 0.0 || !elapsed_secs.is_finite() {
        return 0;
    }
    let percent = (elapsed_secs / total_secs * 100.0).floor();
    percent.clamp(0.0, 100.0) as u8
}

/// Accumulates parser signals for one job.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    current: ProgressSnapshot,
    last_emitted_percent: Option<u8>,
    last_emitted_frame: Option<u64>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(total_secs: f64) -> Self {
        Self {
            current: ProgressSnapshot {
                elapsed_secs: 0.0,
                total_secs,
                percent: 0,
                frame: None,
            },
            last_emitted_percent: None,
            last_emitted_frame: None,
        }
    }

    /// The snapshot after the most recent line, emitted or not.
    #[must_use]
    pub fn latest(&self) -> ProgressSnapshot {
        self.current
    }

    /// Folds a signal in. Returns the snapshot when its percent is new.
    pub fn observe(&mut self, signal: LineSignal) -> Option<ProgressSnapshot> {
        if signal.is_empty() {
            return None;
        }

        if let Some(elapsed) = signal.elapsed.filter(|e| e.is_finite()) {
            let current = &mut self.current;
            current.elapsed_secs = current.elapsed_secs.max(elapsed);
            current.percent = current
                .percent
                .max(percent_of(current.elapsed_secs, current.total_secs));
        }
        if let Some(frame) = signal.frame {
            self.current.frame = Some(self.current.frame.map_or(frame, |f| f.max(frame)));
        }

        self.emit_if_new()
    }

    /// Forces the final 100% snapshot unless one was already emitted.
    pub fn complete(&mut self) -> Option<ProgressSnapshot> {
        if self.last_emitted_percent == Some(100) {
            return None;
        }
        self.current.percent = 100;
        self.current.elapsed_secs = self.current.elapsed_secs.max(self.current.total_secs);
        self.emit_if_new()
    }

    /// Returns the frame counter if it changed since the last call.
    pub fn take_frame_update(&mut self) -> Option<u64> {
        let frame = self.current.frame?;
        if self.last_emitted_frame == Some(frame) {
            return None;
        }
        self.last_emitted_frame = Some(frame);
        Some(frame)
    }

    fn emit_if_new(&mut self) -> Option<ProgressSnapshot> {
        let percent = self.current.percent;
        if self.last_emitted_percent.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last_emitted_percent = Some(percent);
        Some(self.current)
    }
}
