//! Interactive batch control.
//!
//! While a batch runs, single-letter commands on stdin steer it: `p` pauses
//! the active job, `r` resumes it and `c` cancels the batch. Ctrl-C also
//! cancels. Both go through the [`BatchHandle`], so they reach whichever job
//! is running at that moment.

use anyhow::{Context, Result};
use intercut_core::BatchHandle;
use log::{debug, info};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

/// A command typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Cancel,
}

/// Parses one input line. Unknown input yields `None`.
#[must_use]
pub fn parse_control(line: &str) -> Option<ControlCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(ControlCommand::Pause),
        "r" | "resume" => Some(ControlCommand::Resume),
        "c" | "cancel" | "q" | "quit" => Some(ControlCommand::Cancel),
        _ => None,
    }
}

/// Forwards a command to the batch.
pub fn apply_control(handle: &BatchHandle, command: ControlCommand) {
    match command {
        ControlCommand::Pause => {
            info!("Pause requested");
            handle.pause();
        }
        ControlCommand::Resume => {
            info!("Resume requested");
            handle.resume();
        }
        ControlCommand::Cancel => {
            info!("Cancel requested");
            handle.cancel();
        }
    }
}

/// Reads commands from `input` until it ends or the batch is over.
pub fn run_control_loop(input: impl BufRead, handle: &BatchHandle) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if handle.state().terminal {
            break;
        }
        match parse_control(&line) {
            Some(command) => apply_control(handle, command),
            None if line.trim().is_empty() => {}
            None => debug!("Ignoring unknown control input {line:?}"),
        }
    }
}

/// Starts the stdin reader on a background thread.
///
/// The thread blocks on stdin, so it is left detached when the batch ends.
pub fn spawn_stdin_control(handle: BatchHandle) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("intercut-stdin".to_string())
        .spawn(move || run_control_loop(io::stdin().lock(), &handle))
        .context("Failed to start the stdin control thread")
}

/// Makes Ctrl-C cancel the batch.
pub fn install_ctrlc(handle: BatchHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        if handle.is_cancelled() {
            return;
        }
        eprintln!("\nCancelling; waiting for the current job to stop...");
        handle.cancel();
    })
    .context("Failed to install the Ctrl-C handler")
}
