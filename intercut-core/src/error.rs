//! Error types for intercut-core.
//!
//! Every fallible operation in the crate returns [`CoreResult`]. The variants
//! mirror the failure taxonomy of a supervised job: probe failures, process
//! start and exit failures, user cancellation and post-cancel cleanup.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors produced by the core library.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Media metadata could not be read or did not contain a usable duration.
    #[error("Failed to probe '{path}': {reason}")]
    Probe { path: String, reason: String },

    /// The encoder capability query failed. Absorbed by the encoder selector.
    #[error("Encoder capability probe failed: {0}")]
    EncoderProbe(String),

    #[error("Failed to start '{0}': {1}")]
    ProcessSpawn(String, #[source] io::Error),

    #[error("'{command}' exited with {}: {stderr_tail}", describe_exit(.code))]
    ProcessExit {
        command: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Failed while waiting for '{0}': {1}")]
    ProcessWait(String, #[source] io::Error),

    #[error("Process control '{action}' failed: {reason}")]
    ProcessControl { action: &'static str, reason: String },

    /// Not a fault: the job or batch was stopped on request.
    #[error("Cancelled by user")]
    CancelledByUser,

    /// Partial output could not be removed after a cancel or failure.
    #[error("Could not remove partial output '{path}': {reason}")]
    CleanupWarning { path: String, reason: String },

    #[error("Invalid job request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Required dependency not found: {0}")]
    DependencyNotFound(String),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("No processable video files found")]
    NoFilesFound,

    #[error("Supervisor error: {0}")]
    Supervisor(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Builds the error for a process that could not be started.
pub fn command_start_error(command: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::ProcessSpawn(command.into(), err)
}

/// Builds the error for a process that exited unsuccessfully.
pub fn command_failed_error(
    command: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::ProcessExit {
        command: command.into(),
        code: status.code(),
        stderr_tail: stderr.into(),
    }
}

/// Builds the error for a failed `wait()` on a child process.
pub fn command_wait_error(command: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::ProcessWait(command.into(), err)
}
