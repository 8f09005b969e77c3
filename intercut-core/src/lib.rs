//! Core library for supervised ffmpeg interval cuts.
//!
//! An interval cut keeps the first `take` seconds of every `take + skip`
//! second cycle of a video and drops the rest. This crate probes the input,
//! picks an H.264 encoder for the host, builds the ffmpeg command, runs it
//! under a [`JobSupervisor`] with pause/resume/cancel, and reports progress
//! and lifecycle changes as [`JobEvent`]s. [`BatchSequencer`] runs several
//! cuts one after another.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use intercut_core::events::{EventDispatcher, JsonEventHandler};
//! use intercut_core::{BatchSequencer, CoreConfig, JobRequest, Toolchain};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::new();
//! config.validate().unwrap();
//! let toolchain = Arc::new(Toolchain::from_config(config));
//!
//! let files = intercut_core::find_processable_files(Path::new("/videos")).unwrap();
//! let requests = files
//!     .iter()
//!     .map(|f| JobRequest::in_dir(f, Path::new("/videos/cuts"), 5, 10))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let sequencer = BatchSequencer::new(requests, toolchain, tx).unwrap();
//! let batch = std::thread::spawn(move || sequencer.run());
//!
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.add_handler(Arc::new(JsonEventHandler::new()));
//! dispatcher.pump(&rx);
//! let summary = batch.join().unwrap();
//! println!("{} of {} cuts completed", summary.completed, summary.total());
//! ```

pub mod batch;
pub mod command;
pub mod config;
pub mod discovery;
pub mod encoder;
pub mod error;
pub mod events;
pub mod external;
pub mod progress;
pub mod supervisor;
pub mod utils;

// Re-exports for public API
pub use batch::{BatchHandle, BatchItem, BatchSequencer, BatchState, BatchSummary};
pub use command::{CutCycle, JobRequest, build_cut_args, command_preview, output_file_name};
pub use config::{CoreConfig, CoreConfigBuilder};
pub use discovery::{collect_inputs, find_processable_files};
pub use encoder::{EncoderChoice, EncoderId, EncoderTuning, HwAccel, Platform, select_encoder};
pub use error::{CoreError, CoreResult};
pub use events::{EventDispatcher, EventHandler, JobEvent, JobEventKind};
pub use external::{MediaSummary, check_dependency, resolve_tool};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use supervisor::{JobController, JobOutcome, JobState, JobSupervisor, Toolchain};
pub use utils::{format_bytes, format_duration};
