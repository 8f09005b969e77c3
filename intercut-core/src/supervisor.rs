// ============================================================================
// intercut-core/src/supervisor.rs
// ============================================================================
//
// JOB SUPERVISOR: One ffmpeg Cut, From Probe to Terminal Event
//
// A JobSupervisor owns a single job. `start()` moves it out of Idle and hands
// the work to a dedicated worker thread, which probes the input, picks the
// encoder, spawns ffmpeg and reads its `-progress` output line by line. The
// caller keeps a JobController to pause, resume or cancel while that runs.
//
// STATE MACHINE:
//
//   Idle -> Probing -> Running <-> Paused
//             |          |          |
//             |          +----------+--> Cancelling -> Cancelled
//             +-----------------------------^
//   Probing/Running/Paused -> Failed,  Running -> Completed
//
// Every transition happens under the state lock and its StateChanged event is
// sent while the lock is held, so events leave in transition order and the
// terminal event is always the last one for the job.
//
// THREADS:
// - caller: start/pause/resume/cancel; delivers signals directly
// - worker: probe, spawn, read loop, exit handling, cleanup
// - stderr drain: keeps the child from blocking on a full stderr pipe
// - cancel watchdog: kills the child when it outlives the grace period

use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use serde::Serialize;

use crate::command::{JobRequest, build_cut_args, command_preview};
use crate::config::CoreConfig;
use crate::encoder::{
    CapabilityProbe, EncoderChoice, EncoderSelector, FfmpegCapabilityProbe, Platform,
};
use crate::error::{CoreError, CoreResult};
use crate::events::{JobEvent, JobEventKind};
use crate::external::{
    CrateFfprobeExecutor, FfprobeExecutor, ProcessControl, ProcessExit, ProcessSpawner,
    SidecarSpawner, TranscodeProcess,
};
use crate::progress::{ProgressSnapshot, ProgressTracker, parse_line};
use crate::utils::estimated_output_secs;

#[cfg(test)]
mod tests;

// ============================================================================
// TOOLCHAIN
// ============================================================================

/// External collaborators shared by every job of a run.
///
/// The encoder choice is cached here, so a batch probes ffmpeg's encoder list
/// once no matter how many jobs it runs.
pub struct Toolchain {
    config: CoreConfig,
    probe: Arc<dyn FfprobeExecutor>,
    spawner: Arc<dyn ProcessSpawner>,
    selector: EncoderSelector,
}

impl Toolchain {
    /// Production toolchain: ffprobe crate, `ffmpeg -encoders`, ffmpeg-sidecar.
    #[must_use]
    pub fn from_config(config: CoreConfig) -> Self {
        let probe = Arc::new(CrateFfprobeExecutor::new(&config.ffprobe_path));
        let capabilities = Arc::new(FfmpegCapabilityProbe::new(&config.ffmpeg_path));
        Self::with_backends(
            config,
            Platform::current(),
            probe,
            capabilities,
            Arc::new(SidecarSpawner),
        )
    }

    /// Toolchain with explicit backends.
    #[must_use]
    pub fn with_backends(
        config: CoreConfig,
        platform: Platform,
        probe: Arc<dyn FfprobeExecutor>,
        capabilities: Arc<dyn CapabilityProbe>,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> Self {
        let selector = EncoderSelector::new(capabilities, platform, config.software_only);
        Self {
            config,
            probe,
            spawner,
            selector,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    #[must_use]
    pub fn probe(&self) -> &dyn FfprobeExecutor {
        self.probe.as_ref()
    }

    /// The encoder for this run. Probes on first call.
    pub fn encoder(&self) -> EncoderChoice {
        self.selector.choose()
    }

    /// Argument vector for `request` with the run's encoder.
    pub fn cut_args(&self, request: &JobRequest) -> Vec<String> {
        build_cut_args(request, &self.encoder(), &self.config.tuning)
    }

    /// Shell-quoted command line that `request` would run.
    pub fn preview(&self, request: &JobRequest) -> String {
        command_preview(&self.config.ffmpeg_path, &self.cut_args(request))
    }
}

// ============================================================================
// STATE AND OUTCOME
// ============================================================================

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Probing,
    Running,
    Paused,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The legal transition table.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use JobState::{Cancelled, Cancelling, Completed, Failed, Idle, Paused, Probing, Running};
        matches!(
            (self, next),
            (Idle, Probing)
                | (Probing, Running | Failed | Cancelling)
                | (Running, Paused | Cancelling | Completed | Failed)
                | (Paused, Running | Cancelling | Failed)
                | (Cancelling, Cancelled)
        )
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        output: PathBuf,
        output_size: u64,
    },
    Failed {
        message: String,
        exit_code: Option<i32>,
        stderr_tail: Vec<String>,
    },
    Cancelled,
}

impl JobOutcome {
    /// The terminal state this outcome corresponds to.
    #[must_use]
    pub fn state(&self) -> JobState {
        match self {
            Self::Completed { .. } => JobState::Completed,
            Self::Failed { .. } => JobState::Failed,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            exit_code: None,
            stderr_tail: Vec::new(),
        }
    }

    pub(crate) fn event_kind(&self, cleanup_warning: Option<String>) -> JobEventKind {
        match self {
            Self::Completed {
                output,
                output_size,
            } => JobEventKind::Completed {
                output: output.clone(),
                output_size: *output_size,
            },
            Self::Failed {
                message,
                exit_code,
                stderr_tail,
            } => JobEventKind::Failed {
                message: message.clone(),
                exit_code: *exit_code,
                stderr_tail: stderr_tail.clone(),
            },
            Self::Cancelled => JobEventKind::Cancelled { cleanup_warning },
        }
    }
}

// ============================================================================
// SHARED STATE
// ============================================================================

struct Shared {
    job: usize,
    state: Mutex<JobState>,
    control: Mutex<Option<Arc<dyn ProcessControl>>>,
    cancel_requested: AtomicBool,
    latest: Mutex<Option<ProgressSnapshot>>,
    events: Sender<JobEvent>,
    poll_interval: Duration,
    termination_grace: Duration,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attached_control(&self) -> Option<Arc<dyn ProcessControl>> {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    fn emit(&self, kind: JobEventKind) {
        // Subscribers may have gone away; the job still runs to completion.
        let _ = self.events.send(JobEvent {
            job: self.job,
            kind,
        });
    }

    /// Moves `state` to `next` and announces it. Illegal moves are ignored.
    fn transition(&self, state: &mut MutexGuard<'_, JobState>, next: JobState) -> bool {
        let from = **state;
        if !from.can_transition_to(next) {
            debug!("Job {}: ignoring transition {:?} -> {:?}", self.job, from, next);
            return false;
        }
        **state = next;
        debug!("Job {}: {:?} -> {:?}", self.job, from, next);
        self.emit(JobEventKind::StateChanged { from, to: next });
        true
    }

    /// Stops the encoder and moves Running to Paused.
    fn suspend(&self, state: &mut MutexGuard<'_, JobState>, control: &dyn ProcessControl) {
        match control.suspend() {
            Ok(()) => {
                self.transition(state, JobState::Paused);
                info!("Job {} paused", self.job);
            }
            Err(e) => warn!("Job {}: pause failed: {}", self.job, e),
        }
    }

    fn set_latest(&self, snapshot: ProgressSnapshot) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    fn latest(&self) -> Option<ProgressSnapshot> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Cloneable handle for steering a running job from other threads.
#[derive(Clone)]
pub struct JobController {
    shared: Arc<Shared>,
}

impl JobController {
    #[must_use]
    pub fn job(&self) -> usize {
        self.shared.job
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        *self.shared.lock_state()
    }

    /// The most recent progress, including lines that did not emit an event.
    #[must_use]
    pub fn latest_progress(&self) -> Option<ProgressSnapshot> {
        self.shared.latest()
    }

    /// Suspends a running encoder. No-op in any other state.
    pub fn pause(&self) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if *state != JobState::Running {
            return;
        }
        let Some(control) = shared.attached_control() else {
            return;
        };
        shared.suspend(&mut state, control.as_ref());
    }

    /// Continues a paused encoder. No-op in any other state.
    pub fn resume(&self) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if *state != JobState::Paused {
            return;
        }
        if let Some(control) = shared.attached_control() {
            if let Err(e) = control.resume() {
                warn!("Job {}: resume failed: {}", shared.job, e);
            }
        }
        shared.transition(&mut state, JobState::Running);
        info!("Job {} resumed", shared.job);
    }

    /// Requests cancellation.
    ///
    /// During Probing the spawn is skipped. Once a process is attached it is
    /// asked to terminate right away and killed if it is still alive after
    /// the grace period. Has no effect before `start()` or after the job
    /// ended.
    pub fn cancel(&self) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        match *state {
            JobState::Probing | JobState::Running | JobState::Paused => {
                shared.cancel_requested.store(true, Ordering::SeqCst);
                shared.transition(&mut state, JobState::Cancelling);
                info!("Job {}: cancel requested", shared.job);
                if let Some(control) = shared.attached_control() {
                    terminate_with_watchdog(shared.clone(), control);
                }
            }
            _ => debug!("Job {}: cancel ignored in state {:?}", shared.job, *state),
        }
    }
}

/// Sends terminate now and arms a kill for when the grace period runs out.
fn terminate_with_watchdog(shared: Arc<Shared>, control: Arc<dyn ProcessControl>) {
    if let Err(e) = control.terminate() {
        warn!("Job {}: terminate failed: {}", shared.job, e);
    }

    let job = shared.job;
    let spawned = thread::Builder::new()
        .name(format!("intercut-watchdog-{job}"))
        .spawn(move || {
            let deadline = Instant::now() + shared.termination_grace;
            while !shared.lock_state().is_terminal() {
                if Instant::now() >= deadline {
                    warn!(
                        "Job {job}: encoder still running {:?} after cancel, killing it",
                        shared.termination_grace
                    );
                    if let Err(e) = control.kill() {
                        warn!("Job {job}: kill failed: {e}");
                    }
                    return;
                }
                thread::sleep(shared.poll_interval);
            }
        });
    if let Err(e) = spawned {
        warn!("Job {job}: could not start cancel watchdog: {e}");
    }
}

// ============================================================================
// SUPERVISOR
// ============================================================================

/// Supervises one cut job.
///
/// ```rust,no_run
/// use intercut_core::{CoreConfig, JobRequest, JobSupervisor, Toolchain};
/// use std::sync::Arc;
///
/// let toolchain = Arc::new(Toolchain::from_config(CoreConfig::default()));
/// let request = JobRequest::new("in.mp4", "out.mp4", 5, 10).unwrap();
/// let (tx, rx) = crossbeam_channel::unbounded();
///
/// let mut supervisor = JobSupervisor::new(0, request, toolchain, tx);
/// supervisor.start().unwrap();
/// for event in rx.iter() {
///     println!("{event:?}");
///     if event.kind.is_job_terminal() {
///         break;
///     }
/// }
/// let outcome = supervisor.wait().unwrap();
/// ```
pub struct JobSupervisor {
    request: JobRequest,
    toolchain: Arc<Toolchain>,
    controller: JobController,
    pause_gate: Option<Arc<AtomicBool>>,
    worker: Option<JoinHandle<JobOutcome>>,
}

impl JobSupervisor {
    /// Creates an idle supervisor for job number `job`.
    #[must_use]
    pub fn new(
        job: usize,
        request: JobRequest,
        toolchain: Arc<Toolchain>,
        events: Sender<JobEvent>,
    ) -> Self {
        let config = toolchain.config();
        let shared = Arc::new(Shared {
            job,
            state: Mutex::new(JobState::Idle),
            control: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            latest: Mutex::new(None),
            events,
            poll_interval: config.pause_poll_interval,
            termination_grace: config.termination_grace,
        });
        Self {
            request,
            toolchain,
            controller: JobController { shared },
            pause_gate: None,
            worker: None,
        }
    }

    /// Starts the encoder paused when `gate` is raised at the moment the
    /// process is attached.
    ///
    /// A pause requested while the job is still probing is otherwise
    /// dropped, since there is no process to stop yet.
    #[must_use]
    pub fn with_pause_gate(mut self, gate: Arc<AtomicBool>) -> Self {
        self.pause_gate = Some(gate);
        self
    }

    #[must_use]
    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    #[must_use]
    pub fn controller(&self) -> JobController {
        self.controller.clone()
    }

    /// Enters Probing and starts the worker thread.
    pub fn start(&mut self) -> CoreResult<()> {
        let shared = self.controller.shared.clone();
        {
            let mut state = shared.lock_state();
            if *state != JobState::Idle || self.worker.is_some() {
                return Err(CoreError::Supervisor(format!(
                    "job {} already started",
                    shared.job
                )));
            }
            shared.transition(&mut state, JobState::Probing);
        }
        info!(
            "Job {}: cutting {} -> {}",
            shared.job,
            self.request.input().display(),
            self.request.output().display()
        );

        let worker = Worker {
            shared: shared.clone(),
            request: self.request.clone(),
            toolchain: self.toolchain.clone(),
            pause_gate: self.pause_gate.clone(),
            spawned: false,
        };
        match thread::Builder::new()
            .name(format!("intercut-job-{}", shared.job))
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                let message = format!("could not start worker thread: {e}");
                let mut state = shared.lock_state();
                shared.transition(&mut state, JobState::Failed);
                shared.emit(JobOutcome::failed(message.clone()).event_kind(None));
                Err(CoreError::Supervisor(message))
            }
        }
    }

    pub fn pause(&self) {
        self.controller.pause();
    }

    pub fn resume(&self) {
        self.controller.resume();
    }

    pub fn cancel(&self) {
        self.controller.cancel();
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.controller.state()
    }

    #[must_use]
    pub fn latest_progress(&self) -> Option<ProgressSnapshot> {
        self.controller.latest_progress()
    }

    /// Blocks until the job reaches a terminal state.
    pub fn wait(mut self) -> CoreResult<JobOutcome> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| CoreError::Supervisor("job was never started".to_string()))?;
        worker
            .join()
            .map_err(|_| CoreError::Supervisor("job worker panicked".to_string()))
    }
}

// ============================================================================
// WORKER
// ============================================================================

/// How the worker wants the job to end, before a pending cancel is applied.
enum Ending {
    Completed,
    Failed {
        message: String,
        exit_code: Option<i32>,
        stderr_tail: Vec<String>,
    },
    Cancelled,
}

impl Ending {
    fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            exit_code: None,
            stderr_tail: Vec::new(),
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    request: JobRequest,
    toolchain: Arc<Toolchain>,
    pause_gate: Option<Arc<AtomicBool>>,
    /// Whether a child process was started, and so may have left output.
    spawned: bool,
}

impl Worker {
    fn run(mut self) -> JobOutcome {
        let mut tracker = None;
        let ending = self.supervise(&mut tracker);
        self.conclude(ending, tracker.as_mut())
    }

    fn supervise(&mut self, tracker_slot: &mut Option<ProgressTracker>) -> Ending {
        let shared = self.shared.clone();
        let input = self.request.input();

        let duration = match self.toolchain.probe().probe_duration(input) {
            Ok(duration) => duration,
            Err(e) => return Ending::failed(e.to_string()),
        };
        // Percent is measured against the probed input length; the output
        // timeline is shorter, and completion forces the final 100%.
        let cycle = self.request.cycle();
        let expected = estimated_output_secs(duration, cycle.take, cycle.skip);
        debug!(
            "Job {}: input duration {:.2}s, expected output {:.2}s",
            shared.job, duration, expected
        );
        if shared.cancelled() {
            return Ending::Cancelled;
        }

        let choice = self.toolchain.encoder();
        let args = self.toolchain.cut_args(&self.request);
        let preview = command_preview(&self.toolchain.config().ffmpeg_path, &args);
        info!("Job {}: encoding with {}", shared.job, choice);
        debug!("Job {}: {}", shared.job, preview);
        shared.emit(JobEventKind::EncoderSelected {
            choice,
            command: preview,
        });
        if shared.cancelled() {
            return Ending::Cancelled;
        }

        if let Some(parent) = self.request.output().parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    return Ending::failed(format!(
                        "could not create output directory {}: {e}",
                        parent.display()
                    ));
                }
            }
        }

        let mut process = match self
            .toolchain
            .spawner
            .spawn(&self.toolchain.config().ffmpeg_path, &args)
        {
            Ok(process) => process,
            Err(e) => return Ending::failed(e.to_string()),
        };
        self.spawned = true;

        let stderr_tail = process
            .take_stderr()
            .and_then(|stderr| drain_stderr(shared.job, stderr, self.toolchain.config().stderr_tail_lines));
        let Some(stdout) = process.take_stdout() else {
            if let Err(e) = process.control().kill() {
                warn!("Job {}: kill failed: {}", shared.job, e);
            }
            if let Err(e) = self.wait_for_exit(process.as_mut()) {
                warn!("Job {}: could not reap encoder: {}", shared.job, e);
            }
            return Ending::failed("encoder has no stdout to read progress from");
        };

        self.attach(process.control());

        let tracker = tracker_slot.insert(ProgressTracker::new(duration));
        let read_result = self.read_progress(stdout, tracker);

        let exit = self.wait_for_exit(process.as_mut());
        let stderr_tail = stderr_tail
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if shared.cancelled() {
            return Ending::Cancelled;
        }
        if let Err(e) = read_result {
            return Ending::Failed {
                message: format!("failed reading encoder output: {e}"),
                exit_code: None,
                stderr_tail,
            };
        }
        match exit {
            Ok(exit) if exit.success() => Ending::Completed,
            Ok(exit) => {
                let error = CoreError::ProcessExit {
                    command: "ffmpeg".to_string(),
                    code: exit.code,
                    stderr_tail: stderr_tail.last().cloned().unwrap_or_default(),
                };
                Ending::Failed {
                    message: error.to_string(),
                    exit_code: exit.code,
                    stderr_tail,
                }
            }
            Err(e) => Ending::Failed {
                message: e.to_string(),
                exit_code: None,
                stderr_tail,
            },
        }
    }

    /// Publishes the control capability and enters Running, or Paused when
    /// the pause gate was raised before the process existed.
    fn attach(&self, control: Arc<dyn ProcessControl>) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        *shared.control.lock().unwrap_or_else(PoisonError::into_inner) = Some(control.clone());
        if *state == JobState::Cancelling {
            // The cancel arrived while the process was being spawned.
            terminate_with_watchdog(shared.clone(), control);
            return;
        }
        if shared.transition(&mut state, JobState::Running)
            && self
                .pause_gate
                .as_ref()
                .is_some_and(|gate| gate.load(Ordering::SeqCst))
        {
            shared.suspend(&mut state, control.as_ref());
        }
    }

    fn read_progress(
        &self,
        stdout: Box<dyn Read + Send>,
        tracker: &mut ProgressTracker,
    ) -> std::io::Result<()> {
        let shared = &self.shared;
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            if shared.cancelled() {
                return Ok(());
            }
            self.idle_while_paused();
            if shared.cancelled() {
                return Ok(());
            }

            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => return Ok(()),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let line = String::from_utf8_lossy(&buf);
            let signal = parse_line(line.trim_end());
            if signal.is_empty() {
                continue;
            }
            let emitted = tracker.observe(signal);
            shared.set_latest(tracker.latest());
            if let Some(snapshot) = emitted {
                self.emit_progress(snapshot, tracker);
            }
        }
    }

    fn emit_progress(&self, snapshot: ProgressSnapshot, tracker: &mut ProgressTracker) {
        debug!(
            "Job {}: {}% ({:.2}s of {:.2}s)",
            self.shared.job, snapshot.percent, snapshot.elapsed_secs, snapshot.total_secs
        );
        self.shared.emit(JobEventKind::Progress(snapshot));
        if let Some(frame) = tracker.take_frame_update() {
            self.shared.emit(JobEventKind::Frame { frame });
        }
    }

    /// Idles at the poll interval while the job is paused.
    fn idle_while_paused(&self) {
        while !self.shared.cancelled() && *self.shared.lock_state() == JobState::Paused {
            thread::sleep(self.shared.poll_interval);
        }
    }

    fn wait_for_exit(&self, process: &mut dyn TranscodeProcess) -> CoreResult<ProcessExit> {
        loop {
            if let Some(exit) = process.try_wait()? {
                debug!("Job {}: encoder exited with {:?}", self.shared.job, exit.code);
                return Ok(exit);
            }
            thread::sleep(self.shared.poll_interval);
        }
    }

    /// Applies a pending cancel, performs the terminal transition and sends
    /// the terminal event.
    fn conclude(&self, ending: Ending, tracker: Option<&mut ProgressTracker>) -> JobOutcome {
        let shared = &self.shared;
        let mut state = shared.lock_state();

        let ending = if *state == JobState::Cancelling {
            Ending::Cancelled
        } else {
            ending
        };

        let outcome = match ending {
            Ending::Completed => {
                if *state == JobState::Paused {
                    shared.transition(&mut state, JobState::Running);
                }
                if let Some(tracker) = tracker {
                    if let Some(last) = tracker.complete() {
                        shared.set_latest(last);
                        self.emit_progress(last, tracker);
                    }
                }
                let output = self.request.output().to_path_buf();
                let output_size = match fs::metadata(&output) {
                    Ok(meta) => meta.len(),
                    Err(e) => {
                        warn!("Job {}: cannot read output size of {}: {}", shared.job, output.display(), e);
                        0
                    }
                };
                info!("Job {}: completed {}", shared.job, output.display());
                JobOutcome::Completed {
                    output,
                    output_size,
                }
            }
            Ending::Failed {
                message,
                exit_code,
                stderr_tail,
            } => {
                warn!("Job {}: failed: {}", shared.job, message);
                self.remove_partial_output();
                JobOutcome::Failed {
                    message,
                    exit_code,
                    stderr_tail,
                }
            }
            Ending::Cancelled => {
                info!("Job {}: cancelled", shared.job);
                JobOutcome::Cancelled
            }
        };

        let cleanup_warning = match outcome {
            JobOutcome::Cancelled => self.remove_partial_output(),
            _ => None,
        };

        if !shared.transition(&mut state, outcome.state()) {
            warn!(
                "Job {}: unexpected terminal move from {:?} to {:?}",
                shared.job,
                *state,
                outcome.state()
            );
            *state = outcome.state();
        }
        *shared.control.lock().unwrap_or_else(PoisonError::into_inner) = None;
        shared.emit(outcome.event_kind(cleanup_warning));
        outcome
    }

    /// Deletes the output of a job that did not complete. Returns a warning
    /// message when the file exists but cannot be removed.
    fn remove_partial_output(&self) -> Option<String> {
        if !self.spawned {
            return None;
        }
        let output = self.request.output();
        match fs::remove_file(output) {
            Ok(()) => {
                debug!("Job {}: removed partial output {}", self.shared.job, output.display());
                None
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                let warning = CoreError::CleanupWarning {
                    path: output.display().to_string(),
                    reason: e.to_string(),
                };
                warn!("Job {}: {}", self.shared.job, warning);
                Some(warning.to_string())
            }
        }
    }
}

/// Reads stderr to the end on its own thread, keeping the last `keep` lines.
///
/// ffmpeg redraws its stats line with carriage returns; each redraw counts as
/// a line here.
fn drain_stderr(
    job: usize,
    stderr: Box<dyn Read + Send>,
    keep: usize,
) -> Option<JoinHandle<Vec<String>>> {
    let spawned = thread::Builder::new()
        .name(format!("intercut-stderr-{job}"))
        .spawn(move || {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(keep);
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        for segment in String::from_utf8_lossy(&buf).split('\r') {
                            let segment = segment.trim();
                            if segment.is_empty() {
                                continue;
                            }
                            if tail.len() == keep {
                                tail.pop_front();
                            }
                            tail.push_back(segment.to_string());
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            tail.into()
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Job {job}: could not start stderr drain: {e}");
            None
        }
    }
}
