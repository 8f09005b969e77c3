// intercut-core/src/external/mocks.rs

// --- Mocking Infrastructure (for testing) ---
//
// Compiled for unit tests and for downstream tests through the "test-mocks"
// feature. The fake transcode reads its stdout from a channel so tests can
// feed progress lines while the supervisor is running and observe how
// pause/resume/cancel reach the process.

use super::ffmpeg_executor::{ProcessControl, ProcessExit, ProcessSpawner, TranscodeProcess};
use super::ffprobe_executor::{FfprobeExecutor, MediaSummary};
use crate::encoder::CapabilityProbe;
use crate::error::{CoreError, CoreResult};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Process double
// ---------------------------------------------------------------------------

enum Chunk {
    Data(Vec<u8>),
    Eof,
}

/// Blocking reader fed by a channel. Ends on `Chunk::Eof` or disconnect.
struct ChannelReader {
    rx: Receiver<Chunk>,
    pending: VecDeque<u8>,
    done: bool,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() && !self.done {
            match self.rx.recv() {
                Ok(Chunk::Data(bytes)) => self.pending.extend(bytes),
                Ok(Chunk::Eof) | Err(_) => self.done = true,
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Control operation recorded by [`FakeControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Suspend,
    Resume,
    Terminate,
    Kill,
}

#[derive(Default)]
struct FakeState {
    exit: Option<ProcessExit>,
    signals: Vec<Signal>,
}

/// Control side of a [`FakeProcess`].
pub struct FakeControl {
    state: Mutex<FakeState>,
    stdout_tx: Sender<Chunk>,
    /// When false the fake ignores terminate and only dies on kill.
    honours_terminate: bool,
}

impl FakeControl {
    fn record(&self, signal: Signal) {
        if let Ok(mut state) = self.state.lock() {
            state.signals.push(signal);
        }
    }

    fn end(&self, code: Option<i32>) {
        if let Ok(mut state) = self.state.lock() {
            if state.exit.is_none() {
                state.exit = Some(ProcessExit { code });
            }
        }
        let _ = self.stdout_tx.send(Chunk::Eof);
    }

    /// Control operations received so far, in order.
    pub fn signals(&self) -> Vec<Signal> {
        self.state
            .lock()
            .map(|state| state.signals.clone())
            .unwrap_or_default()
    }
}

impl ProcessControl for FakeControl {
    fn suspend(&self) -> CoreResult<()> {
        self.record(Signal::Suspend);
        Ok(())
    }

    fn resume(&self) -> CoreResult<()> {
        self.record(Signal::Resume);
        Ok(())
    }

    fn terminate(&self) -> CoreResult<()> {
        self.record(Signal::Terminate);
        if self.honours_terminate {
            self.end(None);
        }
        Ok(())
    }

    fn kill(&self) -> CoreResult<()> {
        self.record(Signal::Kill);
        self.end(None);
        Ok(())
    }
}

/// Test-side handle for driving a [`FakeProcess`] while it runs.
#[derive(Clone)]
pub struct FakeProcessHandle {
    control: Arc<FakeControl>,
}

impl FakeProcessHandle {
    /// Writes one line to the fake's stdout.
    pub fn emit_line(&self, line: &str) {
        let _ = self
            .control
            .stdout_tx
            .send(Chunk::Data(format!("{line}\n").into_bytes()));
    }

    /// Closes stdout and sets the exit code.
    pub fn exit(&self, code: i32) {
        self.control.end(Some(code));
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.control.signals()
    }

    pub fn control(&self) -> Arc<FakeControl> {
        self.control.clone()
    }
}

/// In-memory transcode process.
pub struct FakeProcess {
    control: Arc<FakeControl>,
    stdout: Option<Box<dyn Read + Send>>,
    stderr: Option<Box<dyn Read + Send>>,
}

impl FakeProcess {
    /// A process driven live through the returned handle.
    pub fn interactive() -> (Self, FakeProcessHandle) {
        Self::build(Vec::new(), true)
    }

    /// Like [`FakeProcess::interactive`], but terminate is ignored so only a
    /// kill ends it.
    pub fn stubborn() -> (Self, FakeProcessHandle) {
        Self::build(Vec::new(), false)
    }

    /// A process that prints `stdout_lines` and `stderr_lines`, then exits
    /// with `code`.
    pub fn scripted(stdout_lines: &[&str], stderr_lines: &[&str], code: i32) -> Self {
        let stderr = stderr_lines
            .iter()
            .map(|line| format!("{line}\n"))
            .collect::<String>()
            .into_bytes();
        let (process, handle) = Self::build(stderr, true);
        for line in stdout_lines {
            handle.emit_line(line);
        }
        handle.exit(code);
        process
    }

    /// A process that exposes no stdout pipe and runs until killed.
    pub fn without_stdout() -> (Self, FakeProcessHandle) {
        let (mut process, handle) = Self::build(Vec::new(), true);
        process.stdout = None;
        (process, handle)
    }

    fn build(stderr: Vec<u8>, honours_terminate: bool) -> (Self, FakeProcessHandle) {
        let (tx, rx) = unbounded();
        let control = Arc::new(FakeControl {
            state: Mutex::new(FakeState::default()),
            stdout_tx: tx,
            honours_terminate,
        });
        let process = Self {
            control: control.clone(),
            stdout: Some(Box::new(ChannelReader {
                rx,
                pending: VecDeque::new(),
                done: false,
            })),
            stderr: Some(Box::new(io::Cursor::new(stderr))),
        };
        (process, FakeProcessHandle { control })
    }
}

impl TranscodeProcess for FakeProcess {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stderr.take()
    }

    fn control(&self) -> Arc<dyn ProcessControl> {
        self.control.clone()
    }

    fn try_wait(&mut self) -> CoreResult<Option<ProcessExit>> {
        Ok(self.control.state.lock().ok().and_then(|state| state.exit))
    }
}

// ---------------------------------------------------------------------------
// Spawner double
// ---------------------------------------------------------------------------

struct SpawnExpectation {
    result: CoreResult<FakeProcess>,
    output_bytes: Option<Vec<u8>>,
}

/// [`ProcessSpawner`] that hands out queued fakes in order.
#[derive(Default)]
pub struct MockSpawner {
    expectations: Mutex<VecDeque<SpawnExpectation>>,
    received_calls: Mutex<Vec<Vec<String>>>,
}

impl MockSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a process. When `output_bytes` is set, the spawn also writes
    /// them to the output path (the last argument).
    pub fn push_process(&self, process: FakeProcess, output_bytes: Option<&[u8]>) {
        self.push(SpawnExpectation {
            result: Ok(process),
            output_bytes: output_bytes.map(<[u8]>::to_vec),
        });
    }

    pub fn push_spawn_error(&self, error: CoreError) {
        self.push(SpawnExpectation {
            result: Err(error),
            output_bytes: None,
        });
    }

    fn push(&self, expectation: SpawnExpectation) {
        if let Ok(mut queue) = self.expectations.lock() {
            queue.push_back(expectation);
        }
    }

    /// Argument vectors passed to `spawn`, in call order.
    pub fn received_calls(&self) -> Vec<Vec<String>> {
        self.received_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl ProcessSpawner for MockSpawner {
    fn spawn(&self, _program: &Path, args: &[String]) -> CoreResult<Box<dyn TranscodeProcess>> {
        if let Ok(mut calls) = self.received_calls.lock() {
            calls.push(args.to_vec());
        }

        let expectation = self
            .expectations
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| panic!("MockSpawner: no process queued for args {args:?}"));

        let process = expectation.result?;
        if let (Some(bytes), Some(output)) = (expectation.output_bytes, args.last()) {
            std::fs::write(output, bytes)?;
        }
        Ok(Box::new(process))
    }
}

// ---------------------------------------------------------------------------
// Probe doubles
// ---------------------------------------------------------------------------

/// [`FfprobeExecutor`] answering from a per-path table.
#[derive(Default)]
pub struct MockFfprobeExecutor {
    durations: Mutex<HashMap<PathBuf, Result<f64, String>>>,
}

impl MockFfprobeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_duration(&self, input_path: &Path, duration: f64) {
        self.insert(input_path, Ok(duration));
    }

    pub fn expect_failure(&self, input_path: &Path, reason: &str) {
        self.insert(input_path, Err(reason.to_string()));
    }

    fn insert(&self, input_path: &Path, result: Result<f64, String>) {
        if let Ok(mut durations) = self.durations.lock() {
            durations.insert(input_path.to_path_buf(), result);
        }
    }

    fn lookup(&self, input_path: &Path) -> CoreResult<f64> {
        let entry = self
            .durations
            .lock()
            .ok()
            .and_then(|durations| durations.get(input_path).cloned());
        match entry {
            Some(Ok(duration)) => Ok(duration),
            Some(Err(reason)) => Err(CoreError::Probe {
                path: input_path.display().to_string(),
                reason,
            }),
            None => Err(CoreError::Probe {
                path: input_path.display().to_string(),
                reason: "MockFfprobeExecutor: no expectation set".to_string(),
            }),
        }
    }
}

impl FfprobeExecutor for MockFfprobeExecutor {
    fn probe_duration(&self, input_path: &Path) -> CoreResult<f64> {
        self.lookup(input_path)
    }

    fn probe_media_summary(&self, input_path: &Path) -> CoreResult<MediaSummary> {
        Ok(MediaSummary {
            duration_secs: self.lookup(input_path)?,
            width: Some(1920),
            height: Some(1080),
            frame_rate: Some(25.0),
            video_codec: Some("h264".to_string()),
            file_size: 0,
        })
    }
}

/// [`CapabilityProbe`] returning a fixed encoder listing.
pub struct StaticCapabilities(pub String);

impl CapabilityProbe for StaticCapabilities {
    fn list_encoders(&self) -> CoreResult<String> {
        Ok(self.0.clone())
    }
}
