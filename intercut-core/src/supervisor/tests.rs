// ============================================================================
// intercut-core/src/supervisor/tests.rs
// ============================================================================
//
// Supervisor tests driven by the in-memory ffmpeg/ffprobe doubles.

use super::*;
use crate::config::CoreConfigBuilder;
use crate::external::mocks::{
    FakeProcess, MockFfprobeExecutor, MockSpawner, Signal, StaticCapabilities,
};
use crossbeam_channel::{Receiver, bounded, unbounded};
use std::path::Path;
use tempfile::tempdir;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

fn toolchain(probe: Arc<dyn FfprobeExecutor>, spawner: Arc<MockSpawner>) -> Arc<Toolchain> {
    toolchain_with_grace(probe, spawner, WAIT_LIMIT)
}

fn toolchain_with_grace(
    probe: Arc<dyn FfprobeExecutor>,
    spawner: Arc<MockSpawner>,
    grace: Duration,
) -> Arc<Toolchain> {
    let config = CoreConfigBuilder::new()
        .ffmpeg_path("ffmpeg")
        .ffprobe_path("ffprobe")
        .software_only(false)
        .pause_poll_interval(Duration::from_millis(5))
        .termination_grace(grace)
        .build()
        .unwrap();
    Arc::new(Toolchain::with_backends(
        config,
        Platform::Linux,
        probe,
        Arc::new(StaticCapabilities(String::new())),
        spawner,
    ))
}

fn probe_with(input: &Path, duration: f64) -> Arc<MockFfprobeExecutor> {
    let probe = MockFfprobeExecutor::new();
    probe.expect_duration(input, duration);
    Arc::new(probe)
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

fn percents(events: &[JobEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            JobEventKind::Progress(snapshot) => Some(snapshot.percent),
            _ => None,
        })
        .collect()
}

fn transitions(events: &[JobEvent]) -> Vec<(JobState, JobState)> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            JobEventKind::StateChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect()
}

fn terminal_count(events: &[JobEvent]) -> usize {
    events.iter().filter(|e| e.kind.is_job_terminal()).count()
}

fn drain(rx: &Receiver<JobEvent>) -> Vec<JobEvent> {
    rx.try_iter().collect()
}

#[test]
fn test_completed_job_reports_monotonic_progress() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out").join("cut.mp4");

    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(
        FakeProcess::scripted(
            &[
                "frame=0",
                "out_time=00:00:00.000000",
                "progress=continue",
                "frame=50",
                "out_time=00:00:05.000000",
                "frame=100",
                "out_time=00:00:07.500000",
                "progress=end",
            ],
            &[],
            0,
        ),
        Some(b"data"),
    );

    let request = JobRequest::new(&input, &output, 5, 10).unwrap();
    let (tx, rx) = unbounded();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner.clone()), tx);
    let controller = supervisor.controller();
    supervisor.start().unwrap();
    let outcome = supervisor.wait().unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Completed {
            output: output.clone(),
            output_size: 4,
        }
    );
    let events = drain(&rx);
    assert_eq!(percents(&events), vec![0, 50, 75, 100]);
    assert_eq!(
        transitions(&events),
        vec![
            (JobState::Idle, JobState::Probing),
            (JobState::Probing, JobState::Running),
            (JobState::Running, JobState::Completed),
        ]
    );
    assert_eq!(terminal_count(&events), 1);
    assert!(matches!(
        events.last().map(|e| &e.kind),
        Some(JobEventKind::Completed { .. })
    ));
    assert_eq!(controller.state(), JobState::Completed);
    assert_eq!(controller.latest_progress().map(|p| p.percent), Some(100));

    let frames: Vec<u64> = events
        .iter()
        .filter_map(|e| match e.kind {
            JobEventKind::Frame { frame } => Some(frame),
            _ => None,
        })
        .collect();
    assert_eq!(frames, vec![0, 50, 100]);

    let calls = spawner.received_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].iter().any(|arg| arg.contains("mod(t,15)")));
}

#[test]
fn test_encoder_selected_event_carries_preview() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("cut.mp4");

    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(FakeProcess::scripted(&[], &[], 0), Some(b""));

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, &output, 5, 10).unwrap();
    let mut supervisor = JobSupervisor::new(3, request, toolchain(probe_with(&input, 30.0), spawner), tx);
    supervisor.start().unwrap();
    supervisor.wait().unwrap();

    let events = drain(&rx);
    assert!(events.iter().all(|e| e.job == 3));
    let selected = events
        .iter()
        .find_map(|e| match &e.kind {
            JobEventKind::EncoderSelected { choice, command } => Some((*choice, command.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(selected.0, EncoderChoice::software());
    assert!(selected.1.starts_with("ffmpeg "));
    assert!(selected.1.contains("lt(mod(t,15),5)"));
}

#[test]
fn test_non_zero_exit_fails_with_stderr_tail() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("cut.mp4");

    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(
        FakeProcess::scripted(
            &["out_time=00:00:01.000000"],
            &["Error while filtering", "Conversion failed!"],
            1,
        ),
        Some(b"partial"),
    );

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, &output, 1, 1).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner), tx);
    supervisor.start().unwrap();
    let outcome = supervisor.wait().unwrap();

    match outcome {
        JobOutcome::Failed {
            message,
            exit_code,
            stderr_tail,
        } => {
            assert_eq!(exit_code, Some(1));
            assert_eq!(stderr_tail, vec!["Error while filtering", "Conversion failed!"]);
            assert!(message.contains("exit code 1"), "{message}");
            assert!(message.contains("Conversion failed!"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!output.exists());

    let events = drain(&rx);
    assert_eq!(terminal_count(&events), 1);
    assert!(!percents(&events).contains(&100));
    assert_eq!(
        transitions(&events).last(),
        Some(&(JobState::Running, JobState::Failed))
    );
}

#[test]
fn test_probe_failure_fails_before_spawn() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("broken.mp4");
    let probe = MockFfprobeExecutor::new();
    probe.expect_failure(&input, "moov atom not found");
    let spawner = Arc::new(MockSpawner::new());

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, dir.path().join("cut.mp4"), 5, 5).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(Arc::new(probe), spawner.clone()), tx);
    supervisor.start().unwrap();
    let outcome = supervisor.wait().unwrap();

    assert!(matches!(&outcome, JobOutcome::Failed { message, .. } if message.contains("moov atom")));
    assert!(spawner.received_calls().is_empty());
    assert_eq!(
        transitions(&drain(&rx)),
        vec![
            (JobState::Idle, JobState::Probing),
            (JobState::Probing, JobState::Failed),
        ]
    );
}

#[test]
fn test_spawn_failure_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_spawn_error(CoreError::ProcessSpawn(
        "ffmpeg".to_string(),
        std::io::Error::new(ErrorKind::NotFound, "no such file"),
    ));

    let (tx, _rx) = unbounded();
    let request = JobRequest::new(&input, dir.path().join("cut.mp4"), 5, 5).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner), tx);
    supervisor.start().unwrap();
    let outcome = supervisor.wait().unwrap();

    assert!(matches!(&outcome, JobOutcome::Failed { message, .. } if message.contains("no such file")));
}

#[test]
fn test_pause_and_resume_reach_the_process() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("cut.mp4");

    let (process, handle) = FakeProcess::interactive();
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(process, Some(b"done"));

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, &output, 5, 10).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner), tx);
    let controller = supervisor.controller();

    // Nothing is attached yet.
    controller.pause();
    assert_eq!(controller.state(), JobState::Idle);

    supervisor.start().unwrap();
    wait_until("running", || controller.state() == JobState::Running);

    handle.emit_line("out_time=00:00:02.500000");
    wait_until("first progress", || controller.latest_progress().is_some());

    controller.pause();
    assert_eq!(controller.state(), JobState::Paused);
    controller.pause();
    controller.resume();
    assert_eq!(controller.state(), JobState::Running);
    controller.resume();
    assert_eq!(handle.signals(), vec![Signal::Suspend, Signal::Resume]);

    for line in ["out_time=00:00:05.000000", "out_time=00:00:07.500000", "out_time=00:00:10.000000"] {
        handle.emit_line(line);
    }
    handle.exit(0);
    let outcome = supervisor.wait().unwrap();

    assert!(matches!(outcome, JobOutcome::Completed { .. }));
    let events = drain(&rx);
    assert_eq!(percents(&events), vec![25, 50, 75, 100]);
    assert!(transitions(&events).contains(&(JobState::Running, JobState::Paused)));
    assert!(transitions(&events).contains(&(JobState::Paused, JobState::Running)));
}

#[test]
fn test_cancel_while_paused_terminates_and_cleans_up() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("cut.mp4");

    let (process, handle) = FakeProcess::interactive();
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(process, Some(b"partial"));

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, &output, 5, 10).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner), tx);
    let controller = supervisor.controller();
    supervisor.start().unwrap();
    wait_until("running", || controller.state() == JobState::Running);
    assert!(output.exists());

    handle.emit_line("out_time=00:00:01.000000");
    controller.pause();
    controller.cancel();
    assert_eq!(controller.state(), JobState::Cancelling);

    let outcome = supervisor.wait().unwrap();
    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(!output.exists());
    assert_eq!(handle.signals(), vec![Signal::Suspend, Signal::Terminate]);

    let events = drain(&rx);
    assert_eq!(terminal_count(&events), 1);
    assert!(matches!(
        events.last().map(|e| &e.kind),
        Some(JobEventKind::Cancelled { cleanup_warning: None })
    ));
    let moves = transitions(&events);
    assert!(moves.contains(&(JobState::Paused, JobState::Cancelling)));
    assert_eq!(moves.last(), Some(&(JobState::Cancelling, JobState::Cancelled)));
}

#[test]
fn test_percent_is_measured_against_probed_duration() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("cut.mp4");

    let (process, handle) = FakeProcess::interactive();
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(process, Some(b"cut"));

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, &output, 5, 10).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 25.0), spawner), tx);
    let controller = supervisor.controller();
    supervisor.start().unwrap();
    wait_until("running", || controller.state() == JobState::Running);

    handle.emit_line("frame=  120 fps=25 q=28.0 time=00:00:12.50 bitrate=N/A speed=1x");
    wait_until("half way", || controller.latest_progress().is_some());
    let snapshot = controller.latest_progress().unwrap();
    assert_eq!(snapshot.elapsed_secs, 12.5);
    assert_eq!(snapshot.total_secs, 25.0);
    assert_eq!(snapshot.percent, 50);
    assert_eq!(snapshot.frame, Some(120));

    // The cut timeline ends well short of the input length.
    handle.emit_line("time=00:00:08.33");
    handle.exit(0);
    let outcome = supervisor.wait().unwrap();
    assert!(matches!(outcome, JobOutcome::Completed { .. }));

    let events = drain(&rx);
    assert_eq!(percents(&events), vec![50, 100]);
    let last = controller.latest_progress().unwrap();
    assert_eq!((last.percent, last.total_secs), (100, 25.0));
}

#[test]
fn test_encoder_without_stdout_is_killed_and_reaped() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("cut.mp4");

    let (process, handle) = FakeProcess::without_stdout();
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(process, Some(b"partial"));

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, &output, 5, 10).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner), tx);
    supervisor.start().unwrap();
    let outcome = supervisor.wait().unwrap();

    assert!(matches!(&outcome, JobOutcome::Failed { message, .. } if message.contains("no stdout")));
    assert_eq!(handle.signals(), vec![Signal::Kill]);
    assert!(!output.exists());
    assert_eq!(terminal_count(&drain(&rx)), 1);
}

struct GatedProbe {
    gate: Receiver<()>,
}

impl FfprobeExecutor for GatedProbe {
    fn probe_duration(&self, _input_path: &Path) -> CoreResult<f64> {
        let _ = self.gate.recv();
        Ok(10.0)
    }

    fn probe_media_summary(&self, input_path: &Path) -> CoreResult<crate::external::MediaSummary> {
        Err(CoreError::Probe {
            path: input_path.display().to_string(),
            reason: "not used".to_string(),
        })
    }
}

#[test]
fn test_cancel_during_probing_skips_spawn() {
    let dir = tempdir().unwrap();
    let (gate_tx, gate_rx) = bounded(1);
    let spawner = Arc::new(MockSpawner::new());

    let (tx, rx) = unbounded();
    let request = JobRequest::new(dir.path().join("in.mp4"), dir.path().join("cut.mp4"), 5, 5).unwrap();
    let mut supervisor = JobSupervisor::new(
        0,
        request,
        toolchain(Arc::new(GatedProbe { gate: gate_rx }), spawner.clone()),
        tx,
    );
    supervisor.start().unwrap();
    assert_eq!(supervisor.state(), JobState::Probing);

    supervisor.cancel();
    gate_tx.send(()).unwrap();
    let outcome = supervisor.wait().unwrap();

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(spawner.received_calls().is_empty());
    assert_eq!(
        transitions(&drain(&rx)),
        vec![
            (JobState::Idle, JobState::Probing),
            (JobState::Probing, JobState::Cancelling),
            (JobState::Cancelling, JobState::Cancelled),
        ]
    );
}

#[test]
fn test_unresponsive_process_is_killed_after_grace() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");

    let (process, handle) = FakeProcess::stubborn();
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(process, None);

    let (tx, _rx) = unbounded();
    let request = JobRequest::new(&input, dir.path().join("cut.mp4"), 5, 5).unwrap();
    let tools = toolchain_with_grace(probe_with(&input, 10.0), spawner, Duration::from_millis(100));
    let mut supervisor = JobSupervisor::new(0, request, tools, tx);
    let controller = supervisor.controller();
    supervisor.start().unwrap();
    wait_until("running", || controller.state() == JobState::Running);

    controller.cancel();
    let outcome = supervisor.wait().unwrap();

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(handle.signals(), vec![Signal::Terminate, Signal::Kill]);
}

#[test]
fn test_controls_after_completion_are_ignored() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("cut.mp4");
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(FakeProcess::scripted(&[], &[], 0), Some(b"ok"));

    let (tx, rx) = unbounded();
    let request = JobRequest::new(&input, &output, 5, 5).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner), tx);
    let controller = supervisor.controller();
    supervisor.start().unwrap();
    supervisor.wait().unwrap();
    let before = drain(&rx).len();

    controller.pause();
    controller.resume();
    controller.cancel();

    assert_eq!(controller.state(), JobState::Completed);
    assert!(drain(&rx).is_empty());
    assert!(before > 0);
    assert!(output.exists());
}

#[test]
fn test_start_twice_is_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let spawner = Arc::new(MockSpawner::new());
    spawner.push_process(FakeProcess::scripted(&[], &[], 0), None);

    let (tx, _rx) = unbounded();
    let request = JobRequest::new(&input, dir.path().join("cut.mp4"), 5, 5).unwrap();
    let mut supervisor = JobSupervisor::new(0, request, toolchain(probe_with(&input, 10.0), spawner), tx);
    supervisor.start().unwrap();
    assert!(matches!(supervisor.start(), Err(CoreError::Supervisor(_))));
    supervisor.wait().unwrap();
}

#[test]
fn test_wait_without_start_is_an_error() {
    let spawner = Arc::new(MockSpawner::new());
    let (tx, _rx) = unbounded();
    let request = JobRequest::new("in.mp4", "cut.mp4", 5, 5).unwrap();
    let supervisor = JobSupervisor::new(0, request, toolchain(probe_with(Path::new("in.mp4"), 1.0), spawner), tx);
    assert!(matches!(supervisor.wait(), Err(CoreError::Supervisor(_))));
}

#[test]
fn test_transition_table() {
    use JobState::*;
    assert!(Idle.can_transition_to(Probing));
    assert!(Probing.can_transition_to(Cancelling));
    assert!(Paused.can_transition_to(Running));
    assert!(Cancelling.can_transition_to(Cancelled));

    assert!(!Idle.can_transition_to(Running));
    assert!(!Cancelling.can_transition_to(Completed));
    assert!(!Paused.can_transition_to(Completed));
    for terminal in [Completed, Failed, Cancelled] {
        assert!(terminal.is_terminal());
        for next in [Idle, Probing, Running, Paused, Cancelling, Completed, Failed, Cancelled] {
            assert!(!terminal.can_transition_to(next));
        }
    }
}
