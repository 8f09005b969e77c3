// intercut-core/tests/batch_tests.rs
//
// End-to-end batch runs through the public API with the in-memory ffmpeg and
// ffprobe doubles.

use intercut_core::encoder::Platform;
use intercut_core::external::mocks::{
    FakeProcess, MockFfprobeExecutor, MockSpawner, StaticCapabilities,
};
use intercut_core::{
    BatchSequencer, CoreConfigBuilder, EncoderId, JobEvent, JobEventKind, JobOutcome, JobRequest,
    Toolchain,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const NVENC_LISTING: &str = " V....D libx264   libx264 H.264\n V....D h264_nvenc   NVIDIA NVENC H.264 encoder\n";

#[test]
fn test_second_probe_failure_still_attempts_third_job() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let out_dir = dir.path().join("cuts");
    let requests: Vec<JobRequest> = ["one.mp4", "two.mp4", "three.mp4"]
        .iter()
        .map(|name| JobRequest::in_dir(dir.path().join(name), &out_dir, 5, 10))
        .collect::<Result<_, _>>()?;

    let probe = MockFfprobeExecutor::new();
    probe.expect_duration(requests[0].input(), 30.0);
    probe.expect_failure(requests[1].input(), "Invalid data found when processing input");
    probe.expect_duration(requests[2].input(), 30.0);

    let spawner = Arc::new(MockSpawner::new());
    for _ in 0..2 {
        spawner.push_process(
            FakeProcess::scripted(
                &["frame=375", "out_time=00:00:15.000000", "frame=750", "out_time=00:00:30.000000", "progress=end"],
                &[],
                0,
            ),
            Some(b"cut output"),
        );
    }

    let config = CoreConfigBuilder::new()
        .ffmpeg_path("ffmpeg")
        .ffprobe_path("ffprobe")
        .software_only(false)
        .pause_poll_interval(Duration::from_millis(5))
        .build()?;
    let toolchain = Arc::new(Toolchain::with_backends(
        config,
        Platform::Linux,
        Arc::new(probe),
        Arc::new(StaticCapabilities(NVENC_LISTING.to_string())),
        spawner.clone(),
    ));

    let (tx, rx) = crossbeam_channel::unbounded();
    let summary = BatchSequencer::new(requests.clone(), toolchain.clone(), tx)?.run();
    let events: Vec<JobEvent> = rx.try_iter().collect();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.all_completed());
    assert!(matches!(
        &summary.items[1].outcome,
        Some(JobOutcome::Failed { message, .. }) if message.contains("Invalid data")
    ));
    assert!(matches!(
        &summary.items[2].outcome,
        Some(JobOutcome::Completed { output_size: 10, .. })
    ));
    assert!(requests[0].output().exists());
    assert!(requests[2].output().exists());

    // Both spawned jobs used the hardware encoder chosen once for the run.
    assert_eq!(toolchain.encoder().encoder, EncoderId::Nvenc);
    for args in spawner.received_calls() {
        let hw = args.iter().position(|a| a == "-hwaccel").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(hw < input);
        assert!(args.contains(&"h264_nvenc".to_string()));
    }

    let failed_jobs: Vec<usize> = events
        .iter()
        .filter(|e| matches!(e.kind, JobEventKind::Failed { .. }))
        .map(|e| e.job)
        .collect();
    assert_eq!(failed_jobs, vec![1]);

    for job in [0, 2] {
        let percents: Vec<u8> = events
            .iter()
            .filter(|e| e.job == job)
            .filter_map(|e| match &e.kind {
                JobEventKind::Progress(p) => Some(p.percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 50, 100], "job {job}");
    }

    match events.last().map(|e| &e.kind) {
        Some(JobEventKind::BatchComplete(done)) => assert_eq!(done, &summary),
        other => panic!("expected BatchComplete last, got {other:?}"),
    }
    Ok(())
}
