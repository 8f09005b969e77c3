// ============================================================================
// intercut-cli/src/commands/cut.rs
// ============================================================================
//
// CUT COMMAND: Runs take/skip cuts for every input
//
// Resolves the inputs, checks the external tools, then hands the requests to
// a BatchSequencer running on its own thread. The calling thread pumps the
// event stream into the terminal view (or the JSON-lines writer) until the
// batch is over, while stdin and Ctrl-C steer the batch through its handle.

use anyhow::{Context, Result, bail};
use intercut_core::events::{EventDispatcher, EventHandler, JsonEventHandler};
use intercut_core::{
    BatchSequencer, BatchSummary, CoreError, JobRequest, Toolchain, check_dependency,
    collect_inputs,
};
use log::info;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::build_config;
use crate::cli::CutArgs;
use crate::control::{install_ctrlc, spawn_stdin_control};
use crate::logging::init_logging;
use crate::terminal::{self, TerminalEventHandler, format_elapsed};

/// Entry point for `intercut cut`.
pub fn run_cut(args: CutArgs, json: bool, verbose: bool) -> Result<()> {
    let start_time = Instant::now();

    // --- Determine Paths ---
    let output_dir = args.output_dir;
    let log_dir = args.log_dir.unwrap_or_else(|| output_dir.join("logs"));

    // --- Resolve Inputs ---
    let inputs = collect_inputs(&args.inputs).context("Invalid input path")?;
    let requests = inputs
        .iter()
        .map(|input| JobRequest::in_dir(input, &output_dir, args.cycle.take, args.cycle.skip))
        .collect::<Result<Vec<_>, _>>()?;

    // --- Create Output Dir and Set Up Logging ---
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory '{}'", output_dir.display())
    })?;
    let log_path = init_logging(verbose, Some(&log_dir))?;

    let mut config = build_config(&args.encoder)?;
    config.inter_job_delay = Duration::from_secs(args.delay);
    check_dependency(&config.ffmpeg_path).context("ffmpeg is required")?;
    check_dependency(&config.ffprobe_path).context("ffprobe is required")?;

    info!(
        "Cutting {} file(s) into {} (take {}s, skip {}s)",
        requests.len(),
        output_dir.display(),
        args.cycle.take,
        args.cycle.skip
    );
    if let Some(path) = &log_path {
        info!("Log file: {}", path.display());
    }

    // --- Run the Batch ---
    let toolchain = Arc::new(Toolchain::from_config(config));
    let (tx, rx) = crossbeam_channel::unbounded();
    let sequencer = BatchSequencer::new(requests, toolchain, tx)?;
    let handle = sequencer.handle();

    install_ctrlc(handle.clone())?;
    spawn_stdin_control(handle.clone())?;

    let batch = thread::Builder::new()
        .name("intercut-batch".to_string())
        .spawn(move || sequencer.run())
        .context("Failed to start the batch thread")?;

    let view: Arc<dyn EventHandler> = if json {
        Arc::new(JsonEventHandler::new().include_frames(verbose))
    } else {
        Arc::new(TerminalEventHandler::new(verbose))
    };
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_handler(view);
    dispatcher.pump(&rx);

    let summary = batch
        .join()
        .map_err(|_| anyhow::anyhow!("The batch thread panicked"))?;

    // --- Final Timing ---
    let elapsed = format_elapsed(start_time.elapsed());
    info!("Batch finished in {elapsed}");
    if !json {
        terminal::print_status("Total time", &elapsed, false);
        if let Some(path) = &log_path {
            terminal::print_status("Log file", &path.display().to_string(), false);
        }
    }

    check_summary(&summary, handle.is_cancelled())
}

/// Maps the batch result onto the process exit status.
fn check_summary(summary: &BatchSummary, cancelled: bool) -> Result<()> {
    if cancelled {
        return Err(anyhow::Error::new(CoreError::CancelledByUser).context(format!(
            "Batch cancelled: {} of {} file(s) completed",
            summary.completed,
            summary.total()
        )));
    }
    if summary.failed > 0 {
        bail!("{} of {} file(s) failed", summary.failed, summary.total());
    }
    Ok(())
}
