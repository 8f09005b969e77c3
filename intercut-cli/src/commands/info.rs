//! `intercut info`: media summary of one file.

use anyhow::{Context, Result};
use intercut_core::external::{CrateFfprobeExecutor, FfprobeExecutor};
use intercut_core::utils::estimated_output_secs;
use intercut_core::{CoreConfig, format_bytes, format_duration};
use log::debug;
use serde_json::json;

use crate::cli::InfoArgs;
use crate::terminal::{print_section, print_status};

pub fn run_info(args: InfoArgs, json: bool) -> Result<()> {
    let config = CoreConfig::new();
    let probe = CrateFfprobeExecutor::new(&config.ffprobe_path);
    debug!("Probing {} with {}", args.input.display(), config.ffprobe_path.display());

    let summary = probe
        .probe_media_summary(&args.input)
        .with_context(|| format!("Could not read '{}'", args.input.display()))?;
    let cut_secs = match (args.take, args.skip) {
        (Some(take), Some(skip)) => Some(estimated_output_secs(summary.duration_secs, take, skip)),
        _ => None,
    };

    if json {
        let value = json!({
            "input": args.input,
            "media": summary,
            "estimated_cut_secs": cut_secs,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_section("Media info");
    print_status("File", &args.input.display().to_string(), true);
    print_status("Duration", &format_duration(summary.duration_secs), false);
    if let (Some(width), Some(height)) = (summary.width, summary.height) {
        print_status("Resolution", &format!("{width}x{height}"), false);
    }
    if let Some(rate) = summary.frame_rate {
        print_status("Frame rate", &format!("{rate:.3} fps"), false);
    }
    if let Some(codec) = &summary.video_codec {
        print_status("Video codec", codec, false);
    }
    print_status("Size", &format_bytes(summary.file_size), false);
    if let (Some(secs), Some(take), Some(skip)) = (cut_secs, args.take, args.skip) {
        print_status(
            "Cut length",
            &format!("{} (take {take}s, skip {skip}s)", format_duration(secs)),
            true,
        );
    }
    Ok(())
}
