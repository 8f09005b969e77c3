//! `intercut preview`: prints the ffmpeg command for a cut.

use anyhow::{Context, Result};
use intercut_core::{JobRequest, Toolchain};
use serde_json::json;
use std::path::PathBuf;

use super::build_config;
use crate::cli::PreviewArgs;

pub fn run_preview(args: PreviewArgs, json: bool) -> Result<()> {
    let config = build_config(&args.encoder)?;
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => args
            .input
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default(),
    };
    let request = JobRequest::in_dir(&args.input, &output_dir, args.cycle.take, args.cycle.skip)
        .context("Invalid cut")?;

    let toolchain = Toolchain::from_config(config);
    let command = toolchain.preview(&request);

    if json {
        let value = json!({
            "input": request.input(),
            "output": request.output(),
            "encoder": toolchain.encoder(),
            "args": toolchain.cut_args(&request),
            "command": command,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{command}");
    }
    Ok(())
}
