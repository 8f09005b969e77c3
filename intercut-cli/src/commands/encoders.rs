//! `intercut encoders`: which H.264 encoder a cut would use here.

use anyhow::Result;
use intercut_core::{Platform, Toolchain};
use serde_json::json;

use super::build_config;
use crate::cli::EncoderArgs;
use crate::terminal::{print_section, print_status};

pub fn run_encoders(args: EncoderArgs, json: bool) -> Result<()> {
    let config = build_config(&args)?;
    let software_only = config.software_only;
    let platform = Platform::current();
    let toolchain = Toolchain::from_config(config);
    let choice = toolchain.encoder();

    let candidates: Vec<String> = platform
        .preferences()
        .iter()
        .map(|candidate| candidate.encoder.to_string())
        .collect();

    if json {
        let value = json!({
            "platform": format!("{platform:?}"),
            "software_only": software_only,
            "candidates": candidates,
            "selected": choice,
            "hardware": choice.encoder.is_hardware(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_section("Encoders");
    print_status("Platform", &format!("{platform:?}"), false);
    let candidates = if software_only {
        "skipped (software only)".to_string()
    } else if candidates.is_empty() {
        "none".to_string()
    } else {
        candidates.join(", ")
    };
    print_status("Hardware", &candidates, false);
    print_status("Selected", &choice.to_string(), true);
    Ok(())
}
