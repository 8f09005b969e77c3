//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

use anyhow::{Context, Result};
use intercut_core::{CoreConfig, CoreConfigBuilder};

use crate::cli::EncoderArgs;

/// Runs a batch of cuts under the supervisor.
pub mod cut;
pub mod encoders;
pub mod info;
pub mod preview;

/// Builds the core configuration: defaults, then `INTERCUT_*` variables,
/// then command-line flags.
pub fn build_config(encoder: &EncoderArgs) -> Result<CoreConfig> {
    let mut builder = CoreConfigBuilder::new();
    if encoder.software {
        builder = builder.software_only(true);
    }
    if let Some(quality) = encoder.quality {
        builder = builder.quality(quality);
    }
    if let Some(preset) = &encoder.preset {
        builder = builder.preset(preset.clone());
    }
    builder.build().context("Invalid configuration")
}
