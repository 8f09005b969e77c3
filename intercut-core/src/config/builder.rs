// ============================================================================
// intercut-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// Starts from `CoreConfig::default()` (which already folds in the INTERCUT_*
// environment overrides) and lets front-ends override individual values
// before validating the result.

use std::path::PathBuf;
use std::time::Duration;

use super::CoreConfig;
use crate::error::CoreResult;

/// Builder for creating [`CoreConfig`] instances.
#[derive(Debug, Clone)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl Default for CoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreConfigBuilder {
    /// Creates a builder seeded with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// Sets the ffmpeg binary.
    #[must_use]
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    /// Sets the ffprobe binary.
    #[must_use]
    pub fn ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffprobe_path = path.into();
        self
    }

    /// Sets the quality value used by every constant-quality encoder knob.
    #[must_use]
    pub fn quality(mut self, quality: u8) -> Self {
        self.config.tuning.quality = quality;
        self
    }

    /// Sets the encoder speed preset (libx264, NVENC, Quick Sync).
    #[must_use]
    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.config.tuning.preset = preset.into();
        self
    }

    #[must_use]
    pub fn videotoolbox_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.config.tuning.videotoolbox_bitrate = bitrate.into();
        self
    }

    #[must_use]
    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.config.tuning.audio_bitrate = bitrate.into();
        self
    }

    /// Forces the software encoder and skips the capability probe.
    #[must_use]
    pub fn software_only(mut self, software_only: bool) -> Self {
        self.config.software_only = software_only;
        self
    }

    #[must_use]
    pub fn pause_poll_interval(mut self, interval: Duration) -> Self {
        self.config.pause_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn termination_grace(mut self, grace: Duration) -> Self {
        self.config.termination_grace = grace;
        self
    }

    #[must_use]
    pub fn stderr_tail_lines(mut self, lines: usize) -> Self {
        self.config.stderr_tail_lines = lines;
        self
    }

    #[must_use]
    pub fn inter_job_delay(mut self, delay: Duration) -> Self {
        self.config.inter_job_delay = delay;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> CoreResult<CoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
