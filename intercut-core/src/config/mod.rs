//! Configuration structures and constants for the intercut-core library.
//!
//! [`CoreConfig`] collects the external tool locations, the encoder tuning
//! knobs and the supervisor timing parameters. Defaults can be overridden
//! through `INTERCUT_*` environment variables, by the builder, or directly
//! on the struct by front-ends.

mod builder;
mod utils;

use std::path::PathBuf;
use std::time::Duration;

use crate::encoder::EncoderTuning;
use crate::error::{CoreError, CoreResult};
use crate::external::resolve_tool;

pub use builder::CoreConfigBuilder;
pub use utils::{get_env_bool, get_env_string, get_env_u8};

/// Default quality value shared by the CRF / CQ / global_quality / QP knobs.
pub const DEFAULT_QUALITY: u8 = 23;

/// Default speed preset for encoders that accept one.
pub const DEFAULT_PRESET: &str = "fast";

/// Target bitrate for VideoToolbox, which has no constant-quality mode here.
pub const DEFAULT_VIDEOTOOLBOX_BITRATE: &str = "5000k";

pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Interval at which a paused read loop re-checks its flags.
pub const DEFAULT_PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a cancelled encoder may take to exit before it is killed.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Number of stderr lines kept for failure reports.
pub const DEFAULT_STDERR_TAIL_LINES: usize = 20;

/// Main configuration structure for the intercut-core library.
///
/// # Examples
///
/// ```rust,no_run
/// use intercut_core::config::CoreConfigBuilder;
/// use std::time::Duration;
///
/// let config = CoreConfigBuilder::new()
///     .quality(20)
///     .preset("medium")
///     .software_only(true)
///     .inter_job_delay(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.tuning.quality, 20);
/// ```
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// ffmpeg binary used for the capability probe and the transcode.
    pub ffmpeg_path: PathBuf,

    /// ffprobe binary used for the duration and media probes.
    pub ffprobe_path: PathBuf,

    /// Encoder-specific quality and rate settings.
    pub tuning: EncoderTuning,

    /// Skip the capability probe and always use libx264.
    pub software_only: bool,

    pub pause_poll_interval: Duration,

    pub termination_grace: Duration,

    pub stderr_tail_lines: usize,

    /// Pause between two batch items. The wait is cancellable.
    pub inter_job_delay: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: resolve_tool("ffmpeg", "INTERCUT_FFMPEG"),
            ffprobe_path: resolve_tool("ffprobe", "INTERCUT_FFPROBE"),
            tuning: EncoderTuning {
                quality: get_env_u8("INTERCUT_QUALITY", DEFAULT_QUALITY),
                preset: get_env_string("INTERCUT_PRESET", DEFAULT_PRESET.to_string()),
                ..EncoderTuning::default()
            },
            software_only: get_env_bool("INTERCUT_SOFTWARE_ONLY", false),
            pause_poll_interval: DEFAULT_PAUSE_POLL_INTERVAL,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            stderr_tail_lines: DEFAULT_STDERR_TAIL_LINES,
            inter_job_delay: Duration::ZERO,
        }
    }
}

impl CoreConfig {
    /// Creates a configuration from defaults and environment overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that the configuration can drive a job.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tuning.quality > 51 {
            return Err(CoreError::Config(format!(
                "quality must be between 0 and 51, got {}",
                self.tuning.quality
            )));
        }
        if self.tuning.preset.trim().is_empty() {
            return Err(CoreError::Config("preset must not be empty".to_string()));
        }
        if self.tuning.videotoolbox_bitrate.trim().is_empty()
            || self.tuning.audio_bitrate.trim().is_empty()
        {
            return Err(CoreError::Config("bitrates must not be empty".to_string()));
        }
        if self.pause_poll_interval.is_zero() {
            return Err(CoreError::Config(
                "pause poll interval must be greater than zero".to_string(),
            ));
        }
        if self.stderr_tail_lines == 0 {
            return Err(CoreError::Config(
                "stderr tail must keep at least one line".to_string(),
            ));
        }
        if self.ffmpeg_path.as_os_str().is_empty() || self.ffprobe_path.as_os_str().is_empty() {
            return Err(CoreError::Config("tool paths must not be empty".to_string()));
        }
        Ok(())
    }
}
