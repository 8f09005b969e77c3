//! FFprobe integration for duration and media summary probes
//!
//! The supervisor only needs the container duration; the `info` view also
//! wants the first video stream's geometry, frame rate and codec. Both come
//! from a single `ffprobe -show_format -show_streams` call made through the
//! `ffprobe` crate with the resolved binary.

use crate::error::{CoreError, CoreResult, command_failed_error, command_start_error};
use ffprobe::{Config, FfProbe, FfProbeError, ffprobe_config};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Media properties shown by the `info` view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSummary {
    pub duration_secs: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Frames per second, evaluated from `r_frame_rate`.
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    pub file_size: u64,
}

/// Source of media metadata.
pub trait FfprobeExecutor: Send + Sync {
    /// Returns the container duration in seconds. Always finite and positive.
    fn probe_duration(&self, input_path: &Path) -> CoreResult<f64>;

    /// Returns the duration plus the first video stream's properties.
    fn probe_media_summary(&self, input_path: &Path) -> CoreResult<MediaSummary>;
}

/// [`FfprobeExecutor`] backed by the `ffprobe` crate.
#[derive(Debug, Clone)]
pub struct CrateFfprobeExecutor {
    ffprobe_path: PathBuf,
}

impl CrateFfprobeExecutor {
    #[must_use]
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn run(&self, input_path: &Path, context: &str) -> CoreResult<FfProbe> {
        log::debug!(
            "Running {} for {context} on: {}",
            self.ffprobe_path.display(),
            input_path.display()
        );
        let config = Config::builder()
            .ffprobe_bin(&self.ffprobe_path)
            .build();
        ffprobe_config(config, input_path).map_err(|err| {
            log::error!(
                "ffprobe failed for {context} on {}: {:?}",
                input_path.display(),
                err
            );
            map_ffprobe_error(err, input_path, context)
        })
    }
}

impl FfprobeExecutor for CrateFfprobeExecutor {
    fn probe_duration(&self, input_path: &Path) -> CoreResult<f64> {
        let metadata = self.run(input_path, "duration")?;
        parse_duration(metadata.format.duration.as_deref(), input_path)
    }

    fn probe_media_summary(&self, input_path: &Path) -> CoreResult<MediaSummary> {
        let metadata = self.run(input_path, "media summary")?;
        let duration_secs = parse_duration(metadata.format.duration.as_deref(), input_path)?;
        let file_size = std::fs::metadata(input_path)?.len();

        let mut summary = MediaSummary {
            duration_secs,
            width: None,
            height: None,
            frame_rate: None,
            video_codec: None,
            file_size,
        };

        if let Some(video) = metadata
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
        {
            summary.width = video.width.and_then(|w| u32::try_from(w).ok());
            summary.height = video.height.and_then(|h| u32::try_from(h).ok());
            summary.frame_rate = parse_frame_rate(&video.r_frame_rate);
            summary.video_codec = video.codec_name.clone();
        } else {
            log::warn!("No video stream found in {}", input_path.display());
        }

        Ok(summary)
    }
}

/// Parses ffprobe's `format.duration` field.
pub(crate) fn parse_duration(raw: Option<&str>, input_path: &Path) -> CoreResult<f64> {
    let probe_error = |reason: String| CoreError::Probe {
        path: input_path.display().to_string(),
        reason,
    };

    let raw = raw.ok_or_else(|| probe_error("no duration in format section".to_string()))?;
    let duration: f64 = raw
        .trim()
        .parse()
        .map_err(|_| probe_error(format!("unparsable duration '{raw}'")))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(probe_error(format!("non-positive duration {duration}")));
    }
    Ok(duration)
}

/// Evaluates a rational frame rate such as `30000/1001`.
pub(crate) fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = match raw.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (raw.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

fn map_ffprobe_error(err: FfProbeError, input_path: &Path, context: &str) -> CoreError {
    match err {
        FfProbeError::Io(io_err) => command_start_error(format!("ffprobe ({context})"), io_err),
        FfProbeError::Status(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let exit = command_failed_error(format!("ffprobe ({context})"), output.status, stderr);
            CoreError::Probe {
                path: input_path.display().to_string(),
                reason: exit.to_string(),
            }
        }
        FfProbeError::Deserialize(err) => CoreError::Probe {
            path: input_path.display().to_string(),
            reason: format!("unreadable ffprobe output: {err}"),
        },
        _ => CoreError::Probe {
            path: input_path.display().to_string(),
            reason: format!("unknown ffprobe error: {err:?}"),
        },
    }
}
