//! Encoder selection and encoder-specific tuning.
//!
//! The selector asks ffmpeg for its compiled-in encoder list once, then walks
//! a static per-platform preference table and takes the first encoder the
//! list mentions. Anything that goes wrong on the way degrades to libx264
//! without hardware acceleration; the choice only affects speed, never
//! whether a job can run.
//!
//! Tuning flags are looked up through [`EncoderId::tuning_builder`], a closed
//! table keyed on the encoder id.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_PRESET, DEFAULT_QUALITY,
    DEFAULT_VIDEOTOOLBOX_BITRATE,
};
use crate::error::{CoreError, CoreResult};

/// Host operating system families with distinct hardware encoder stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Platform {
    /// Detects the platform this binary runs on.
    #[must_use]
    pub fn current() -> Self {
        match env::consts::OS {
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            _ => Self::Other,
        }
    }

    /// Hardware encoders worth trying on this platform, best first.
    #[must_use]
    pub fn preferences(self) -> &'static [EncoderChoice] {
        match self {
            Self::MacOs => MACOS_PREFERENCES,
            Self::Windows => WINDOWS_PREFERENCES,
            Self::Linux => LINUX_PREFERENCES,
            Self::Other => &[],
        }
    }
}

const MACOS_PREFERENCES: &[EncoderChoice] =
    &[EncoderChoice::new(EncoderId::VideoToolbox, HwAccel::VideoToolbox)];

const WINDOWS_PREFERENCES: &[EncoderChoice] = &[
    EncoderChoice::new(EncoderId::Nvenc, HwAccel::Cuda),
    EncoderChoice::new(EncoderId::QuickSync, HwAccel::Qsv),
];

const LINUX_PREFERENCES: &[EncoderChoice] = &[
    EncoderChoice::new(EncoderId::Nvenc, HwAccel::Cuda),
    EncoderChoice::new(EncoderId::Vaapi, HwAccel::Vaapi),
];

/// Video encoders the command builder knows how to tune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderId {
    /// Software H.264 (libx264).
    X264,
    VideoToolbox,
    Nvenc,
    QuickSync,
    Vaapi,
}

impl EncoderId {
    /// The encoder name as ffmpeg spells it.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X264 => "libx264",
            Self::VideoToolbox => "h264_videotoolbox",
            Self::Nvenc => "h264_nvenc",
            Self::QuickSync => "h264_qsv",
            Self::Vaapi => "h264_vaapi",
        }
    }

    #[must_use]
    pub fn is_hardware(self) -> bool {
        !matches!(self, Self::X264)
    }

    /// Returns the function producing this encoder's tuning flags.
    #[must_use]
    pub fn tuning_builder(self) -> TuningBuilder {
        match self {
            Self::X264 => x264_tuning,
            Self::VideoToolbox => videotoolbox_tuning,
            Self::Nvenc => nvenc_tuning,
            Self::QuickSync => qsv_tuning,
            Self::Vaapi => vaapi_tuning,
        }
    }
}

impl fmt::Display for EncoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware acceleration mode passed to `-hwaccel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HwAccel {
    None,
    VideoToolbox,
    Cuda,
    Qsv,
    Vaapi,
}

impl HwAccel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::VideoToolbox => "videotoolbox",
            Self::Cuda => "cuda",
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
        }
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder and acceleration mode used for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncoderChoice {
    pub encoder: EncoderId,
    pub hwaccel: HwAccel,
}

impl EncoderChoice {
    #[must_use]
    pub const fn new(encoder: EncoderId, hwaccel: HwAccel) -> Self {
        Self { encoder, hwaccel }
    }

    /// libx264 without hardware acceleration.
    #[must_use]
    pub const fn software() -> Self {
        Self::new(EncoderId::X264, HwAccel::None)
    }
}

impl fmt::Display for EncoderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} acceleration)", self.encoder, self.hwaccel)
    }
}

/// Quality and rate knobs shared by the tuning builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderTuning {
    /// Value for `-crf`, `-cq`, `-global_quality` or `-qp`.
    pub quality: u8,
    pub preset: String,
    pub videotoolbox_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncoderTuning {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            preset: DEFAULT_PRESET.to_string(),
            videotoolbox_bitrate: DEFAULT_VIDEOTOOLBOX_BITRATE.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }
}

/// Produces the encoder-specific part of the argument vector.
pub type TuningBuilder = fn(&EncoderTuning) -> Vec<String>;

fn x264_tuning(tuning: &EncoderTuning) -> Vec<String> {
    vec![
        "-preset".to_string(),
        tuning.preset.clone(),
        "-crf".to_string(),
        tuning.quality.to_string(),
    ]
}

fn videotoolbox_tuning(tuning: &EncoderTuning) -> Vec<String> {
    // VideoToolbox may fall back to its software path when the GPU is busy.
    vec![
        "-b:v".to_string(),
        tuning.videotoolbox_bitrate.clone(),
        "-allow_sw".to_string(),
        "1".to_string(),
    ]
}

fn nvenc_tuning(tuning: &EncoderTuning) -> Vec<String> {
    vec![
        "-preset".to_string(),
        tuning.preset.clone(),
        "-cq".to_string(),
        tuning.quality.to_string(),
    ]
}

fn qsv_tuning(tuning: &EncoderTuning) -> Vec<String> {
    vec![
        "-preset".to_string(),
        tuning.preset.clone(),
        "-global_quality".to_string(),
        tuning.quality.to_string(),
    ]
}

fn vaapi_tuning(tuning: &EncoderTuning) -> Vec<String> {
    vec!["-qp".to_string(), tuning.quality.to_string()]
}

/// Picks the first preferred encoder present in `capabilities`.
///
/// `capabilities` is the raw text printed by `ffmpeg -encoders`; entries are
/// matched by substring.
#[must_use]
pub fn select_encoder(platform: Platform, capabilities: &str) -> EncoderChoice {
    platform
        .preferences()
        .iter()
        .find(|choice| capabilities.contains(choice.encoder.as_str()))
        .copied()
        .unwrap_or_else(EncoderChoice::software)
}

/// Source of the transcoder's encoder list.
pub trait CapabilityProbe: Send + Sync {
    /// Returns the raw encoder listing.
    fn list_encoders(&self) -> CoreResult<String>;
}

/// Runs `ffmpeg -hide_banner -encoders`.
#[derive(Debug, Clone)]
pub struct FfmpegCapabilityProbe {
    ffmpeg_path: PathBuf,
}

impl FfmpegCapabilityProbe {
    #[must_use]
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl CapabilityProbe for FfmpegCapabilityProbe {
    fn list_encoders(&self) -> CoreResult<String> {
        debug!(
            "Querying encoder list from {}",
            self.ffmpeg_path.display()
        );
        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .output()
            .map_err(|e| CoreError::EncoderProbe(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(CoreError::EncoderProbe(format!(
                "ffmpeg -encoders exited with {:?}",
                output.status.code()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Chooses the encoder once and hands out the cached result afterwards.
pub struct EncoderSelector {
    probe: Arc<dyn CapabilityProbe>,
    platform: Platform,
    software_only: bool,
    choice: OnceCell<EncoderChoice>,
}

impl EncoderSelector {
    #[must_use]
    pub fn new(probe: Arc<dyn CapabilityProbe>, platform: Platform, software_only: bool) -> Self {
        Self {
            probe,
            platform,
            software_only,
            choice: OnceCell::new(),
        }
    }

    /// Returns the encoder for this run, probing on first use.
    pub fn choose(&self) -> EncoderChoice {
        *self.choice.get_or_init(|| self.detect())
    }

    fn detect(&self) -> EncoderChoice {
        if self.software_only {
            info!("Software encoding forced; skipping encoder probe");
            return EncoderChoice::software();
        }

        let choice = match self.probe.list_encoders() {
            Ok(capabilities) => select_encoder(self.platform, &capabilities),
            Err(e) => {
                warn!("{e}; falling back to libx264");
                EncoderChoice::software()
            }
        };
        info!("Selected encoder: {choice}");
        choice
    }
}

impl fmt::Debug for EncoderSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderSelector")
            .field("platform", &self.platform)
            .field("software_only", &self.software_only)
            .field("choice", &self.choice.get())
            .finish_non_exhaustive()
    }
}
