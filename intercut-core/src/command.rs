//! Job requests and the ffmpeg argument builder.
//!
//! A cut keeps the first `take` seconds of every `take + skip` second cycle.
//! The same `lt(mod(t,C),T)` expression drives the video `select` and the
//! audio `aselect` filters; `setpts`/`asetpts` then close the gaps left by
//! the dropped segments.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::encoder::{EncoderChoice, EncoderTuning, HwAccel};
use crate::error::{CoreError, CoreResult};

/// Extension of every cut output.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Keep/discard pattern of a cut, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CutCycle {
    pub take: u32,
    pub skip: u32,
}

impl CutCycle {
    /// Creates a cycle. Both durations must be at least one second.
    pub fn new(take: u32, skip: u32) -> CoreResult<Self> {
        if take == 0 {
            return Err(CoreError::InvalidRequest(
                "take must be at least 1 second".to_string(),
            ));
        }
        if skip == 0 {
            return Err(CoreError::InvalidRequest(
                "skip must be at least 1 second".to_string(),
            ));
        }
        if take.checked_add(skip).is_none() {
            return Err(CoreError::InvalidRequest(
                "take + skip overflows".to_string(),
            ));
        }
        Ok(Self { take, skip })
    }

    /// Length of one keep/discard period.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        u64::from(self.take) + u64::from(self.skip)
    }

    /// True when a sample at `t` seconds survives the cut.
    #[must_use]
    pub fn retains(&self, t: f64) -> bool {
        if !t.is_finite() || t < 0.0 {
            return false;
        }
        t.rem_euclid(self.cycle() as f64) < f64::from(self.take)
    }

    /// The `lt(mod(t,C),T)` selection expression.
    ///
    /// ffmpeg's `between` is inclusive at both ends and would keep the frame
    /// at `mod(t,C) == T`, so the upper bound is expressed with `lt`. `t` is
    /// never negative, which makes the lower bound implicit.
    #[must_use]
    pub fn select_expr(&self) -> String {
        format!("lt(mod(t,{}),{})", self.cycle(), self.take)
    }

    /// Retained windows `[start, end)` within the first `duration` seconds.
    #[must_use]
    pub fn windows(&self, duration: f64) -> Vec<(f64, f64)> {
        let cycle = self.cycle() as f64;
        let take = f64::from(self.take);
        let mut windows = Vec::new();
        let mut start = 0.0;
        while start < duration {
            windows.push((start, (start + take).min(duration)));
            start += cycle;
        }
        windows
    }
}

/// A single cut job. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    input: PathBuf,
    output: PathBuf,
    cycle: CutCycle,
}

impl JobRequest {
    /// Validates the take/skip durations and builds the request.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        take: u32,
        skip: u32,
    ) -> CoreResult<Self> {
        let input = input.into();
        let output = output.into();
        if input.as_os_str().is_empty() || output.as_os_str().is_empty() {
            return Err(CoreError::InvalidRequest(
                "input and output paths must not be empty".to_string(),
            ));
        }
        if input == output {
            return Err(CoreError::InvalidRequest(format!(
                "output would overwrite the input: {}",
                input.display()
            )));
        }
        Ok(Self {
            input,
            output,
            cycle: CutCycle::new(take, skip)?,
        })
    }

    /// Builds a request whose output sits in `output_dir` under the
    /// conventional cut name.
    pub fn in_dir(input: impl Into<PathBuf>, output_dir: &Path, take: u32, skip: u32) -> CoreResult<Self> {
        let input = input.into();
        let output = output_dir.join(output_file_name(&input, take, skip));
        Self::new(input, output, take, skip)
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    #[must_use]
    pub fn cycle(&self) -> CutCycle {
        self.cycle
    }
}

/// `cut_<stem>_take<T>s_skip<S>s.mp4`
#[must_use]
pub fn output_file_name(input: &Path, take: u32, skip: u32) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    format!("cut_{stem}_take{take}s_skip{skip}s.{OUTPUT_EXTENSION}")
}

/// Builds the ffmpeg argument vector for a cut.
///
/// The binary itself is not part of the vector.
#[must_use]
pub fn build_cut_args(
    request: &JobRequest,
    choice: &EncoderChoice,
    tuning: &EncoderTuning,
) -> Vec<String> {
    let select = request.cycle.select_expr();
    let mut args: Vec<String> = Vec::with_capacity(40);

    // Acceleration must be set up before the input is opened.
    if choice.hwaccel != HwAccel::None {
        args.push("-hwaccel".to_string());
        args.push(choice.hwaccel.as_str().to_string());
    }
    args.push("-i".to_string());
    args.push(request.input.to_string_lossy().into_owned());

    args.push("-threads".to_string());
    args.push("0".to_string());

    args.push("-vf".to_string());
    args.push(format!("select='{select}',setpts=N/FRAME_RATE/TB"));
    args.push("-af".to_string());
    args.push(format!("aselect='{select}',asetpts=N/SR/TB"));

    args.push("-c:v".to_string());
    args.push(choice.encoder.as_str().to_string());
    args.extend((choice.encoder.tuning_builder())(tuning));

    args.extend(
        [
            "-c:a",
            tuning.audio_codec.as_str(),
            "-b:a",
            tuning.audio_bitrate.as_str(),
            "-avoid_negative_ts",
            "make_zero",
            "-max_muxing_queue_size",
            "9999",
            "-fflags",
            "+genpts",
            "-movflags",
            "+faststart",
            "-progress",
            "pipe:1",
            "-y",
        ]
        .iter()
        .map(|s| (*s).to_string()),
    );
    args.push(request.output.to_string_lossy().into_owned());

    args
}

/// Renders a command line as a shell-quoted string.
#[must_use]
pub fn command_preview(program: &Path, args: &[String]) -> String {
    let program = program.to_string_lossy();
    std::iter::once(program.as_ref())
        .chain(args.iter().map(String::as_str))
        .map(|part| {
            shlex::try_quote(part)
                .map(|quoted| quoted.into_owned())
                .unwrap_or_else(|_| part.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderId;

    fn request() -> JobRequest {
        JobRequest::new("/videos/in.mov", "/out/cut.mp4", 5, 10).unwrap()
    }

    fn position(args: &[String], flag: &str) -> usize {
        args.iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("{flag} missing from {args:?}"))
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(
            JobRequest::new("a.mp4", "b.mp4", 0, 10),
            Err(CoreError::InvalidRequest(_))
        ));
        assert!(matches!(
            JobRequest::new("a.mp4", "b.mp4", 5, 0),
            Err(CoreError::InvalidRequest(_))
        ));
        assert!(JobRequest::new("a.mp4", "a.mp4", 5, 5).is_err());
        assert!(JobRequest::new("a.mp4", "b.mp4", 1, 1).is_ok());
    }

    #[test]
    fn test_thirty_second_input_windows() {
        let cycle = CutCycle::new(5, 10).unwrap();
        assert_eq!(cycle.cycle(), 15);
        assert_eq!(cycle.windows(30.0), vec![(0.0, 5.0), (15.0, 20.0)]);
        assert!(cycle.select_expr().contains("mod(t,15)"));
        assert_eq!(cycle.select_expr(), "lt(mod(t,15),5)");
    }

    #[test]
    fn test_retains_never_selects_skip_region() {
        for take in 1..=6u32 {
            for skip in 1..=6u32 {
                let cycle = CutCycle::new(take, skip).unwrap();
                let period = cycle.cycle() as f64;
                let mut t = 0.0;
                while t < period * 3.0 {
                    let phase = t % period;
                    assert_eq!(
                        cycle.retains(t),
                        phase < f64::from(take),
                        "take={take} skip={skip} t={t}"
                    );
                    t += 0.25;
                }
            }
        }
    }

    /// Evaluates `lt(mod(t,C),T)` the way ffmpeg's expression evaluator does:
    /// `mod(a,b)` is `a - b*floor(a/b)` and `lt` yields 1 only for a strict
    /// inequality.
    fn eval_select_expr(expr: &str, t: f64) -> bool {
        let inner = expr
            .strip_prefix("lt(mod(t,")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or_else(|| panic!("unexpected select expression {expr}"));
        let (cycle, take) = inner.split_once("),").unwrap();
        let cycle: f64 = cycle.parse().unwrap();
        let take: f64 = take.parse().unwrap();
        t - cycle * (t / cycle).floor() < take
    }

    #[test]
    fn test_select_expr_excludes_take_boundary() {
        let cycle = CutCycle::new(5, 10).unwrap();
        let expr = cycle.select_expr();
        // Frame 125 at 25 fps sits exactly on the first skip boundary.
        for t in [0.0, 4.96, 5.0, 5.04, 14.96, 15.0, 19.96, 20.0, 29.96] {
            assert_eq!(eval_select_expr(&expr, t), cycle.retains(t), "t={t}");
        }
        assert!(!eval_select_expr(&expr, 5.0));
        assert!(!eval_select_expr(&expr, 20.0));

        for take in 1..=6u32 {
            for skip in 1..=6u32 {
                let cycle = CutCycle::new(take, skip).unwrap();
                let expr = cycle.select_expr();
                for frame in 0..(cycle.cycle() * 3 * 25) {
                    let t = frame as f64 / 25.0;
                    assert_eq!(
                        eval_select_expr(&expr, t),
                        cycle.retains(t),
                        "take={take} skip={skip} t={t}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_software_args_exact() {
        let args = build_cut_args(
            &request(),
            &EncoderChoice::software(),
            &EncoderTuning::default(),
        );
        let expected: Vec<String> = [
            "-i",
            "/videos/in.mov",
            "-threads",
            "0",
            "-vf",
            "select='lt(mod(t,15),5)',setpts=N/FRAME_RATE/TB",
            "-af",
            "aselect='lt(mod(t,15),5)',asetpts=N/SR/TB",
            "-c:v",
            "libx264",
            "-preset",
            "fast",
            "-crf",
            "23",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-avoid_negative_ts",
            "make_zero",
            "-max_muxing_queue_size",
            "9999",
            "-fflags",
            "+genpts",
            "-movflags",
            "+faststart",
            "-progress",
            "pipe:1",
            "-y",
            "/out/cut.mp4",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
        assert!(!args.contains(&"-hwaccel".to_string()));
    }

    #[test]
    fn test_hwaccel_precedes_input() {
        let choice = EncoderChoice::new(EncoderId::Nvenc, HwAccel::Cuda);
        let args = build_cut_args(&request(), &choice, &EncoderTuning::default());

        let hw = position(&args, "-hwaccel");
        assert_eq!(args[hw + 1], "cuda");
        assert!(hw < position(&args, "-i"));
        assert_eq!(args[position(&args, "-c:v") + 1], "h264_nvenc");
        assert_eq!(args[position(&args, "-cq") + 1], "23");
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_output_is_last_and_overwritten() {
        let choice = EncoderChoice::new(EncoderId::VideoToolbox, HwAccel::VideoToolbox);
        let args = build_cut_args(&request(), &choice, &EncoderTuning::default());
        assert_eq!(args.last().map(String::as_str), Some("/out/cut.mp4"));
        assert_eq!(args[args.len() - 2], "-y");
        assert_eq!(args[position(&args, "-progress") + 1], "pipe:1");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("/media/Holiday Clip.mkv"), 5, 10),
            "cut_Holiday Clip_take5s_skip10s.mp4"
        );
        let request = JobRequest::in_dir("/media/a.avi", Path::new("/out"), 2, 3).unwrap();
        assert_eq!(request.output(), Path::new("/out/cut_a_take2s_skip3s.mp4"));
    }

    #[test]
    fn test_command_preview_quotes_filters() {
        let args = build_cut_args(
            &request(),
            &EncoderChoice::software(),
            &EncoderTuning::default(),
        );
        let preview = command_preview(Path::new("ffmpeg"), &args);
        assert!(preview.starts_with("ffmpeg -i /videos/in.mov"));
        assert!(preview.contains("mod(t,15)"));
        let reparsed = shlex::split(&preview).unwrap();
        assert_eq!(&reparsed[1..], args.as_slice());
    }
}
