//! Line parser for ffmpeg progress output.
//!
//! Works on both the `-progress` key/value stream (`frame=120`,
//! `out_time=00:00:12.500000`) and the human-oriented stats line
//! (`frame=  120 fps=25 ... time=00:00:12.50 ...`). Unknown lines are normal
//! and simply produce an empty signal.

use once_cell::sync::Lazy;
use regex::Regex;

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time=(\d{2,}):(\d{2}):(\d{2})\.(\d{2})").expect("time pattern is valid")
});

static FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"frame=\s*(\d+)").expect("frame pattern is valid"));

/// What a single line revealed. Both fields are independent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineSignal {
    /// Position in the output timeline, in seconds.
    pub elapsed: Option<f64>,
    pub frame: Option<u64>,
}

impl LineSignal {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elapsed.is_none() && self.frame.is_none()
    }
}

/// Extracts `HH:MM:SS.hh` after `time=` as seconds.
#[must_use]
pub fn parse_elapsed(line: &str) -> Option<f64> {
    let caps = TIME_RE.captures(line)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let hundredths = field(4)?;
    Some(
        f64::from(hours) * 3600.0
            + f64::from(minutes) * 60.0
            + f64::from(seconds)
            + f64::from(hundredths) / 100.0,
    )
}

/// Extracts the number after `frame=`.
#[must_use]
pub fn parse_frame(line: &str) -> Option<u64> {
    FRAME_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parses one line of output.
#[must_use]
pub fn parse_line(line: &str) -> LineSignal {
    LineSignal {
        elapsed: parse_elapsed(line),
        frame: parse_frame(line),
    }
}
