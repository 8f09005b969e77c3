//! Formatting and path helpers shared by the core and the front-ends.

use std::path::Path;

use crate::discovery::VIDEO_EXTENSIONS;

/// Checks whether `path` is an existing file with a video extension.
#[must_use]
pub fn is_valid_video_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
}

/// Formats seconds as HH:MM:SS (e.g., 3725.0 -> "01:02:05"). Returns "??:??:??" for invalid inputs.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "??:??:??".to_string();
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Formats bytes with binary units (B, KiB, MiB, GiB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let bytes_f64 = bytes as f64;
    if bytes_f64 >= GIB {
        format!("{:.2} GiB", bytes_f64 / GIB)
    } else if bytes_f64 >= MIB {
        format!("{:.2} MiB", bytes_f64 / MIB)
    } else if bytes_f64 >= KIB {
        format!("{:.2} KiB", bytes_f64 / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Length of the cut output for a `duration` second input.
///
/// Whole cycles keep `take` seconds each; a trailing partial cycle keeps at
/// most `take`.
#[must_use]
pub fn estimated_output_secs(duration: f64, take: u32, skip: u32) -> f64 {
    if !duration.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    let take = f64::from(take);
    let cycle = take + f64::from(skip);
    if cycle <= 0.0 {
        return 0.0;
    }
    let whole = (duration / cycle).floor();
    let rest = duration - whole * cycle;
    whole * take + rest.min(take)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_is_valid_video_file() {
        let dir = tempdir().unwrap();
        for name in ["a.mp4", "b.MOV", "c.Mkv", "d.webm", "e.txt", "noext"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        assert!(is_valid_video_file(&dir.path().join("a.mp4")));
        assert!(is_valid_video_file(&dir.path().join("b.MOV")));
        assert!(is_valid_video_file(&dir.path().join("c.Mkv")));
        assert!(is_valid_video_file(&dir.path().join("d.webm")));
        assert!(!is_valid_video_file(&dir.path().join("e.txt")));
        assert!(!is_valid_video_file(&dir.path().join("noext")));
        assert!(!is_valid_video_file(&dir.path().join("missing.mp4")));
        assert!(!is_valid_video_file(dir.path()));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00:00");
        assert_eq!(format_duration(59.9), "00:00:59");
        assert_eq!(format_duration(3661.0), "01:01:01");
        assert_eq!(format_duration(90061.0), "25:01:01");
        assert_eq!(format_duration(-1.0), "??:??:??");
        assert_eq!(format_duration(f64::NAN), "??:??:??");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }

    #[test]
    fn test_estimated_output_secs() {
        assert_eq!(estimated_output_secs(30.0, 5, 10), 10.0);
        assert_eq!(estimated_output_secs(17.0, 5, 10), 7.0);
        assert_eq!(estimated_output_secs(3.0, 5, 10), 3.0);
        assert_eq!(estimated_output_secs(0.0, 5, 10), 0.0);
    }
}
