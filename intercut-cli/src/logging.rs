// ============================================================================
// intercut-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: fern dispatch for the console and the run log
//
// The core library only talks to the `log` facade. This module installs the
// backend: a console sink on stderr at the level chosen with `-v`, and for
// `cut` a timestamped log file that always records debug output (including
// the full ffmpeg command lines and the stderr tail of failed jobs).

use anyhow::{Context, Result};
use console::style;
use log::{Level, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
///
/// Used for the log file name of each run.
///
/// # Example
/// ```
/// let log_filename = format!("intercut_cut_{}.log", intercut_cli::logging::get_timestamp());
/// assert!(log_filename.ends_with(".log"));
/// ```
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Console level for the given verbosity.
///
/// Lifecycle messages are already shown by the terminal view, so the quiet
/// console only carries warnings and errors.
#[must_use]
pub fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

fn styled_level(level: Level) -> String {
    let label = format!("{level:<5}");
    match level {
        Level::Error => style(label).red().bold().to_string(),
        Level::Warn => style(label).yellow().to_string(),
        Level::Info => style(label).green().to_string(),
        Level::Debug => style(label).blue().to_string(),
        Level::Trace => style(label).magenta().to_string(),
    }
}

/// Installs the global logger.
///
/// When `log_dir` is given, the directory is created and a
/// `intercut_cut_<timestamp>.log` file is added at debug level. Returns the
/// path of that file.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{} {}", styled_level(record.level()), message))
        })
        .level(console_level(verbose))
        .chain(std::io::stderr());

    let mut root = fern::Dispatch::new()
        .level(LevelFilter::Debug)
        // The sidecar logs every ffmpeg line it parses at debug level.
        .level_for("ffmpeg_sidecar", LevelFilter::Warn)
        .chain(console);

    let mut log_path = None;
    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;
        let path = dir.join(format!("intercut_cut_{}.log", get_timestamp()));
        let file = fern::log_file(&path)
            .with_context(|| format!("Failed to create log file '{}'", path.display()))?;

        root = root.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {:<5} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        strip_ansi_escapes::strip_str(message.to_string())
                    ))
                })
                .level(LevelFilter::Debug)
                .chain(file),
        );
        log_path = Some(path);
    }

    root.apply().context("Failed to install the logger")?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let stamp = get_timestamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'_');
        assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(true), LevelFilter::Debug);
        assert_eq!(console_level(false), LevelFilter::Warn);
    }
}
