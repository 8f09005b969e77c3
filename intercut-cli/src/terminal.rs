// ============================================================================
// intercut-cli/src/terminal.rs
// ============================================================================
//
// TERMINAL OUTPUT: Human-readable view of the job event stream
//
// Renders the events of a batch as sections, status lines and one progress
// bar per job. The bar is drawn on stderr and hidden when stderr is not a
// terminal; the status lines always go to stdout.
//
// Visual hierarchy:
//
// 1. Sections (===== SECTION =====) for the batch start and summary
// 2. Processing steps (» [1/3] file) for each job
// 3. Status items (  Label:     Value) for details
// 4. Results (✓ / ✗ / ⊘) for the end of each job

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use intercut_core::events::{EventHandler, JobEvent, JobEventKind};
use intercut_core::{BatchSummary, JobOutcome, JobState, format_bytes, format_duration};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Styling constants for terminal output
pub mod styling {
    pub const SUCCESS_SYMBOL: &str = "✓";
    pub const PROCESSING_SYMBOL: &str = "»";
    pub const ERROR_SYMBOL: &str = "✗";
    pub const CANCELLED_SYMBOL: &str = "⊘";

    pub const SECTION_PREFIX: &str = "===== ";
    pub const SECTION_SUFFIX: &str = " =====";

    pub const STATUS_INDENT: &str = "  ";
    pub const SUB_ITEM_INDENT: &str = "    ";

    /// Width the status labels are padded to.
    pub const LABEL_WIDTH: usize = 14;
}

/// Formats a section header.
#[must_use]
pub fn format_section(title: &str) -> String {
    format!(
        "{}{}{}",
        styling::SECTION_PREFIX,
        style(title.to_uppercase()).cyan().bold(),
        styling::SECTION_SUFFIX
    )
}

/// Formats a status line (key-value pair).
#[must_use]
pub fn format_status(label: &str, value: &str, highlight: bool) -> String {
    let label = format!("{label}:");
    let value = if highlight {
        style(value).bold().to_string()
    } else {
        value.to_string()
    };
    format!(
        "{}{:<width$} {}",
        styling::STATUS_INDENT,
        label,
        value,
        width = styling::LABEL_WIDTH + 1
    )
}

/// Prints a status line straight to stdout.
pub fn print_status(label: &str, value: &str, highlight: bool) {
    println!("{}", format_status(label, value, highlight));
}

/// Prints a section header straight to stdout.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format_section(title));
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner} {msg:<10} {percent:>3}% [{bar:30}] {elapsed_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##.")
}

#[derive(Default)]
struct TerminalState {
    bar: Option<ProgressBar>,
}

/// [`EventHandler`] drawing the batch in the terminal.
pub struct TerminalEventHandler {
    verbose: bool,
    state: Mutex<TerminalState>,
}

impl TerminalEventHandler {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            state: Mutex::new(TerminalState::default()),
        }
    }

    fn new_bar() -> ProgressBar {
        let bar = ProgressBar::new(100);
        bar.set_style(progress_style());
        bar.set_message("starting");
        if std::io::stderr().is_terminal() {
            bar.enable_steady_tick(Duration::from_millis(120));
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar
    }

    /// Prints above the bar when one is drawn, so the two do not interleave.
    fn say(state: &TerminalState, line: &str) {
        match &state.bar {
            Some(bar) if !bar.is_hidden() => bar.suspend(|| println!("{line}")),
            _ => println!("{line}"),
        }
    }

    fn finish_bar(state: &mut TerminalState) {
        if let Some(bar) = state.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn on_event(&self, state: &mut TerminalState, event: &JobEvent) {
        match &event.kind {
            JobEventKind::BatchStarted { total } => {
                println!();
                println!("{}", format_section("Cutting"));
                println!("{}", format_status("Files", &total.to_string(), true));
                println!(
                    "{}Controls: p + Enter pauses, r resumes, c cancels",
                    styling::STATUS_INDENT
                );
            }
            JobEventKind::JobStarted { input, output, total } => {
                println!();
                println!(
                    "{}{} {}",
                    styling::STATUS_INDENT,
                    styling::PROCESSING_SYMBOL,
                    style(format!("[{}/{}] {}", event.job + 1, total, file_name(input))).bold()
                );
                println!("{}", format_status("Output", &output.display().to_string(), false));
                state.bar = Some(Self::new_bar());
            }
            JobEventKind::EncoderSelected { choice, command } => {
                Self::say(state, &format_status("Encoder", &choice.to_string(), false));
                if self.verbose {
                    Self::say(state, &format!("{}{}", styling::SUB_ITEM_INDENT, style(command).dim()));
                }
            }
            JobEventKind::StateChanged { to, .. } => {
                if let Some(bar) = &state.bar {
                    match to {
                        JobState::Running => bar.set_message("cutting"),
                        JobState::Paused => bar.set_message("paused"),
                        JobState::Cancelling => bar.set_message("cancelling"),
                        _ => {}
                    }
                }
            }
            JobEventKind::Progress(snapshot) => {
                if let Some(bar) = &state.bar {
                    bar.set_position(u64::from(snapshot.percent));
                }
            }
            JobEventKind::Frame { .. } => {}
            JobEventKind::Completed { output, output_size } => {
                Self::finish_bar(state);
                println!(
                    "{}{} {} ({})",
                    styling::STATUS_INDENT,
                    style(styling::SUCCESS_SYMBOL).green(),
                    file_name(output),
                    format_bytes(*output_size)
                );
            }
            JobEventKind::Failed {
                message,
                exit_code,
                stderr_tail,
            } => {
                Self::finish_bar(state);
                println!(
                    "{}{} {}",
                    styling::STATUS_INDENT,
                    style(styling::ERROR_SYMBOL).red().bold(),
                    style(message).red()
                );
                if let Some(code) = exit_code {
                    println!("{}", format_status("Exit code", &code.to_string(), false));
                }
                let shown = if self.verbose { stderr_tail.len() } else { 3 };
                let skip = stderr_tail.len().saturating_sub(shown);
                for line in &stderr_tail[skip..] {
                    println!("{}{}", styling::SUB_ITEM_INDENT, style(line).dim());
                }
            }
            JobEventKind::Cancelled { cleanup_warning } => {
                Self::finish_bar(state);
                println!(
                    "{}{} {}",
                    styling::STATUS_INDENT,
                    style(styling::CANCELLED_SYMBOL).yellow(),
                    "Cancelled"
                );
                if let Some(warning) = cleanup_warning {
                    println!("{}{}", styling::SUB_ITEM_INDENT, style(warning).yellow());
                }
            }
            JobEventKind::BatchComplete(summary) => {
                Self::finish_bar(state);
                print_summary("Summary", summary);
            }
            JobEventKind::BatchCancelled(summary) => {
                Self::finish_bar(state);
                print_summary("Cancelled", summary);
            }
        }
    }
}

impl EventHandler for TerminalEventHandler {
    fn handle(&self, event: &JobEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.on_event(&mut state, event);
    }
}

/// Counts of a batch summary as one line, e.g. "2 completed, 1 failed".
#[must_use]
pub fn summary_line(summary: &BatchSummary) -> String {
    let mut parts = vec![format!("{} completed", summary.completed)];
    if summary.failed > 0 {
        parts.push(format!("{} failed", summary.failed));
    }
    if summary.cancelled > 0 {
        parts.push(format!("{} cancelled", summary.cancelled));
    }
    if summary.not_started > 0 {
        parts.push(format!("{} not started", summary.not_started));
    }
    format!("{} of {} file(s): {}", summary.completed, summary.total(), parts.join(", "))
}

fn print_summary(title: &str, summary: &BatchSummary) {
    print_section(title);
    println!("{}{}", styling::STATUS_INDENT, summary_line(summary));
    for item in &summary.items {
        let (symbol, detail) = match &item.outcome {
            Some(JobOutcome::Completed { output_size, .. }) => (
                style(styling::SUCCESS_SYMBOL).green(),
                format_bytes(*output_size),
            ),
            Some(JobOutcome::Failed { message, .. }) => {
                (style(styling::ERROR_SYMBOL).red(), message.clone())
            }
            Some(JobOutcome::Cancelled) => {
                (style(styling::CANCELLED_SYMBOL).yellow(), "cancelled".to_string())
            }
            None => (style("-").dim(), "not started".to_string()),
        };
        println!(
            "{}{} {}: {}",
            styling::STATUS_INDENT,
            symbol,
            file_name(&item.input),
            detail
        );
    }
}

/// Formats an elapsed wall-clock time for the closing line of a run.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format_duration(elapsed.as_secs_f64())
}
