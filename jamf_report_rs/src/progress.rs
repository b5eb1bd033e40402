//! Phase feedback for interactive runs: one spinner per collection phase,
//! replaced by a marked status line when the phase ends.
//!
//! Everything goes to stderr so `--format json --output -` keeps stdout clean.
//! indicatif hides the spinner itself when stderr is not a terminal.

use std::time::Duration;

use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};

/// How a phase (or the whole run) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Note,
    /// Finished, but something was left out of the report.
    Partial,
    Failed,
}

impl Status {
    fn marker(self) -> StyledObject<&'static str> {
        let marker = match self {
            Status::Done => style("✓").green(),
            Status::Note => style("ℹ").blue(),
            Status::Partial => style("⚠").yellow(),
            Status::Failed => style("✗").red(),
        };
        marker.bold().for_stderr()
    }
}

/// `✓ message`, coloured when stderr supports it.
pub fn render(status: Status, message: &str) -> String {
    format!("{} {message}", status.marker())
}

pub fn line(status: Status, message: &str) {
    eprintln!("{}", render(status, message));
}

pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(phase: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_message(phase.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// Clear the spinner and leave a status line in its place.
    pub fn finish(self, status: Status, message: &str) {
        self.bar.finish_and_clear();
        line(status, message);
    }
}

// An auth failure unwinds through `?` with the spinner still ticking.
impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Run time as `850ms`, `3.2s` or `4m 05s`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return format!("{millis}ms");
    }
    let secs = duration.as_secs();
    if secs < 60 {
        return format!("{:.1}s", duration.as_secs_f64());
    }
    format!("{}m {:02}s", secs / 60, secs % 60)
}

/// `1 row`, `12 rows`
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    let noun = if count == 1 { singular } else { plural };
    format!("{count} {noun}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(3240)), "3.2s");
        assert_eq!(format_duration(Duration::from_secs(245)), "4m 05s");
    }

    #[test]
    fn counts() {
        assert_eq!(format_count(1, "row", "rows"), "1 row");
        assert_eq!(format_count(0, "policy", "policies"), "0 policies");
    }

    #[test]
    fn status_lines_carry_their_marker() {
        assert!(render(Status::Done, "Wrote 5 sheets").contains("✓"));
        assert!(render(Status::Partial, "left out").contains("⚠"));
        assert!(render(Status::Failed, "boom").contains("✗"));
        assert!(render(Status::Note, "Cancelled").ends_with(" Cancelled"));
    }
}
