// Run progress reporting
//
// A bar over archive units for interactive runs, plus log lines for every unit
// event so non-interactive runs still leave a trail.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;

/// Progress of one unit through its events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitProgress {
    pub unit: String,
    pub phase: String,
    pub current: u64,
    pub total: u64,
    pub percent: f64,
    pub message: String,
}

impl UnitProgress {
    pub fn new(unit: impl Into<String>, phase: impl Into<String>, current: u64, total: u64) -> Self {
        let total_safe = total.max(1);
        let percent = (current as f64 / total_safe as f64) * 100.0;
        Self {
            unit: unit.into(),
            phase: phase.into(),
            current,
            total,
            percent: percent.min(100.0),
            message: String::new(),
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = msg.into();
        self
    }
}

/// Shared across unit workers; `ProgressBar` is internally synchronized.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(total_units: u64, visible: bool) -> Self {
        let bar = ProgressBar::new(total_units);
        if visible {
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} units ({eta}) {msg}")
            {
                bar.set_style(style.progress_chars("##-"));
            }
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }

    /// Reporter that only logs.
    pub fn hidden() -> Self {
        Self::new(0, false)
    }

    pub fn set_total(&self, total_units: u64) {
        self.bar.set_length(total_units);
    }

    pub fn report(&self, progress: &UnitProgress) {
        log::debug!(
            "[{}] {} {}/{} ({:.0}%) {}",
            progress.unit,
            progress.phase,
            progress.current,
            progress.total,
            progress.percent,
            progress.message
        );
        self.bar.set_message(format!("{} {}", progress.unit, progress.phase));
    }

    pub fn unit_finished(&self, unit: &str, outcome: &str) {
        log::info!("[{}] {}", unit, outcome);
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_clamped() {
        let p = UnitProgress::new("day", "transcoding", 5, 4);
        assert_eq!(p.percent, 100.0);
        let p = UnitProgress::new("day", "scanning", 0, 0);
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn test_hidden_reporter_counts_units() {
        let reporter = ProgressReporter::hidden();
        reporter.set_total(2);
        reporter.report(&UnitProgress::new("day", "scanning", 1, 2).with_message("x"));
        reporter.unit_finished("day", "complete");
        assert_eq!(reporter.bar.position(), 1);
        reporter.finish();
    }
}
