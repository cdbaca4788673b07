// Ingest pipeline module

pub mod archive;
pub mod day;
pub mod discover;
pub mod filter;
pub mod ids;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use crossbeam_channel::unbounded;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::transcode::Transcoder;

pub use day::{process_unit, DayOutcome, DayPipeline, DayReport, EventFailure, FailureStage, UnitState};
pub use discover::ArchiveUnit;

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub units: Vec<DayReport>,
    /// Archives skipped because an earlier archive already claimed their name.
    pub duplicates: Vec<PathBuf>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(UnitState::Complete)
    }

    pub fn skipped(&self) -> usize {
        self.count(UnitState::SkippedAlreadyDone)
    }

    pub fn failed(&self) -> usize {
        self.count(UnitState::Failed)
    }

    pub fn rows(&self) -> usize {
        self.units.iter().map(|u| u.rows()).sum()
    }

    pub fn dropped(&self) -> usize {
        self.units.iter().map(|u| u.dropped).sum()
    }

    pub fn event_failures(&self) -> usize {
        self.units.iter().map(|u| u.failures.len()).sum()
    }

    pub fn unit(&self, name: &str) -> Option<&DayReport> {
        self.units.iter().find(|u| u.unit == name)
    }

    fn count(&self, state: UnitState) -> usize {
        self.units.iter().filter(|u| u.outcome.state() == state).count()
    }
}

/// Run the pipeline over every archive below the input root.
///
/// Errors only for run-level problems (bad roots, unreadable input root).
/// Unit and event failures are recorded in the summary.
pub fn run_ingest(config: &PipelineConfig, transcoder: &dyn Transcoder, progress: &ProgressReporter) -> Result<RunSummary> {
    config.validate()?;
    let started_at = Utc::now();

    let archives = discover::discover_archives(&config.input_root)?;
    let (units, duplicates) = discover::split_duplicate_names(archives);
    for dup in &duplicates {
        log::warn!(
            "Skipping {}: another archive already maps to output folder '{}'",
            dup.path.display(),
            dup.name
        );
    }

    log::info!(
        "Found {} archive(s) in {} ({} worker(s))",
        units.len(),
        config.input_root.display(),
        config.workers
    );
    progress.set_total(units.len() as u64);

    let mut reports = run_units(&units, config, transcoder, progress);
    reports.sort_by(|a, b| a.unit.cmp(&b.unit));
    progress.finish();

    Ok(RunSummary {
        started_at,
        finished_at: Utc::now(),
        units: reports,
        duplicates: duplicates.into_iter().map(|u| u.path).collect(),
    })
}

/// Fixed-size pool over units. Each unit is handled start to finish by one worker.
fn run_units(
    units: &[ArchiveUnit],
    config: &PipelineConfig,
    transcoder: &dyn Transcoder,
    progress: &ProgressReporter,
) -> Vec<DayReport> {
    let workers = config.workers.max(1).min(units.len().max(1));
    let (unit_tx, unit_rx) = unbounded::<&ArchiveUnit>();
    let (report_tx, report_rx) = unbounded::<DayReport>();

    for unit in units {
        // Receiver is alive until the scope below ends.
        let _ = unit_tx.send(unit);
    }
    drop(unit_tx);

    std::thread::scope(|s| {
        for _ in 0..workers {
            let unit_rx = unit_rx.clone();
            let report_tx = report_tx.clone();
            s.spawn(move || {
                for unit in unit_rx.iter() {
                    log::info!("[{}] processing {}", unit.name, unit.path.display());
                    let report = process_unit(unit, config, transcoder, progress);
                    progress.unit_finished(&unit.name, &describe(&report));
                    if report_tx.send(report).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(report_tx);

    report_rx.try_iter().collect()
}

fn describe(report: &DayReport) -> String {
    match &report.outcome {
        DayOutcome::Complete { rows } => format!(
            "complete: {} clip(s), {} dropped, {} failed",
            rows,
            report.dropped,
            report.failures.len()
        ),
        DayOutcome::SkippedAlreadyDone => "already processed".to_string(),
        DayOutcome::Failed { reason } => format!("failed: {}", reason),
    }
}
