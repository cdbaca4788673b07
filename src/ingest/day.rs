// Day pipeline: one archive unit in, one output folder + ledger out
//
// Phases:
//   1. skip check   ledger present -> done; folder without ledger -> stale, rebuilt
//   2. scan         natural-ordered entries -> metadata -> filter -> extract
//   3. transcode    bounded pool fed while scanning, results keyed by scan order
//   4. commit       identifiers assigned to successful clips in scan order,
//                   clips moved into their category folder
//   5. ledger       written atomically; its presence marks the unit complete

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crossbeam_channel::{bounded, unbounded};
use serde::Serialize;

use super::archive::{ArchiveReader, EventMetadata};
use super::discover::ArchiveUnit;
use super::filter::{EventFilter, FilterDecision};
use super::ids::{format_identifier, IdentifierAssigner};
use crate::config::PipelineConfig;
use crate::constants::{IDENTIFIER_WIDTH, LEDGER_FILENAME, STAGING_FOLDER};
use crate::error::{IngestError, Result};
use crate::ledger::{Category, LedgerRow, LedgerWriter};
use crate::progress::{ProgressReporter, UnitProgress};
use crate::transcode::Transcoder;

/// Lifecycle of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    Processing,
    Complete,
    Failed,
    SkippedAlreadyDone,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, UnitState::Pending | UnitState::Processing)
    }
}

/// Terminal result of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayOutcome {
    Complete { rows: usize },
    SkippedAlreadyDone,
    Failed { reason: String },
}

impl DayOutcome {
    pub fn state(&self) -> UnitState {
        match self {
            DayOutcome::Complete { .. } => UnitState::Complete,
            DayOutcome::SkippedAlreadyDone => UnitState::SkippedAlreadyDone,
            DayOutcome::Failed { .. } => UnitState::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Metadata,
    Extract,
    Transcode,
    Commit,
}

/// One event that did not make it into the ledger. Carries enough context to
/// redo it by hand.
#[derive(Debug, Clone, Serialize)]
pub struct EventFailure {
    pub entry: String,
    pub stage: FailureStage,
    pub destination: Option<PathBuf>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    pub unit: String,
    pub archive: PathBuf,
    pub outcome: DayOutcome,
    /// Events that passed the filter.
    pub kept: usize,
    /// Events with a non-target label.
    pub dropped: usize,
    pub failures: Vec<EventFailure>,
}

impl DayReport {
    fn new(unit: &ArchiveUnit, outcome: DayOutcome) -> Self {
        Self {
            unit: unit.name.clone(),
            archive: unit.path.clone(),
            outcome,
            kept: 0,
            dropped: 0,
            failures: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        match self.outcome {
            DayOutcome::Complete { rows } => rows,
            _ => 0,
        }
    }
}

struct TranscodeJob {
    seq: usize,
    entry: String,
    metadata: EventMetadata,
    input: PathBuf,
    staged: PathBuf,
}

struct TranscodeDone {
    job: TranscodeJob,
    result: Result<()>,
}

/// Per-unit processing. Owns nothing shared; every unit writes only below its
/// own output folder.
pub struct DayPipeline<'a> {
    unit: &'a ArchiveUnit,
    config: &'a PipelineConfig,
    transcoder: &'a dyn Transcoder,
    progress: &'a ProgressReporter,
    filter: EventFilter,
    state: UnitState,
}

impl<'a> DayPipeline<'a> {
    pub fn new(
        unit: &'a ArchiveUnit,
        config: &'a PipelineConfig,
        transcoder: &'a dyn Transcoder,
        progress: &'a ProgressReporter,
    ) -> Self {
        Self {
            unit,
            config,
            transcoder,
            progress,
            filter: EventFilter::new(config.target_label.clone()),
            state: UnitState::Pending,
        }
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    fn transition(&mut self, next: UnitState) {
        log::debug!("[{}] {:?} -> {:?}", self.unit.name, self.state, next);
        self.state = next;
    }

    pub fn run(mut self) -> DayReport {
        let target = self.unit.output_dir(&self.config.output_root);
        let ledger_path = target.join(LEDGER_FILENAME);

        if ledger_path.exists() {
            log::info!("[{}] {} already exists, skipping", self.unit.name, ledger_path.display());
            self.transition(UnitState::SkippedAlreadyDone);
            return DayReport::new(self.unit, DayOutcome::SkippedAlreadyDone);
        }

        self.transition(UnitState::Processing);
        let mut report = DayReport::new(self.unit, DayOutcome::Complete { rows: 0 });

        match self.process(&target, &ledger_path, &mut report) {
            Ok(rows) => {
                self.transition(UnitState::Complete);
                report.outcome = DayOutcome::Complete { rows };
            }
            Err(e) => {
                log::error!("[{}] unit failed: {}", self.unit.name, e);
                self.transition(UnitState::Failed);
                report.outcome = DayOutcome::Failed { reason: e.to_string() };
            }
        }
        report
    }

    fn process(&self, target: &Path, ledger_path: &Path, report: &mut DayReport) -> Result<usize> {
        let mut reader = ArchiveReader::open(&self.unit.path).map_err(|e| {
            IngestError::Other(format!("cannot open archive {}: {}", self.unit.path.display(), e))
        })?;

        if target.exists() {
            log::warn!(
                "[{}] {} has no ledger (interrupted run), rebuilding it",
                self.unit.name,
                target.display()
            );
            fs::remove_dir_all(target)?;
        }

        for category in Category::ALL {
            fs::create_dir_all(target.join(category.dir_name()))?;
        }
        let staging = target.join(STAGING_FOLDER);
        fs::create_dir_all(&staging)?;

        let scratch = tempfile::Builder::new().prefix("waggle-extract-").tempdir()?;

        let entries = reader.frame_entries();
        log::info!("[{}] {} frame sequences in {}", self.unit.name, entries.len(), reader.path().display());

        let mut done = self.scan_and_transcode(&mut reader, &entries, scratch.path(), &staging, report);
        done.sort_by_key(|d| d.job.seq);

        let mut writer = LedgerWriter::new();
        self.commit(done, target, &mut writer, report);

        if let Err(e) = fs::remove_dir_all(&staging) {
            log::warn!("[{}] could not remove {}: {}", self.unit.name, staging.display(), e);
        }

        // No ledger means the next run rebuilds this unit.
        let transcode_failures = report
            .failures
            .iter()
            .filter(|f| f.stage == FailureStage::Transcode)
            .count();
        if writer.is_empty() && transcode_failures > 0 {
            return Err(IngestError::FFmpeg(format!(
                "all {} kept event(s) failed ({} in transcode); not writing {}",
                report.kept,
                transcode_failures,
                ledger_path.display()
            )));
        }

        let rows = writer.finish(ledger_path)?;
        Ok(rows)
    }

    /// Scan entries on this thread and feed kept events to transcode workers.
    fn scan_and_transcode(
        &self,
        reader: &mut ArchiveReader,
        entries: &[String],
        scratch: &Path,
        staging: &Path,
        report: &mut DayReport,
    ) -> Vec<TranscodeDone> {
        let workers = self.config.transcode_workers.max(1);
        let (job_tx, job_rx) = bounded::<TranscodeJob>(workers * 2);
        let (done_tx, done_rx) = unbounded::<TranscodeDone>();
        let total = entries.len() as u64;
        let extension = self.config.profile.extension.as_str();
        let transcoder = self.transcoder;

        std::thread::scope(|s| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    for job in job_rx.iter() {
                        let result = run_transcode(transcoder, &job.input, &job.staged);
                        let _ = fs::remove_file(&job.input);
                        if done_tx.send(TranscodeDone { job, result }).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(done_tx);

            for (idx, entry) in entries.iter().enumerate() {
                self.progress.report(
                    &UnitProgress::new(&self.unit.name, "scanning", idx as u64 + 1, total).with_message(entry.as_str()),
                );

                let metadata = match reader.read_metadata(entry) {
                    Ok(m) => m,
                    Err(e) => {
                        log::error!("[{}] skipping {}: {}", self.unit.name, entry, e);
                        report.failures.push(EventFailure {
                            entry: entry.clone(),
                            stage: FailureStage::Metadata,
                            destination: None,
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                if let FilterDecision::Drop { label } = self.filter.decide(&metadata) {
                    log::debug!("[{}] dropping {} (label '{}')", self.unit.name, entry, label);
                    report.dropped += 1;
                    continue;
                }
                report.kept += 1;

                // Scan position, not the final identifier; only successful clips get one.
                let key = format_identifier(idx as u32 + 1, IDENTIFIER_WIDTH);
                let staged = staging.join(format!("{}.{}", key, extension));

                let input = match reader.extract_frames(entry, scratch, &key) {
                    Ok(p) => p,
                    Err(e) => {
                        log::error!("[{}] failed to extract {}: {}", self.unit.name, entry, e);
                        report.failures.push(EventFailure {
                            entry: entry.clone(),
                            stage: FailureStage::Extract,
                            destination: Some(staged),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                let job = TranscodeJob {
                    seq: idx,
                    entry: entry.clone(),
                    metadata,
                    input,
                    staged,
                };
                if job_tx.send(job).is_err() {
                    log::error!("[{}] transcode workers stopped early", self.unit.name);
                    break;
                }
            }
            drop(job_tx);
        });

        done_rx.try_iter().collect()
    }

    /// Give successful clips their identifiers in scan order and move them into place.
    fn commit(&self, done: Vec<TranscodeDone>, target: &Path, writer: &mut LedgerWriter, report: &mut DayReport) {
        let mut ids = IdentifierAssigner::new();
        let extension = self.config.profile.extension.as_str();
        let total = done.len() as u64;

        for (idx, TranscodeDone { job, result }) in done.into_iter().enumerate() {
            self.progress.report(&UnitProgress::new(&self.unit.name, "committing", idx as u64 + 1, total));

            if let Err(e) = result {
                log::error!(
                    "[{}] transcode failed for {} -> {}: {}",
                    self.unit.name,
                    job.entry,
                    job.staged.display(),
                    e
                );
                report.failures.push(EventFailure {
                    entry: job.entry,
                    stage: FailureStage::Transcode,
                    destination: Some(job.staged),
                    error: e.to_string(),
                });
                continue;
            }

            let category = job.metadata.predicted_category();
            let day_dance_id = ids.peek();
            let destination = target
                .join(category.dir_name())
                .join(format!("{}.{}", day_dance_id, extension));

            if let Err(e) = fs::rename(&job.staged, &destination) {
                log::error!(
                    "[{}] could not move {} to {}: {}",
                    self.unit.name,
                    job.staged.display(),
                    destination.display(),
                    e
                );
                report.failures.push(EventFailure {
                    entry: job.entry,
                    stage: FailureStage::Commit,
                    destination: Some(destination),
                    error: e.to_string(),
                });
                continue;
            }

            let day_dance_id = ids.assign();
            writer.push(LedgerRow::new(
                day_dance_id,
                job.metadata.waggle_id,
                category,
                job.metadata.predicted_class_label,
            ));
        }
    }
}

fn run_transcode(transcoder: &dyn Transcoder, input: &Path, output: &Path) -> Result<()> {
    match catch_unwind(AssertUnwindSafe(|| transcoder.transcode(input, output))) {
        Ok(result) => result,
        Err(_) => Err(IngestError::FFmpeg(format!(
            "transcoder panicked on {}",
            input.display()
        ))),
    }
}

/// Process one unit end to end.
pub fn process_unit(
    unit: &ArchiveUnit,
    config: &PipelineConfig,
    transcoder: &dyn Transcoder,
    progress: &ProgressReporter,
) -> DayReport {
    DayPipeline::new(unit, config, transcoder, progress).run()
}
