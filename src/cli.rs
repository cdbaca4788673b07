// Waggle Ingest CLI binary

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use waggle_ingest_lib::ingest::{run_ingest, DayOutcome, RunSummary};
use waggle_ingest_lib::progress::ProgressReporter;
use waggle_ingest_lib::tools::{is_tool_available, FFMPEG_ENV_KEY};
use waggle_ingest_lib::{constants, FfmpegTranscoder, PipelineConfig};

/// Processes zipped waggle-detector output from <INPUT_DIR> into per-day video
/// folders and correction ledgers under <OUTPUT_DIR>.
#[derive(Parser, Debug)]
#[command(name = "waggle-ingest")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory containing zipped per-day detector output
    input_dir: PathBuf,

    /// Directory where processed output is stored
    output_dir: PathBuf,

    /// Archives processed in parallel
    #[arg(short, long, default_value_t = constants::DEFAULT_UNIT_WORKERS)]
    workers: usize,

    /// Transcodes running in parallel within one archive
    #[arg(long, default_value_t = constants::DEFAULT_TRANSCODE_WORKERS)]
    transcode_workers: usize,

    /// ffmpeg binary (defaults to WAGGLE_FFMPEG_PATH, a bundled copy, or PATH)
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// x264 constant rate factor
    #[arg(long, default_value_t = constants::VIDEO_CRF)]
    crf: u32,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = PipelineConfig::new(&cli.input_dir, &cli.output_dir);
    config.workers = cli.workers;
    config.transcode_workers = cli.transcode_workers;
    config.profile.crf = cli.crf;
    if let Some(ffmpeg) = cli.ffmpeg {
        config.ffmpeg_path = ffmpeg;
    }

    if !cli.input_dir.exists() {
        anyhow::bail!("{} does not exist.", cli.input_dir.display());
    }
    if !cli.input_dir.is_dir() {
        anyhow::bail!("{} is not a valid directory.", cli.input_dir.display());
    }
    if !is_tool_available(&config.ffmpeg_path) {
        anyhow::bail!(
            "ffmpeg not found or not runnable at {}. Install it, or pass --ffmpeg / set {}.",
            config.ffmpeg_path.display(),
            FFMPEG_ENV_KEY
        );
    }

    let transcoder = FfmpegTranscoder::new(config.ffmpeg_path.clone(), config.profile.clone());
    let progress = ProgressReporter::new(0, !cli.no_progress && std::io::stderr().is_terminal());

    let summary = run_ingest(&config, &transcoder, &progress)
        .with_context(|| format!("Ingest of {} failed", cli.input_dir.display()))?;

    print_summary(&summary);

    if let Some(path) = cli.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

fn print_summary(summary: &RunSummary) {
    let elapsed = summary.finished_at - summary.started_at;

    println!();
    println!("Ingest complete in {}s:", elapsed.num_seconds());
    println!("  Units processed: {}", summary.completed());
    println!("  Units skipped:   {}", summary.skipped());
    println!("  Units failed:    {}", summary.failed());
    println!("  Clips written:   {}", summary.rows());
    println!("  Events dropped:  {}", summary.dropped());
    println!("  Events failed:   {}", summary.event_failures());

    if !summary.duplicates.is_empty() {
        println!();
        println!("Archives ignored (duplicate day name):");
        for path in &summary.duplicates {
            println!("  {}", path.display());
        }
    }

    let failed_units: Vec<_> = summary
        .units
        .iter()
        .filter_map(|u| match &u.outcome {
            DayOutcome::Failed { reason } => Some((u, reason)),
            _ => None,
        })
        .collect();
    if !failed_units.is_empty() {
        println!();
        println!("Failed units:");
        for (unit, reason) in failed_units {
            println!("  {} ({}): {}", unit.unit, unit.archive.display(), reason);
        }
    }

    let event_failures: Vec<_> = summary
        .units
        .iter()
        .flat_map(|u| u.failures.iter().map(move |f| (u.unit.as_str(), f)))
        .collect();
    if !event_failures.is_empty() {
        println!();
        println!("{:<12}  {:<10}  {:<40}  {}", "Unit", "Stage", "Entry", "Error");
        println!("{}", "-".repeat(90));
        for (unit, failure) in event_failures {
            let entry = shorten(&failure.entry, 40);
            println!("{:<12}  {:<10}  {:<40}  {}", unit, format!("{:?}", failure.stage), entry, failure.error);
            if let Some(dest) = &failure.destination {
                println!("{:<12}  {:<10}  -> {}", "", "", dest.display());
            }
        }
    }
}

/// Keep the tail of long entry names, which is the part that differs.
fn shorten(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}
