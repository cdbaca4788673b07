// Waggle Ingest - Library Entry Point
//
// Turns zipped per-day detector captures into
//   <output>/<day>/{tagged-dances,untagged-dances}/<id>.mp4
//   <output>/<day>/data.csv

pub mod config;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod progress;
pub mod tools;
pub mod transcode;

pub use config::{EncodingProfile, PipelineConfig};
pub use error::{IngestError, Result};
pub use ingest::{run_ingest, DayOutcome, DayReport, RunSummary};
pub use transcode::{FfmpegTranscoder, Transcoder};
