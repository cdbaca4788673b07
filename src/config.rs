// Run configuration

use std::fs;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_TRANSCODE_WORKERS, DEFAULT_UNIT_WORKERS, TARGET_LABEL, VIDEO_CODEC, VIDEO_CRF,
    VIDEO_EXTENSION, VIDEO_PIX_FMT,
};
use crate::error::{IngestError, Result};

/// Fixed encoding settings applied to every clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProfile {
    pub codec: String,
    pub crf: u32,
    pub pix_fmt: String,
    pub extension: String,
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            codec: VIDEO_CODEC.to_string(),
            crf: VIDEO_CRF,
            pix_fmt: VIDEO_PIX_FMT.to_string(),
            extension: VIDEO_EXTENSION.to_string(),
        }
    }
}

/// Everything one run needs. Passed by reference into each unit; never global.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Archive units processed in parallel.
    pub workers: usize,
    /// Transcodes running in parallel within one unit.
    pub transcode_workers: usize,
    pub target_label: String,
    pub ffmpeg_path: PathBuf,
    pub profile: EncodingProfile,
}

impl PipelineConfig {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            workers: DEFAULT_UNIT_WORKERS,
            transcode_workers: DEFAULT_TRANSCODE_WORKERS,
            target_label: TARGET_LABEL.to_string(),
            ffmpeg_path: crate::tools::ffmpeg_path(),
            profile: EncodingProfile::default(),
        }
    }

    /// Run-level checks. Creates the output root when everything else is valid.
    pub fn validate(&self) -> Result<()> {
        if !self.input_root.exists() {
            return Err(IngestError::InvalidPath(format!(
                "{} does not exist",
                self.input_root.display()
            )));
        }
        if !self.input_root.is_dir() {
            return Err(IngestError::InvalidPath(format!(
                "{} is not a valid directory",
                self.input_root.display()
            )));
        }
        if self.workers == 0 {
            return Err(IngestError::Config("workers must be at least 1".to_string()));
        }
        if self.transcode_workers == 0 {
            return Err(IngestError::Config(
                "transcode workers must be at least 1".to_string(),
            ));
        }
        if self.output_root.exists() && !self.output_root.is_dir() {
            return Err(IngestError::InvalidPath(format!(
                "{} exists and is not a directory",
                self.output_root.display()
            )));
        }

        fs::create_dir_all(&self.output_root)?;
        Ok(())
    }
}
