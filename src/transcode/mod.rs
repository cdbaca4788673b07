// Clip transcoding
//
// Converts one extracted frame sequence (APNG) into an H.264 video with a fixed
// profile. Each call is a blocking ffmpeg subprocess; failures are returned to the
// caller and never panic.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::EncodingProfile;
use crate::constants::TEMP_FILE_SUFFIX;
use crate::error::{IngestError, Result};

/// Something that turns a frame-sequence file into a video file.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Transcoder backed by the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    profile: EncodingProfile,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, profile: EncodingProfile) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            profile,
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temp_output_path(output, &self.profile.extension);
        let args = build_args(input, &tmp_path, &self.profile)?;

        log::debug!("Running {} {}", self.ffmpeg.display(), args.join(" "));
        let result = Command::new(&self.ffmpeg).args(&args).output();

        let output_status = match result {
            Ok(o) => o,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(IngestError::FFmpeg(format!(
                    "failed to run {}: {}",
                    self.ffmpeg.display(),
                    e
                )));
            }
        };

        if !output_status.status.success() {
            let _ = fs::remove_file(&tmp_path);
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            return Err(IngestError::FFmpeg(format!(
                "transcode of {} exited with {}: {}",
                input.display(),
                output_status.status,
                last_lines(&stderr, 5)
            )));
        }

        fs::rename(&tmp_path, output)?;
        verify_output(output)
    }
}

/// Build the ffmpeg argument list for one clip.
pub fn build_args(input: &Path, output: &Path, profile: &EncodingProfile) -> Result<Vec<String>> {
    Ok(vec![
        "-y".into(),
        "-loglevel".into(), "error".into(),
        "-i".into(), path_str(input)?,
        "-c:v".into(), profile.codec.clone(),
        "-crf".into(), profile.crf.to_string(),
        "-pix_fmt".into(), profile.pix_fmt.clone(),
        path_str(output)?,
    ])
}

/// Check that a transcoded file exists and is not empty, removing empty files.
pub fn verify_output(output: &Path) -> Result<()> {
    if !output.exists() {
        return Err(IngestError::FFmpeg(format!("{} was not created", output.display())));
    }

    let size = fs::metadata(output)?.len();
    if size == 0 {
        let _ = fs::remove_file(output);
        return Err(IngestError::FFmpeg(format!("{} is empty", output.display())));
    }

    Ok(())
}

// Keeps the real extension last so ffmpeg can pick the muxer.
fn temp_output_path(output: &Path, extension: &str) -> PathBuf {
    output.with_extension(format!("{}.{}", TEMP_FILE_SUFFIX, extension))
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(String::from)
        .ok_or_else(|| IngestError::InvalidPath(format!("non UTF-8 path: {}", path.display())))
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}
