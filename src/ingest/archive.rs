// Archive reader for one day's detections
//
// Each event is a pair of members sharing a path prefix:
//   <prefix>frames.apng   frame sequence
//   <prefix>waggle.json   classifier metadata

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer};
use zip::ZipArchive;

use crate::constants::{FRAMES_EXTENSION, FRAMES_SUFFIX, METADATA_SUFFIX};
use crate::error::{IngestError, Result};
use crate::ledger::Category;

const MAX_PREALLOC: u64 = 1 << 20;

/// Classifier output for one event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventMetadata {
    pub predicted_class_label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub waggle_id: String,
    /// Optional tag prediction; absent means untagged.
    #[serde(default)]
    pub category_label: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventMetadata {
    pub fn from_slice(entry: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| IngestError::MalformedMetadata {
            entry: entry.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn predicted_category(&self) -> Category {
        match self.category_label.as_deref() {
            None => Category::Untagged,
            Some(label) => Category::from_label(label).unwrap_or_else(|| {
                log::warn!(
                    "Unknown category_label '{}' for waggle {}, treating as untagged",
                    label,
                    self.waggle_id
                );
                Category::Untagged
            }),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number, got {}", other))),
    }
}

/// Metadata member name for a frame-sequence member, or None if the name
/// does not follow the naming convention.
pub fn metadata_name_for(frames_entry: &str) -> Option<String> {
    frames_entry
        .strip_suffix(FRAMES_SUFFIX)
        .map(|prefix| format!("{}{}", prefix, METADATA_SUFFIX))
}

pub fn is_frames_entry(name: &str) -> bool {
    !name.ends_with('/') && name.ends_with(FRAMES_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalPart {
    // (digit count without leading zeros, digits)
    Number(usize, String),
    Text(String),
}

fn natural_key(re: &Regex, name: &str) -> Vec<NaturalPart> {
    re.find_iter(name)
        .map(|m| {
            let s = m.as_str();
            if s.as_bytes()[0].is_ascii_digit() {
                let trimmed = s.trim_start_matches('0');
                NaturalPart::Number(trimmed.len(), trimmed.to_string())
            } else {
                NaturalPart::Text(s.to_string())
            }
        })
        .collect()
}

/// Sort names so that digit runs compare numerically ("2/" before "10/").
/// Ties fall back to plain string order so the result is total.
pub fn sort_natural(names: &mut [String]) {
    let re = match Regex::new(r"\d+|\D+") {
        Ok(re) => re,
        Err(_) => {
            names.sort();
            return;
        }
    };
    names.sort_by_cached_key(|n| (natural_key(&re, n), n.clone()));
}

/// Open archive for one unit.
pub struct ArchiveReader {
    path: PathBuf,
    archive: ZipArchive<File>,
    names: HashSet<String>,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;
        let names = archive.file_names().map(String::from).collect();
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Frame-sequence members in natural order.
    pub fn frame_entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self
            .names
            .iter()
            .filter(|n| is_frames_entry(n))
            .cloned()
            .collect();
        sort_natural(&mut entries);
        entries
    }

    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(name)?;
        // Declared size comes from the archive directory and may be bogus.
        let mut bytes = Vec::with_capacity(file.size().min(MAX_PREALLOC) as usize);
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Load the sibling metadata of a frame-sequence member.
    pub fn read_metadata(&mut self, frames_entry: &str) -> Result<EventMetadata> {
        let metadata_name = metadata_name_for(frames_entry).ok_or_else(|| IngestError::MissingMetadata {
            entry: frames_entry.to_string(),
            expected: format!("a name ending in {}", FRAMES_SUFFIX),
        })?;

        if !self.contains(&metadata_name) {
            return Err(IngestError::MissingMetadata {
                entry: frames_entry.to_string(),
                expected: metadata_name,
            });
        }

        let bytes = self.read_entry(&metadata_name)?;
        EventMetadata::from_slice(&metadata_name, &bytes)
    }

    /// Extract a frame-sequence member to `<dest_dir>/<flat_stem>.apng`,
    /// dropping the nested path it has inside the archive.
    pub fn extract_frames(&mut self, frames_entry: &str, dest_dir: &Path, flat_stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(format!("{}.{}", flat_stem, FRAMES_EXTENSION));

        let mut file = self.archive.by_name(frames_entry)?;
        let mut out = File::create(&dest)?;
        let written = io::copy(&mut file, &mut out)?;
        if written == 0 {
            drop(out);
            let _ = fs::remove_file(&dest);
            return Err(IngestError::Other(format!("{} is empty", frames_entry)));
        }

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_metadata_name_for() {
        assert_eq!(metadata_name_for("12/44/8/frames.apng").as_deref(), Some("12/44/8/waggle.json"));
        assert_eq!(metadata_name_for("12/44/8/video.apng"), None);
    }

    #[test]
    fn test_natural_sort_orders_numbers_numerically() {
        let mut names = vec![
            "10/1/frames.apng".to_string(),
            "2/10/frames.apng".to_string(),
            "2/9/frames.apng".to_string(),
            "02/9/frames.apng".to_string(),
        ];
        sort_natural(&mut names);
        assert_eq!(names, vec!["02/9/frames.apng", "2/9/frames.apng", "2/10/frames.apng", "10/1/frames.apng"]);
    }

    #[test]
    fn test_metadata_accepts_numeric_waggle_id_and_extras() {
        let meta = EventMetadata::from_slice(
            "x/waggle.json",
            br#"{"predicted_class_label": "waggle", "waggle_id": 2198403, "cam_id": 1}"#,
        )
        .unwrap();
        assert_eq!(meta.waggle_id, "2198403");
        assert_eq!(meta.extra.get("cam_id"), Some(&serde_json::json!(1)));
        assert_eq!(meta.predicted_category(), Category::Untagged);
    }

    #[test]
    fn test_metadata_category_label() {
        let meta = EventMetadata::from_slice(
            "x/waggle.json",
            br#"{"predicted_class_label": "waggle", "waggle_id": "a", "category_label": "tagged"}"#,
        )
        .unwrap();
        assert_eq!(meta.predicted_category(), Category::Tagged);
    }

    #[test]
    fn test_malformed_metadata() {
        let err = EventMetadata::from_slice("x/waggle.json", br#"{"waggle_id": "a"}"#).unwrap_err();
        assert!(matches!(err, IngestError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_reader_lists_and_extracts_flat() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("day.zip");
        write_zip(&zip_path, &[
            ("12/44/8/frames.apng", "frames-a"),
            ("12/44/8/waggle.json", r#"{"predicted_class_label":"waggle","waggle_id":"1"}"#),
            ("3/1/0/frames.apng", "frames-b"),
        ]);

        let mut reader = ArchiveReader::open(&zip_path).unwrap();
        assert_eq!(reader.frame_entries(), vec!["3/1/0/frames.apng", "12/44/8/frames.apng"]);
        assert_eq!(reader.entry_names().len(), 3);

        let meta = reader.read_metadata("12/44/8/frames.apng").unwrap();
        assert_eq!(meta.waggle_id, "1");

        let err = reader.read_metadata("3/1/0/frames.apng").unwrap_err();
        match err {
            IngestError::MissingMetadata { entry, expected } => {
                assert_eq!(entry, "3/1/0/frames.apng");
                assert_eq!(expected, "3/1/0/waggle.json");
            }
            other => panic!("unexpected error: {}", other),
        }

        let out_dir = tmp.path().join("extract");
        let extracted = reader.extract_frames("12/44/8/frames.apng", &out_dir, "0001").unwrap();
        assert_eq!(extracted, out_dir.join("0001.apng"));
        assert_eq!(std::fs::read(&extracted).unwrap(), b"frames-a");
        assert!(!out_dir.join("12").exists());
    }

    #[test]
    fn test_read_entry_larger_than_preallocation() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("day.zip");
        let big = "x".repeat((MAX_PREALLOC as usize) * 2 + 7);
        write_zip(&zip_path, &[("0/frames.apng", big.as_str())]);

        let mut reader = ArchiveReader::open(&zip_path).unwrap();
        let bytes = reader.read_entry("0/frames.apng").unwrap();
        assert_eq!(bytes.len(), big.len());
    }

    #[test]
    fn test_open_non_zip_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        assert!(ArchiveReader::open(&path).is_err());
    }
}
