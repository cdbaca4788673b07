// Archive discovery

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::constants::ARCHIVE_EXTENSION;
use crate::error::{IngestError, Result};

/// One day's archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUnit {
    pub path: PathBuf,
    /// File stem; names the unit's output folder.
    pub name: String,
}

impl ArchiveUnit {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IngestError::InvalidPath(format!("no usable file stem: {}", path.display())))?;

        Ok(Self {
            path: path.to_path_buf(),
            name: name.to_string(),
        })
    }

    pub fn output_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.name)
    }
}

/// Find every archive below `root`, sorted by path.
pub fn discover_archives(root: &Path) -> Result<Vec<ArchiveUnit>> {
    let mut files = Vec::new();

    if root.is_file() {
        if is_archive_file(root) {
            files.push(root.to_path_buf());
        }
    } else if root.is_dir() {
        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    log::warn!("Skipping unreadable path during discovery: {}", err);
                    None
                }
            })
        {
            let path = entry.path();
            if path.is_file() && is_archive_file(path) {
                files.push(path.to_path_buf());
            }
        }
    } else {
        return Err(IngestError::InvalidPath(format!("{} does not exist", root.display())));
    }

    files.sort();

    let mut units = Vec::with_capacity(files.len());
    for path in files {
        match ArchiveUnit::from_path(&path) {
            Ok(unit) => units.push(unit),
            Err(e) => log::warn!("Ignoring archive: {}", e),
        }
    }
    Ok(units)
}

/// Split units into those with a unique output name and later duplicates.
/// The first archive (in path order) for a given name wins.
pub fn split_duplicate_names(units: Vec<ArchiveUnit>) -> (Vec<ArchiveUnit>, Vec<ArchiveUnit>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut duplicates = Vec::new();

    for unit in units {
        if seen.insert(unit.name.clone()) {
            unique.push(unit);
        } else {
            duplicates.push(unit);
        }
    }

    (unique, duplicates)
}

/// Check if a file is an archive based on extension
pub fn is_archive_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        .unwrap_or(false)
}
