// Per-day ledger (data.csv)
//
// One row per kept, transcoded event. The reviewer rewrites the whole file when it
// records corrections, so the column order and empty-string conventions are fixed.

pub mod category;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::constants::{LEDGER_COLUMNS, TEMP_FILE_SUFFIX};
use crate::error::{IngestError, Result};

pub use category::Category;

/// One ledger row.
///
/// `corrected` carries both `corrected_category` and `corrected_category_label`,
/// so a row can never have only one of them set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub day_dance_id: String,
    pub waggle_id: String,
    pub category: Category,
    pub confidence: Option<String>,
    pub corrected: Option<Category>,
    pub dance_type: String,
    pub corrected_dance_type: Option<String>,
}

impl LedgerRow {
    pub fn new(day_dance_id: impl Into<String>, waggle_id: impl Into<String>, category: Category, dance_type: impl Into<String>) -> Self {
        Self {
            day_dance_id: day_dance_id.into(),
            waggle_id: waggle_id.into(),
            category,
            confidence: None,
            corrected: None,
            dance_type: dance_type.into(),
            corrected_dance_type: None,
        }
    }

    /// Category after human review, falling back to the prediction.
    pub fn effective_category(&self) -> Category {
        self.corrected.unwrap_or(self.category)
    }

    /// Mark the prediction as wrong, or undo an existing correction.
    pub fn toggle_correction(&mut self) {
        self.corrected = match self.corrected {
            None => Some(self.category.flipped()),
            Some(_) => None,
        };
    }

    /// Path of this row's video relative to the unit folder.
    /// Videos stay under the predicted category even after correction.
    pub fn video_path(&self, extension: &str) -> PathBuf {
        Path::new(self.category.dir_name()).join(format!("{}.{}", self.day_dance_id, extension))
    }

    fn to_record(&self) -> [String; 9] {
        [
            self.day_dance_id.clone(),
            self.waggle_id.clone(),
            self.category.code().to_string(),
            self.category.label().to_string(),
            self.confidence.clone().unwrap_or_default(),
            self.corrected.map(|c| c.code().to_string()).unwrap_or_default(),
            self.corrected.map(|c| c.label().to_string()).unwrap_or_default(),
            self.dance_type.clone(),
            self.corrected_dance_type.clone().unwrap_or_default(),
        ]
    }

    fn from_record(record: &csv::StringRecord, line: u64) -> Result<Self> {
        if record.len() != LEDGER_COLUMNS.len() {
            return Err(IngestError::Ledger(format!(
                "line {}: expected {} fields, found {}",
                line,
                LEDGER_COLUMNS.len(),
                record.len()
            )));
        }
        let field = |i: usize| record.get(i).unwrap_or("");
        // Spreadsheet round-trips pad the category columns; free-text columns are kept verbatim.
        let code_field = |i: usize| field(i).trim();

        let category = parse_category(code_field(2), code_field(3))
            .map_err(|reason| IngestError::Ledger(format!("line {}: {}", line, reason)))?;

        let corrected = match (code_field(5), code_field(6)) {
            ("", "") => None,
            (code, label) if !code.is_empty() && !label.is_empty() => Some(
                parse_category(code, label)
                    .map_err(|reason| IngestError::Ledger(format!("line {}: corrected {}", line, reason)))?,
            ),
            _ => {
                return Err(IngestError::Ledger(format!(
                    "line {}: corrected_category and corrected_category_label must be set together",
                    line
                )))
            }
        };

        Ok(Self {
            day_dance_id: field(0).to_string(),
            waggle_id: field(1).to_string(),
            category,
            confidence: non_empty(field(4)),
            corrected,
            dance_type: field(7).to_string(),
            corrected_dance_type: non_empty(field(8)),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a code/label pair. Integer codes written as floats ("1.0") are accepted.
fn parse_category(code: &str, label: &str) -> std::result::Result<Category, String> {
    let code_num: u8 = code
        .parse::<u8>()
        .ok()
        .or_else(|| code.parse::<f64>().ok().filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= 255.0).map(|f| f as u8))
        .ok_or_else(|| format!("invalid category code '{}'", code))?;
    let from_code = Category::from_code(code_num).ok_or_else(|| format!("unknown category code {}", code_num))?;
    let from_label = Category::from_label(label).ok_or_else(|| format!("unknown category label '{}'", label))?;
    if from_code != from_label {
        return Err(format!("category code {} does not match label '{}'", code_num, label));
    }
    Ok(from_code)
}

/// Accumulates rows for one unit and writes them once at the end.
#[derive(Debug, Default)]
pub struct LedgerWriter {
    rows: Vec<LedgerRow>,
}

impl LedgerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: LedgerRow) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sort by identifier and write the ledger atomically. Returns the row count.
    pub fn finish(mut self, path: &Path) -> Result<usize> {
        // Length first so "10000" sorts after "9999".
        self.rows
            .sort_by(|a, b| (a.day_dance_id.len(), &a.day_dance_id).cmp(&(b.day_dance_id.len(), &b.day_dance_id)));
        write_ledger(path, &self.rows)?;
        Ok(self.rows.len())
    }
}

/// Write a full ledger via temp file + rename, so readers never see a partial file.
pub fn write_ledger(path: &Path, rows: &[LedgerRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    let result = write_rows(&tmp_path, rows);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_rows(tmp_path: &Path, rows: &[LedgerRow]) -> Result<()> {
    let file = File::create(tmp_path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(LEDGER_COLUMNS)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;

    let file = writer
        .into_inner()
        .map_err(|e| IngestError::Ledger(format!("failed to finish {}: {}", tmp_path.display(), e)))?;
    file.sync_all()?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(TEMP_FILE_SUFFIX);
    path.with_file_name(name)
}

/// Read a ledger back, validating the header and the correction pairing.
pub fn read_ledger(path: &Path) -> Result<Vec<LedgerRow>> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let found: Vec<&str> = headers.iter().map(|h| h.trim()).collect();
    if found != LEDGER_COLUMNS {
        return Err(IngestError::Ledger(format!(
            "unexpected header in {}: {}",
            path.display(),
            found.join(",")
        )));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        rows.push(LedgerRow::from_record(&record, idx as u64 + 2)?);
    }
    Ok(rows)
}
