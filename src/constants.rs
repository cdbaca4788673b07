// Waggle Ingest Constants
// These values define the on-disk contract shared with the review tool. Do not change
// without updating the reviewer as well.

// Archive layout
pub const ARCHIVE_EXTENSION: &str = "zip";
pub const FRAMES_SUFFIX: &str = "frames.apng";
pub const METADATA_SUFFIX: &str = "waggle.json";
pub const FRAMES_EXTENSION: &str = "apng";

// Classification
pub const TARGET_LABEL: &str = "waggle";

// Identifiers
pub const IDENTIFIER_WIDTH: usize = 4;

// Output layout
pub const TAGGED_DANCE_DIR: &str = "tagged-dances";
pub const UNTAGGED_DANCE_DIR: &str = "untagged-dances";
pub const LEDGER_FILENAME: &str = "data.csv";
pub const STAGING_FOLDER: &str = ".staging";
pub const TEMP_FILE_SUFFIX: &str = "tmp";

// Category codes (tagged = 1)
pub const TAGGED: &str = "tagged";
pub const UNTAGGED: &str = "untagged";
pub const TAGGED_CODE: u8 = 1;
pub const UNTAGGED_CODE: u8 = 0;

// Encoding profile
pub const VIDEO_EXTENSION: &str = "mp4";
pub const VIDEO_CODEC: &str = "libx264";
pub const VIDEO_CRF: u32 = 18;
pub const VIDEO_PIX_FMT: &str = "yuv420p";

// Concurrency defaults
pub const DEFAULT_UNIT_WORKERS: usize = 1;
pub const DEFAULT_TRANSCODE_WORKERS: usize = 2;

// Ledger columns, in file order
pub const LEDGER_COLUMNS: [&str; 9] = [
    "day_dance_id",
    "waggle_id",
    "category",
    "category_label",
    "confidence",
    "corrected_category",
    "corrected_category_label",
    "dance_type",
    "corrected_dance_type",
];
