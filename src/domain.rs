use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// The only file type tabulated; everything else is skipped during extraction.
pub const NIFTI_TYPE: &str = "nifti";

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subject {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Acquisition {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub file_id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub info: Map<String, Value>,
}

impl FileEntry {
    pub fn is_nifti(&self) -> bool {
        self.file_type.as_deref() == Some(NIFTI_TYPE)
    }
}

/// One structured-query result: an acquisition reference with its
/// subject/session context already attached, so the incremental path never
/// re-walks the hierarchy.
#[derive(Debug, Clone)]
pub struct AcquisitionHit {
    pub acquisition_id: String,
    pub subject_code: String,
    pub session_label: String,
}

/// Flat per-file tuple produced by extraction. Labels and the file name are
/// always present; the three trailing fields may be absent when upstream
/// metadata is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub subject: String,
    pub session: String,
    pub acquisition: String,
    pub file_name: String,
    pub series_number: Option<i64>,
    pub timestamp: Option<NaiveDateTime>,
    pub created: Option<NaiveDateTime>,
}

/// Result table keyed by the remote-assigned file id. Ids are unique by
/// construction; the BTreeMap only buys a deterministic export order.
pub type ScanTable = BTreeMap<String, ScanRecord>;
