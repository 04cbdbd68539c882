use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::domain::{Acquisition, FileEntry};

const SERIES_NUMBER_KEY: &str = "SeriesNumber";
const DATETIME_KEY: &str = "AcquisitionDateTime";
const TIME_KEY: &str = "AcquisitionTime";
const DATE_KEY: &str = "AcquisitionDate";

/// Resolve the per-file fields: the remote file id (always present), the
/// series number, and the acquisition timestamp. The optional fields fall
/// back to absent when the metadata is missing or malformed; nothing here
/// is an error.
pub fn extract_fields(
    file: &FileEntry,
    acquisition: &Acquisition,
) -> (String, Option<i64>, Option<NaiveDateTime>) {
    let series = series_number(file);
    let timestamp = resolve_timestamp(file, acquisition);
    (file.file_id.clone(), series, timestamp)
}

fn series_number(file: &FileEntry) -> Option<i64> {
    match file.info.get(SERIES_NUMBER_KEY)? {
        Value::Number(num) => num
            .as_i64()
            .or_else(|| num.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok().or_else(|| {
            text.trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Timestamp resolution chain, first success wins:
/// 1. combined `AcquisitionDateTime` from file metadata
/// 2. the parent acquisition's timestamp date + `AcquisitionTime` from metadata
/// 3. date-only `AcquisitionDate` from metadata, at midnight
/// 4. absent
fn resolve_timestamp(file: &FileEntry, acquisition: &Acquisition) -> Option<NaiveDateTime> {
    if let Some(value) = info_str(file, DATETIME_KEY).and_then(parse_datetime) {
        return Some(value);
    }
    if let (Some(stamp), Some(time)) = (
        acquisition.timestamp,
        info_str(file, TIME_KEY).and_then(parse_time),
    ) {
        return Some(stamp.date_naive().and_time(time));
    }
    info_str(file, DATE_KEY)
        .and_then(parse_date)
        .map(|date| date.and_time(NaiveTime::MIN))
}

fn info_str<'a>(file: &'a FileEntry, key: &str) -> Option<&'a str> {
    file.info.get(key).and_then(Value::as_str)
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
        return Some(aware.naive_local());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y%m%d%H%M%S%.f",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    const FORMATS: &[&str] = &["%H:%M:%S%.f", "%H%M%S%.f", "%H:%M"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}
