use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, NaiveDateTime, Utc};

use crate::domain::ScanTable;
use crate::error::ScantabError;

pub const COLUMNS: [&str; 8] = [
    "FileId",
    "Subject",
    "Session",
    "Acquisition",
    "Filename",
    "SeriesNumber",
    "Timestamp",
    "Created",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Write the table as CSV under `dest` (created if absent) and return the
/// full output path. Absent optionals serialize as empty cells. A write
/// failure is fatal; there is no partial-output recovery.
pub fn write_csv(
    table: &ScanTable,
    dest: &Utf8Path,
    file_name: &str,
) -> Result<Utf8PathBuf, ScantabError> {
    fs::create_dir_all(dest.as_std_path())
        .map_err(|err| ScantabError::Filesystem(err.to_string()))?;
    let path = dest.join(file_name);

    let mut out = String::new();
    out.push_str(&COLUMNS.join(","));
    out.push('\n');
    for (file_id, record) in table {
        let row = [
            csv_field(file_id),
            csv_field(&record.subject),
            csv_field(&record.session),
            csv_field(&record.acquisition),
            csv_field(&record.file_name),
            record
                .series_number
                .map(|value| value.to_string())
                .unwrap_or_default(),
            format_timestamp(record.timestamp),
            format_timestamp(record.created),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    fs::write(path.as_std_path(), out).map_err(|err| ScantabError::Filesystem(err.to_string()))?;
    Ok(path)
}

/// Derived output name when the caller does not supply one: embeds the
/// project label and the date range the run covered.
pub fn default_file_name(project_label: &str, since: Option<NaiveDate>) -> String {
    let today = Utc::now().date_naive();
    match since {
        Some(since) => format!("{project_label}_scans_{since}_to_{today}.csv"),
        None => format!("{project_label}_scans_{today}.csv"),
    }
}

fn format_timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|value| value.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::ScanRecord;

    fn record(series: Option<i64>) -> ScanRecord {
        ScanRecord {
            subject: "S1".to_string(),
            session: "V1".to_string(),
            acquisition: "T1w".to_string(),
            file_name: "scan.nii.gz".to_string(),
            series_number: series,
            timestamp: Some(
                NaiveDate::from_ymd_opt(2021, 1, 1)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
            ),
            created: None,
        }
    }

    #[test]
    fn writes_header_and_rows_in_fixed_order() {
        let temp = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

        let mut table = ScanTable::new();
        table.insert("file1".to_string(), record(Some(3)));

        let path = write_csv(&table, &dest, "out.csv").unwrap();
        let content = std::fs::read_to_string(path.as_std_path()).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "FileId,Subject,Session,Acquisition,Filename,SeriesNumber,Timestamp,Created"
        );
        assert_eq!(
            lines.next().unwrap(),
            "file1,S1,V1,T1w,scan.nii.gz,3,2021-01-01T10:00:00,"
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn absent_optionals_are_empty_cells() {
        let temp = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

        let mut table = ScanTable::new();
        let mut rec = record(None);
        rec.timestamp = None;
        table.insert("file1".to_string(), rec);

        let path = write_csv(&table, &dest, "out.csv").unwrap();
        let content = std::fs::read_to_string(path.as_std_path()).unwrap();
        assert!(content.lines().nth(1).unwrap().ends_with("scan.nii.gz,,,"));
    }

    #[test]
    fn creates_missing_destination_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dest =
            Utf8PathBuf::from_path_buf(temp.path().join("nested").join("deeper")).unwrap();

        let table = ScanTable::new();
        let path = write_csv(&table, &dest, "out.csv").unwrap();
        assert!(path.as_std_path().exists());
    }

    #[test]
    fn quotes_fields_containing_delimiters() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn default_name_embeds_label_and_range() {
        let today = Utc::now().date_naive();
        assert_eq!(
            default_file_name("Study", None),
            format!("Study_scans_{today}.csv")
        );
        let since = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        assert_eq!(
            default_file_name("Study", Some(since)),
            format!("Study_scans_2021-06-01_to_{today}.csv")
        );
    }
}
