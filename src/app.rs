use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use crate::domain::{Acquisition, FileEntry, NIFTI_TYPE, Project, ScanRecord, ScanTable};
use crate::error::ScantabError;
use crate::extract::extract_fields;
use crate::flywheel::{FlywheelClient, SEARCH_LIMIT};
use crate::progress::ProgressSink;

#[derive(Clone)]
pub struct App<C: FlywheelClient> {
    client: C,
}

impl<C: FlywheelClient> App<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn lookup_project(&self, label: &str) -> Result<Project, ScantabError> {
        self.client.lookup_project(label)
    }

    /// Full traversal: every subject, every session (reloaded), every
    /// acquisition (reloaded), every NIfTI file. Any remote error aborts
    /// the run; there is no partial-failure handling.
    pub fn scan_project(
        &self,
        project: &Project,
        sink: &dyn ProgressSink,
    ) -> Result<ScanTable, ScantabError> {
        let mut table = ScanTable::new();
        let subjects = self.client.subjects(&project.id)?;
        sink.begin_subjects(subjects.len() as u64);

        for subject in &subjects {
            let sessions = self.client.sessions(&subject.id)?;

            // Pre-count acquisitions so the per-subject bar has a total.
            let mut acquisition_total = 0u64;
            for session in &sessions {
                acquisition_total += self.client.acquisitions(&session.id)?.len() as u64;
            }
            sink.begin_subject(&subject.label, acquisition_total);

            for session in sessions {
                let session = self.client.reload_session(&session.id)?;
                for acquisition in self.client.acquisitions(&session.id)? {
                    let acquisition = self.client.reload_acquisition(&acquisition.id)?;
                    for file in &acquisition.files {
                        if !file.is_nifti() {
                            continue;
                        }
                        sink.file_seen(&file.name);
                        record_file(&mut table, &subject.label, &session.label, &acquisition, file);
                    }
                    sink.acquisition_done();
                }
            }
            sink.subject_done();
        }

        sink.finish();
        Ok(table)
    }

    /// Incremental path: one structured server-side query filtered by file
    /// type and creation date, then a per-file re-filter because a matching
    /// acquisition may still contain older files. The boundary comparison is
    /// timezone-aware (midnight UTC on the since-date); the stored value
    /// stays naive, matching what the full traversal records.
    pub fn scan_since(
        &self,
        project: &Project,
        since: NaiveDate,
    ) -> Result<ScanTable, ScantabError> {
        let query = structured_query(project, since);
        let hits = self.client.search_acquisitions(&query, SEARCH_LIMIT)?;
        if hits.is_empty() {
            return Err(ScantabError::NoResults(query));
        }
        info!(hits = hits.len(), "structured query matched acquisitions");

        let boundary = since.and_time(NaiveTime::MIN).and_utc();
        let mut table = ScanTable::new();
        for hit in hits {
            let acquisition = self.client.reload_acquisition(&hit.acquisition_id)?;
            for file in &acquisition.files {
                if !file.is_nifti() {
                    continue;
                }
                let Some(created) = file.created else {
                    continue;
                };
                if created < boundary {
                    continue;
                }
                record_file(
                    &mut table,
                    &hit.subject_code,
                    &hit.session_label,
                    &acquisition,
                    file,
                );
            }
        }
        Ok(table)
    }
}

/// Record-construction step shared by both drivers. The file's creation
/// timestamp is stored stripped of its timezone.
fn record_file(
    table: &mut ScanTable,
    subject: &str,
    session: &str,
    acquisition: &Acquisition,
    file: &FileEntry,
) {
    let (file_id, series_number, timestamp) = extract_fields(file, acquisition);
    table.insert(
        file_id,
        ScanRecord {
            subject: subject.to_string(),
            session: session.to_string(),
            acquisition: acquisition.label.clone(),
            file_name: file.name.clone(),
            series_number,
            timestamp,
            created: file.created.map(|value| value.naive_utc()),
        },
    );
}

fn structured_query(project: &Project, since: NaiveDate) -> String {
    format!(
        "project._id = {} AND file.type = {NIFTI_TYPE} AND file.created >= {since}",
        project.id
    )
}
