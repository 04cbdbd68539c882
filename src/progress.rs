use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Observational side channel for traversal progress. Sinks never influence
/// the outcome of a run.
pub trait ProgressSink {
    fn begin_subjects(&self, total: u64);
    fn begin_subject(&self, label: &str, acquisition_total: u64);
    fn file_seen(&self, name: &str);
    fn acquisition_done(&self);
    fn subject_done(&self);
    fn finish(&self);
}

/// No-op sink for tests and non-interactive runs.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn begin_subjects(&self, _total: u64) {}
    fn begin_subject(&self, _label: &str, _acquisition_total: u64) {}
    fn file_seen(&self, _name: &str) {}
    fn acquisition_done(&self) {}
    fn subject_done(&self) {}
    fn finish(&self) {}
}

/// Terminal progress: an outer bar over subjects and a transient inner bar
/// over the current subject's acquisitions, with the file being processed
/// shown as the inner bar's message.
pub struct BarProgress {
    multi: MultiProgress,
    subjects: Mutex<Option<ProgressBar>>,
    current: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            subjects: Mutex::new(None),
            current: Mutex::new(None),
        }
    }

    fn bar_style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn begin_subjects(&self, total: u64) {
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(Self::bar_style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} subjects {msg}",
        ));
        bar.enable_steady_tick(Duration::from_millis(100));
        *self.subjects.lock().expect("progress lock") = Some(bar);
    }

    fn begin_subject(&self, label: &str, acquisition_total: u64) {
        let bar = self.multi.add(ProgressBar::new(acquisition_total));
        bar.set_style(Self::bar_style(
            "  {spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} acquisitions {msg}",
        ));
        bar.set_message(format!("subject {label}"));
        *self.current.lock().expect("progress lock") = Some(bar);
    }

    fn file_seen(&self, name: &str) {
        if let Some(bar) = self.current.lock().expect("progress lock").as_ref() {
            bar.set_message(name.to_string());
        }
    }

    fn acquisition_done(&self) {
        if let Some(bar) = self.current.lock().expect("progress lock").as_ref() {
            bar.inc(1);
        }
    }

    fn subject_done(&self) {
        if let Some(bar) = self.current.lock().expect("progress lock").take() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        if let Some(bar) = self.subjects.lock().expect("progress lock").as_ref() {
            bar.inc(1);
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.subjects.lock().expect("progress lock").take() {
            bar.finish_with_message("done");
        }
        self.multi.clear().ok();
    }
}
