//! # Progress Display Module
//!
//! Feedback visivo in tempo reale con `indicatif`.
//!
//! ## Responsabilità:
//! - Barra del batch: file completati sul totale, con il nome del file corrente
//! - Barra del job: secondi di media codificati sulla durata stimata dal probe
//! - Riepilogo finale al termine del batch
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========>-------------------------------] 2/9 (22%) clip.mov
//!   clip.mov (full-transcode) [=============>----------] 58% ETA 00:01:12
//! ```

use crate::batch::{BatchEvents, BatchSummary, FileReport};
use crate::config::EngineConfig;
use crate::planner::JobAction;
use crate::runner::JobOutcome;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Job bars count milliseconds of media
const UNITS_PER_SECOND: f64 = 1000.0;

/// Bar for the running job plus the exact media time behind it
struct JobBar {
    bar: ProgressBar,
    seconds: f64,
}

impl JobBar {
    fn advance(&mut self, seconds: f64) {
        self.seconds += seconds;
        self.bar.set_position((self.seconds * UNITS_PER_SECOND).round() as u64);
    }
}

/// Progress bars for a batch run
pub struct ProgressManager {
    multi: MultiProgress,
    batch: ProgressBar,
    job: Mutex<Option<JobBar>>,
}

impl ProgressManager {
    /// Bars drawn on stderr
    pub fn new(total_files: u64) -> Self {
        Self::with_target(total_files, ProgressDrawTarget::stderr())
    }

    /// Bars that track state without drawing anything
    pub fn hidden(total_files: u64) -> Self {
        Self::with_target(total_files, ProgressDrawTarget::hidden())
    }

    fn with_target(total_files: u64, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let batch = multi.add(ProgressBar::new(total_files));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            batch.set_style(style.progress_chars("=>-"));
        }
        batch.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            batch,
            job: Mutex::new(None),
        }
    }

    pub fn files_done(&self) -> u64 {
        self.batch.position()
    }

    /// Position of the current job bar in seconds, if a job is running
    pub fn job_seconds(&self) -> Option<f64> {
        self.job
            .lock()
            .ok()?
            .as_ref()
            .map(|job| job.bar.position() as f64 / UNITS_PER_SECOND)
    }

    /// Print a line above the bars
    pub fn println(&self, message: &str) {
        let _ = self.multi.println(message);
    }

    fn job_bar(&self, length_seconds: f64, message: String) -> ProgressBar {
        let bar = self
            .multi
            .add(ProgressBar::new((length_seconds * UNITS_PER_SECOND).round() as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {msg} [{bar:30.green/white}] {percent}% ETA {eta}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(message);
        bar
    }

    fn clear_job(&self) {
        if let Ok(mut slot) = self.job.lock() {
            if let Some(job) = slot.take() {
                job.bar.finish_and_clear();
            }
        }
    }
}

fn outcome_icon(outcome: &JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Success => "✅",
        JobOutcome::Skipped => "⏩",
        _ => "❌",
    }
}

impl BatchEvents for ProgressManager {
    fn batch_started(&self, total_files: usize, _config: &EngineConfig) {
        self.batch.set_length(total_files as u64);
    }

    fn file_started(&self, _index: usize, _total: usize, path: &Path, _size_bytes: u64) {
        self.batch
            .set_message(path.file_name().unwrap_or_default().to_string_lossy().into_owned());
    }

    fn job_started(&self, path: &Path, action: &JobAction, duration_seconds: f64) {
        self.clear_job();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let bar = self.job_bar(duration_seconds, format!("{} ({})", name, action.label()));
        if let Ok(mut slot) = self.job.lock() {
            *slot = Some(JobBar { bar, seconds: 0.0 });
        }
    }

    fn job_progress(&self, seconds: f64) {
        if let Ok(mut slot) = self.job.lock() {
            if let Some(job) = slot.as_mut() {
                job.advance(seconds);
            }
        }
    }

    fn file_finished(&self, report: &FileReport) {
        self.clear_job();
        self.batch.inc(1);
        self.batch.set_message(format!(
            "{} {}: {}",
            outcome_icon(&report.outcome),
            report.file_name(),
            report.outcome.describe()
        ));
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        self.clear_job();
        self.batch.finish_with_message(summary.format_summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(outcome: JobOutcome) -> FileReport {
        FileReport {
            path: PathBuf::from("in/clip.mov"),
            action: JobAction::FullTranscode(None),
            problems: Vec::new(),
            outcome,
            bytes_before: 1000,
            bytes_after: 500,
            elapsed_seconds: 1.0,
            output_path: None,
            original_deleted: false,
        }
    }

    #[test]
    fn test_job_bar_tracks_media_seconds() {
        let progress = ProgressManager::hidden(2);
        assert_eq!(progress.job_seconds(), None);

        progress.job_started(Path::new("clip.mov"), &JobAction::FullTranscode(None), 10.0);
        progress.job_progress(2.5);
        progress.job_progress(1.5);
        assert_eq!(progress.job_seconds(), Some(4.0));

        progress.file_finished(&report(JobOutcome::Success));
        assert_eq!(progress.job_seconds(), None);
        assert_eq!(progress.files_done(), 1);
    }

    #[test]
    fn test_small_increments_do_not_drift() {
        let progress = ProgressManager::hidden(1);
        progress.job_started(Path::new("clip.mov"), &JobAction::FullTranscode(None), 10.0);
        // each step is below one bar unit
        for _ in 0..1000 {
            progress.job_progress(0.0004);
        }
        assert_eq!(progress.job_seconds(), Some(0.4));

        for _ in 0..3 {
            progress.job_progress(0.0016);
        }
        assert_eq!(progress.job_seconds(), Some(0.405));
    }

    #[test]
    fn test_batch_counts_every_outcome() {
        let progress = ProgressManager::hidden(0);
        progress.batch_started(3, &EngineConfig::default());
        progress.file_finished(&report(JobOutcome::Skipped));
        progress.file_finished(&report(JobOutcome::TimedOut));
        progress.file_finished(&report(JobOutcome::Success));
        assert_eq!(progress.files_done(), 3);
        progress.batch_finished(&BatchSummary::default());
    }

    #[test]
    fn test_outcome_icon() {
        assert_eq!(outcome_icon(&JobOutcome::Success), "✅");
        assert_eq!(outcome_icon(&JobOutcome::Skipped), "⏩");
        assert_eq!(outcome_icon(&JobOutcome::TimedOut), "❌");
    }
}
