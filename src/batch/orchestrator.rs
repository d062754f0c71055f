//! # Batch Orchestrator
//!
//! Sequenziatore principale: un file alla volta, nell'ordine ricevuto.
//!
//! I nomi di output sono assegnati per l'intero batch prima di iniziare:
//! due input con lo stesso stem non scrivono mai sullo stesso file.
//!
//! ## Pipeline per file:
//! 1. Attende l'ammissione dal governor (allo scadere procede comunque)
//! 2. Probe → rilevamento problemi → piano
//! 3. `Skip`: conta come saltato, nessun encoder e nessuna pausa
//! 4. Altrimenti esegue il job; su `Success` elimina l'originale se
//!    configurato (un errore di cancellazione è solo un warning)
//! 5. Pausa tra job, tranne dopo l'ultimo file
//!
//! Nessun errore su un singolo file interrompe il batch: ogni esito finisce
//! nei contatori del `BatchSummary`.

use super::events::BatchEvents;
use super::scheduler::{Scheduler, SequentialScheduler};
use crate::config::EngineConfig;
use crate::detector::ProblemDetector;
use crate::file_manager::FileManager;
use crate::governor::{ResourceGovernor, ResourceSampler};
use crate::planner::{JobAction, TranscodeJobPlanner};
use crate::probe::MediaProbe;
use crate::runner::{JobOutcome, JobResult, JobRunner};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// What happened to one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub action: JobAction,
    pub problems: Vec<&'static str>,
    pub outcome: JobOutcome,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub elapsed_seconds: f64,
    pub output_path: Option<PathBuf>,
    pub original_deleted: bool,
}

impl FileReport {
    fn skipped(path: &Path, size: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            action: JobAction::Skip,
            problems: Vec::new(),
            outcome: JobOutcome::Skipped,
            bytes_before: size,
            bytes_after: size,
            elapsed_seconds: 0.0,
            output_path: None,
            original_deleted: false,
        }
    }

    fn from_result(path: &Path, action: JobAction, problems: Vec<&'static str>, result: JobResult) -> Self {
        Self {
            path: path.to_path_buf(),
            action,
            problems,
            outcome: result.outcome,
            bytes_before: result.bytes_before,
            bytes_after: result.bytes_after,
            elapsed_seconds: result.elapsed_seconds,
            output_path: result.output_path,
            original_deleted: false,
        }
    }

    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_before, self.bytes_after)
    }
}

/// Aggregate counters for a run; owned by the orchestrator
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Input bytes of succeeded jobs
    pub bytes_before: u64,
    /// Output bytes of succeeded jobs
    pub bytes_after: u64,
    pub elapsed_seconds: f64,
    pub results: Vec<FileReport>,
}

impl BatchSummary {
    pub fn record(&mut self, report: FileReport) {
        match report.outcome {
            JobOutcome::Success => {
                self.succeeded += 1;
                self.bytes_before += report.bytes_before;
                self.bytes_after += report.bytes_after;
            }
            JobOutcome::Skipped => self.skipped += 1,
            _ => self.failed += 1,
        }
        self.results.push(report);
    }

    pub fn total_files(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_before, self.bytes_after)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.results
            .iter()
            .filter(|r| !matches!(r.outcome, JobOutcome::Success | JobOutcome::Skipped))
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Succeeded: {} | Skipped: {} | Failed: {} | {} → {} ({:.1}% saved) in {:.1}s",
            self.total_files(),
            self.succeeded,
            self.skipped,
            self.failed,
            FileManager::format_size(self.bytes_before),
            FileManager::format_size(self.bytes_after),
            self.reduction_percent(),
            self.elapsed_seconds
        )
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Top-level sequencer over a list of files
pub struct BatchOrchestrator<P, R, S, Q = SequentialScheduler>
where
    S: ResourceSampler,
{
    config: EngineConfig,
    probe: P,
    detector: ProblemDetector,
    runner: R,
    governor: ResourceGovernor<S>,
    scheduler: Q,
}

impl<P, R, S> BatchOrchestrator<P, R, S, SequentialScheduler>
where
    P: MediaProbe,
    R: JobRunner,
    S: ResourceSampler,
{
    pub fn new(config: EngineConfig, probe: P, runner: R, governor: ResourceGovernor<S>) -> Self {
        Self::with_scheduler(config, probe, runner, governor, SequentialScheduler)
    }
}

impl<P, R, S, Q> BatchOrchestrator<P, R, S, Q>
where
    P: MediaProbe,
    R: JobRunner,
    S: ResourceSampler,
    Q: Scheduler,
{
    pub fn with_scheduler(
        config: EngineConfig,
        probe: P,
        runner: R,
        governor: ResourceGovernor<S>,
        scheduler: Q,
    ) -> Self {
        let detector = ProblemDetector::new(config.correction_enabled);
        Self {
            config,
            probe,
            detector,
            runner,
            governor,
            scheduler,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process every file in order and return the aggregate counts
    pub async fn run_batch(&self, files: &[PathBuf], events: &dyn BatchEvents) -> BatchSummary {
        let started = Instant::now();
        let total = files.len();
        events.batch_started(total, &self.config);
        info!("🎬 Processing {} video(s)", total);

        let outputs = FileManager::output_paths_for(files, &self.config.output_dir);
        for (path, output) in files.iter().zip(&outputs) {
            if *output != FileManager::output_path_for(path, &self.config.output_dir) {
                warn!(
                    file = %display_name(path),
                    "Another input shares this name, writing {}",
                    display_name(output)
                );
            }
        }

        let jobs: Vec<LocalBoxFuture<'_, FileReport>> = files
            .iter()
            .zip(&outputs)
            .enumerate()
            .map(|(index, (path, output))| self.process_file(index, total, path, output, events).boxed_local())
            .collect();

        let mut summary = BatchSummary::default();
        for report in self.scheduler.run_all(jobs).await {
            summary.record(report);
        }
        summary.elapsed_seconds = started.elapsed().as_secs_f64();

        events.batch_finished(&summary);
        summary
    }

    async fn process_file(
        &self,
        index: usize,
        total: usize,
        path: &Path,
        output: &Path,
        events: &dyn BatchEvents,
    ) -> FileReport {
        let name = display_name(path);
        let size = FileManager::file_size(path).await.unwrap_or(0);
        events.file_started(index, total, path, size);
        info!(file = %name, "[{}/{}] {} ({})", index + 1, total, name, FileManager::format_size(size));

        let timeout = self.config.admission_timeout();
        if !self.governor.await_admission(&self.config, timeout).await {
            warn!(
                file = %name,
                "Resources still above limits after {}s, starting anyway",
                timeout.as_secs()
            );
        }

        let probe = self.probe.probe(path).await;
        info!(file = %name, "📊 {}", probe.summary());

        let problems = self.detector.detect(path, &probe);
        if problems.any() {
            warn!(file = %name, "⚠️  Problems detected: {}", problems.describe().join(", "));
        }

        let action = TranscodeJobPlanner::plan(&probe, &problems, &self.config);
        if action == JobAction::Skip {
            info!(file = %name, "⏩ Already optimized, skipping");
            let report = FileReport::skipped(path, size);
            events.file_finished(&report);
            return report;
        }

        info!(file = %name, "🔄 {}", action.label());
        events.job_started(path, &action, probe.duration_seconds);
        let mut sink = |seconds: f64| events.job_progress(seconds);
        let result = self
            .runner
            .run(path, output, &action, probe.duration_seconds, &mut sink)
            .await;

        let mut report = FileReport::from_result(path, action, problems.describe(), result);
        if report.outcome.is_success() {
            self.log_success(&name, &report);
            report.original_deleted = self.delete_original(&name, &report).await;
        } else {
            error!(
                file = %name,
                elapsed = report.elapsed_seconds,
                "❌ {} failed ({}), original kept",
                name,
                report.outcome.describe()
            );
        }
        events.file_finished(&report);

        if index + 1 < total {
            self.governor.inter_job_pause(&self.config).await;
        }
        report
    }

    fn log_success(&self, name: &str, report: &FileReport) {
        if report.bytes_after > report.bytes_before {
            warn!(
                file = %name,
                "Output is larger than the original ({} → {})",
                FileManager::format_size(report.bytes_before),
                FileManager::format_size(report.bytes_after)
            );
        }
        info!(
            file = %name,
            elapsed = report.elapsed_seconds,
            "✅ {}: {} → {} ({:.1}% saved) in {:.1}s",
            name,
            FileManager::format_size(report.bytes_before),
            FileManager::format_size(report.bytes_after),
            report.reduction_percent(),
            report.elapsed_seconds
        );
    }

    /// Remove the source after a verified success; failures only warn
    async fn delete_original(&self, name: &str, report: &FileReport) -> bool {
        if !self.config.delete_originals || report.output_path.as_deref() == Some(report.path.as_path()) {
            return false;
        }
        match FileManager::remove_original(&report.path).await {
            Ok(()) => {
                info!(file = %name, "🗑️  Original removed");
                true
            }
            Err(e) => {
                warn!(file = %name, "Could not remove original: {}", e);
                false
            }
        }
    }
}
