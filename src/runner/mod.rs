//! # Process Runner Module
//!
//! Esegue un singolo job di ffmpeg e ne supervisiona il processo.
//!
//! ## Responsabilità:
//! - Costruzione deterministica della riga di comando (`command`)
//! - Lettura dello stream di progresso su stdout (`progress`)
//! - Drenaggio continuo di stderr in un task dedicato (`diagnostics`):
//!   l'encoder non deve mai bloccarsi su una pipe piena
//! - Classificazione dello stato di uscita (`exit`)
//! - Timeout globale del job e attesa limitata dell'uscita dopo la chiusura
//!   dello stream di progresso
//! - Verifica dell'output: exit 0 con file vuoto o mancante è un fallimento
//! - L'encoder scrive su un file di staging; solo un output verificato viene
//!   rinominato sul nome finale, e un job fallito elimina soltanto il proprio
//!   staging (mai un file prodotto da un altro job)
//!
//! ## Esiti:
//! - `Success`: exit 0 e output non vuoto
//! - `Failure`: exit non zero (o kill esterno riconosciuto), con l'ultima
//!   riga diagnostica rilevante
//! - `TimedOut`: job oltre il limite, processo terminato
//! - `AbnormalTermination`: nessun codice di uscita o codice non portabile

pub mod command;
pub mod diagnostics;
pub mod exit;
pub mod progress;

pub use command::build_ffmpeg_args;
pub use diagnostics::DiagnosticTail;
pub use exit::{classify_exit, ExitClassification};
pub use progress::{ProgressSink, ProgressTracker};

use crate::config::EngineConfig;
use crate::error::TranscodeError;
use crate::file_manager::FileManager;
use crate::planner::JobAction;
use diagnostics::{spawn_drain, DIAGNOSTIC_CHANNEL_CAPACITY};
use exit::raw_exit_code;
use progress::parse_progress_line;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How long leftover diagnostics are collected once the process is gone
const DIAGNOSTIC_FLUSH: Duration = Duration::from_secs(2);

/// Terminal state of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    Failure { code: i64, diagnostic: String },
    Skipped,
    TimedOut,
    AbnormalTermination { reason: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }

    /// One-line description for logs and summaries
    pub fn describe(&self) -> String {
        match self {
            JobOutcome::Success => "success".to_string(),
            JobOutcome::Skipped => "skipped".to_string(),
            JobOutcome::TimedOut => "timed out".to_string(),
            JobOutcome::Failure { code, diagnostic } if diagnostic.is_empty() => {
                format!("exit code {}", code)
            }
            JobOutcome::Failure { code, diagnostic } => {
                format!("exit code {}: {}", code, diagnostic)
            }
            JobOutcome::AbnormalTermination { reason } => format!("abnormal termination: {}", reason),
        }
    }
}

/// Result of one job
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub outcome: JobOutcome,
    /// Verified output, only set on success
    pub output_path: Option<PathBuf>,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub elapsed_seconds: f64,
}

impl JobResult {
    fn new(outcome: JobOutcome, bytes_before: u64, started: Instant) -> Self {
        Self {
            outcome,
            output_path: None,
            bytes_before,
            bytes_after: 0,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        }
    }

    fn failure(code: i64, diagnostic: impl Into<String>, bytes_before: u64, started: Instant) -> Self {
        Self::new(
            JobOutcome::Failure {
                code,
                diagnostic: diagnostic.into(),
            },
            bytes_before,
            started,
        )
    }
}

/// Executes one planned job, writing its result to `output`
pub trait JobRunner {
    fn run(
        &self,
        input: &Path,
        output: &Path,
        action: &JobAction,
        duration_seconds: f64,
        progress: &mut dyn ProgressSink,
    ) -> impl Future<Output = JobResult>;
}

/// How supervision of a running encoder ended
enum Ended {
    Exited(ExitStatus),
    WaitFailed(std::io::Error),
    /// Progress stream closed but no exit status within the grace period
    GraceExpired,
    /// Whole-job ceiling reached
    JobTimeout,
}

/// ffmpeg-backed implementation of `JobRunner`
pub struct ProcessRunner {
    config: EngineConfig,
}

impl ProcessRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn spawn_encoder(&self, args: &[String]) -> Result<Child, TranscodeError> {
        Command::new(&self.config.ffmpeg_program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscodeError::LaunchFailed {
                program: self.config.ffmpeg_program.clone(),
                reason: e.to_string(),
            })
    }

    async fn execute(
        &self,
        input: &Path,
        output: &Path,
        action: &JobAction,
        duration_seconds: f64,
        progress: &mut dyn ProgressSink,
    ) -> JobResult {
        let started = Instant::now();
        let staging = FileManager::staging_path_for(output);

        let Some(args) = build_ffmpeg_args(input, &staging, action, &self.config) else {
            let size = FileManager::file_size(input).await.unwrap_or(0);
            let mut result = JobResult::new(JobOutcome::Skipped, size, started);
            result.bytes_after = size;
            return result;
        };

        let bytes_before = match FileManager::file_size(input).await {
            Some(size) if size > 0 => size,
            _ => return JobResult::failure(-1, "input missing or empty", 0, started),
        };

        if let Some(parent) = staging.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return JobResult::failure(
                    -1,
                    format!("cannot create output directory: {}", e),
                    bytes_before,
                    started,
                );
            }
        }

        debug!("ffmpeg {}", args.join(" "));
        let mut child = match self.spawn_encoder(&args) {
            Ok(child) => child,
            Err(e) => {
                warn!("{}", e);
                return JobResult::failure(-1, e.to_string(), bytes_before, started);
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill().await;
            return JobResult::new(
                JobOutcome::AbnormalTermination {
                    reason: "encoder pipes unavailable".to_string(),
                },
                bytes_before,
                started,
            );
        };

        let (tx, mut rx) = mpsc::channel(DIAGNOSTIC_CHANNEL_CAPACITY);
        spawn_drain(stderr, tx);
        let mut tail = DiagnosticTail::default();
        let mut tracker = ProgressTracker::new(duration_seconds);

        let ended = tokio::time::timeout(
            self.config.job_timeout(),
            supervise(
                &mut child,
                stdout,
                &mut rx,
                &mut tail,
                &mut tracker,
                &mut *progress,
                self.config.exit_grace(),
            ),
        )
        .await
        .unwrap_or(Ended::JobTimeout);

        if matches!(ended, Ended::GraceExpired | Ended::JobTimeout) {
            let _ = child.kill().await;
        }

        let _ = tokio::time::timeout(DIAGNOSTIC_FLUSH, async {
            while let Some(line) = rx.recv().await {
                tail.push(line);
            }
        })
        .await;

        let outcome = match ended {
            Ended::Exited(status) => outcome_for_exit(raw_exit_code(&status), &tail),
            Ended::WaitFailed(e) => JobOutcome::AbnormalTermination {
                reason: format!("wait failed: {}", e),
            },
            Ended::GraceExpired => {
                warn!(
                    "Encoder did not exit within {}s after closing its progress stream",
                    self.config.exit_grace_secs
                );
                JobOutcome::TimedOut
            }
            Ended::JobTimeout => {
                warn!("Job exceeded {}s, encoder killed", self.config.job_timeout_secs);
                JobOutcome::TimedOut
            }
        };

        let mut result = JobResult::new(outcome, bytes_before, started);
        if result.outcome.is_success() {
            let verified = match FileManager::file_size(&staging).await {
                Some(size) if size > 0 => match FileManager::promote(&staging, output).await {
                    Ok(()) => {
                        if let Some(delta) = tracker.complete() {
                            progress.advance(delta);
                        }
                        result.bytes_after = size;
                        result.output_path = Some(output.to_path_buf());
                        JobOutcome::Success
                    }
                    Err(e) => JobOutcome::Failure {
                        code: 0,
                        diagnostic: format!("cannot move output into place: {:#}", e),
                    },
                },
                _ => JobOutcome::Failure {
                    code: 0,
                    diagnostic: "empty or missing output".to_string(),
                },
            };
            result.outcome = verified;
        }

        if !result.outcome.is_success() {
            FileManager::discard_partial(&staging).await;
        }
        result
    }
}

impl JobRunner for ProcessRunner {
    async fn run(
        &self,
        input: &Path,
        output: &Path,
        action: &JobAction,
        duration_seconds: f64,
        progress: &mut dyn ProgressSink,
    ) -> JobResult {
        self.execute(input, output, action, duration_seconds, progress).await
    }
}

fn outcome_for_exit(code: Option<i64>, tail: &DiagnosticTail) -> JobOutcome {
    match classify_exit(code) {
        ExitClassification::Success => JobOutcome::Success,
        ExitClassification::Failure(code) | ExitClassification::Killed(code) => JobOutcome::Failure {
            code,
            diagnostic: tail.summary(),
        },
        ExitClassification::Abnormal(None) => JobOutcome::AbnormalTermination {
            reason: "no exit code".to_string(),
        },
        ExitClassification::Abnormal(Some(code)) => JobOutcome::AbnormalTermination {
            reason: tail
                .last_relevant()
                .map(str::to_string)
                .unwrap_or_else(|| format!("exit code {}", code)),
        },
    }
}

/// Follow progress until stdout closes, then wait (bounded) for the exit
/// status. Diagnostics are consumed in both phases so the drain task can
/// never stall on a full channel.
async fn supervise(
    child: &mut Child,
    stdout: ChildStdout,
    diagnostics: &mut mpsc::Receiver<String>,
    tail: &mut DiagnosticTail,
    tracker: &mut ProgressTracker,
    progress: &mut dyn ProgressSink,
    grace: Duration,
) -> Ended {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(delta) = parse_progress_line(&line).and_then(|pos| tracker.observe(pos)) {
                        progress.advance(delta);
                    }
                }
                Ok(None) | Err(_) => break,
            },
            Some(line) = diagnostics.recv() => tail.push(line),
        }
    }

    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            status = child.wait() => {
                return match status {
                    Ok(status) => Ended::Exited(status),
                    Err(e) => Ended::WaitFailed(e),
                };
            }
            Some(line) = diagnostics.recv() => tail.push(line),
            _ = &mut deadline => return Ended::GraceExpired,
        }
    }
}
