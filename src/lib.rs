//! # Video Batch Optimizer Library
//!
//! Motore di transcodifica batch attento alle risorse del sistema.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: configurazione immutabile, preset di qualità, override da ambiente
//! - `error`: tipi di errore custom
//! - `probe`: metadati del file via ffprobe (degrada ai default, mai fatale)
//! - `detector`: rilevamento VFR / timestamp / desync audio
//! - `planner`: decisione per file (`Skip`, `CorrectOnly`, `FullTranscode`)
//! - `governor`: ammissione in base a CPU e memoria
//! - `runner`: esecuzione e supervisione di ffmpeg per un singolo job
//! - `batch`: orchestratore sequenziale e aggregazione dei risultati
//! - `file_manager`, `platform`, `progress`, `json_output`, `utils`: supporto
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use video_batch_optimizer::*;
//!
//! let config = EngineConfig::from_env();
//! let orchestrator = BatchOrchestrator::new(
//!     config.clone(),
//!     ProbeService::new(config.clone()),
//!     ProcessRunner::new(config.clone()),
//!     ResourceGovernor::system(&config),
//! );
//! let files = FileManager::find_video_files(&input_dir)?;
//! let summary = orchestrator.run_batch(&files, &NoEvents).await;
//! ```

pub mod batch;
pub mod config;
pub mod detector;
pub mod error;
pub mod file_manager;
pub mod governor;
pub mod json_output;
pub mod planner;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod utils;

pub use batch::{BatchEvents, BatchOrchestrator, BatchSummary, FileReport, NoEvents, Scheduler, SequentialScheduler};
pub use config::{EngineConfig, QualityPreset};
pub use detector::{ProblemDetector, ProblemReport};
pub use error::TranscodeError;
pub use file_manager::FileManager;
pub use governor::{ResourceGovernor, ResourceSampler, ResourceSnapshot, SysinfoSampler};
pub use planner::{Corrections, JobAction, TranscodeJobPlanner};
pub use probe::{MediaProbe, ProbeResult, ProbeService};
pub use runner::{JobOutcome, JobResult, JobRunner, ProcessRunner, ProgressSink};
