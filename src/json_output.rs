//! # JSON Output Module
//!
//! Output strutturato in JSON (una riga per evento su stdout) per chi
//! controlla il batch da un altro processo.
//!
//! ## Tipi di messaggi:
//! - `start`: inizio del batch, con la configurazione effettiva
//! - `file_start`: inizio elaborazione di un file
//! - `file_complete`: esito di un file
//! - `complete`: fine del batch con i contatori aggregati
//! - `error`: errore fatale prima o durante l'avvio

use crate::batch::{BatchEvents, BatchSummary, FileReport};
use crate::config::EngineConfig;
use crate::runner::JobOutcome;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        input_dir: PathBuf,
        output_dir: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    FileStart {
        path: PathBuf,
        size: u64,
        index: usize,
        total: usize,
    },

    FileComplete {
        path: PathBuf,
        action: &'static str,
        problems: Vec<&'static str>,
        outcome: JobOutcome,
        original_size: u64,
        output_size: u64,
        reduction_percent: f64,
        elapsed_seconds: f64,
        original_deleted: bool,
    },

    Complete {
        succeeded: usize,
        failed: usize,
        skipped: usize,
        bytes_before: u64,
        bytes_after: u64,
        reduction_percent: f64,
        duration_seconds: f64,
    },

    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione riportata nel messaggio `start`
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub thread_budget: usize,
    pub cpu_limit_pct: f32,
    pub memory_limit_pct: f32,
    pub quality_preset: String,
    pub crf: u8,
    pub speed_preset: String,
    pub correction_enabled: bool,
    pub correct_vfr: bool,
    pub correct_timestamps: bool,
    pub correct_audio: bool,
    pub delete_originals: bool,
}

impl From<&EngineConfig> for JsonConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            thread_budget: config.thread_budget,
            cpu_limit_pct: config.cpu_limit_pct,
            memory_limit_pct: config.memory_limit_pct,
            quality_preset: config.quality_preset.name.clone(),
            crf: config.quality_preset.crf,
            speed_preset: config.quality_preset.speed_preset.clone(),
            correction_enabled: config.correction_enabled,
            correct_vfr: config.correct_vfr,
            correct_timestamps: config.correct_timestamps,
            correct_audio: config.correct_audio,
            delete_originals: config.delete_originals,
        }
    }
}

impl JsonMessage {
    /// Serialized single-line form
    pub fn to_line(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Some(line) = self.to_line() {
            println!("{}", line);
        }
    }

    pub fn file_complete(report: &FileReport) -> Self {
        Self::FileComplete {
            path: report.path.clone(),
            action: report.action.label(),
            problems: report.problems.clone(),
            outcome: report.outcome.clone(),
            original_size: report.bytes_before,
            output_size: report.bytes_after,
            reduction_percent: report.reduction_percent(),
            elapsed_seconds: report.elapsed_seconds,
            original_deleted: report.original_deleted,
        }
    }

    pub fn complete(summary: &BatchSummary) -> Self {
        Self::Complete {
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped,
            bytes_before: summary.bytes_before,
            bytes_after: summary.bytes_after,
            reduction_percent: summary.reduction_percent(),
            duration_seconds: summary.elapsed_seconds,
        }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            details,
        }
    }
}

/// `BatchEvents` sink that writes one JSON line per event
pub struct JsonEvents {
    input_dir: PathBuf,
}

impl JsonEvents {
    pub fn new(input_dir: &Path) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
        }
    }
}

impl BatchEvents for JsonEvents {
    fn batch_started(&self, total_files: usize, config: &EngineConfig) {
        JsonMessage::Start {
            input_dir: self.input_dir.clone(),
            output_dir: config.output_dir.clone(),
            total_files,
            config: JsonConfig::from(config),
        }
        .emit();
    }

    fn file_started(&self, index: usize, total: usize, path: &Path, size_bytes: u64) {
        JsonMessage::FileStart {
            path: path.to_path_buf(),
            size: size_bytes,
            index,
            total,
        }
        .emit();
    }

    fn file_finished(&self, report: &FileReport) {
        JsonMessage::file_complete(report).emit();
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        JsonMessage::complete(summary).emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::JobAction;
    use serde_json::Value;

    #[test]
    fn test_start_message_shape() {
        let config = EngineConfig::default();
        let line = JsonMessage::Start {
            input_dir: PathBuf::from("videos"),
            output_dir: config.output_dir.clone(),
            total_files: 3,
            config: JsonConfig::from(&config),
        }
        .to_line()
        .unwrap();

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["total_files"], 3);
        assert_eq!(value["config"]["crf"], 23);
        assert_eq!(value["config"]["quality_preset"], "default");
    }

    #[test]
    fn test_file_complete_carries_outcome() {
        let report = FileReport {
            path: PathBuf::from("videos/a.mov"),
            action: JobAction::FullTranscode(None),
            problems: vec!["variable frame rate"],
            outcome: JobOutcome::Failure {
                code: 1,
                diagnostic: "Error opening input".to_string(),
            },
            bytes_before: 1000,
            bytes_after: 0,
            elapsed_seconds: 2.0,
            output_path: None,
            original_deleted: false,
        };

        let line = JsonMessage::file_complete(&report).to_line().unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "file_complete");
        assert_eq!(value["action"], "full-transcode");
        assert_eq!(value["outcome"]["status"], "failure");
        assert_eq!(value["outcome"]["code"], 1);
        assert_eq!(value["problems"][0], "variable frame rate");
    }

    #[test]
    fn test_complete_and_error_messages() {
        let summary = BatchSummary {
            succeeded: 2,
            skipped: 1,
            bytes_before: 2000,
            bytes_after: 500,
            ..Default::default()
        };
        let value: Value = serde_json::from_str(&JsonMessage::complete(&summary).to_line().unwrap()).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["succeeded"], 2);
        assert_eq!(value["reduction_percent"], 75.0);

        let value: Value =
            serde_json::from_str(&JsonMessage::error("ffmpeg not found", None).to_line().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert!(value["details"].is_null());
    }
}
