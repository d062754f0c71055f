//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione immutabile del motore.
//!
//! ## Responsabilità:
//! - Definisce `EngineConfig` con tutti i parametri di transcodifica e di
//!   controllo risorse
//! - Legge le variabili d'ambiente UNA sola volta all'avvio, tramite una
//!   funzione di lookup iniettabile (i test non toccano mai l'env del processo)
//! - Applica i clamp sui limiti (CPU/memoria in [50, 95])
//! - Supporta caricamento/salvataggio da/verso file JSON
//!
//! ## Variabili d'ambiente:
//! - `FFMPEG_THREADS`: thread per l'encoder (default: metà dei core, max 8)
//! - `LIMITE_CPU`: limite CPU in % (default: 85)
//! - `LIMITE_MEMORIA`: limite memoria in % (default: 85)
//! - `PAUSA_ENTRE_VIDEOS`: pausa tra job in secondi (default: 1.0)
//! - `PERFIL_QUALIDADE`: nome del preset (`default`, `web`, `mobile`, `archive`)
//! - `CORRIGIR_PROBLEMAS`: interruttore generale della correzione (default: on)
//! - `CORRIGIR_VFR`, `CORRIGIR_TIMESTAMPS`, `CORRIGIR_AUDIO`: correzione per
//!   singolo tipo di problema (default: on)
//! - `DELETAR_ORIGINAIS`: elimina gli originali dopo un successo (default: on)
//!
//! ## Esempio:
//! ```rust,ignore
//! let mut config = EngineConfig::from_env();
//! config.output_dir = PathBuf::from("/media/out");
//! config.validate()?;
//! ```

use crate::error::TranscodeError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Lower bound for CPU and memory admission limits
pub const MIN_LIMIT_PCT: f32 = 50.0;
/// Upper bound for CPU and memory admission limits
pub const MAX_LIMIT_PCT: f32 = 95.0;
/// Hard cap on encoder threads when derived from the core count
pub const MAX_DEFAULT_THREADS: usize = 8;

/// Encoder quality/speed knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub name: String,
    /// Constant rate factor (0-51, lower = better quality)
    pub crf: u8,
    /// x264 speed preset (ultrafast ... veryslow)
    pub speed_preset: String,
}

impl QualityPreset {
    fn new(name: &str, crf: u8, speed_preset: &str) -> Self {
        Self {
            name: name.to_string(),
            crf,
            speed_preset: speed_preset.to_string(),
        }
    }

    /// Look up a named preset
    pub fn named(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "default" => Some(Self::new("default", 23, "medium")),
            "web" => Some(Self::new("web", 23, "fast")),
            "mobile" => Some(Self::new("mobile", 25, "medium")),
            "archive" => Some(Self::new("archive", 18, "slow")),
            _ => None,
        }
    }

    /// Look up a named preset, falling back to `default` for unknown names
    pub fn named_or_default(name: &str) -> Self {
        Self::named(name).unwrap_or_else(|| {
            warn!("Unknown quality preset '{}', using 'default'", name);
            Self::default()
        })
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        Self::new("default", 23, "medium")
    }
}

/// Immutable engine configuration, built once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Threads handed to the encoder
    pub thread_budget: usize,
    /// Admission CPU limit (percent, clamped to [50, 95])
    pub cpu_limit_pct: f32,
    /// Admission memory limit (percent, clamped to [50, 95])
    pub memory_limit_pct: f32,
    /// Sleep between jobs, skipped after the last one
    pub inter_job_pause_seconds: f64,
    pub quality_preset: QualityPreset,
    /// Detect and correct VFR / timestamp / audio problems
    pub correction_enabled: bool,
    /// Normalize variable frame rate sources
    pub correct_vfr: bool,
    /// Regenerate broken timestamps
    pub correct_timestamps: bool,
    /// Resample audio that drifts from video
    pub correct_audio: bool,
    /// Audio bitrate for re-encoded audio
    pub audio_bitrate: String,
    /// Codec that counts as "already optimized"
    pub target_codec: String,
    /// Total bitrate (kbps) below which a target-codec file is considered compressed
    pub compressed_bitrate_kbps: f64,
    /// Delete the source after a confirmed success
    pub delete_originals: bool,
    /// Where transcoded files are written
    pub output_dir: PathBuf,
    pub ffmpeg_program: String,
    pub ffprobe_program: String,
    pub probe_timeout_secs: u64,
    /// Ceiling for a single encoder run
    pub job_timeout_secs: u64,
    /// How long to wait for an exit status after the progress stream closes
    pub exit_grace_secs: u64,
    pub admission_timeout_secs: u64,
    pub admission_poll_secs: f64,
    /// Niceness applied to this process at startup (Unix only)
    pub process_nice: i32,
    /// Emit JSON events instead of progress bars
    pub json_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_budget: default_thread_budget(num_cpus::get()),
            cpu_limit_pct: 85.0,
            memory_limit_pct: 85.0,
            inter_job_pause_seconds: 1.0,
            quality_preset: QualityPreset::default(),
            correction_enabled: true,
            correct_vfr: true,
            correct_timestamps: true,
            correct_audio: true,
            audio_bitrate: "128k".to_string(),
            target_codec: "h264".to_string(),
            compressed_bitrate_kbps: 5000.0,
            delete_originals: true,
            output_dir: PathBuf::from("output"),
            ffmpeg_program: "ffmpeg".to_string(),
            ffprobe_program: "ffprobe".to_string(),
            probe_timeout_secs: 10,
            job_timeout_secs: 2 * 60 * 60,
            exit_grace_secs: 30,
            admission_timeout_secs: 90,
            admission_poll_secs: 2.0,
            process_nice: 5,
            json_output: false,
        }
    }
}

/// Half of the logical cores, at least 1, at most 8
pub fn default_thread_budget(logical_cores: usize) -> usize {
    (logical_cores / 2).clamp(1, MAX_DEFAULT_THREADS)
}

/// Clamp an admission limit into the supported range
pub fn clamp_limit(pct: f32) -> f32 {
    pct.clamp(MIN_LIMIT_PCT, MAX_LIMIT_PCT)
}

/// Parse an on/off style flag; `None` for unrecognised values
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Build a configuration from defaults plus the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults plus an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup);
        config
    }

    /// Apply environment-style overrides
    ///
    /// Unparseable values are ignored and the current value is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(threads) = lookup("FFMPEG_THREADS").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.thread_budget = threads.max(1);
        }

        if let Some(cpu) = lookup("LIMITE_CPU").and_then(|v| v.trim().parse::<f32>().ok()) {
            self.cpu_limit_pct = clamp_limit(cpu);
        }

        if let Some(mem) = lookup("LIMITE_MEMORIA").and_then(|v| v.trim().parse::<f32>().ok()) {
            self.memory_limit_pct = clamp_limit(mem);
        }

        if let Some(pause) = lookup("PAUSA_ENTRE_VIDEOS").and_then(|v| v.trim().parse::<f64>().ok()) {
            self.inter_job_pause_seconds = pause.max(0.0);
        }

        if let Some(name) = lookup("PERFIL_QUALIDADE") {
            self.quality_preset = QualityPreset::named_or_default(&name);
        }

        if let Some(flag) = lookup("CORRIGIR_PROBLEMAS").as_deref().and_then(parse_flag) {
            self.correction_enabled = flag;
        }

        let toggles = [
            ("CORRIGIR_VFR", &mut self.correct_vfr),
            ("CORRIGIR_TIMESTAMPS", &mut self.correct_timestamps),
            ("CORRIGIR_AUDIO", &mut self.correct_audio),
        ];
        for (key, field) in toggles {
            if let Some(flag) = lookup(key).as_deref().and_then(parse_flag) {
                *field = flag;
            }
        }

        if let Some(flag) = lookup("DELETAR_ORIGINAIS").as_deref().and_then(parse_flag) {
            self.delete_originals = flag;
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), TranscodeError> {
        if self.quality_preset.crf > 51 {
            return Err(TranscodeError::InvalidConfig(
                "CRF must be between 0 and 51".to_string(),
            ));
        }

        if self.thread_budget == 0 {
            return Err(TranscodeError::InvalidConfig(
                "Thread budget must be greater than 0".to_string(),
            ));
        }

        for (label, pct) in [("CPU", self.cpu_limit_pct), ("Memory", self.memory_limit_pct)] {
            if !(MIN_LIMIT_PCT..=MAX_LIMIT_PCT).contains(&pct) {
                return Err(TranscodeError::InvalidConfig(format!(
                    "{} limit must be between {} and {}",
                    label, MIN_LIMIT_PCT, MAX_LIMIT_PCT
                )));
            }
        }

        if self.inter_job_pause_seconds < 0.0 || self.admission_poll_secs <= 0.0 {
            return Err(TranscodeError::InvalidConfig(
                "Pause and poll intervals must not be negative".to_string(),
            ));
        }

        if self.audio_bitrate.trim().is_empty() {
            return Err(TranscodeError::InvalidConfig(
                "Audio bitrate must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Reject layouts where output would overwrite input
    pub fn validate_directories(&self, input_dir: &Path) -> Result<(), TranscodeError> {
        let input = input_dir.canonicalize().unwrap_or_else(|_| input_dir.to_path_buf());
        let output = self
            .output_dir
            .canonicalize()
            .unwrap_or_else(|_| self.output_dir.clone());

        if input == output {
            return Err(TranscodeError::InvalidConfig(format!(
                "Input and output directories must differ: {}",
                input.display()
            )));
        }
        Ok(())
    }

    pub fn inter_job_pause(&self) -> Duration {
        Duration::from_secs_f64(self.inter_job_pause_seconds.max(0.0))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_secs(self.exit_grace_secs)
    }

    pub fn admission_timeout(&self) -> Duration {
        Duration::from_secs(self.admission_timeout_secs)
    }

    pub fn admission_poll(&self) -> Duration {
        Duration::from_secs_f64(self.admission_poll_secs.max(0.001))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let mut config: EngineConfig = serde_json::from_str(&content)?;
        config.cpu_limit_pct = clamp_limit(config.cpu_limit_pct);
        config.memory_limit_pct = clamp_limit(config.memory_limit_pct);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
