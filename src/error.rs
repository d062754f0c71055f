//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom del motore di transcodifica.
//!
//! ## Responsabilità:
//! - Definisce `TranscodeError` per categorizzare gli errori che possono
//!   interrompere un'operazione (non un singolo job)
//! - Integra con `thiserror` per la conversione automatica degli errori
//!
//! ## Categorie di errori:
//! - `ProbeFailed`: ffprobe assente, in timeout o con output illeggibile
//!   (mai fatale, il probe degrada ai valori di default)
//! - `LaunchFailed`: l'encoder non può essere avviato (fatale solo per il file)
//! - `MissingDependency`: toolchain esterna mancante all'avvio (fatale per il run)
//! - `InvalidConfig`: parametri di configurazione fuori range
//! - `Io` / `Json`: errori standard convertiti automaticamente
//!
//! Gli esiti dei singoli job (timeout, terminazione anomala, output vuoto)
//! non sono errori: vengono riportati come `JobOutcome` nel `JobResult`.
//!
//! ## Esempio:
//! ```rust,ignore
//! if !platform.is_command_available("ffmpeg").await {
//!     return Err(TranscodeError::MissingDependency("ffmpeg".to_string()));
//! }
//! ```

/// Custom error types for the transcoding engine
#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Failed to launch {program}: {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
