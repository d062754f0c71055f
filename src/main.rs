//! # Video Batch Optimizer - Main Entry Point
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (su stderr)
//! - Configurazione a strati: default → file JSON → ambiente → CLI
//! - Preflight: toolchain esterna, directory di input/output
//! - Avvio del batch e gestione dell'interruzione (Ctrl-C)
//!
//! ## Codici di uscita:
//! - `0`: batch completato
//! - `1`: nessun file trovato o precondizione fatale (es. ffmpeg mancante)
//! - `130`: interrotto dall'utente
//!
//! ## Esempio di utilizzo:
//! ```bash
//! video-optimizer ./videos -o ./optimized --preset web --cpu-limit 75 --verbose
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use video_batch_optimizer::config::{clamp_limit, QualityPreset};
use video_batch_optimizer::json_output::{JsonEvents, JsonMessage};
use video_batch_optimizer::platform::PlatformCommands;
use video_batch_optimizer::progress::ProgressManager;
use video_batch_optimizer::{
    BatchEvents, BatchOrchestrator, BatchSummary, EngineConfig, FileManager, ProbeService, ProcessRunner,
    ResourceGovernor,
};

const EXIT_FATAL: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "video-optimizer", version)]
#[command(about = "Transcode a folder of videos to H.264/AAC MP4 without overloading the machine")]
struct Args {
    /// Directory containing the videos to process (not recursive)
    input_dir: PathBuf,

    /// Output directory for transcoded files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Quality preset (default, web, mobile, archive)
    #[arg(long)]
    preset: Option<String>,

    /// Override the preset CRF (0-51, lower = better quality)
    #[arg(long)]
    crf: Option<u8>,

    /// Encoder threads
    #[arg(long)]
    threads: Option<usize>,

    /// CPU limit percent for admitting a new job (50-95)
    #[arg(long)]
    cpu_limit: Option<f32>,

    /// Memory limit percent for admitting a new job (50-95)
    #[arg(long)]
    memory_limit: Option<f32>,

    /// Pause between jobs in seconds
    #[arg(long)]
    pause: Option<f64>,

    /// Keep source files after a successful transcode
    #[arg(long)]
    keep_originals: bool,

    /// Disable VFR / timestamp / audio correction
    #[arg(long)]
    no_correction: bool,

    /// Do not normalize variable frame rate
    #[arg(long, alias = "sem-vfr")]
    no_vfr: bool,

    /// Do not regenerate timestamps
    #[arg(long, alias = "sem-timestamps")]
    no_timestamps: bool,

    /// Do not resample desynchronized audio
    #[arg(long, alias = "sem-audio")]
    no_audio_resync: bool,

    /// Emit JSON events on stdout instead of progress bars
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(ref output) = self.output {
            config.output_dir = output.clone();
        }
        if let Some(ref name) = self.preset {
            config.quality_preset = QualityPreset::named_or_default(name);
        }
        if let Some(crf) = self.crf {
            config.quality_preset.crf = crf;
        }
        if let Some(threads) = self.threads {
            config.thread_budget = threads.max(1);
        }
        if let Some(cpu) = self.cpu_limit {
            config.cpu_limit_pct = clamp_limit(cpu);
        }
        if let Some(memory) = self.memory_limit {
            config.memory_limit_pct = clamp_limit(memory);
        }
        if let Some(pause) = self.pause {
            config.inter_job_pause_seconds = pause.max(0.0);
        }
        if self.keep_originals {
            config.delete_originals = false;
        }
        if self.no_correction {
            config.correction_enabled = false;
        }
        if self.no_vfr {
            config.correct_vfr = false;
        }
        if self.no_timestamps {
            config.correct_timestamps = false;
        }
        if self.no_audio_resync {
            config.correct_audio = false;
        }
        if self.json {
            config.json_output = true;
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    let json = args.json;

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            if json {
                JsonMessage::error("fatal error", Some(format!("{:#}", e))).emit();
            }
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = match args.config {
        Some(ref path) => EngineConfig::from_file(path).await?,
        None => EngineConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    args.apply(&mut config);
    config.validate()?;

    if !args.input_dir.is_dir() {
        bail!("Input directory does not exist: {}", args.input_dir.display());
    }
    config.validate_directories(&args.input_dir)?;

    info!("🖥️  {}", PlatformCommands::system_info());
    PlatformCommands::instance().check_toolchain(&config).await?;

    if !config.output_dir.exists() {
        tokio::fs::create_dir_all(&config.output_dir).await?;
        info!("Created output directory: {}", config.output_dir.display());
    }

    let files = FileManager::find_video_files(&args.input_dir)?;
    if files.is_empty() {
        warn!("No video files found in {}", args.input_dir.display());
        if config.json_output {
            JsonMessage::error("no video files found", Some(args.input_dir.display().to_string())).emit();
        }
        return Ok(ExitCode::from(EXIT_FATAL));
    }

    info!(
        "⚙️  Preset '{}' (CRF {}, {}), {} threads, limits CPU {:.0}% / memory {:.0}%",
        config.quality_preset.name,
        config.quality_preset.crf,
        config.quality_preset.speed_preset,
        config.thread_budget,
        config.cpu_limit_pct,
        config.memory_limit_pct
    );

    let events: Box<dyn BatchEvents> = if config.json_output {
        Box::new(JsonEvents::new(&args.input_dir))
    } else {
        Box::new(ProgressManager::new(files.len() as u64))
    };

    let orchestrator = BatchOrchestrator::new(
        config.clone(),
        ProbeService::new(config.clone()),
        ProcessRunner::new(config.clone()),
        ResourceGovernor::system(&config),
    );

    let summary = tokio::select! {
        summary = orchestrator.run_batch(&files, events.as_ref()) => summary,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping the batch (the current output may be incomplete)");
            if config.json_output {
                JsonMessage::error("interrupted", None).emit();
            }
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    if !config.json_output {
        print_summary(&summary);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!("📊 Batch summary");
    println!("  ✅ Succeeded: {}", summary.succeeded);
    println!("  ⏩ Skipped:   {}", summary.skipped);
    println!("  ❌ Failed:    {}", summary.failed);
    println!(
        "  💾 {} → {} ({:.1}% saved)",
        FileManager::format_size(summary.bytes_before),
        FileManager::format_size(summary.bytes_after),
        summary.reduction_percent()
    );
    println!("  ⏱️  {:.1}s", summary.elapsed_seconds);

    for report in summary.failures() {
        println!("  • {}: {}", report.file_name(), report.outcome.describe());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_layer_onto_config() {
        let args = Args::parse_from([
            "video-optimizer",
            "videos",
            "--preset",
            "mobile",
            "--cpu-limit",
            "99",
            "--sem-vfr",
            "--no-audio-resync",
        ]);
        let mut config = EngineConfig::default();
        args.apply(&mut config);

        assert_eq!(config.quality_preset.crf, 25);
        assert_eq!(config.cpu_limit_pct, 95.0);
        assert!(config.correction_enabled);
        assert!(!config.correct_vfr);
        assert!(config.correct_timestamps);
        assert!(!config.correct_audio);
    }

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let args = Args::parse_from(["video-optimizer", "videos"]);
        let mut config = EngineConfig::default();
        args.apply(&mut config);

        assert!(config.correct_vfr && config.correct_timestamps && config.correct_audio);
        assert!(config.delete_originals);
    }
}
