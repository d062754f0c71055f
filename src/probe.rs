//! # Probe Service Module
//!
//! Questo modulo interroga ffprobe per ottenere i metadati di un singolo file.
//!
//! ## Responsabilità:
//! - Esegue ffprobe con output JSON (un solo record per file)
//! - Estrae codec, risoluzione, bitrate, frame rate, durata, dimensione
//! - Conta gli stream audio (usato dal rilevatore di problemi)
//! - Politica fail-open: non fallisce MAI, su errore restituisce un
//!   `ProbeResult` degradato con durata di fallback (100s)
//!
//! ## Perché la durata di fallback:
//! Il tracking del progresso divide per la durata; un denominatore a zero
//! renderebbe il progresso inutilizzabile.

use crate::config::EngineConfig;
use crate::error::TranscodeError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Duration used when the real one cannot be determined
pub const FALLBACK_DURATION_SECS: f64 = 100.0;

/// Frame-rate ratio as reported by the container (`r_frame_rate`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Parse `"30000/1001"` style ratios; a bare number is taken as `n/1`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.split_once('/') {
            Some((num, den)) => Some(Self {
                num: num.trim().parse().ok()?,
                den: den.trim().parse().ok()?,
            }),
            None => Some(Self {
                num: raw.parse().ok()?,
                den: 1,
            }),
        }
    }

    /// Frames per second, `None` when the denominator is zero
    pub fn fps(&self) -> Option<f64> {
        if self.den == 0 {
            None
        } else {
            Some(self.num as f64 / self.den as f64)
        }
    }
}

/// Where a probe result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeSource {
    /// Values were read from ffprobe output
    Measured,
    /// Probe failed, values are the degraded defaults
    Fallback,
}

/// Media metadata for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Video stream bitrate in kbps (0 when unknown)
    pub bitrate_video_kbps: f64,
    /// Container bitrate in kbps (0 when unknown)
    pub bitrate_total_kbps: f64,
    /// Frames per second rounded to two decimals (0 when unknown)
    pub fps: f64,
    pub duration_seconds: f64,
    pub size_bytes: u64,
    pub frame_rate: FrameRate,
    pub audio_streams: u32,
    pub source: ProbeSource,
}

impl ProbeResult {
    /// Degraded record returned when probing fails
    pub fn fallback() -> Self {
        Self {
            codec: "unknown".to_string(),
            width: 0,
            height: 0,
            bitrate_video_kbps: 0.0,
            bitrate_total_kbps: 0.0,
            fps: 0.0,
            duration_seconds: FALLBACK_DURATION_SECS,
            size_bytes: 0,
            frame_rate: FrameRate::default(),
            audio_streams: 0,
            source: ProbeSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ProbeSource::Fallback
    }

    /// Short human-readable description, e.g. `1920x1080 | h264 | 4200kbps`
    pub fn summary(&self) -> String {
        let bitrate = if self.bitrate_total_kbps > 0.0 {
            format!("{:.0}kbps", self.bitrate_total_kbps)
        } else {
            "N/A".to_string()
        };
        format!("{}x{} | {} | {}", self.width, self.height, self.codec, bitrate)
    }
}

/// Anything that can produce a `ProbeResult` for a path
pub trait MediaProbe {
    fn probe(&self, path: &Path) -> impl Future<Output = ProbeResult>;
}

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub streams: Option<Vec<Stream>>,
        pub format: Option<Format>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        pub codec_name: Option<String>,
        pub width: Option<u32>,
        pub height: Option<u32>,
        pub bit_rate: Option<String>,
        pub r_frame_rate: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Format {
        pub duration: Option<String>,
        pub bit_rate: Option<String>,
        pub size: Option<String>,
    }
}

fn bps_to_kbps(raw: Option<&String>) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .map(|bps| bps / 1000.0)
        .unwrap_or(0.0)
}

/// Parses ffprobe JSON output into a `ProbeResult`
pub fn parse_ffprobe_output(json_str: &str) -> Result<ProbeResult, TranscodeError> {
    let ffprobe: ffprobe_json::FfprobeOutput = serde_json::from_str(json_str)?;

    let streams = ffprobe.streams.unwrap_or_default();
    let video = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| TranscodeError::ProbeFailed("no video stream".to_string()))?;
    let audio_streams = streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .count() as u32;

    let frame_rate = video
        .r_frame_rate
        .as_deref()
        .and_then(FrameRate::parse)
        .unwrap_or_default();
    let fps = frame_rate
        .fps()
        .map(|fps| (fps * 100.0).round() / 100.0)
        .unwrap_or(0.0);

    let (duration, bitrate_total, size) = match ffprobe.format.as_ref() {
        Some(format) => (
            format
                .duration
                .as_deref()
                .and_then(|d| d.trim().parse::<f64>().ok())
                .unwrap_or(0.0),
            bps_to_kbps(format.bit_rate.as_ref()),
            format
                .size
                .as_deref()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(0),
        ),
        None => (0.0, 0.0, 0),
    };

    Ok(ProbeResult {
        codec: video
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        bitrate_video_kbps: bps_to_kbps(video.bit_rate.as_ref()),
        bitrate_total_kbps: bitrate_total,
        fps,
        duration_seconds: if duration > 0.0 && duration.is_finite() {
            duration
        } else {
            FALLBACK_DURATION_SECS
        },
        size_bytes: size,
        frame_rate,
        audio_streams,
        source: ProbeSource::Measured,
    })
}

/// ffprobe-backed implementation of `MediaProbe`
pub struct ProbeService {
    config: EngineConfig,
}

impl ProbeService {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    async fn run_ffprobe(&self, path: &Path) -> Result<ProbeResult, TranscodeError> {
        let mut cmd = Command::new(&self.config.ffprobe_program);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type,codec_name,width,height,bit_rate,r_frame_rate",
            "-show_entries",
            "format=duration,bit_rate,size",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.probe_timeout(), cmd.output())
            .await
            .map_err(|_| {
                TranscodeError::ProbeFailed(format!(
                    "timed out after {}s",
                    self.config.probe_timeout_secs
                ))
            })?
            .map_err(|e| TranscodeError::LaunchFailed {
                program: self.config.ffprobe_program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TranscodeError::ProbeFailed(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

impl MediaProbe for ProbeService {
    async fn probe(&self, path: &Path) -> ProbeResult {
        match self.run_ffprobe(path).await {
            Ok(result) => {
                debug!("Probed {}: {}", path.display(), result.summary());
                result
            }
            Err(e) => {
                warn!(
                    "Probe failed for {}, using defaults: {}",
                    path.display(),
                    e
                );
                ProbeResult::fallback()
            }
        }
    }
}
