//! # Problem Detector Module
//!
//! Classifica anomalie di timing e audio a partire dal risultato del probe.
//!
//! ## Flag:
//! - `variable_frame_rate`: il rapporto di frame rate non è intero, oppure
//!   l'fps intero è fuori da [10, 120]
//! - `audio_desync`: nessuno stream audio presente (l'assenza viene trattata
//!   come rischio di dessincronizzazione)
//! - `timestamp_issue`: derivato, `variable_frame_rate || audio_desync`.
//!   Non viene misurato sui gap dei PTS.
//!
//! Se la correzione è disabilitata o il probe è degradato, tutti i flag sono
//! `false`: il rilevamento non deve mai bloccare la pipeline.

use crate::probe::ProbeResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Lowest integral fps considered constant-rate material
pub const MIN_STEADY_FPS: f64 = 10.0;
/// Highest integral fps considered constant-rate material
pub const MAX_STEADY_FPS: f64 = 120.0;

/// Timing and audio anomalies for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemReport {
    pub variable_frame_rate: bool,
    pub timestamp_issue: bool,
    pub audio_desync: bool,
}

impl ProblemReport {
    pub fn any(&self) -> bool {
        self.variable_frame_rate || self.timestamp_issue || self.audio_desync
    }

    /// Human-readable list of detected problems
    pub fn describe(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.variable_frame_rate {
            problems.push("variable frame rate");
        }
        if self.timestamp_issue {
            problems.push("timestamp issues");
        }
        if self.audio_desync {
            problems.push("possible audio desync");
        }
        problems
    }
}

/// Detects VFR / timestamp / audio problems from probe data
#[derive(Debug, Clone, Copy)]
pub struct ProblemDetector {
    enabled: bool,
}

impl ProblemDetector {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn detect(&self, path: &Path, probe: &ProbeResult) -> ProblemReport {
        if !self.enabled || probe.is_fallback() {
            return ProblemReport::default();
        }

        let variable_frame_rate = match probe.frame_rate.fps() {
            Some(fps) => fps.fract() != 0.0 || !(MIN_STEADY_FPS..=MAX_STEADY_FPS).contains(&fps),
            None => false,
        };
        let audio_desync = probe.audio_streams == 0;

        let report = ProblemReport {
            variable_frame_rate,
            timestamp_issue: variable_frame_rate || audio_desync,
            audio_desync,
        };

        if report.any() {
            debug!(
                "Problems detected in {}: {}",
                path.display(),
                report.describe().join(", ")
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FrameRate, ProbeSource};

    fn probe_with(frame_rate: FrameRate, audio_streams: u32) -> ProbeResult {
        ProbeResult {
            codec: "h264".to_string(),
            width: 1280,
            height: 720,
            bitrate_video_kbps: 900.0,
            bitrate_total_kbps: 1000.0,
            fps: frame_rate.fps().unwrap_or(0.0),
            duration_seconds: 30.0,
            size_bytes: 1_000_000,
            frame_rate,
            audio_streams,
            source: ProbeSource::Measured,
        }
    }

    fn detect(probe: &ProbeResult) -> ProblemReport {
        ProblemDetector::new(true).detect(Path::new("clip.mp4"), probe)
    }

    #[test]
    fn test_clean_file() {
        let report = detect(&probe_with(FrameRate::new(30, 1), 1));
        assert_eq!(report, ProblemReport::default());
        assert!(!report.any());
    }

    #[test]
    fn test_non_integral_rate_is_vfr() {
        let report = detect(&probe_with(FrameRate::new(60000, 1001), 1));
        assert!(report.variable_frame_rate);
        assert!(report.timestamp_issue);
        assert!(!report.audio_desync);
    }

    #[test]
    fn test_out_of_range_rate_is_vfr() {
        assert!(detect(&probe_with(FrameRate::new(5, 1), 1)).variable_frame_rate);
        assert!(detect(&probe_with(FrameRate::new(240, 1), 1)).variable_frame_rate);
        assert!(!detect(&probe_with(FrameRate::new(10, 1), 1)).variable_frame_rate);
        assert!(!detect(&probe_with(FrameRate::new(120, 1), 1)).variable_frame_rate);
    }

    #[test]
    fn test_zero_denominator_is_not_vfr() {
        let report = detect(&probe_with(FrameRate::new(0, 0), 1));
        assert!(!report.variable_frame_rate);
    }

    #[test]
    fn test_missing_audio_is_desync() {
        let report = detect(&probe_with(FrameRate::new(25, 1), 0));
        assert!(report.audio_desync);
        assert!(report.timestamp_issue);
        assert!(!report.variable_frame_rate);
        assert_eq!(report.describe(), vec!["timestamp issues", "possible audio desync"]);
    }

    #[test]
    fn test_disabled_or_fallback_reports_nothing() {
        let noisy = probe_with(FrameRate::new(5, 1), 0);
        let disabled = ProblemDetector::new(false).detect(Path::new("a.mp4"), &noisy);
        assert_eq!(disabled, ProblemReport::default());

        let fallback = ProblemDetector::new(true).detect(Path::new("a.mp4"), &ProbeResult::fallback());
        assert_eq!(fallback, ProblemReport::default());
    }
}
