//! # Transcode Job Planner Module
//!
//! Combina il probe e il report dei problemi in una decisione per file.
//!
//! ## Tabella decisionale (valutata in ordine):
//! 1. codec == target, bitrate sotto soglia, nessun problema → `Skip`
//! 2. codec == target con almeno un problema → `CorrectOnly`
//!    (video in stream copy, salvo VFR: in quel caso il video viene
//!    ricodificato con il filtro di normalizzazione fps)
//! 3. altrimenti → `FullTranscode` (parametri del preset di qualità, più i
//!    filtri correttivi se ci sono problemi)
//!
//! Un file con un problema rilevato non viene mai saltato in silenzio, a meno
//! che la correzione di quel tipo sia disattivata nella configurazione.

use crate::config::EngineConfig;
use crate::detector::ProblemReport;
use crate::probe::ProbeResult;
use serde::{Deserialize, Serialize};

/// Normalization target when the probed fps is unknown
pub const DEFAULT_NORMALIZED_FPS: u32 = 30;

/// Corrective filters layered onto a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corrections {
    /// Constant frame rate to normalize to; set iff the source is VFR
    pub fps_target: Option<u32>,
    /// Resample audio against timestamps (`aresample=async=1`)
    pub resync_audio: bool,
    /// Regenerate presentation timestamps (`+genpts+igndts`)
    pub regenerate_timestamps: bool,
}

impl Corrections {
    /// Corrections needed for a problem report, `None` when clean
    ///
    /// Each kind is gated by its own toggle in `config`; a problem whose
    /// correction is switched off contributes nothing.
    pub fn for_problems(problems: &ProblemReport, probe: &ProbeResult, config: &EngineConfig) -> Option<Self> {
        let corrections = Self {
            fps_target: (problems.variable_frame_rate && config.correct_vfr).then(|| normalization_fps(probe)),
            resync_audio: problems.audio_desync && config.correct_audio,
            regenerate_timestamps: problems.timestamp_issue && config.correct_timestamps,
        };
        (!corrections.is_empty()).then_some(corrections)
    }

    pub fn is_empty(&self) -> bool {
        self.fps_target.is_none() && !self.resync_audio && !self.regenerate_timestamps
    }

    /// Whether the video stream has to be re-encoded to apply these
    pub fn needs_video_reencode(&self) -> bool {
        self.fps_target.is_some()
    }
}

/// What to do with one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobAction {
    Skip,
    /// Stream-copy video (unless VFR) and apply only corrective filters
    CorrectOnly(Corrections),
    /// Re-encode both streams with the quality preset
    FullTranscode(Option<Corrections>),
}

impl JobAction {
    pub fn corrections(&self) -> Option<&Corrections> {
        match self {
            JobAction::Skip => None,
            JobAction::CorrectOnly(c) => Some(c),
            JobAction::FullTranscode(c) => c.as_ref(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobAction::Skip => "skip",
            JobAction::CorrectOnly(_) => "correct-only",
            JobAction::FullTranscode(_) => "full-transcode",
        }
    }
}

/// round(fps) when known, otherwise 30
pub fn normalization_fps(probe: &ProbeResult) -> u32 {
    let rounded = probe.fps.round();
    if probe.fps > 0.0 && rounded >= 1.0 {
        rounded as u32
    } else {
        DEFAULT_NORMALIZED_FPS
    }
}

/// Stateless decision table
pub struct TranscodeJobPlanner;

impl TranscodeJobPlanner {
    pub fn plan(probe: &ProbeResult, problems: &ProblemReport, config: &EngineConfig) -> JobAction {
        let target_codec = probe.codec.eq_ignore_ascii_case(&config.target_codec);
        let compressed = probe.bitrate_total_kbps < config.compressed_bitrate_kbps;
        let corrections = Corrections::for_problems(problems, probe, config);

        match (target_codec, corrections) {
            (true, None) if compressed => JobAction::Skip,
            (true, Some(corrections)) => JobAction::CorrectOnly(corrections),
            (_, corrections) => JobAction::FullTranscode(corrections),
        }
    }
}
