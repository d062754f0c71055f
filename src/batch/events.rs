//! Hooks the orchestrator calls as a batch advances.
//!
//! Progress bars and the JSON event stream both hang off this trait; every
//! method defaults to a no-op.

use super::{BatchSummary, FileReport};
use crate::config::EngineConfig;
use crate::planner::JobAction;
use std::path::Path;

pub trait BatchEvents {
    fn batch_started(&self, _total_files: usize, _config: &EngineConfig) {}

    fn file_started(&self, _index: usize, _total: usize, _path: &Path, _size_bytes: u64) {}

    /// An encoder is about to run for `duration_seconds` of media
    fn job_started(&self, _path: &Path, _action: &JobAction, _duration_seconds: f64) {}

    /// Progress increment, in seconds of media
    fn job_progress(&self, _seconds: f64) {}

    fn file_finished(&self, _report: &FileReport) {}

    fn batch_finished(&self, _summary: &BatchSummary) {}
}

/// Reports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl BatchEvents for NoEvents {}
