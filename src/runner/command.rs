//! Deterministic ffmpeg command lines.
//!
//! The same action, paths and config always give the same arguments, in the
//! same order. Progress goes to stdout (`-progress pipe:1`), diagnostics to
//! stderr.

use crate::args;
use crate::config::EngineConfig;
use crate::planner::JobAction;
use crate::utils::path_arg;
use std::path::Path;

/// ffmpeg encoder for a target codec name
pub fn encoder_for(codec: &str) -> &str {
    match codec.to_ascii_lowercase().as_str() {
        "h264" | "avc" => "libx264",
        "hevc" | "h265" => "libx265",
        "av1" => "libsvtav1",
        "vp9" => "libvpx-vp9",
        _ => codec,
    }
}

/// Arguments for one job, `None` for `Skip`
pub fn build_ffmpeg_args(
    input: &Path,
    output: &Path,
    action: &JobAction,
    config: &EngineConfig,
) -> Option<Vec<String>> {
    let (video_reencode, audio_reencode, corrections) = match action {
        JobAction::Skip => return None,
        JobAction::CorrectOnly(c) => (c.needs_video_reencode(), c.resync_audio, Some(c)),
        JobAction::FullTranscode(c) => (true, true, c.as_ref()),
    };

    let mut cmd = args!["-hide_banner", "-nostdin", "-y"];

    if corrections.is_some_and(|c| c.regenerate_timestamps) {
        cmd.extend(args!["-fflags", "+genpts+igndts"]);
    }
    cmd.extend(args!["-i", path_arg(input).as_str()]);
    cmd.extend(args!["-threads", config.thread_budget.to_string().as_str()]);

    if let Some(fps) = corrections.and_then(|c| c.fps_target) {
        cmd.extend(args!["-vf", format!("fps={}", fps).as_str()]);
    }
    if video_reencode {
        let preset = &config.quality_preset;
        cmd.extend(args![
            "-c:v",
            encoder_for(&config.target_codec),
            "-crf",
            preset.crf.to_string().as_str(),
            "-preset",
            preset.speed_preset.as_str(),
            "-pix_fmt",
            "yuv420p",
        ]);
    } else {
        cmd.extend(args!["-c:v", "copy"]);
    }

    if audio_reencode {
        cmd.extend(args!["-c:a", "aac", "-b:a", config.audio_bitrate.as_str()]);
    } else {
        cmd.extend(args!["-c:a", "copy"]);
    }
    if corrections.is_some_and(|c| c.resync_audio) {
        cmd.extend(args!["-af", "aresample=async=1"]);
    }

    cmd.extend(args![
        "-movflags",
        "+faststart",
        "-max_muxing_queue_size",
        "4096",
        "-loglevel",
        "warning",
        "-nostats",
        "-progress",
        "pipe:1",
    ]);
    cmd.push(path_arg(output));
    Some(cmd)
}
