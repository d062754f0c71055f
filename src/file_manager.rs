//! # File Management Module
//!
//! Discovery dei video in input e operazioni sui file di output.
//!
//! ## Responsabilità:
//! - Discovery non ricorsiva dei video nella directory di input
//! - Percorso di output deterministico (`<output_dir>/<stem>.mp4`); input con
//!   lo stesso stem ricevono nomi distinti (`<stem>_<ext>.mp4`)
//! - Nome temporaneo di staging, rinominato solo dopo la verifica dell'output
//! - Lettura dimensioni e rimozione degli originali dopo un job riuscito
//! - Formattazione human-readable delle dimensioni e della riduzione
//!
//! ## Formati supportati:
//! - **Input**: MP4, M4V, MOV, MKV, WebM, AVI
//! - **Output**: sempre MP4

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Extensions picked up by discovery (compared case-insensitively)
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "webm", "avi"];

/// File-system helpers for the batch
pub struct FileManager;

fn stem_key(path: &Path) -> String {
    path.file_stem().unwrap_or_default().to_string_lossy().to_lowercase()
}

impl FileManager {
    /// Top-level video files in `input_dir`, sorted by name
    pub fn find_video_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| Self::is_video(path))
            .collect();

        files.sort();
        Ok(files)
    }

    /// Check if a file is a supported video
    pub fn is_video(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Where the job for `input` writes its result
    pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
        let file_stem = input.file_stem().unwrap_or_default().to_string_lossy();
        output_dir.join(format!("{}.mp4", file_stem))
    }

    /// Output paths for a whole batch, one per input and pairwise distinct
    ///
    /// Inputs sharing a stem (`a.mkv`, `a.mov`) keep their extension in the
    /// name (`a_mkv.mp4`, `a_mov.mp4`); stems are compared case-insensitively.
    pub fn output_paths_for(inputs: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for input in inputs {
            *counts.entry(stem_key(input)).or_default() += 1;
        }
        let is_unique = |input: &Path| counts.get(&stem_key(input)).copied().unwrap_or(0) <= 1;

        let mut taken: HashSet<String> = inputs
            .iter()
            .filter(|input| is_unique(input.as_path()))
            .map(|input| stem_key(input))
            .collect();

        inputs
            .iter()
            .map(|input| {
                if is_unique(input.as_path()) {
                    return Self::output_path_for(input, output_dir);
                }
                let stem = input.file_stem().unwrap_or_default().to_string_lossy();
                let ext = input
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                let mut candidate = format!("{}_{}", stem, ext);
                let mut n = 2;
                while !taken.insert(candidate.to_lowercase()) {
                    candidate = format!("{}_{}_{}", stem, ext, n);
                    n += 1;
                }
                output_dir.join(format!("{}.mp4", candidate))
            })
            .collect()
    }

    /// Hidden sibling a job writes to until its output is verified
    pub fn staging_path_for(output: &Path) -> PathBuf {
        let stem = output.file_stem().unwrap_or_default().to_string_lossy();
        let ext = output
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_string());
        output.with_file_name(format!(".{}.partial.{}", stem, ext))
    }

    /// Move a verified staging file onto its final name
    pub async fn promote(staging: &Path, output: &Path) -> Result<()> {
        fs::rename(staging, output).await?;
        Ok(())
    }

    /// Size in bytes, `None` if the file is missing or unreadable
    pub async fn file_size(path: &Path) -> Option<u64> {
        fs::metadata(path).await.ok().map(|m| m.len())
    }

    /// Delete a source file once its output has been verified
    pub async fn remove_original(path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        Ok(())
    }

    /// Best-effort cleanup of a staging file
    pub async fn discard_partial(path: &Path) {
        let _ = fs::remove_file(path).await;
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut value = size as f64;
        let mut unit = 0;

        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }

        if unit == 0 {
            format!("{} {}", size, UNITS[0])
        } else {
            format!("{:.2} {}", value, UNITS[unit])
        }
    }

    /// Percentage saved going from `before` to `after` (negative if it grew)
    pub fn calculate_reduction(before: u64, after: u64) -> f64 {
        if before == 0 {
            0.0
        } else {
            (before as f64 - after as f64) / before as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_video_files_is_flat_and_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.MKV"), b"x").unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.mov"), b"x").unwrap();

        let files = FileManager::find_video_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.MKV"]);
    }

    #[test]
    fn test_is_video() {
        assert!(FileManager::is_video(Path::new("clip.M4V")));
        assert!(FileManager::is_video(Path::new("clip.webm")));
        assert!(!FileManager::is_video(Path::new("photo.jpg")));
        assert!(!FileManager::is_video(Path::new("README")));
    }

    #[test]
    fn test_output_path_for() {
        let out = FileManager::output_path_for(Path::new("/in/holiday.mov"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/holiday.mp4"));
    }

    #[test]
    fn test_output_paths_disambiguate_shared_stems() {
        let inputs: Vec<PathBuf> = ["/in/a.mkv", "/in/a.mov", "/in/b.mov", "/in/A.mp4"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let outputs = FileManager::output_paths_for(&inputs, Path::new("/out"));
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("/out/a_mkv.mp4"),
                PathBuf::from("/out/a_mov.mp4"),
                PathBuf::from("/out/b.mp4"),
                PathBuf::from("/out/A_mp4.mp4"),
            ]
        );
    }

    #[test]
    fn test_output_paths_never_reuse_a_taken_name() {
        // `a_mkv.mov` already owns `a_mkv.mp4`
        let inputs: Vec<PathBuf> = ["/in/a.mkv", "/in/a.mov", "/in/a_mkv.mov"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let outputs = FileManager::output_paths_for(&inputs, Path::new("/out"));
        assert_eq!(outputs[0], PathBuf::from("/out/a_mkv_2.mp4"));
        assert_eq!(outputs[1], PathBuf::from("/out/a_mov.mp4"));
        assert_eq!(outputs[2], PathBuf::from("/out/a_mkv.mp4"));
    }

    #[test]
    fn test_staging_path_for() {
        let staging = FileManager::staging_path_for(Path::new("/out/holiday.mp4"));
        assert_eq!(staging, PathBuf::from("/out/.holiday.partial.mp4"));
    }

    #[tokio::test]
    async fn test_file_size_and_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp4");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        assert_eq!(FileManager::file_size(&path).await, Some(2048));
        FileManager::remove_original(&path).await.unwrap();
        assert_eq!(FileManager::file_size(&path).await, None);
        assert!(FileManager::remove_original(&path).await.is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(1536), "1.50 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(1000, 250), 75.0);
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
        assert_eq!(FileManager::calculate_reduction(100, 150), -50.0);
    }
}
