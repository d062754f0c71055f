//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica cross-platform per i tool esterni
//! (ffmpeg, ffprobe) e per la priorità del processo.

use crate::config::EngineConfig;
use crate::error::TranscodeError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Platform-specific command manager
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let mut commands = HashMap::new();
        if cfg!(windows) {
            commands.insert("ffmpeg", "ffmpeg.exe");
            commands.insert("ffprobe", "ffprobe.exe");
        } else {
            commands.insert("ffmpeg", "ffmpeg");
            commands.insert("ffprobe", "ffprobe");
        }

        Self { commands }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Find an executable in PATH; paths with a separator are checked directly
    pub fn resolve_tool(&self, program: &str) -> Option<PathBuf> {
        which::which(self.get_command(program)).ok()
    }

    /// Check if a command is available on the system
    pub fn is_command_available(&self, program: &str) -> bool {
        match self.resolve_tool(program) {
            Some(path) => {
                debug!("Resolved {} -> {}", program, path.display());
                true
            }
            None => false,
        }
    }

    /// Installation hint shown when a tool is missing
    pub fn install_hint(tool: &str) -> String {
        match tool {
            "ffmpeg" | "ffprobe" => {
                if cfg!(target_os = "linux") {
                    "sudo apt-get install ffmpeg".to_string()
                } else if cfg!(target_os = "macos") {
                    "brew install ffmpeg".to_string()
                } else {
                    "download a build from https://www.gyan.dev/ffmpeg/builds/ and add it to PATH".to_string()
                }
            }
            other => format!("install '{}' and add it to PATH", other),
        }
    }

    /// Startup check of the external toolchain
    ///
    /// A missing encoder is fatal; a missing prober only degrades probes to
    /// their fallback values.
    pub async fn check_toolchain(&self, config: &EngineConfig) -> Result<(), TranscodeError> {
        if !self.is_command_available(&config.ffmpeg_program) {
            return Err(TranscodeError::MissingDependency(format!(
                "{} not found, install it with: {}",
                config.ffmpeg_program,
                Self::install_hint("ffmpeg")
            )));
        }

        if !self.is_command_available(&config.ffprobe_program) {
            warn!(
                "{} not found, file metadata will fall back to defaults ({})",
                config.ffprobe_program,
                Self::install_hint("ffprobe")
            );
        }
        Ok(())
    }

    /// Lower this process's scheduling priority; best-effort
    #[cfg(unix)]
    pub fn lower_priority(nice: i32) -> bool {
        // SAFETY: setpriority only touches the calling process's scheduling state.
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
        rc == 0
    }

    #[cfg(not(unix))]
    pub fn lower_priority(_nice: i32) -> bool {
        false
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
            logical_cores: num_cpus::get(),
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
    pub logical_cores: usize,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}, {} cores)",
            self.os, self.arch, self.family, self.logical_cores
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_commands() {
        let platform = PlatformCommands::instance();
        assert!(platform.get_command("ffmpeg").starts_with("ffmpeg"));
        assert_eq!(platform.get_command("custom-tool"), "custom-tool");
    }

    #[test]
    fn test_missing_command_not_available() {
        let platform = PlatformCommands::instance();
        assert!(!platform.is_command_available("no-such-encoder-xyz"));
        assert!(platform.resolve_tool("./no/such/ffmpeg").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_tool_finds_sh() {
        let platform = PlatformCommands::instance();
        assert!(platform.resolve_tool("sh").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_tool_requires_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let tool = dir.path().join("ffmpeg");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        let program = tool.to_string_lossy().to_string();
        let platform = PlatformCommands::instance();

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(platform.resolve_tool(&program).is_none());

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(platform.resolve_tool(&program).is_some());
    }

    #[tokio::test]
    async fn test_missing_encoder_is_fatal() {
        let config = EngineConfig {
            ffmpeg_program: "no-such-encoder-xyz".to_string(),
            ..Default::default()
        };
        let result = PlatformCommands::instance().check_toolchain(&config).await;
        assert!(matches!(result, Err(TranscodeError::MissingDependency(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_prober_only_warns() {
        let config = EngineConfig {
            ffmpeg_program: "sh".to_string(),
            ffprobe_program: "no-such-prober-xyz".to_string(),
            ..Default::default()
        };
        let result = PlatformCommands::instance().check_toolchain(&config).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_install_hint_mentions_ffmpeg() {
        assert!(PlatformCommands::install_hint("ffprobe").contains("ffmpeg"));
    }

    #[test]
    fn test_system_info() {
        let info = PlatformCommands::system_info();
        assert!(!info.os.is_empty());
        assert!(info.logical_cores >= 1);
        assert!(info.to_string().contains("cores"));
    }
}
