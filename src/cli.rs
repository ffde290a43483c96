// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_scene_path;

/// Command-line arguments for `phaseframe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "phaseframe",
    version,
    about = "Simulate a phase-and-frame task scheduler over a scene of components.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the scene file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_scene_path())]
    pub scene: PathBuf,

    /// Number of frames to fire.
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub frames: u64,

    /// Pace frames with `[scheduler].frame_interval_ms` instead of firing
    /// them back to back.
    #[arg(long)]
    pub realtime: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PHASEFRAME_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the scene, but don't run any frame.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::parse_from(["phaseframe"]);
        assert_eq!(args.scene, default_scene_path());
        assert_eq!(args.frames, 10);
        assert!(!args.realtime);
        assert!(!args.dry_run);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn parses_flags() {
        let args = CliArgs::parse_from([
            "phaseframe",
            "--scene",
            "demo.toml",
            "--frames",
            "3",
            "--realtime",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.scene, PathBuf::from("demo.toml"));
        assert_eq!(args.frames, 3);
        assert!(args.realtime);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
