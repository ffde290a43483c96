// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::{FrameNumber, Phase};

#[derive(Error, Debug)]
pub enum PhaseframeError {
    /// A callback rescheduled itself into the frame and phase it is running
    /// in after the recursion trap was armed. Aborts the frame.
    #[error("callback {callback} recursively scheduled into frame {frame} ({phase})")]
    RecursiveSchedule {
        callback: String,
        frame: FrameNumber,
        phase: Phase,
    },

    #[error(
        "different defer calls cannot be combined: (+{}, {}) vs (+{}, {})",
        .first.0, .first.1, .other.0, .other.1
    )]
    IncompatibleDefer {
        first: (u32, Phase),
        other: (u32, Phase),
    },

    #[error("frame offset {0} does not fit a schedule mask")]
    FrameOffsetOverflow(u32),

    /// A render state still had bits scheduled for a frame that already ran.
    #[error("render state was not called in frame {frame} (scheduled mask {scheduled:#b})")]
    MissedFrame { frame: FrameNumber, scheduled: u32 },

    #[error("render state called for frame {frame} ({phase}) but not scheduled")]
    UnscheduledCallback { frame: FrameNumber, phase: Phase },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in invalidation graph: {0}")]
    InvalidationCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PhaseframeError {
    /// Whether the error must abort the current frame instead of being
    /// reported and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PhaseframeError::RecursiveSchedule { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PhaseframeError>;
