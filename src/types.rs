// src/types.rs

//! Phase constants, mask helpers and the state handle shared by every layer.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Number of mask bits used per frame (one per phase).
pub const FRAME_SHIFT: u32 = 2;

/// Mask covering every phase of a single frame.
pub const PHASE_MASK: u32 = (1 << FRAME_SHIFT) - 1;

/// Mask bit for the CALCULATE phase of the upcoming frame.
pub const MASK_CALCULATE: u32 = 1 << Phase::Calculate.index();

/// Mask bit for the RENDER phase of the upcoming frame.
pub const MASK_RENDER: u32 = 1 << Phase::Render.index();

/// Largest frame offset that still fits a 32 bit schedule mask.
pub const MAX_FRAME_OFFSET: u32 = 32 / FRAME_SHIFT - 1;

/// Frame counter type. Starts at 0 and increases by one per fired frame.
pub type FrameNumber = u64;

/// The two phases of a frame.
///
/// - `Calculate`: derive synthetic state from raw fields. Always fully
///   drained before anything renders.
/// - `Render`: perform the side-effecting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[serde(alias = "measure")]
    Calculate,
    Render,
}

impl Phase {
    /// Both phases in execution order.
    pub const ALL: [Phase; 2] = [Phase::Calculate, Phase::Render];

    /// Numeric phase index (`Calculate = 0`, `Render = 1`).
    pub const fn index(self) -> u32 {
        match self {
            Phase::Calculate => 0,
            Phase::Render => 1,
        }
    }

    pub fn from_index(index: u32) -> Option<Phase> {
        match index {
            0 => Some(Phase::Calculate),
            1 => Some(Phase::Render),
            _ => None,
        }
    }

    /// Mask bit of this phase in the upcoming frame.
    pub const fn mask(self) -> u32 {
        1 << self.index()
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Calculate => "CALCULATE",
            Phase::Render => "RENDER",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "calculate" | "measure" => Ok(Phase::Calculate),
            "render" => Ok(Phase::Render),
            other => Err(format!(
                "invalid phase: {other} (expected \"calculate\" or \"render\")"
            )),
        }
    }
}

/// Mask bit for `phase` running `frame_offset` frames after the upcoming one.
///
/// Returns `None` when the offset does not fit a 32 bit mask.
pub fn phase_bit(frame_offset: u32, phase: Phase) -> Option<u32> {
    if frame_offset > MAX_FRAME_OFFSET {
        return None;
    }
    Some(1 << (phase.index() + frame_offset * FRAME_SHIFT))
}

/// Fold the next frame's bits onto the current frame.
pub fn merge_frames(mask: u32) -> u32 {
    (PHASE_MASK & mask) | (mask >> FRAME_SHIFT)
}

/// Handle to a render state owned by a [`Surface`](crate::engine::Surface).
///
/// Carries a generation counter so handles held past the state's removal
/// never reach a recycled slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl StateId {
    /// Raw slot index (diagnostics only).
    pub fn index(self) -> u32 {
        self.idx
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateId({}@gen{})", self.idx, self.generation)
    }
}
