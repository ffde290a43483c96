// src/engine/mod.rs

//! Frame engine.
//!
//! The synchronous core lives in [`surface`]: an arena of render states plus
//! the scheduler they share. The async shell in [`runtime`] plays the part
//! of the host's frame-pacing primitive: it fires a frame on each interval
//! tick while one is requested, and feeds commands received over a channel
//! into the surface between frames.

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::render::DependencyKey;
use crate::types::{FrameNumber, StateId};

pub mod runtime;
pub mod surface;

pub use runtime::Runtime;
pub use surface::Surface;

/// Options of the async frame loop.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Minimum time between two fired frames.
    pub frame_interval: Duration,
    /// Stop after this many frames have fired.
    pub max_frames: Option<u64>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            max_frames: None,
        }
    }
}

/// Commands accepted by the runtime between frames.
pub enum RuntimeEvent<C> {
    Invalidate {
        state: StateId,
        key: DependencyKey,
    },
    InvalidateAll {
        state: StateId,
    },
    Pause {
        state: StateId,
    },
    Unpause {
        state: StateId,
    },
    /// Mutate the component, then invalidate `key`.
    Update {
        state: StateId,
        key: DependencyKey,
        update: Box<dyn FnOnce(&mut C) + Send>,
    },
    /// Reply with the frame number once the next frame's CALCULATE phase
    /// runs.
    WaitForFrame(oneshot::Sender<FrameNumber>),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    Shutdown,
}

impl<C> fmt::Debug for RuntimeEvent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEvent::Invalidate { state, key } => f
                .debug_struct("Invalidate")
                .field("state", state)
                .field("key", key)
                .finish(),
            RuntimeEvent::InvalidateAll { state } => {
                f.debug_struct("InvalidateAll").field("state", state).finish()
            }
            RuntimeEvent::Pause { state } => f.debug_struct("Pause").field("state", state).finish(),
            RuntimeEvent::Unpause { state } => {
                f.debug_struct("Unpause").field("state", state).finish()
            }
            RuntimeEvent::Update { state, key, .. } => f
                .debug_struct("Update")
                .field("state", state)
                .field("key", key)
                .finish_non_exhaustive(),
            RuntimeEvent::WaitForFrame(_) => f.write_str("WaitForFrame(..)"),
            RuntimeEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}
