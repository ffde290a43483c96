// src/render/animation.rs

use std::fmt;

use crate::render::task::Continuation;
use crate::types::{FrameNumber, Phase};

/// A live continuation of a task, scoped to one render state.
pub struct Animation<C> {
    pub frame: FrameNumber,
    pub phase: Phase,
    pub run: Continuation<C>,
    /// Index of the originating task in the renderer's task list.
    pub task: usize,
}

impl<C> Animation<C> {
    pub fn new(frame: FrameNumber, phase: Phase, run: Continuation<C>, task: usize) -> Self {
        Self {
            frame,
            phase,
            run,
            task,
        }
    }
}

impl<C> fmt::Debug for Animation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("frame", &self.frame)
            .field("phase", &self.phase)
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}
