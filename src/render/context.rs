// src/render/context.rs

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::render::task::DependencyKey;
use crate::types::{FrameNumber, Phase};

/// What a run function sees: the component plus the frame it runs in.
///
/// Invalidations raised here are collected and applied by the owning render
/// state once the current pass is over, so a CALCULATE task changing a value
/// another CALCULATE task depends on settles within the same frame.
#[derive(Debug)]
pub struct TaskContext<'a, C> {
    component: &'a mut C,
    frame: FrameNumber,
    phase: Phase,
    now: Instant,
    invalidated: Vec<DependencyKey>,
    invalidate_all: bool,
}

impl<'a, C> TaskContext<'a, C> {
    pub fn new(component: &'a mut C, frame: FrameNumber, phase: Phase, now: Instant) -> Self {
        Self {
            component,
            frame,
            phase,
            now,
            invalidated: Vec::new(),
            invalidate_all: false,
        }
    }

    pub fn component(&self) -> &C {
        self.component
    }

    pub fn component_mut(&mut self) -> &mut C {
        self.component
    }

    pub fn frame(&self) -> FrameNumber {
        self.frame
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Time captured when the current frame started.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn invalidate(&mut self, key: impl Into<DependencyKey>) {
        self.invalidated.push(key.into());
    }

    pub fn invalidate_all(&mut self) {
        self.invalidate_all = true;
    }

    /// Drain the collected invalidations (`keys`, `all`).
    pub(crate) fn take_invalidations(&mut self) -> (Vec<DependencyKey>, bool) {
        let all = std::mem::replace(&mut self.invalidate_all, false);
        (std::mem::take(&mut self.invalidated), all)
    }
}

impl<C> Deref for TaskContext<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.component
    }
}

impl<C> DerefMut for TaskContext<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.component
    }
}
