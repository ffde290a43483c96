// src/render/state.rs

//! Per-component scheduling state.
//!
//! `scheduled` mirrors what sits in the scheduler queues for this state,
//! relative to `frame`: bit `phase + offset * FRAME_SHIFT` is set while an
//! entry for `frame + offset` is queued. When the scheduler's frame moves on,
//! the mask is shifted down so it stays relative to the current frame.
//!
//! A paused state keeps receiving the callbacks it already queued but does
//! not run anything. New requests go to a shadow mask and are replayed by
//! [`RenderState::unpause`].

use std::fmt;
use std::rc::Rc;

use tracing::{debug, error};

use crate::bitset::Bitset;
use crate::errors::{PhaseframeError, Result};
use crate::render::animation::Animation;
use crate::render::context::TaskContext;
use crate::render::renderer::Renderer;
use crate::render::task::DependencyKey;
use crate::sched::Scheduler;
use crate::types::{
    merge_frames, phase_bit, FrameNumber, Phase, StateId, FRAME_SHIFT, MAX_FRAME_OFFSET,
};

/// Diagnostic snapshot of a render state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStatus {
    pub frame: FrameNumber,
    pub scheduled: u32,
    pub runnable: String,
}

pub struct RenderState<C> {
    id: StateId,
    renderer: Rc<Renderer<C>>,
    runnable: Bitset,
    animations: Vec<Animation<C>>,
    scheduled: u32,
    frame: FrameNumber,
    paused: bool,
    pscheduled: u32,
    pframe: FrameNumber,
}

impl<C> fmt::Debug for RenderState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderState")
            .field("id", &self.id)
            .field("frame", &self.frame)
            .field("scheduled", &self.scheduled)
            .field("runnable", &self.runnable.to_string())
            .field("animations", &self.animations.len())
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

impl<C: 'static> RenderState<C> {
    /// New states start paused with every task runnable. The first
    /// [`RenderState::unpause`] schedules the full initial pass.
    pub fn new(
        id: StateId,
        renderer: Rc<Renderer<C>>,
        scheduler: &Scheduler<StateId>,
    ) -> Self {
        let mut runnable = Bitset::with_len(renderer.task_count());
        let initial = renderer.schedule_all(&mut runnable);
        let frame = scheduler.frame();

        Self {
            id,
            renderer,
            runnable,
            animations: Vec::new(),
            scheduled: 0,
            frame,
            paused: true,
            pscheduled: initial,
            pframe: frame,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn renderer(&self) -> &Rc<Renderer<C>> {
        &self.renderer
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frame(&self) -> FrameNumber {
        self.frame
    }

    pub fn scheduled_mask(&self) -> u32 {
        self.scheduled
    }

    pub fn animations(&self) -> &[Animation<C>] {
        &self.animations
    }

    pub fn status(&self) -> RenderStatus {
        RenderStatus {
            frame: self.frame,
            scheduled: self.scheduled,
            runnable: self.runnable.to_string(),
        }
    }

    /// Mark the tasks depending on `key` as runnable. Unknown keys are
    /// ignored.
    pub fn invalidate(
        &mut self,
        key: &DependencyKey,
        scheduler: &mut Scheduler<StateId>,
    ) -> Result<()> {
        let mask = self.renderer.schedule_tasks(key, &mut self.runnable);
        if mask == 0 {
            return Ok(());
        }
        self.schedule(mask, scheduler)
    }

    pub fn invalidate_all(&mut self, scheduler: &mut Scheduler<StateId>) -> Result<()> {
        let mask = self.renderer.schedule_all(&mut self.runnable);
        if mask == 0 {
            return Ok(());
        }
        self.schedule(mask, scheduler)
    }

    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.pscheduled = self.scheduled;
        self.pframe = self.frame;
        debug!(state = ?self.id, frame = self.frame, "render state paused");
    }

    pub fn unpause(&mut self, scheduler: &mut Scheduler<StateId>) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        self.advance_to(scheduler.frame());
        let frame = self.frame;

        // Animations whose frame passed while paused are due now. Their bits
        // are rebuilt relative to `frame`.
        let mut due = 0;
        for animation in self.animations.iter_mut() {
            animation.frame = animation.frame.max(frame);
            due |= u32::try_from(animation.frame - frame)
                .ok()
                .and_then(|offset| phase_bit(offset, animation.phase))
                .unwrap_or(0);
        }

        debug!(state = ?self.id, frame, due, "render state unpaused");

        let mut pending = self.pscheduled;
        if self.pframe != frame {
            pending = merge_frames(pending);
        }
        self.schedule(pending | due, scheduler)
    }

    /// Scheduler callback for `(frame, phase)`.
    pub fn on_frame(
        &mut self,
        frame: FrameNumber,
        phase: Phase,
        scheduler: &mut Scheduler<StateId>,
        component: &mut C,
    ) -> Result<()> {
        self.advance_to(frame);

        if self.scheduled & phase.mask() == 0 {
            let err = PhaseframeError::UnscheduledCallback { frame, phase };
            error!(state = ?self.id, error = %err, "render state bookkeeping fault");
        }
        self.scheduled &= !phase.mask();

        if self.paused {
            return Ok(());
        }

        let renderer = Rc::clone(&self.renderer);
        let mut cx = TaskContext::new(component, frame, phase, scheduler.now());
        let mut mask = renderer.run(frame, phase, &mut self.runnable, &mut self.animations, &mut cx);

        let (keys, all) = cx.take_invalidations();
        for key in &keys {
            mask |= renderer.schedule_tasks(key, &mut self.runnable);
        }
        if all {
            mask |= renderer.schedule_all(&mut self.runnable);
        }

        if mask != 0 {
            self.schedule(mask, scheduler)?;
        }
        Ok(())
    }

    fn schedule(&mut self, mask: u32, scheduler: &mut Scheduler<StateId>) -> Result<()> {
        if self.paused {
            self.pscheduled |= mask;
            return Ok(());
        }

        self.advance_to(scheduler.frame());

        let mask = mask & !self.scheduled;
        if mask == 0 {
            return Ok(());
        }

        scheduler.schedule(mask, self.id)?;
        self.scheduled |= mask;
        Ok(())
    }

    /// Re-base `scheduled` on `frame`. Bits for frames that have already
    /// passed are reported and discarded. Returns whether the frame moved.
    fn advance_to(&mut self, frame: FrameNumber) -> bool {
        if frame <= self.frame {
            return false;
        }

        let elapsed = frame - self.frame;
        let (missed, rest) = if elapsed > u64::from(MAX_FRAME_OFFSET) {
            (self.scheduled, 0)
        } else {
            let shift = elapsed as u32 * FRAME_SHIFT;
            let past = (1u32 << shift) - 1;
            (self.scheduled & past, self.scheduled >> shift)
        };

        if missed != 0 {
            let err = PhaseframeError::MissedFrame {
                frame: self.frame,
                scheduled: missed,
            };
            error!(state = ?self.id, error = %err, "render state bookkeeping fault");
        }

        self.scheduled = rest;
        self.frame = frame;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::task::{Task, TaskResult};
    use crate::types::{MASK_CALCULATE, MASK_RENDER};

    type Log = Vec<String>;

    const ID: StateId = StateId { idx: 0, generation: 0 };

    fn renderer() -> Rc<Renderer<Log>> {
        let task = |phase, name: &'static str, dep: &'static str| {
            Task::new(phase, [dep], move |cx: &mut TaskContext<'_, Log>| {
                cx.push(name.to_string());
                Ok(TaskResult::Done)
            })
        };
        Rc::new(
            Renderer::new()
                .with_task(task(Phase::Calculate, "a", "x"))
                .with_task(task(Phase::Render, "b", "x"))
                .with_task(task(Phase::Render, "c", "y")),
        )
    }

    fn fire(scheduler: &mut Scheduler<StateId>, state: &mut RenderState<Log>, log: &mut Log) {
        scheduler
            .fire(|s, _, frame, phase| state.on_frame(frame, phase, s, log))
            .expect("frame fires");
    }

    #[test]
    fn starts_paused_with_everything_pending() {
        let scheduler = Scheduler::default();
        let state = RenderState::new(ID, renderer(), &scheduler);
        assert!(state.is_paused());
        assert_eq!(state.scheduled_mask(), 0);
        assert!(!scheduler.frame_requested());
        assert_eq!(state.status().runnable, format!("{}", 0b111u32 << 29));
    }

    #[test]
    fn unpause_runs_the_initial_pass() {
        let mut scheduler = Scheduler::default();
        let mut state = RenderState::new(ID, renderer(), &scheduler);
        state.unpause(&mut scheduler).expect("unpause");
        assert_eq!(state.scheduled_mask(), MASK_CALCULATE | MASK_RENDER);

        let mut log = Log::new();
        fire(&mut scheduler, &mut state, &mut log);
        assert_eq!(log, vec!["a", "b", "c"]);
        assert_eq!(state.scheduled_mask(), 0);
        assert_eq!(state.status().runnable, "0");
    }

    #[test]
    fn invalidation_while_paused_is_shadowed() {
        let mut scheduler = Scheduler::default();
        let mut state = RenderState::new(ID, renderer(), &scheduler);
        state.unpause(&mut scheduler).expect("unpause");
        let mut log = Log::new();
        fire(&mut scheduler, &mut state, &mut log);
        log.clear();

        state.pause();
        state.invalidate(&"y".into(), &mut scheduler).expect("invalidate");
        assert!(!scheduler.has_pending());

        state.unpause(&mut scheduler).expect("unpause");
        assert_eq!(state.scheduled_mask(), MASK_RENDER);
        fire(&mut scheduler, &mut state, &mut log);
        assert_eq!(log, vec!["c"]);
    }

    #[test]
    fn repeated_invalidation_queues_once() {
        let mut scheduler = Scheduler::default();
        let mut state = RenderState::new(ID, renderer(), &scheduler);
        state.unpause(&mut scheduler).expect("unpause");
        state.invalidate(&"x".into(), &mut scheduler).expect("invalidate");
        state.invalidate(&"x".into(), &mut scheduler).expect("invalidate");
        assert_eq!(scheduler.queue_len(0, Phase::Calculate), 1);
        assert_eq!(scheduler.queue_len(0, Phase::Render), 1);
    }

    #[test]
    fn unknown_key_is_a_no_op() {
        let mut scheduler = Scheduler::default();
        let mut state = RenderState::new(ID, renderer(), &scheduler);
        state.unpause(&mut scheduler).expect("unpause");
        let mut log = Log::new();
        fire(&mut scheduler, &mut state, &mut log);

        state.invalidate(&DependencyKey::signal("resize"), &mut scheduler).expect("invalidate");
        assert!(!scheduler.frame_requested());
        assert_eq!(state.scheduled_mask(), 0);
    }

    #[test]
    fn scheduled_mask_follows_the_frame() {
        let mut scheduler = Scheduler::default();
        let mut state = RenderState::new(ID, renderer(), &scheduler);
        state.unpause(&mut scheduler).expect("unpause");
        let mut log = Log::new();
        fire(&mut scheduler, &mut state, &mut log);

        // Two frames pass without this state being involved.
        scheduler.fire(|_, _, _, _| Ok(())).expect("idle frame");
        state.invalidate(&"x".into(), &mut scheduler).expect("invalidate");
        assert_eq!(state.frame(), 2);
        assert_eq!(state.scheduled_mask(), MASK_CALCULATE | MASK_RENDER);
    }
}
