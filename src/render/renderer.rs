// src/render/renderer.rs

//! The per-class task list and the execution loop run for one
//! `(frame, phase)` of a render state.

use std::cell::OnceCell;
use std::fmt;

use tracing::{debug, error, trace};

use crate::bitset::{bit_index, first_bit, limb_mask, Bitset};
use crate::errors::PhaseframeError;
use crate::render::animation::Animation;
use crate::render::context::TaskContext;
use crate::render::dependency_map::DependencyMap;
use crate::render::task::{DependencyKey, Task, TaskResult};
use crate::types::{FrameNumber, Phase, FRAME_SHIFT};

/// Ordered task list of a component class plus its lazily built
/// [`DependencyMap`].
pub struct Renderer<C> {
    tasks: Vec<Task<C>>,
    dependency_map: OnceCell<DependencyMap>,
}

impl<C> Default for Renderer<C> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            dependency_map: OnceCell::new(),
        }
    }
}

impl<C> fmt::Debug for Renderer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("tasks", &self.tasks)
            .field("compiled", &self.dependency_map.get().is_some())
            .finish()
    }
}

impl<C: 'static> Renderer<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the tasks of a parent class. Tasks added afterwards come
    /// after the inherited ones.
    pub fn inherit(parent: &Renderer<C>) -> Self {
        Self {
            tasks: parent.tasks.clone(),
            dependency_map: OnceCell::new(),
        }
    }

    pub fn add_task(&mut self, task: Task<C>) {
        self.tasks.push(task);
        self.dependency_map = OnceCell::new();
    }

    pub fn with_task(mut self, task: Task<C>) -> Self {
        self.add_task(task);
        self
    }

    pub fn tasks(&self) -> &[Task<C>] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn dependency_map(&self) -> &DependencyMap {
        self.dependency_map
            .get_or_init(|| DependencyMap::build(&self.tasks))
    }

    /// Mark every task depending on `key` as runnable and return the phases
    /// they run in. Unknown keys yield 0.
    pub fn schedule_tasks(&self, key: &DependencyKey, runnable: &mut Bitset) -> u32 {
        match self.dependency_map().get(key) {
            Some(entry) => {
                runnable.apply(&entry.tasks);
                entry.phase_mask
            }
            None => 0,
        }
    }

    /// Mark every task as runnable.
    pub fn schedule_all(&self, runnable: &mut Bitset) -> u32 {
        let mut mask = 0;
        for (index, task) in self.tasks.iter().enumerate() {
            mask |= task.phase().mask();
            runnable.set(index);
        }
        mask
    }

    /// Run every runnable task of `phase`, then every animation due in
    /// `(frame, phase)`.
    ///
    /// Returns the schedule mask of the follow-up work produced: bit
    /// `phase + offset * FRAME_SHIFT` for work due `offset` frames from
    /// `frame`.
    pub fn run(
        &self,
        frame: FrameNumber,
        phase: Phase,
        runnable: &mut Bitset,
        animations: &mut Vec<Animation<C>>,
        cx: &mut TaskContext<'_, C>,
    ) -> u32 {
        let mut mask = 0;

        for limb in 0..runnable.limb_count() {
            let mut rest = runnable.limb(limb);

            while rest != 0 {
                let bit = first_bit(rest);
                rest &= !limb_mask(bit);
                let index = bit_index(limb, bit);

                let Some(task) = self.tasks.get(index) else {
                    runnable.clear(index);
                    continue;
                };

                // Bits of the other phase stay set for their own pass.
                if task.phase() != phase {
                    continue;
                }

                runnable.clear(index);
                animations.retain(|animation| animation.task != index);

                if task.is_debug() {
                    debug!(task = index, label = ?task.label_str(), frame, %phase, "renderer: running task");
                } else {
                    trace!(task = index, frame, %phase, "renderer: running task");
                }

                match task.call(cx) {
                    Ok(TaskResult::Done) => {}
                    // Due now: picked up by the animation walk below.
                    Ok(TaskResult::NextFrame(run)) => {
                        animations.push(Animation::new(frame, phase, run, index));
                        mask |= phase.mask();
                    }
                    Ok(TaskResult::Defer(defer)) => match defer.mask_bit() {
                        Some(bit) => {
                            let due = frame + u64::from(defer.frame_offset);
                            animations.push(Animation::new(due, defer.phase, defer.run, index));
                            mask |= bit;
                        }
                        None => {
                            let err = PhaseframeError::FrameOffsetOverflow(defer.frame_offset);
                            error!(task = index, label = ?task.label_str(), error = %err, "renderer: dropping deferred work");
                        }
                    },
                    Err(err) => {
                        error!(
                            task = index,
                            label = ?task.label_str(),
                            frame,
                            %phase,
                            error = %err,
                            "renderer: task failed"
                        );
                    }
                }
            }
        }

        mask | self.run_animations(frame, phase, animations, cx)
    }

    fn run_animations(
        &self,
        frame: FrameNumber,
        phase: Phase,
        animations: &mut Vec<Animation<C>>,
        cx: &mut TaskContext<'_, C>,
    ) -> u32 {
        let mut mask = 0;
        let mut i = 0;

        while i < animations.len() {
            let animation = &mut animations[i];

            if animation.phase != phase || animation.frame > frame {
                i += 1;
                continue;
            }

            if animation.frame < frame {
                error!(
                    task = animation.task,
                    due = animation.frame,
                    frame,
                    %phase,
                    "renderer: animation was never run, dropping it"
                );
                animations.remove(i);
                continue;
            }

            let keep = match (animation.run)(cx) {
                Ok(TaskResult::Done) => false,
                Ok(TaskResult::NextFrame(run)) => {
                    animation.run = run;
                    animation.frame = frame + 1;
                    mask |= 1 << (phase.index() + FRAME_SHIFT);
                    true
                }
                Ok(TaskResult::Defer(defer)) => match defer.mask_bit() {
                    Some(bit) => {
                        animation.frame = frame + u64::from(defer.frame_offset);
                        animation.phase = defer.phase;
                        animation.run = defer.run;
                        mask |= bit;
                        true
                    }
                    None => {
                        let err = PhaseframeError::FrameOffsetOverflow(defer.frame_offset);
                        error!(task = animation.task, error = %err, "renderer: stopping animation");
                        false
                    }
                },
                Err(err) => {
                    error!(
                        task = animation.task,
                        frame,
                        %phase,
                        error = %err,
                        "renderer: animation failed"
                    );
                    false
                }
            };

            if keep {
                i += 1;
            } else {
                animations.remove(i);
            }
        }

        mask
    }
}
