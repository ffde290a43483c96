// src/engine/surface.rs

//! Synchronous core of the engine.
//!
//! A [`Surface`] owns one [`Scheduler`] and every render state sharing it,
//! together with the component each state renders. States are addressed by
//! generational [`StateId`] handles: removing a state bumps its slot's
//! generation, so queue entries and handles still naming it are skipped
//! instead of reaching whatever reuses the slot.
//!
//! Nothing here touches the Tokio runtime or the clock beyond
//! `Instant::now()`; the async shell in [`crate::engine::runtime`] decides
//! when frames fire. Frame waiters are plain `oneshot` senders completed from
//! inside [`Surface::tick`].

use std::fmt;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::render::{DependencyKey, RenderState, RenderStatus, Renderer};
use crate::sched::{FrameStats, Scheduler, SchedulerConfig, SchedulerStatus};
use crate::types::{FrameNumber, StateId, MASK_CALCULATE};

/// Queue key that resolves the frame waiters. No slot reaches this index.
const FRAME_WAITERS: StateId = StateId {
    idx: u32::MAX,
    generation: u32::MAX,
};

struct Mounted<C> {
    state: RenderState<C>,
    component: C,
}

struct Slot<C> {
    generation: u32,
    entry: Option<Mounted<C>>,
}

pub struct Surface<C> {
    scheduler: Scheduler<StateId>,
    slots: Vec<Slot<C>>,
    free_list: Vec<u32>,
    waiters: Vec<oneshot::Sender<FrameNumber>>,
}

impl<C> fmt::Debug for Surface<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self.slots.iter().filter(|s| s.entry.is_some()).count();
        f.debug_struct("Surface")
            .field("scheduler", &self.scheduler.status())
            .field("states", &live)
            .field("waiters", &self.waiters.len())
            .finish_non_exhaustive()
    }
}

fn lookup<C>(slots: &[Slot<C>], id: StateId) -> Option<&Mounted<C>> {
    let slot = slots.get(id.idx as usize)?;
    if slot.generation != id.generation {
        return None;
    }
    slot.entry.as_ref()
}

fn lookup_mut<C>(slots: &mut [Slot<C>], id: StateId) -> Option<&mut Mounted<C>> {
    let slot = slots.get_mut(id.idx as usize)?;
    if slot.generation != id.generation {
        return None;
    }
    slot.entry.as_mut()
}

impl<C: 'static> Surface<C> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            scheduler: Scheduler::new(config),
            slots: Vec::new(),
            free_list: Vec::new(),
            waiters: Vec::new(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler<StateId> {
        &self.scheduler
    }

    pub fn frame(&self) -> FrameNumber {
        self.scheduler.frame()
    }

    pub fn frame_requested(&self) -> bool {
        self.scheduler.frame_requested()
    }

    pub fn scheduler_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    /// Add a render state for `component`. It starts paused; see
    /// [`Surface::mount`] for the usual insert-and-show.
    pub fn insert(&mut self, renderer: Rc<Renderer<C>>, component: C) -> StateId {
        let id = match self.free_list.pop() {
            Some(idx) => StateId {
                idx,
                generation: self.slots[idx as usize].generation,
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                StateId {
                    idx: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        let state = RenderState::new(id, renderer, &self.scheduler);
        self.slots[id.idx as usize].entry = Some(Mounted { state, component });
        debug!(state = ?id, "surface: state inserted");
        id
    }

    /// Insert and unpause, scheduling the initial full pass.
    pub fn mount(&mut self, renderer: Rc<Renderer<C>>, component: C) -> Result<StateId> {
        let id = self.insert(renderer, component);
        self.unpause(id)?;
        Ok(id)
    }

    /// Drop a state and return its component. Queue entries still naming it
    /// are skipped when their frame fires.
    pub fn remove(&mut self, id: StateId) -> Option<C> {
        let slot = self.slots.get_mut(id.idx as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let mounted = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.idx);
        debug!(state = ?id, "surface: state removed");
        Some(mounted.component)
    }

    pub fn contains(&self, id: StateId) -> bool {
        lookup(&self.slots, id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn component(&self, id: StateId) -> Option<&C> {
        lookup(&self.slots, id).map(|m| &m.component)
    }

    /// Mutable access to a component. Changing a value does not invalidate
    /// anything by itself; follow up with [`Surface::invalidate`].
    pub fn component_mut(&mut self, id: StateId) -> Option<&mut C> {
        lookup_mut(&mut self.slots, id).map(|m| &mut m.component)
    }

    pub fn state(&self, id: StateId) -> Option<&RenderState<C>> {
        lookup(&self.slots, id).map(|m| &m.state)
    }

    pub fn invalidate(&mut self, id: StateId, key: impl Into<DependencyKey>) -> Result<()> {
        let key = key.into();
        let Some(mounted) = lookup_mut(&mut self.slots, id) else {
            warn!(state = ?id, %key, "surface: invalidate on stale handle");
            return Ok(());
        };
        mounted.state.invalidate(&key, &mut self.scheduler)
    }

    pub fn invalidate_all(&mut self, id: StateId) -> Result<()> {
        let Some(mounted) = lookup_mut(&mut self.slots, id) else {
            warn!(state = ?id, "surface: invalidate_all on stale handle");
            return Ok(());
        };
        mounted.state.invalidate_all(&mut self.scheduler)
    }

    pub fn pause(&mut self, id: StateId) {
        match lookup_mut(&mut self.slots, id) {
            Some(mounted) => mounted.state.pause(),
            None => warn!(state = ?id, "surface: pause on stale handle"),
        }
    }

    pub fn unpause(&mut self, id: StateId) -> Result<()> {
        let Some(mounted) = lookup_mut(&mut self.slots, id) else {
            warn!(state = ?id, "surface: unpause on stale handle");
            return Ok(());
        };
        mounted.state.unpause(&mut self.scheduler)
    }

    pub fn is_paused(&self, id: StateId) -> Option<bool> {
        self.state(id).map(RenderState::is_paused)
    }

    pub fn status(&self, id: StateId) -> Option<RenderStatus> {
        self.state(id).map(RenderState::status)
    }

    /// Resolves with the frame number once the CALCULATE phase of the next
    /// frame starts dispatching this request. Requests a frame.
    pub fn wait_for_frame(&mut self) -> Result<oneshot::Receiver<FrameNumber>> {
        let (tx, rx) = oneshot::channel();
        self.add_waiter(tx)?;
        Ok(rx)
    }

    fn add_waiter(&mut self, waiter: oneshot::Sender<FrameNumber>) -> Result<()> {
        if self.waiters.is_empty() {
            self.scheduler.schedule(MASK_CALCULATE, FRAME_WAITERS)?;
        }
        self.waiters.push(waiter);
        Ok(())
    }

    /// Fire one frame, whether or not one was requested.
    pub fn tick(&mut self) -> Result<FrameStats> {
        let slots = &mut self.slots;
        let waiters = &mut self.waiters;
        let result = self.scheduler.fire(|scheduler, id, frame, phase| {
            if id == FRAME_WAITERS {
                trace!(frame, waiters = waiters.len(), "surface: resolving frame waiters");
                for waiter in waiters.drain(..) {
                    // The receiver may have given up waiting.
                    let _ = waiter.send(frame);
                }
                return Ok(());
            }

            match lookup_mut(slots, id) {
                Some(mounted) => {
                    mounted
                        .state
                        .on_frame(frame, phase, scheduler, &mut mounted.component)
                }
                None => {
                    debug!(state = ?id, frame, %phase, "surface: skipping stale handle");
                    Ok(())
                }
            }
        });

        // An aborted frame drops its queues; carry the waiters over.
        if result.is_err() && !self.waiters.is_empty() {
            self.scheduler.schedule(MASK_CALCULATE, FRAME_WAITERS)?;
        }
        result
    }

    /// Fire frames while one is requested, at most `max_frames` of them.
    /// Returns how many fired.
    pub fn run_until_idle(&mut self, max_frames: u64) -> Result<u64> {
        let mut fired = 0;
        while fired < max_frames && self.frame_requested() {
            self.tick()?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Apply one runtime command. Returns `false` once shutdown was
    /// requested.
    pub fn apply(&mut self, event: RuntimeEvent<C>) -> Result<bool> {
        match event {
            RuntimeEvent::Invalidate { state, key } => self.invalidate(state, key)?,
            RuntimeEvent::InvalidateAll { state } => self.invalidate_all(state)?,
            RuntimeEvent::Pause { state } => self.pause(state),
            RuntimeEvent::Unpause { state } => self.unpause(state)?,
            RuntimeEvent::Update { state, key, update } => match self.component_mut(state) {
                Some(component) => {
                    update(component);
                    self.invalidate(state, key)?;
                }
                None => warn!(state = ?state, %key, "surface: update on stale handle"),
            },
            RuntimeEvent::WaitForFrame(reply) => self.add_waiter(reply)?,
            RuntimeEvent::Shutdown => return Ok(false),
        }
        Ok(true)
    }
}
