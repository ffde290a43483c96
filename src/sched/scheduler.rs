// src/sched/scheduler.rs

//! Frame coordinator shared by every render state of one surface.
//!
//! Queues are indexed by `phase + frame_offset * FRAME_SHIFT`. Slots 0 and 1
//! hold work for the frame about to fire (or currently firing); higher slots
//! hold work for later frames and move down by one frame slot every time a
//! frame completes.
//!
//! The scheduler never calls into the host itself. Any number of
//! [`Scheduler::schedule`] calls collapse into a single pending frame
//! request, observable through [`Scheduler::frame_requested`]; the owner
//! answers it by calling [`Scheduler::fire`].

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::time::Instant;

use tracing::{debug, error, trace, warn};

use crate::errors::{PhaseframeError, Result};
use crate::types::{FrameNumber, Phase, FRAME_SHIFT, MAX_FRAME_OFFSET, PHASE_MASK};

/// Tunables of the recursion trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub trap_enabled: bool,
    /// Callbacks a frame may always run before the trap is armed.
    pub trap_base: usize,
    /// Extra callbacks allowed per entry queued when the frame started.
    pub trap_per_callback: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trap_enabled: true,
            trap_base: 100,
            trap_per_callback: 10,
        }
    }
}

/// Read-only snapshot for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub scheduled: bool,
    pub running: bool,
    pub phase: Option<Phase>,
    pub frame: FrameNumber,
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self.phase.map_or("NONE", Phase::name);
        write!(
            f,
            "frame={} phase={} scheduled={} running={}",
            self.frame, phase, self.scheduled, self.running
        )
    }
}

/// Summary of one fired frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: FrameNumber,
    pub callbacks: usize,
    pub failures: usize,
}

#[derive(Debug)]
pub struct Scheduler<K> {
    queues: Vec<Vec<K>>,
    scheduled: bool,
    running: bool,
    phase: Option<Phase>,
    frame: FrameNumber,
    trap: Option<HashSet<(K, Phase)>>,
    now: Option<Instant>,
    frame_requests: u64,
    config: SchedulerConfig,
}

impl<K> Default for Scheduler<K>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl<K> Scheduler<K>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            queues: Vec::new(),
            scheduled: false,
            running: false,
            phase: None,
            frame: 0,
            trap: None,
            now: None,
            frame_requests: 0,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Frame that is firing, or the next one to fire when idle.
    pub fn frame(&self) -> FrameNumber {
        self.frame
    }

    /// Whether a frame has been requested and not fired yet.
    pub fn frame_requested(&self) -> bool {
        self.scheduled
    }

    /// Total number of frame requests issued so far.
    pub fn frame_requests(&self) -> u64 {
        self.frame_requests
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frame start time while firing, the current time otherwise.
    pub fn now(&self) -> Instant {
        match (self.running, self.now) {
            (true, Some(now)) => now,
            _ => Instant::now(),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            scheduled: self.scheduled,
            running: self.running,
            phase: self.phase,
            frame: self.frame,
        }
    }

    /// Entries waiting in the queue of `(frame_offset, phase)`.
    pub fn queue_len(&self, frame_offset: u32, phase: Phase) -> usize {
        let index = queue_index(frame_offset, phase);
        self.queues.get(index).map_or(0, Vec::len)
    }

    /// Whether any queue holds work.
    pub fn has_pending(&self) -> bool {
        self.queues.iter().any(|q| !q.is_empty())
    }

    /// Queue `key` once for every bit of `mask` and return the current frame.
    ///
    /// Bit `phase + offset * FRAME_SHIFT` targets `phase` of the frame
    /// `offset` frames after the current one.
    pub fn schedule(&mut self, mask: u32, key: K) -> Result<FrameNumber> {
        if mask == 0 {
            return Ok(self.frame);
        }

        if mask & PHASE_MASK != 0 {
            self.check_trap(mask & PHASE_MASK, key)?;
        }

        let mut rest = mask;
        let mut frame_offset = 0u32;
        while rest != 0 {
            for phase in Phase::ALL {
                if rest & phase.mask() == 0 {
                    continue;
                }
                let index = queue_index(frame_offset, phase);
                if index >= self.queues.len() {
                    // Keep whole frame slots so rotation stays aligned.
                    let len = (index / 2 + 1) * 2;
                    self.queues.resize_with(len, Vec::new);
                }
                self.queues[index].push(key);
            }
            rest >>= FRAME_SHIFT;
            frame_offset += 1;
        }

        let future = mask >> FRAME_SHIFT != 0;
        if !self.running || future {
            self.request_frame();
        }

        trace!(callback = ?key, mask, frame = self.frame, "scheduler: queued");
        Ok(self.frame)
    }

    /// Like [`Scheduler::schedule`], one frame later.
    pub fn schedule_next(&mut self, mask: u32, key: K) -> Result<FrameNumber> {
        if mask.leading_zeros() < FRAME_SHIFT {
            return Err(PhaseframeError::FrameOffsetOverflow(MAX_FRAME_OFFSET + 1));
        }
        self.schedule(mask << FRAME_SHIFT, key)
    }

    /// Fire one frame.
    ///
    /// `dispatch` is called once per queue entry with the scheduler itself,
    /// so callbacks can schedule more work. CALCULATE is drained, then
    /// RENDER, and the pair repeats while CALCULATE received new entries.
    ///
    /// Non-fatal dispatch errors are logged and counted. A fatal one drops
    /// the rest of the frame's work and is returned after the frame counter
    /// has advanced.
    pub fn fire<F>(&mut self, mut dispatch: F) -> Result<FrameStats>
    where
        F: FnMut(&mut Self, K, FrameNumber, Phase) -> Result<()>,
    {
        self.scheduled = false;
        self.running = true;
        self.phase = None;
        self.now = Some(Instant::now());

        let frame = self.frame;
        let result = self.run_frame(frame, &mut dispatch);

        if result.is_err() {
            for queue in self.queues.iter_mut().take(FRAME_SHIFT as usize) {
                queue.clear();
            }
        }

        self.running = false;
        self.phase = None;
        self.trap = None;
        self.frame = frame + 1;
        self.rotate();

        if self.has_pending() {
            self.request_frame();
        }

        match &result {
            Ok(stats) => debug!(
                frame,
                callbacks = stats.callbacks,
                failures = stats.failures,
                "scheduler: frame done"
            ),
            Err(err) => error!(frame, error = %err, "scheduler: frame aborted"),
        }

        result
    }

    fn run_frame<F>(&mut self, frame: FrameNumber, dispatch: &mut F) -> Result<FrameStats>
    where
        F: FnMut(&mut Self, K, FrameNumber, Phase) -> Result<()>,
    {
        let threshold = self.config.trap_base
            + self.config.trap_per_callback
                * (self.queue_len(0, Phase::Calculate) + self.queue_len(0, Phase::Render));

        let mut stats = FrameStats {
            frame,
            ..FrameStats::default()
        };

        loop {
            for phase in Phase::ALL {
                let index = queue_index(0, phase);
                if self.queues.get(index).is_none_or(Vec::is_empty) {
                    continue;
                }

                self.phase = Some(phase);

                // Entries appended while draining run in this pass too.
                let mut i = 0;
                while let Some(&key) = self.queues.get(index).and_then(|q| q.get(i)) {
                    i += 1;

                    match dispatch(self, key, frame, phase) {
                        Ok(()) => {}
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => {
                            stats.failures += 1;
                            error!(
                                callback = ?key,
                                status = %self.status(),
                                error = %err,
                                "scheduler: callback failed"
                            );
                        }
                    }

                    stats.callbacks += 1;
                    if self.config.trap_enabled && stats.callbacks == threshold {
                        warn!(frame, callbacks = stats.callbacks, "scheduler: arming recursion trap");
                        self.trap = Some(HashSet::new());
                    }
                }

                if let Some(queue) = self.queues.get_mut(index) {
                    queue.clear();
                }
            }

            if self.queue_len(0, Phase::Calculate) == 0 {
                break;
            }
        }

        Ok(stats)
    }

    fn check_trap(&mut self, current: u32, key: K) -> Result<()> {
        let frame = self.frame;
        let Some(trap) = self.trap.as_mut() else {
            return Ok(());
        };

        for phase in Phase::ALL {
            if current & phase.mask() != 0 && !trap.insert((key, phase)) {
                return Err(PhaseframeError::RecursiveSchedule {
                    callback: format!("{key:?}"),
                    frame,
                    phase,
                });
            }
        }
        Ok(())
    }

    fn rotate(&mut self) {
        let slot = FRAME_SHIFT as usize;
        if self.queues.len() > slot {
            self.queues.rotate_left(slot);
        }
    }

    fn request_frame(&mut self) {
        if self.scheduled {
            return;
        }
        self.scheduled = true;
        self.frame_requests += 1;
        trace!(frame = self.frame, "scheduler: frame requested");
    }
}

fn queue_index(frame_offset: u32, phase: Phase) -> usize {
    (phase.index() + frame_offset * FRAME_SHIFT) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MASK_CALCULATE, MASK_RENDER};

    type Calls = Vec<(u32, FrameNumber, Phase)>;

    fn record(calls: &mut Calls) -> impl FnMut(&mut Scheduler<u32>, u32, FrameNumber, Phase) -> Result<()> + '_ {
        move |_, key, frame, phase| {
            calls.push((key, frame, phase));
            Ok(())
        }
    }

    #[test]
    fn many_schedules_request_one_frame() {
        let mut scheduler = Scheduler::<u32>::default();
        for key in 0..10 {
            scheduler.schedule(MASK_RENDER, key).expect("schedule");
        }
        assert!(scheduler.frame_requested());
        assert_eq!(scheduler.frame_requests(), 1);
        assert_eq!(scheduler.queue_len(0, Phase::Render), 10);

        let mut calls = Calls::new();
        let stats = scheduler.fire(record(&mut calls)).expect("fire");
        assert_eq!(stats.callbacks, 10);
        assert_eq!(scheduler.frame(), 1);
        assert!(!scheduler.frame_requested());
    }

    #[test]
    fn calculate_runs_before_render() {
        let mut scheduler = Scheduler::<u32>::default();
        scheduler.schedule(MASK_RENDER, 1).expect("schedule");
        scheduler.schedule(MASK_CALCULATE, 2).expect("schedule");

        let mut calls = Calls::new();
        scheduler.fire(record(&mut calls)).expect("fire");
        assert_eq!(calls, vec![(2, 0, Phase::Calculate), (1, 0, Phase::Render)]);
    }

    #[test]
    fn render_callbacks_can_queue_more_calculation() {
        let mut scheduler = Scheduler::<u32>::default();
        scheduler.schedule(MASK_RENDER, 1).expect("schedule");

        let mut calls = Calls::new();
        scheduler
            .fire(|s, key, frame, phase| {
                calls.push((key, frame, phase));
                if key == 1 {
                    s.schedule(MASK_CALCULATE | MASK_RENDER, 2)?;
                }
                Ok(())
            })
            .expect("fire");

        assert_eq!(
            calls,
            vec![
                (1, 0, Phase::Render),
                (2, 0, Phase::Render),
                (2, 0, Phase::Calculate),
            ]
        );
        assert!(!scheduler.frame_requested());
    }

    #[test]
    fn future_work_rotates_into_place() {
        let mut scheduler = Scheduler::<u32>::default();
        scheduler.schedule(MASK_RENDER << (2 * FRAME_SHIFT), 7).expect("schedule");
        assert_eq!(scheduler.queue_len(2, Phase::Render), 1);

        let mut calls = Calls::new();
        scheduler.fire(record(&mut calls)).expect("frame 0");
        assert!(calls.is_empty());
        assert!(scheduler.frame_requested(), "pending work keeps frames coming");

        scheduler.fire(record(&mut calls)).expect("frame 1");
        assert!(calls.is_empty());
        scheduler.fire(record(&mut calls)).expect("frame 2");
        assert_eq!(calls, vec![(7, 2, Phase::Render)]);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn schedule_next_targets_following_frame() {
        let mut scheduler = Scheduler::<u32>::default();
        scheduler.schedule_next(MASK_CALCULATE, 3).expect("schedule");
        assert_eq!(scheduler.queue_len(1, Phase::Calculate), 1);
        assert!(scheduler.schedule_next(1 << 31, 3).is_err());
    }

    #[test]
    fn failing_callback_does_not_stop_the_queue() {
        let mut scheduler = Scheduler::<u32>::default();
        for key in 0..3 {
            scheduler.schedule(MASK_RENDER, key).expect("schedule");
        }

        let mut seen = Vec::new();
        let stats = scheduler
            .fire(|_, key, _, _| {
                seen.push(key);
                if key == 1 {
                    return Err(PhaseframeError::ConfigError("broken".into()));
                }
                Ok(())
            })
            .expect("non-fatal errors are absorbed");

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn self_rescheduling_trips_the_trap() {
        let mut scheduler = Scheduler::<u32>::new(SchedulerConfig {
            trap_enabled: true,
            trap_base: 5,
            trap_per_callback: 1,
        });
        scheduler.schedule(MASK_CALCULATE, 9).expect("schedule");

        let mut runs = 0;
        let result = scheduler.fire(|s, key, _, _| {
            runs += 1;
            s.schedule(MASK_CALCULATE, key).map(|_| ())
        });

        match result {
            Err(PhaseframeError::RecursiveSchedule { frame, phase, .. }) => {
                assert_eq!(frame, 0);
                assert_eq!(phase, Phase::Calculate);
            }
            other => panic!("expected RecursiveSchedule, got {other:?}"),
        }
        // threshold 6: armed after the sixth run, the seventh inserts, the
        // eighth trips.
        assert_eq!(runs, 8);
        assert_eq!(scheduler.frame(), 1);
        assert!(!scheduler.has_pending());
        assert!(!scheduler.is_running());
    }

    #[test]
    fn status_reports_phase_while_running() {
        let mut scheduler = Scheduler::<u32>::default();
        scheduler.schedule(MASK_RENDER, 0).expect("schedule");
        let mut seen = None;
        scheduler
            .fire(|s, _, _, _| {
                seen = Some(s.status());
                Ok(())
            })
            .expect("fire");

        let status = seen.expect("callback ran");
        assert!(status.running);
        assert_eq!(status.phase, Some(Phase::Render));
        assert_eq!(status.to_string(), "frame=0 phase=RENDER scheduled=false running=true");
        assert_eq!(scheduler.status().phase, None);
    }
}
