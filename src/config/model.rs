// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::sched::SchedulerConfig;
use crate::types::{FrameNumber, Phase};

/// Scene file as read from TOML, before validation.
///
/// ```toml
/// [scheduler]
/// frame_interval_ms = 16
///
/// [component.meter]
/// options = { value = 0.0, gain = 1.0 }
///
/// [[component.meter.task]]
/// label = "clamp"
/// phase = "calculate"
/// options = ["value"]
/// invalidates = ["display"]
///
/// [[event]]
/// frame = 3
/// component = "meter"
/// action = "set"
/// key = "value"
/// value = 0.5
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSceneFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Components from `[component.<name>]`, keyed by name.
    #[serde(default)]
    pub component: BTreeMap<String, ComponentConfig>,

    /// Scripted changes from `[[event]]`.
    #[serde(default)]
    pub event: Vec<EventConfig>,
}

/// A scene that passed validation. Built through `TryFrom<RawSceneFile>`.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub scheduler: SchedulerSection,
    pub component: BTreeMap<String, ComponentConfig>,
    pub event: Vec<EventConfig>,
}

impl SceneConfig {
    pub(crate) fn new_unchecked(raw: RawSceneFile) -> Self {
        Self {
            scheduler: raw.scheduler,
            component: raw.component,
            event: raw.event,
        }
    }

    /// Events ordered by frame, file order kept within a frame.
    pub fn events_by_frame(&self) -> Vec<&EventConfig> {
        let mut events: Vec<&EventConfig> = self.event.iter().collect();
        events.sort_by_key(|e| e.frame);
        events
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Frame pacing used by `--realtime`.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_trap_enabled")]
    pub trap_enabled: bool,

    #[serde(default = "default_trap_base")]
    pub trap_base: usize,

    #[serde(default = "default_trap_per_callback")]
    pub trap_per_callback: usize,
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_trap_enabled() -> bool {
    true
}

fn default_trap_base() -> usize {
    100
}

fn default_trap_per_callback() -> usize {
    10
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            trap_enabled: default_trap_enabled(),
            trap_base: default_trap_base(),
            trap_per_callback: default_trap_per_callback(),
        }
    }
}

impl SchedulerSection {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            trap_enabled: self.trap_enabled,
            trap_base: self.trap_base,
            trap_per_callback: self.trap_per_callback,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// `[component.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ComponentConfig {
    /// Declared options and their initial values.
    #[serde(default)]
    pub options: BTreeMap<String, f64>,

    /// Tasks from `[[component.<name>.task]]`, in declaration order.
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

impl ComponentConfig {
    /// Whether some task of this component listens to `signal`.
    pub fn has_signal(&self, signal: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.signals.iter().any(|s| s == signal))
    }
}

/// `[[component.<name>.task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Name used in the trace; defaults to `task<index>`.
    #[serde(default)]
    pub label: Option<String>,

    pub phase: Phase,

    /// Option dependencies. Their current values are recorded in the trace.
    #[serde(default)]
    pub options: Vec<String>,

    /// Signal dependencies.
    #[serde(default)]
    pub signals: Vec<String>,

    /// Option keys invalidated every time the task runs.
    #[serde(default)]
    pub invalidates: Vec<String>,

    /// Animation steps after the task. The first runs in the task's pass,
    /// each later one a frame after the previous.
    #[serde(default)]
    pub animate_frames: u32,

    /// Hand over to a continuation at a later frame and/or other phase.
    #[serde(default)]
    pub defer: Option<DeferConfig>,

    /// The run function always fails.
    #[serde(default)]
    pub fail: bool,

    /// Log every run of this task at debug level.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DeferConfig {
    #[serde(default)]
    pub frames: u32,
    pub phase: Phase,
}

/// `[[event]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// Applied just before this frame fires.
    pub frame: FrameNumber,
    pub component: String,
    pub action: EventAction,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Write `value` into option `key`, then invalidate it.
    Set,
    /// Invalidate `key` (an option or a signal) without changing anything.
    Invalidate,
    InvalidateAll,
    Pause,
    Unpause,
}
