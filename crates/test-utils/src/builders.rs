#![allow(dead_code)]

use std::collections::BTreeMap;

use phaseframe::config::{
    ComponentConfig, DeferConfig, EventAction, EventConfig, RawSceneFile, SceneConfig,
    SchedulerSection, TaskConfig,
};
use phaseframe::types::{FrameNumber, Phase};

/// Builder for `SceneConfig` to simplify test setup.
pub struct SceneBuilder {
    scene: RawSceneFile,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self {
            scene: RawSceneFile {
                scheduler: SchedulerSection::default(),
                component: BTreeMap::new(),
                event: Vec::new(),
            },
        }
    }

    pub fn with_component(mut self, name: &str, component: ComponentConfig) -> Self {
        self.scene.component.insert(name.to_string(), component);
        self
    }

    pub fn with_trap(mut self, base: usize, per_callback: usize) -> Self {
        self.scene.scheduler.trap_enabled = true;
        self.scene.scheduler.trap_base = base;
        self.scene.scheduler.trap_per_callback = per_callback;
        self
    }

    pub fn without_trap(mut self) -> Self {
        self.scene.scheduler.trap_enabled = false;
        self
    }

    pub fn with_event(
        mut self,
        frame: FrameNumber,
        component: &str,
        action: EventAction,
        key: Option<&str>,
        value: Option<f64>,
    ) -> Self {
        self.scene.event.push(EventConfig {
            frame,
            component: component.to_string(),
            action,
            key: key.map(str::to_string),
            value,
        });
        self
    }

    pub fn set_at(self, frame: FrameNumber, component: &str, key: &str, value: f64) -> Self {
        self.with_event(frame, component, EventAction::Set, Some(key), Some(value))
    }

    pub fn invalidate_at(self, frame: FrameNumber, component: &str, key: &str) -> Self {
        self.with_event(frame, component, EventAction::Invalidate, Some(key), None)
    }

    /// The raw file, for validation tests.
    pub fn raw(self) -> RawSceneFile {
        self.scene
    }

    pub fn build(self) -> SceneConfig {
        SceneConfig::try_from(self.scene).expect("Failed to build valid scene from builder")
    }
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ComponentConfig`.
pub struct ComponentBuilder {
    component: ComponentConfig,
}

impl ComponentBuilder {
    pub fn new() -> Self {
        Self {
            component: ComponentConfig::default(),
        }
    }

    pub fn option(mut self, name: &str, value: f64) -> Self {
        self.component.options.insert(name.to_string(), value);
        self
    }

    pub fn task(mut self, task: TaskConfig) -> Self {
        self.component.tasks.push(task);
        self
    }

    pub fn build(self) -> ComponentConfig {
        self.component
    }
}

impl Default for ComponentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskBuilder {
    task: TaskConfig,
}

impl TaskBuilder {
    pub fn new(label: &str, phase: Phase) -> Self {
        Self {
            task: TaskConfig {
                label: Some(label.to_string()),
                phase,
                options: vec![],
                signals: vec![],
                invalidates: vec![],
                animate_frames: 0,
                defer: None,
                fail: false,
                debug: false,
            },
        }
    }

    pub fn calculate(label: &str) -> Self {
        Self::new(label, Phase::Calculate)
    }

    pub fn render(label: &str) -> Self {
        Self::new(label, Phase::Render)
    }

    pub fn option(mut self, name: &str) -> Self {
        self.task.options.push(name.to_string());
        self
    }

    pub fn signal(mut self, name: &str) -> Self {
        self.task.signals.push(name.to_string());
        self
    }

    pub fn invalidates(mut self, name: &str) -> Self {
        self.task.invalidates.push(name.to_string());
        self
    }

    pub fn animate(mut self, frames: u32) -> Self {
        self.task.animate_frames = frames;
        self
    }

    pub fn defer(mut self, frames: u32, phase: Phase) -> Self {
        self.task.defer = Some(DeferConfig { frames, phase });
        self
    }

    pub fn failing(mut self) -> Self {
        self.task.fail = true;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
