// src/sim/scene.rs

use std::collections::BTreeMap;

use tracing::{debug, error, info};

use crate::config::{EventAction, EventConfig, SceneConfig};
use crate::engine::{RuntimeEvent, Surface};
use crate::errors::{PhaseframeError, Result};
use crate::render::DependencyKey;
use crate::sched::FrameStats;
use crate::sim::component::{build_renderer, SimComponent, Trace};
use crate::types::{FrameNumber, StateId};

/// A loaded scene: one surface with every configured component mounted, and
/// the scripted events still to apply.
#[derive(Debug)]
pub struct Scene {
    surface: Surface<SimComponent>,
    ids: BTreeMap<String, StateId>,
    /// Remaining events, ordered by frame.
    events: Vec<EventConfig>,
    trace: Trace,
}

impl Scene {
    pub fn from_config(config: &SceneConfig) -> Result<Self> {
        let mut surface = Surface::new(config.scheduler.scheduler_config());
        let trace = Trace::default();
        let mut ids = BTreeMap::new();

        for (name, component) in config.component.iter() {
            let renderer = build_renderer(component);
            let sim = SimComponent::new(name.as_str(), component.options.clone(), trace.clone());
            let id = surface.mount(renderer, sim)?;
            debug!(component = %name, state = ?id, tasks = component.tasks.len(), "scene: mounted");
            ids.insert(name.clone(), id);
        }

        let events = config.events_by_frame().into_iter().cloned().collect();

        info!(components = ids.len(), "scene loaded");
        Ok(Self {
            surface,
            ids,
            events,
            trace,
        })
    }

    pub fn surface(&self) -> &Surface<SimComponent> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface<SimComponent> {
        &mut self.surface
    }

    pub fn id(&self, component: &str) -> Option<StateId> {
        self.ids.get(component).copied()
    }

    pub fn ids(&self) -> &BTreeMap<String, StateId> {
        &self.ids
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn frame(&self) -> FrameNumber {
        self.surface.frame()
    }

    /// Scripted events not applied yet, ordered by frame.
    pub fn pending_events(&self) -> &[EventConfig] {
        &self.events
    }

    /// Translate a scripted event into a runtime command.
    pub fn runtime_event(&self, event: &EventConfig) -> Result<RuntimeEvent<SimComponent>> {
        let state = self.id(&event.component).ok_or_else(|| {
            PhaseframeError::ConfigError(format!("unknown component '{}'", event.component))
        })?;

        let key = event.key.clone().unwrap_or_default();

        let command = match event.action {
            EventAction::Set => {
                let value = event.value.ok_or_else(|| {
                    PhaseframeError::ConfigError("`set` event without a value".to_string())
                })?;
                let name = key.clone();
                RuntimeEvent::Update {
                    state,
                    key: DependencyKey::option(key),
                    update: Box::new(move |component: &mut SimComponent| {
                        component.set_option(&name, value)
                    }),
                }
            }
            EventAction::Invalidate => {
                let key = match self.surface.component(state) {
                    Some(component) => component.key_for(&key),
                    None => DependencyKey::signal(key),
                };
                RuntimeEvent::Invalidate { state, key }
            }
            EventAction::InvalidateAll => RuntimeEvent::InvalidateAll { state },
            EventAction::Pause => RuntimeEvent::Pause { state },
            EventAction::Unpause => RuntimeEvent::Unpause { state },
        };
        Ok(command)
    }

    pub fn apply_event(&mut self, event: &EventConfig) -> Result<()> {
        let command = self.runtime_event(event)?;
        debug!(frame = self.frame(), ?command, "scene: applying event");
        self.surface.apply(command)?;
        Ok(())
    }

    /// Apply the events due at the current frame, then fire it.
    pub fn step(&mut self) -> Result<FrameStats> {
        let frame = self.frame();
        let due = self.events.iter().take_while(|e| e.frame <= frame).count();
        let events: Vec<EventConfig> = self.events.drain(..due).collect();
        for event in &events {
            self.apply_event(event)?;
        }
        self.surface.tick()
    }

    /// Step `frames` times. A frame aborted by a fatal scheduler error is
    /// logged and the scene keeps going.
    pub fn run_frames(&mut self, frames: u64) -> Result<Vec<FrameStats>> {
        let mut stats = Vec::new();
        for _ in 0..frames {
            match self.step() {
                Ok(frame) => stats.push(frame),
                Err(err) if err.is_fatal() => {
                    error!(error = %err, "scene: frame aborted");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(stats)
    }

    /// Split into the surface, the remaining scripted events and the trace.
    pub fn into_parts(self) -> (Surface<SimComponent>, Vec<EventConfig>, Trace) {
        (self.surface, self.events, self.trace)
    }
}
