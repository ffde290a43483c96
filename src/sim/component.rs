// src/sim/component.rs

//! A scripted component whose tasks do nothing but record themselves.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use anyhow::bail;

use crate::config::{ComponentConfig, TaskConfig};
use crate::render::{DependencyKey, Options, Renderer, Task, TaskContext, TaskResult};
use crate::types::{FrameNumber, Phase};

/// What kind of run produced a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Task,
    Animation,
    Deferred,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraceKind::Task => "task",
            TraceKind::Animation => "animation",
            TraceKind::Deferred => "deferred",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub frame: FrameNumber,
    pub phase: Phase,
    pub component: String,
    pub label: String,
    pub kind: TraceKind,
    /// Option values the run saw, by name.
    pub values: Vec<(String, Option<f64>)>,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {:>3} {:<9} {}.{} ({})",
            self.frame, self.phase, self.component, self.label, self.kind
        )?;
        for (name, value) in &self.values {
            match value {
                Some(v) => write!(f, " {name}={v}")?,
                None => write!(f, " {name}=<unset>")?,
            }
        }
        Ok(())
    }
}

/// Execution log shared by every component of a scene.
#[derive(Debug, Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<TraceEntry>>>);

impl Trace {
    pub fn push(&self, entry: TraceEntry) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// `component.label` of every run in `frame`, in execution order.
    pub fn runs_in(&self, frame: FrameNumber) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|e| e.frame == frame)
            .map(|e| format!("{}.{}", e.component, e.label))
            .collect()
    }

    /// Entries recorded since `start`.
    pub fn since(&self, start: usize) -> Vec<TraceEntry> {
        self.0.borrow().iter().skip(start).cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct SimComponent {
    name: String,
    options: BTreeMap<String, f64>,
    trace: Trace,
}

impl SimComponent {
    pub fn new(name: impl Into<String>, options: BTreeMap<String, f64>, trace: Trace) -> Self {
        Self {
            name: name.into(),
            options,
            trace,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn set_option(&mut self, name: &str, value: f64) {
        self.options.insert(name.to_string(), value);
    }

    /// Dependency key for `name`: an option key if declared, else a signal.
    pub fn key_for(&self, name: &str) -> DependencyKey {
        if self.has_option(name) {
            DependencyKey::option(name)
        } else {
            DependencyKey::signal(name)
        }
    }
}

impl Options for SimComponent {
    type Value = f64;

    fn option(&self, name: &str) -> Option<f64> {
        self.options.get(name).copied()
    }
}

fn record(
    cx: &TaskContext<'_, SimComponent>,
    label: &str,
    kind: TraceKind,
    values: Vec<(String, Option<f64>)>,
) {
    cx.trace.push(TraceEntry {
        frame: cx.frame(),
        phase: cx.phase(),
        component: cx.name.clone(),
        label: label.to_string(),
        kind,
        values,
    });
}

/// Run behaviour of one configured task.
#[derive(Debug)]
struct Behaviour {
    label: String,
    options: Vec<String>,
    invalidates: Vec<String>,
    animate_frames: u32,
    defer: Option<(u32, Phase)>,
    fail: bool,
}

impl Behaviour {
    fn run(
        &self,
        cx: &mut TaskContext<'_, SimComponent>,
        values: &[Option<f64>],
    ) -> anyhow::Result<TaskResult<SimComponent>> {
        let named = self.options.iter().cloned().zip(values.iter().copied()).collect();
        record(cx, &self.label, TraceKind::Task, named);

        if self.fail {
            bail!("task '{}' is configured to fail", self.label);
        }

        for key in &self.invalidates {
            cx.invalidate(DependencyKey::option(key.as_str()));
        }

        if self.animate_frames > 0 {
            return Ok(animate(self.label.clone(), self.animate_frames));
        }

        if let Some((frames, phase)) = self.defer {
            let label = self.label.clone();
            return Ok(TaskResult::defer(frames, phase, move |cx: &mut TaskContext<'_, SimComponent>| {
                record(cx, &label, TraceKind::Deferred, Vec::new());
                Ok(TaskResult::Done)
            }));
        }

        Ok(TaskResult::Done)
    }
}

fn animate(label: String, remaining: u32) -> TaskResult<SimComponent> {
    TaskResult::next_frame(move |cx: &mut TaskContext<'_, SimComponent>| {
        record(cx, &label, TraceKind::Animation, Vec::new());
        if remaining > 1 {
            Ok(animate(label.clone(), remaining - 1))
        } else {
            Ok(TaskResult::Done)
        }
    })
}

pub fn build_task(index: usize, config: &TaskConfig) -> Task<SimComponent> {
    let label = config.label.clone().unwrap_or_else(|| format!("task{index}"));

    let dependencies: Vec<DependencyKey> = config
        .options
        .iter()
        .map(|name| DependencyKey::option(name.as_str()))
        .chain(config.signals.iter().map(|name| DependencyKey::signal(name.as_str())))
        .collect();

    let behaviour = Rc::new(Behaviour {
        label: label.clone(),
        options: config.options.clone(),
        invalidates: config.invalidates.clone(),
        animate_frames: config.animate_frames,
        defer: config.defer.map(|d| (d.frames, d.phase)),
        fail: config.fail,
    });

    Task::<SimComponent>::with_options(
        config.phase,
        dependencies,
        move |cx: &mut TaskContext<'_, SimComponent>, values: &[Option<f64>]| {
            behaviour.run(cx, values)
        },
    )
    .label(label)
    .debug(config.debug)
}

pub fn build_renderer(config: &ComponentConfig) -> Rc<Renderer<SimComponent>> {
    let mut renderer = Renderer::new();
    for (index, task) in config.tasks.iter().enumerate() {
        renderer.add_task(build_task(index, task));
    }
    Rc::new(renderer)
}
