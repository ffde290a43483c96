// src/render/task.rs

//! Task declarations and the task result protocol.
//!
//! A [`Task`] is declared once per component class: a phase, the dependency
//! keys it reads, and a run function. Run functions report what should
//! happen next through [`TaskResult`]:
//!
//! - [`TaskResult::Done`]: nothing further.
//! - [`TaskResult::NextFrame`]: from a task, run the continuation right
//!   after the task walk of the current pass; from a continuation, run it
//!   again in the same phase of the following frame.
//! - [`TaskResult::Defer`]: run the continuation `frame_offset` frames from
//!   now in the given phase.

use std::fmt;
use std::rc::Rc;

use crate::errors::{PhaseframeError, Result};
use crate::render::context::TaskContext;
use crate::types::{phase_bit, Phase};

/// Return type of task and continuation run functions.
pub type RunResult<C> = anyhow::Result<TaskResult<C>>;

/// A continuation produced by a task or a previous continuation.
pub type Continuation<C> = Box<dyn FnMut(&mut TaskContext<'_, C>) -> RunResult<C>>;

type RunFn<C> = Rc<dyn Fn(&mut TaskContext<'_, C>) -> RunResult<C>>;

/// Something a task can depend on.
///
/// Option keys name a field of the component and are resolved into run
/// function arguments by [`Task::with_options`]. Signals are opaque triggers
/// (a resize, a child being added) that carry no value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKey {
    Option(String),
    Signal(String),
}

impl DependencyKey {
    pub fn option(name: impl Into<String>) -> Self {
        DependencyKey::Option(name.into())
    }

    pub fn signal(name: impl Into<String>) -> Self {
        DependencyKey::Signal(name.into())
    }

    /// The option name, if this is an option key.
    pub fn as_option(&self) -> Option<&str> {
        match self {
            DependencyKey::Option(name) => Some(name),
            DependencyKey::Signal(_) => None,
        }
    }
}

impl From<&str> for DependencyKey {
    fn from(name: &str) -> Self {
        DependencyKey::Option(name.to_string())
    }
}

impl From<String> for DependencyKey {
    fn from(name: String) -> Self {
        DependencyKey::Option(name)
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKey::Option(name) => write!(f, "option:{name}"),
            DependencyKey::Signal(name) => write!(f, "signal:{name}"),
        }
    }
}

/// Read access to a component's current option values.
pub trait Options {
    type Value;

    fn option(&self, name: &str) -> Option<Self::Value>;
}

/// Work deferred to a given frame offset and phase.
pub struct Defer<C> {
    pub frame_offset: u32,
    pub phase: Phase,
    pub run: Continuation<C>,
}

impl<C> Defer<C> {
    pub fn new(
        frame_offset: u32,
        phase: Phase,
        run: impl FnMut(&mut TaskContext<'_, C>) -> RunResult<C> + 'static,
    ) -> Self {
        Self {
            frame_offset,
            phase,
            run: Box::new(run),
        }
    }

    /// `(frame_offset, phase)` pair; only defers of the same class combine.
    pub fn class(&self) -> (u32, Phase) {
        (self.frame_offset, self.phase)
    }

    /// Schedule mask bit for this defer, `None` if the offset is too large.
    pub fn mask_bit(&self) -> Option<u32> {
        phase_bit(self.frame_offset, self.phase)
    }
}

impl<C> fmt::Debug for Defer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defer")
            .field("frame_offset", &self.frame_offset)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Outcome of running a task or a continuation.
pub enum TaskResult<C> {
    Done,
    NextFrame(Continuation<C>),
    Defer(Defer<C>),
}

impl<C> TaskResult<C> {
    pub fn next_frame(run: impl FnMut(&mut TaskContext<'_, C>) -> RunResult<C> + 'static) -> Self {
        TaskResult::NextFrame(Box::new(run))
    }

    pub fn defer(
        frame_offset: u32,
        phase: Phase,
        run: impl FnMut(&mut TaskContext<'_, C>) -> RunResult<C> + 'static,
    ) -> Self {
        TaskResult::Defer(Defer::new(frame_offset, phase, run))
    }

    /// RENDER phase of the current frame.
    pub fn render(run: impl FnMut(&mut TaskContext<'_, C>) -> RunResult<C> + 'static) -> Self {
        Self::defer(0, Phase::Render, run)
    }

    /// CALCULATE phase of the current frame.
    pub fn measure(run: impl FnMut(&mut TaskContext<'_, C>) -> RunResult<C> + 'static) -> Self {
        Self::defer(0, Phase::Calculate, run)
    }

    pub fn render_next(run: impl FnMut(&mut TaskContext<'_, C>) -> RunResult<C> + 'static) -> Self {
        Self::defer(1, Phase::Render, run)
    }

    pub fn measure_next(run: impl FnMut(&mut TaskContext<'_, C>) -> RunResult<C> + 'static) -> Self {
        Self::defer(1, Phase::Calculate, run)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskResult::Done)
    }
}

impl<C> fmt::Debug for TaskResult<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskResult::Done => f.write_str("Done"),
            TaskResult::NextFrame(_) => f.write_str("NextFrame(..)"),
            TaskResult::Defer(defer) => f.debug_tuple("Defer").field(defer).finish(),
        }
    }
}

/// Merge several deferred results into one.
///
/// Only [`TaskResult::Defer`] entries take part; everything else is ignored.
/// No defers yields [`TaskResult::Done`], a single defer is returned as is.
/// Several defers must share `(frame_offset, phase)`; the merged continuation
/// runs every part and combines their results again.
pub fn combine_defer<C: 'static>(
    results: impl IntoIterator<Item = TaskResult<C>>,
) -> Result<TaskResult<C>> {
    let mut defers: Vec<Defer<C>> = results
        .into_iter()
        .filter_map(|result| match result {
            TaskResult::Defer(defer) => Some(defer),
            TaskResult::Done | TaskResult::NextFrame(_) => None,
        })
        .collect();

    if defers.len() <= 1 {
        return Ok(defers.pop().map_or(TaskResult::Done, TaskResult::Defer));
    }

    let class = defers[0].class();
    if let Some(other) = defers.iter().map(Defer::class).find(|c| *c != class) {
        return Err(PhaseframeError::IncompatibleDefer {
            first: class,
            other,
        });
    }

    let mut parts: Vec<Continuation<C>> = defers.into_iter().map(|d| d.run).collect();
    let (frame_offset, phase) = class;

    Ok(TaskResult::defer(frame_offset, phase, move |cx| {
        let mut results = Vec::with_capacity(parts.len());
        for part in parts.iter_mut() {
            results.push(part(cx)?);
        }
        Ok(combine_defer(results)?)
    }))
}

/// An immutable task declaration shared by all render states of a class.
pub struct Task<C> {
    phase: Phase,
    dependencies: Vec<DependencyKey>,
    run: RunFn<C>,
    debug: bool,
    label: Option<String>,
}

impl<C> Clone for Task<C> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase,
            dependencies: self.dependencies.clone(),
            run: Rc::clone(&self.run),
            debug: self.debug,
            label: self.label.clone(),
        }
    }
}

impl<C> fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.label)
            .field("phase", &self.phase)
            .field("dependencies", &self.dependencies)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl<C> Task<C> {
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dependencies(&self) -> &[DependencyKey] {
        &self.dependencies
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn label_str(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn call(&self, cx: &mut TaskContext<'_, C>) -> RunResult<C> {
        (self.run)(cx)
    }
}

impl<C: 'static> Task<C> {
    /// Declare a task whose run function gets the context only.
    pub fn new<K>(
        phase: Phase,
        dependencies: impl IntoIterator<Item = K>,
        run: impl Fn(&mut TaskContext<'_, C>) -> RunResult<C> + 'static,
    ) -> Self
    where
        K: Into<DependencyKey>,
    {
        Self {
            phase,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            run: Rc::new(run),
            debug: false,
            label: None,
        }
    }

    /// Declare a task whose run function also receives the current values of
    /// its option dependencies, in declaration order. Signals are skipped.
    pub fn with_options<K>(
        phase: Phase,
        dependencies: impl IntoIterator<Item = K>,
        run: impl Fn(&mut TaskContext<'_, C>, &[Option<C::Value>]) -> RunResult<C> + 'static,
    ) -> Self
    where
        K: Into<DependencyKey>,
        C: Options,
    {
        let dependencies: Vec<DependencyKey> = dependencies.into_iter().map(Into::into).collect();
        let names: Vec<String> = dependencies
            .iter()
            .filter_map(|key| key.as_option().map(str::to_string))
            .collect();

        let resolved = move |cx: &mut TaskContext<'_, C>| {
            let values: Vec<Option<C::Value>> = names
                .iter()
                .map(|name| cx.component().option(name))
                .collect();
            run(cx, &values)
        };

        Self {
            phase,
            dependencies,
            run: Rc::new(resolved),
            debug: false,
            label: None,
        }
    }
}

pub fn define_render<C, K>(
    dependencies: impl IntoIterator<Item = K>,
    run: impl Fn(&mut TaskContext<'_, C>, &[Option<C::Value>]) -> RunResult<C> + 'static,
) -> Task<C>
where
    C: Options + 'static,
    K: Into<DependencyKey>,
{
    Task::with_options(Phase::Render, dependencies, run)
}

pub fn define_recalculation<C, K>(
    dependencies: impl IntoIterator<Item = K>,
    run: impl Fn(&mut TaskContext<'_, C>, &[Option<C::Value>]) -> RunResult<C> + 'static,
) -> Task<C>
where
    C: Options + 'static,
    K: Into<DependencyKey>,
{
    Task::with_options(Phase::Calculate, dependencies, run)
}

/// Alias of [`define_recalculation`] for tasks that read layout.
pub fn define_measure<C, K>(
    dependencies: impl IntoIterator<Item = K>,
    run: impl Fn(&mut TaskContext<'_, C>, &[Option<C::Value>]) -> RunResult<C> + 'static,
) -> Task<C>
where
    C: Options + 'static,
    K: Into<DependencyKey>,
{
    define_recalculation(dependencies, run)
}

/// A task whose first step runs in `phase` and which typically hands over
/// to the other phase through [`TaskResult::Defer`].
pub fn define_multi_phase<C, K>(
    phase: Phase,
    dependencies: impl IntoIterator<Item = K>,
    run: impl Fn(&mut TaskContext<'_, C>, &[Option<C::Value>]) -> RunResult<C> + 'static,
) -> Task<C>
where
    C: Options + 'static,
    K: Into<DependencyKey>,
{
    Task::with_options(phase, dependencies, run)
}
