#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use phaseframe::render::{DependencyKey, Options, Task, TaskContext, TaskResult};
use phaseframe::types::{FrameNumber, Phase};

/// One run observed by a [`Journal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub frame: FrameNumber,
    pub phase: Phase,
    pub label: String,
}

/// Shared run log. Clones append to the same list, so several components
/// can write into one journal and the test keeps a handle to read it.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Record>>>);

impl Journal {
    pub fn push(&self, frame: FrameNumber, phase: Phase, label: &str) {
        self.0.borrow_mut().push(Record {
            frame,
            phase,
            label: label.to_string(),
        });
    }

    pub fn records(&self) -> Vec<Record> {
        self.0.borrow().clone()
    }

    /// Labels in run order.
    pub fn labels(&self) -> Vec<String> {
        self.0.borrow().iter().map(|r| r.label.clone()).collect()
    }

    /// Labels that ran in `frame`, in run order.
    pub fn labels_in(&self, frame: FrameNumber) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|r| r.frame == frame)
            .map(|r| r.label.clone())
            .collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.0.borrow().iter().filter(|r| r.label == label).count()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Minimal component for driving renderers in tests.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub options: BTreeMap<String, f64>,
    pub journal: Journal,
}

impl Recorder {
    pub fn new(journal: &Journal) -> Self {
        Self {
            options: BTreeMap::new(),
            journal: journal.clone(),
        }
    }

    pub fn with_option(mut self, name: &str, value: f64) -> Self {
        self.options.insert(name.to_string(), value);
        self
    }

    /// Append a run to the journal from inside a task.
    pub fn record(cx: &TaskContext<'_, Recorder>, label: &str) {
        cx.journal.push(cx.frame(), cx.phase(), label);
    }
}

impl Options for Recorder {
    type Value = f64;

    fn option(&self, name: &str) -> Option<f64> {
        self.options.get(name).copied()
    }
}

/// A task that journals `label` and finishes.
pub fn recording_task<K>(
    label: &'static str,
    phase: Phase,
    dependencies: impl IntoIterator<Item = K>,
) -> Task<Recorder>
where
    K: Into<DependencyKey>,
{
    Task::new(phase, dependencies, move |cx: &mut TaskContext<'_, Recorder>| {
        Recorder::record(cx, label);
        Ok(TaskResult::Done)
    })
    .label(label)
}

/// A task that journals `label` and then fails.
pub fn failing_task<K>(
    label: &'static str,
    phase: Phase,
    dependencies: impl IntoIterator<Item = K>,
) -> Task<Recorder>
where
    K: Into<DependencyKey>,
{
    Task::new(phase, dependencies, move |cx: &mut TaskContext<'_, Recorder>| {
        Recorder::record(cx, label);
        anyhow::bail!("{label} failed")
    })
    .label(label)
}
