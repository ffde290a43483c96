#![allow(dead_code)]

use std::rc::Rc;

use phaseframe::engine::Surface;
use phaseframe::render::{Renderer, Task};
use phaseframe::sched::SchedulerConfig;
use phaseframe::types::StateId;
use phaseframe_test_utils::recorder::{Journal, Recorder};

/// A surface with a single mounted recorder. The initial full pass has not
/// fired yet.
pub fn mounted(tasks: Vec<Task<Recorder>>) -> (Surface<Recorder>, StateId, Journal) {
    mounted_with(SchedulerConfig::default(), tasks)
}

pub fn mounted_with(
    config: SchedulerConfig,
    tasks: Vec<Task<Recorder>>,
) -> (Surface<Recorder>, StateId, Journal) {
    phaseframe_test_utils::init_tracing();

    let journal = Journal::default();
    let mut surface = Surface::new(config);
    let id = surface
        .mount(renderer(tasks), Recorder::new(&journal))
        .expect("mount");
    (surface, id, journal)
}

pub fn renderer(tasks: Vec<Task<Recorder>>) -> Rc<Renderer<Recorder>> {
    let mut renderer = Renderer::new();
    for task in tasks {
        renderer.add_task(task);
    }
    Rc::new(renderer)
}

/// Fire the initial pass and forget what it ran.
pub fn settle(surface: &mut Surface<Recorder>, journal: &Journal) {
    surface.tick().expect("initial pass");
    journal.clear();
}

pub fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
