mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;

use phaseframe::bitset::Bitset;
use phaseframe::render::{DependencyKey, Renderer, Task, TaskContext, TaskResult};
use phaseframe::types::Phase;
use phaseframe_test_utils::recorder::Recorder;

const KEYS: usize = 6;

fn key(k: usize) -> DependencyKey {
    DependencyKey::option(format!("k{k}"))
}

/// Up to 40 tasks so runnable sets span more than one limb.
fn task_shapes() -> impl Strategy<Value = Vec<(bool, BTreeSet<usize>)>> {
    proptest::collection::vec(
        (any::<bool>(), proptest::collection::btree_set(0..KEYS, 0..3)),
        1..40,
    )
}

fn phase_of(calculate: bool) -> Phase {
    if calculate { Phase::Calculate } else { Phase::Render }
}

fn recording(index: usize, calculate: bool, deps: &BTreeSet<usize>) -> Task<Recorder> {
    let label = format!("t{index}");
    Task::new(
        phase_of(calculate),
        deps.iter().map(|&k| key(k)),
        move |cx: &mut TaskContext<'_, Recorder>| {
            Recorder::record(cx, &label);
            Ok(TaskResult::Done)
        },
    )
}

proptest! {
    #[test]
    fn schedule_tasks_marks_exactly_the_dependents(shapes in task_shapes()) {
        let mut renderer = Renderer::<()>::new();
        for (calculate, deps) in &shapes {
            renderer.add_task(Task::new(
                phase_of(*calculate),
                deps.iter().map(|&k| key(k)),
                |_: &mut TaskContext<'_, ()>| Ok(TaskResult::Done),
            ));
        }

        for k in 0..KEYS {
            let mut runnable = Bitset::default();
            let mask = renderer.schedule_tasks(&key(k), &mut runnable);

            let expected: Vec<usize> = shapes
                .iter()
                .enumerate()
                .filter(|(_, (_, deps))| deps.contains(&k))
                .map(|(i, _)| i)
                .collect();
            let expected_mask = shapes
                .iter()
                .filter(|(_, deps)| deps.contains(&k))
                .fold(0, |mask, (calculate, _)| mask | phase_of(*calculate).mask());

            prop_assert_eq!(runnable.iter().collect::<Vec<_>>(), expected);
            prop_assert_eq!(mask, expected_mask);
        }
    }

    #[test]
    fn invalidated_tasks_run_once_calculate_first(
        shapes in task_shapes(),
        invalidated in proptest::collection::btree_set(0..KEYS, 1..4),
    ) {
        let tasks = shapes
            .iter()
            .enumerate()
            .map(|(i, (calculate, deps))| recording(i, *calculate, deps))
            .collect();
        let (mut surface, id, journal) = common::mounted(tasks);
        common::settle(&mut surface, &journal);

        for &k in &invalidated {
            surface.invalidate(id, key(k)).expect("invalidate");
        }
        surface.tick().expect("tick");

        let records = journal.records();
        for (i, (_, deps)) in shapes.iter().enumerate() {
            let runs = journal.count(&format!("t{i}"));
            let dependent = deps.iter().any(|k| invalidated.contains(k));
            prop_assert_eq!(runs, usize::from(dependent));
        }

        let first_render = records.iter().position(|r| r.phase == Phase::Render);
        if let Some(first_render) = first_render {
            prop_assert!(records[first_render..].iter().all(|r| r.phase == Phase::Render));
        }
    }
}
