mod common;

use phaseframe::render::{Task, TaskContext, TaskResult};
use phaseframe::types::Phase;
use phaseframe_test_utils::recorder::{recording_task, Recorder};

use common::{labels, mounted, settle};

fn abc() -> Vec<Task<Recorder>> {
    vec![
        recording_task("A", Phase::Calculate, ["x"]),
        recording_task("B", Phase::Render, ["x"]),
        recording_task("C", Phase::Render, ["y"]),
    ]
}

#[test]
fn invalidation_runs_only_dependent_tasks() {
    let (mut surface, id, journal) = mounted(abc());
    settle(&mut surface, &journal);

    surface.invalidate(id, "x").expect("invalidate");
    let frame = surface.frame();
    surface.tick().expect("tick");
    assert_eq!(journal.labels_in(frame), labels(&["A", "B"]));

    surface.invalidate(id, "y").expect("invalidate");
    let frame = surface.frame();
    surface.tick().expect("tick");
    assert_eq!(journal.labels_in(frame), labels(&["C"]));
}

#[test]
fn initial_pass_runs_everything_calculate_first() {
    let (mut surface, _, journal) = mounted(vec![
        recording_task("paint", Phase::Render, ["x"]),
        recording_task("layout", Phase::Calculate, ["x"]),
    ]);

    surface.tick().expect("tick");
    assert_eq!(journal.labels_in(0), labels(&["layout", "paint"]));
}

#[test]
fn repeated_invalidation_runs_each_task_once() {
    let (mut surface, id, journal) = mounted(abc());
    settle(&mut surface, &journal);

    for _ in 0..3 {
        surface.invalidate(id, "x").expect("invalidate");
    }
    surface.invalidate_all(id).expect("invalidate_all");

    assert_eq!(surface.scheduler().queue_len(0, Phase::Calculate), 1);
    assert_eq!(surface.scheduler().queue_len(0, Phase::Render), 1);
    assert_eq!(surface.scheduler().frame_requests(), 2);

    let stats = surface.tick().expect("tick");
    assert_eq!(stats.callbacks, 2);
    assert_eq!(journal.labels(), labels(&["A", "B", "C"]));
}

#[test]
fn calculate_chain_settles_within_the_frame() {
    let (mut surface, id, journal) = mounted(vec![
        recording_task("derived", Phase::Calculate, ["z"]),
        Task::new(Phase::Calculate, ["x"], |cx: &mut TaskContext<'_, Recorder>| {
            Recorder::record(cx, "source");
            cx.invalidate("z");
            Ok(TaskResult::Done)
        })
        .label("source"),
        recording_task("paint", Phase::Render, ["x"]),
    ]);
    settle(&mut surface, &journal);

    surface.invalidate(id, "x").expect("invalidate");
    let frame = surface.frame();
    surface.tick().expect("tick");

    assert_eq!(journal.labels_in(frame), labels(&["source", "derived", "paint"]));
    assert!(!surface.frame_requested());
}

#[test]
fn render_can_request_more_calculation_in_the_same_frame() {
    let (mut surface, id, journal) = mounted(vec![
        Task::new(Phase::Render, ["x"], |cx: &mut TaskContext<'_, Recorder>| {
            Recorder::record(cx, "paint");
            cx.invalidate("w");
            Ok(TaskResult::Done)
        })
        .label("paint"),
        recording_task("measure", Phase::Calculate, ["w"]),
    ]);
    settle(&mut surface, &journal);

    surface.invalidate(id, "x").expect("invalidate");
    let frame = surface.frame();
    surface.tick().expect("tick");

    let records = journal.records();
    assert_eq!(journal.labels_in(frame), labels(&["paint", "measure"]));
    assert!(records.iter().all(|r| r.frame == frame));
    assert_eq!(records[1].phase, Phase::Calculate);
}

#[test]
fn states_share_one_frame() {
    let (mut surface, first, journal) = mounted(abc());
    let second = surface
        .mount(common::renderer(abc()), Recorder::new(&journal))
        .expect("mount");
    settle(&mut surface, &journal);

    surface.invalidate(first, "y").expect("invalidate");
    surface.invalidate(second, "x").expect("invalidate");
    assert_eq!(surface.scheduler().frame_requests(), 2);

    surface.tick().expect("tick");
    // Every CALCULATE callback runs before any RENDER callback.
    assert_eq!(journal.labels(), labels(&["A", "C", "B"]));
}
