mod common;

use phaseframe::types::Phase;
use phaseframe_test_utils::recorder::{failing_task, recording_task, Recorder};

use common::{labels, mounted, settle};

#[test]
fn failing_task_does_not_stop_its_neighbours() {
    let (mut surface, id, journal) = mounted(vec![
        recording_task("first", Phase::Render, ["x"]),
        failing_task("second", Phase::Render, ["x"]),
        recording_task("third", Phase::Render, ["x"]),
    ]);
    settle(&mut surface, &journal);

    for _ in 0..3 {
        surface.invalidate(id, "x").expect("invalidate");
        let frame = surface.frame();
        let stats = surface.tick().expect("a failing task is not a frame error");
        assert_eq!(stats.failures, 0);
        assert_eq!(journal.labels_in(frame), labels(&["first", "second", "third"]));
    }
}

#[test]
fn failing_task_does_not_affect_other_states() {
    let (mut surface, broken, journal) =
        mounted(vec![failing_task("broken", Phase::Calculate, ["x"])]);
    let healthy = surface
        .mount(
            common::renderer(vec![recording_task("healthy", Phase::Render, ["x"])]),
            Recorder::new(&journal),
        )
        .expect("mount");
    settle(&mut surface, &journal);

    surface.invalidate(broken, "x").expect("invalidate");
    surface.invalidate(healthy, "x").expect("invalidate");
    surface.tick().expect("tick");

    assert_eq!(journal.labels(), labels(&["broken", "healthy"]));
    assert!(!surface.frame_requested());
}
