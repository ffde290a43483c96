mod common;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use phaseframe::engine::{Runtime, RuntimeEvent, RuntimeOptions, Surface};
use phaseframe::render::{DependencyKey, RunResult, Task, TaskContext, TaskResult};
use phaseframe::sched::SchedulerConfig;
use phaseframe::types::Phase;
use phaseframe_test_utils::recorder::{recording_task, Recorder};
use phaseframe_test_utils::with_timeout;

use common::mounted;

fn options(max_frames: Option<u64>) -> RuntimeOptions {
    RuntimeOptions {
        frame_interval: Duration::from_millis(1),
        max_frames,
    }
}

fn forever(cx: &mut TaskContext<'_, Recorder>) -> RunResult<Recorder> {
    Recorder::record(cx, "tick");
    Ok(TaskResult::render_next(forever))
}

#[tokio::test]
async fn runtime_stops_once_idle_and_disconnected() {
    let (surface, _, journal) = mounted(vec![recording_task("draw", Phase::Render, ["x"])]);
    let (tx, rx) = mpsc::channel(8);
    drop(tx);

    let surface = with_timeout(Runtime::new(surface, rx, options(None)).run())
        .await
        .expect("runtime");

    assert_eq!(journal.count("draw"), 1);
    assert_eq!(surface.frame(), 1);
    assert!(!surface.frame_requested());
}

#[tokio::test]
async fn runtime_honours_the_frame_budget() {
    let (surface, _, journal) = mounted(vec![Task::new(
        Phase::Render,
        ["x"],
        |cx: &mut TaskContext<'_, Recorder>| {
            Recorder::record(cx, "start");
            Ok(TaskResult::render_next(forever))
        },
    )]);
    let (_tx, rx) = mpsc::channel(8);

    let surface = with_timeout(Runtime::new(surface, rx, options(Some(3))).run())
        .await
        .expect("runtime");

    assert_eq!(surface.frame(), 3);
    assert_eq!(journal.count("start"), 1);
    assert_eq!(journal.count("tick"), 2);
    assert!(surface.frame_requested());
}

#[tokio::test]
async fn shutdown_event_stops_the_runtime() {
    let (surface, _, _) = mounted(vec![Task::new(
        Phase::Render,
        ["x"],
        |_: &mut TaskContext<'_, Recorder>| Ok(TaskResult::render_next(forever)),
    )]);
    let (tx, rx) = mpsc::channel(8);

    let runtime = Runtime::new(surface, rx, options(None));
    tx.send(RuntimeEvent::Shutdown).await.expect("send");

    let surface = with_timeout(runtime.run()).await.expect("runtime");
    assert!(surface.frame() < 100);
}

#[tokio::test]
async fn update_event_mutates_then_invalidates() {
    let (surface, id, journal) = mounted(vec![recording_task("draw", Phase::Render, ["width"])]);
    let (tx, rx) = mpsc::channel(8);

    tx.send(RuntimeEvent::Update {
        state: id,
        key: DependencyKey::option("width"),
        update: Box::new(|recorder: &mut Recorder| {
            recorder.options.insert("width".to_string(), 3.0);
        }),
    })
    .await
    .expect("send");
    drop(tx);

    let surface = with_timeout(Runtime::new(surface, rx, options(None)).run())
        .await
        .expect("runtime");

    let width = surface.component(id).and_then(|r| r.options.get("width").copied());
    assert_eq!(width, Some(3.0));
    assert!(journal.count("draw") >= 1);
    assert!(!surface.frame_requested());
}

#[tokio::test]
async fn wait_for_frame_replies_once_the_frame_runs() {
    phaseframe_test_utils::init_tracing();
    let surface: Surface<Recorder> = Surface::new(SchedulerConfig::default());
    let (tx, rx) = mpsc::channel(8);
    let (reply, frame) = oneshot::channel();
    tx.send(RuntimeEvent::WaitForFrame(reply)).await.expect("send");
    drop(tx);

    let surface = with_timeout(Runtime::new(surface, rx, options(None)).run())
        .await
        .expect("runtime");

    assert_eq!(frame.await, Ok(0));
    assert_eq!(surface.frame(), 1);
}
