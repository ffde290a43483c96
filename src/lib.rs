// src/lib.rs

pub mod bitset;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod render;
pub mod sched;
pub mod sim;
pub mod types;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, SceneConfig};
use crate::engine::{Runtime, RuntimeEvent, RuntimeOptions};
use crate::sim::{Scene, SimComponent, Trace};
use crate::types::FrameNumber;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the scene, mounts every component, then either fires
/// `--frames` frames back to back (printing the trace as it grows) or hands
/// the surface to the async [`Runtime`] for `--realtime` pacing.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.scene)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let scene = Scene::from_config(&cfg)?;

    if args.realtime {
        run_realtime(scene, cfg.scheduler.frame_interval(), args.frames).await
    } else {
        run_simulation(scene, args.frames)
    }
}

fn run_simulation(mut scene: Scene, frames: u64) -> Result<()> {
    let mut printed = 0;

    for _ in 0..frames {
        let frame = scene.frame();
        match scene.step() {
            Ok(stats) => debug!(frame, callbacks = stats.callbacks, "frame fired"),
            Err(err) if err.is_fatal() => warn!(frame, error = %err, "frame aborted"),
            Err(err) => return Err(err.into()),
        }

        for entry in scene.trace().since(printed) {
            println!("{entry}");
        }
        printed = scene.trace().len();
    }

    info!(
        frames,
        runs = scene.trace().len(),
        requests = scene.surface().scheduler().frame_requests(),
        "simulation finished"
    );
    Ok(())
}

async fn run_realtime(scene: Scene, interval: Duration, frames: u64) -> Result<()> {
    // Scripted events are converted up front; the feeder only sends them.
    let pending = scripted_events(&scene)?;
    let (surface, _, trace) = scene.into_parts();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent<SimComponent>>(64);

    // Feed scripted events at their frame's wall-clock time.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            for (frame, event) in pending {
                let offset = interval.saturating_mul(u32::try_from(frame).unwrap_or(u32::MAX));
                tokio::time::sleep_until(start + offset).await;
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    // Ctrl-C → graceful shutdown. Holds a weak sender so the channel closes
    // once the feeder is done.
    {
        let weak = rt_tx.downgrade();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(RuntimeEvent::Shutdown).await;
            }
        });
    }
    drop(rt_tx);

    let options = RuntimeOptions {
        frame_interval: interval,
        max_frames: Some(frames),
    };
    let surface = Runtime::new(surface, rt_rx, options).run().await?;

    print_trace(&trace);
    info!(frame = surface.frame(), "realtime run finished");
    Ok(())
}

fn scripted_events(scene: &Scene) -> Result<Vec<(FrameNumber, RuntimeEvent<SimComponent>)>> {
    scene
        .pending_events()
        .iter()
        .map(|event| Ok((event.frame, scene.runtime_event(event)?)))
        .collect()
}

fn print_trace(trace: &Trace) {
    for entry in trace.entries() {
        println!("{entry}");
    }
}

/// Print components, tasks and events without running anything.
fn print_dry_run(cfg: &SceneConfig) {
    println!("phaseframe dry-run");
    println!("  scheduler.frame_interval_ms = {}", cfg.scheduler.frame_interval_ms);
    println!(
        "  scheduler.trap = {} (base {}, per callback {})",
        cfg.scheduler.trap_enabled, cfg.scheduler.trap_base, cfg.scheduler.trap_per_callback
    );
    println!();

    println!("components ({}):", cfg.component.len());
    for (name, component) in cfg.component.iter() {
        println!("  - {name}");
        if !component.options.is_empty() {
            println!("      options: {:?}", component.options);
        }
        for (index, task) in component.tasks.iter().enumerate() {
            let label = task.label.clone().unwrap_or_else(|| format!("task{index}"));
            println!("      [{index}] {label} ({})", task.phase);
            if !task.options.is_empty() {
                println!("          options: {:?}", task.options);
            }
            if !task.signals.is_empty() {
                println!("          signals: {:?}", task.signals);
            }
            if !task.invalidates.is_empty() {
                println!("          invalidates: {:?}", task.invalidates);
            }
            if task.animate_frames > 0 {
                println!("          animate_frames: {}", task.animate_frames);
            }
            if let Some(defer) = task.defer {
                println!("          defer: +{} {}", defer.frames, defer.phase);
            }
            if task.fail {
                println!("          fail: true");
            }
        }
    }

    if !cfg.event.is_empty() {
        println!();
        println!("events ({}):", cfg.event.len());
        for event in cfg.events_by_frame() {
            let key = event.key.as_deref().unwrap_or("-");
            match event.value {
                Some(value) => println!(
                    "  - frame {}: {} {:?} {key} = {value}",
                    event.frame, event.component, event.action
                ),
                None => println!(
                    "  - frame {}: {} {:?} {key}",
                    event.frame, event.component, event.action
                ),
            }
        }
    }

    debug!("dry-run complete (no frames fired)");
}
