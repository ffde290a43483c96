// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::errors::Result;

use super::surface::Surface;
use super::{RuntimeEvent, RuntimeOptions};

/// Drives a [`Surface`] in real time.
///
/// This is a thin IO shell: frames fire on interval ticks while the
/// scheduler has one requested, and [`RuntimeEvent`]s are applied to the
/// surface between frames. Everything else happens in the synchronous core.
///
/// The surface holds `Rc`s, so the returned future is not `Send`; await it
/// on the task that owns it.
pub struct Runtime<C> {
    surface: Surface<C>,
    event_rx: mpsc::Receiver<RuntimeEvent<C>>,
    options: RuntimeOptions,
}

impl<C> fmt::Debug for Runtime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("surface", &self.surface)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: 'static> Runtime<C> {
    pub fn new(
        surface: Surface<C>,
        event_rx: mpsc::Receiver<RuntimeEvent<C>>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            surface,
            event_rx,
            options,
        }
    }

    /// Main loop. Returns the surface once shutdown was requested, the frame
    /// budget is spent, or the channel is closed with no frame pending.
    pub async fn run(mut self) -> Result<Surface<C>> {
        info!(interval = ?self.options.frame_interval, "frame runtime started");

        let mut ticker = time::interval(self.options.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut fired = 0u64;
        let mut channel_open = true;

        loop {
            tokio::select! {
                event = self.event_rx.recv(), if channel_open => match event {
                    Some(event) => {
                        debug!(?event, "runtime received event");
                        if !self.surface.apply(event)? {
                            info!("shutdown requested; stopping runtime");
                            break;
                        }
                    }
                    None => {
                        debug!("runtime event channel closed");
                        channel_open = false;
                    }
                },
                _ = ticker.tick(), if self.surface.frame_requested() => {
                    if let Err(err) = self.surface.tick() {
                        error!(error = %err, "frame aborted");
                    }
                    fired += 1;

                    if self.options.max_frames.is_some_and(|max| fired >= max) {
                        info!(frames = fired, "frame budget reached; stopping runtime");
                        break;
                    }
                }
                else => {
                    info!(frames = fired, "nothing left to do; stopping runtime");
                    break;
                }
            }
        }

        info!(frame = self.surface.frame(), "frame runtime exiting");
        Ok(self.surface)
    }
}
