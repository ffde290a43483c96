// src/sim/mod.rs

//! Scene simulator.
//!
//! Mounts one [`SimComponent`] per configured component on a single
//! surface. Their tasks record every run into a shared [`Trace`] and
//! otherwise only do what the scene file asks: invalidate options, animate
//! for a number of frames, defer to another frame or phase, or fail.

pub mod component;
pub mod scene;

pub use component::{build_renderer, build_task, SimComponent, Trace, TraceEntry, TraceKind};
pub use scene::Scene;
