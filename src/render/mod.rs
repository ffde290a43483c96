// src/render/mod.rs

//! Task declarations, dependency compilation and the per-component render
//! state.

pub mod animation;
pub mod context;
pub mod dependency_map;
pub mod renderer;
pub mod state;
pub mod task;

pub use animation::Animation;
pub use context::TaskContext;
pub use dependency_map::{DependencyEntry, DependencyMap};
pub use renderer::Renderer;
pub use state::{RenderState, RenderStatus};
pub use task::{
    combine_defer, define_measure, define_multi_phase, define_recalculation, define_render,
    Continuation, Defer, DependencyKey, Options, RunResult, Task, TaskResult,
};
