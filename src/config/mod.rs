// src/config/mod.rs

//! Scene files for the simulator.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a scene from disk or a string.
//! - `validate.rs`: semantic checks turning a raw file into a [`SceneConfig`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_scene_path, load_and_validate, load_from_path, parse_scene};
pub use model::{
    ComponentConfig, DeferConfig, EventAction, EventConfig, RawSceneFile, SceneConfig,
    SchedulerSection, TaskConfig,
};
pub use validate::validate_scene;
