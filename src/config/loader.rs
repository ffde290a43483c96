// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSceneFile, SceneConfig};
use crate::errors::Result;

/// Read and deserialize a scene file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSceneFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let scene: RawSceneFile = toml::from_str(&contents)?;
    Ok(scene)
}

/// Read, deserialize and validate a scene file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SceneConfig> {
    let raw = load_from_path(&path)?;
    SceneConfig::try_from(raw)
}

/// Validate a scene given as TOML text.
pub fn parse_scene(contents: &str) -> Result<SceneConfig> {
    let raw: RawSceneFile = toml::from_str(contents)?;
    SceneConfig::try_from(raw)
}

/// `Scene.toml` in the current working directory.
pub fn default_scene_path() -> PathBuf {
    PathBuf::from("Scene.toml")
}
