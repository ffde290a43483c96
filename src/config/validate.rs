// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{EventAction, RawSceneFile, SceneConfig};
use crate::errors::{PhaseframeError, Result};
use crate::types::MAX_FRAME_OFFSET;

impl TryFrom<RawSceneFile> for SceneConfig {
    type Error = PhaseframeError;

    fn try_from(raw: RawSceneFile) -> std::result::Result<Self, Self::Error> {
        validate_scene(&raw)?;
        Ok(SceneConfig::new_unchecked(raw))
    }
}

pub fn validate_scene(scene: &RawSceneFile) -> Result<()> {
    ensure_has_components(scene)?;
    validate_scheduler(scene)?;
    validate_tasks(scene)?;
    validate_events(scene)?;
    validate_invalidation_graph(scene)?;
    Ok(())
}

fn config_error(msg: String) -> PhaseframeError {
    PhaseframeError::ConfigError(msg)
}

fn ensure_has_components(scene: &RawSceneFile) -> Result<()> {
    if scene.component.is_empty() {
        return Err(config_error(
            "scene must contain at least one [component.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(scene: &RawSceneFile) -> Result<()> {
    let s = &scene.scheduler;

    if s.frame_interval_ms == 0 {
        return Err(config_error(
            "[scheduler].frame_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if s.trap_base == 0 {
        return Err(config_error("[scheduler].trap_base must be >= 1 (got 0)".to_string()));
    }
    if s.trap_per_callback == 0 {
        return Err(config_error(
            "[scheduler].trap_per_callback must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(scene: &RawSceneFile) -> Result<()> {
    for (name, component) in scene.component.iter() {
        for (index, task) in component.tasks.iter().enumerate() {
            let label = task.label.clone().unwrap_or_else(|| format!("task{index}"));

            for option in task.options.iter().chain(task.invalidates.iter()) {
                if !component.options.contains_key(option) {
                    return Err(config_error(format!(
                        "task '{name}.{label}' refers to undeclared option '{option}'"
                    )));
                }
            }

            if let Some(defer) = task.defer {
                if defer.frames > MAX_FRAME_OFFSET {
                    return Err(config_error(format!(
                        "task '{name}.{label}' defers {} frames (max {MAX_FRAME_OFFSET})",
                        defer.frames
                    )));
                }
                if task.animate_frames > 0 {
                    return Err(config_error(format!(
                        "task '{name}.{label}' cannot set both `defer` and `animate_frames`"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_events(scene: &RawSceneFile) -> Result<()> {
    for (index, event) in scene.event.iter().enumerate() {
        let Some(component) = scene.component.get(&event.component) else {
            return Err(config_error(format!(
                "event #{index} refers to unknown component '{}'",
                event.component
            )));
        };

        match event.action {
            EventAction::Set => {
                let (Some(key), Some(_)) = (&event.key, event.value) else {
                    return Err(config_error(format!(
                        "event #{index}: `set` needs both `key` and `value`"
                    )));
                };
                if !component.options.contains_key(key) {
                    return Err(config_error(format!(
                        "event #{index}: component '{}' has no option '{key}'",
                        event.component
                    )));
                }
            }
            EventAction::Invalidate => {
                let Some(key) = &event.key else {
                    return Err(config_error(format!(
                        "event #{index}: `invalidate` needs a `key`"
                    )));
                };
                if !component.options.contains_key(key) && !component.has_signal(key) {
                    return Err(config_error(format!(
                        "event #{index}: '{key}' is neither an option nor a signal of '{}'",
                        event.component
                    )));
                }
            }
            EventAction::InvalidateAll | EventAction::Pause | EventAction::Unpause => {}
        }
    }
    Ok(())
}

/// Tasks invalidate options unconditionally, so a loop of "depends on" /
/// "invalidates" edges would re-run forever within one frame.
fn validate_invalidation_graph(scene: &RawSceneFile) -> Result<()> {
    // Edge direction: dependency -> invalidated option, e.g. a task reading
    // `value` and invalidating `display` adds `meter.value -> meter.display`.
    let nodes: Vec<(String, Vec<(String, String)>)> = scene
        .component
        .iter()
        .map(|(name, component)| {
            let edges = component
                .tasks
                .iter()
                .flat_map(|task| {
                    task.options.iter().chain(task.signals.iter()).flat_map(move |dep| {
                        task.invalidates
                            .iter()
                            .map(move |target| (dep.clone(), target.clone()))
                    })
                })
                .collect();
            (name.clone(), edges)
        })
        .collect();

    for (name, edges) in nodes.iter() {
        if let Some((dep, _)) = edges.iter().find(|(dep, target)| dep == target) {
            return Err(PhaseframeError::InvalidationCycle(format!(
                "a task of '{name}' invalidates its own dependency '{dep}'"
            )));
        }

        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (dep, target) in edges.iter() {
            graph.add_edge(dep.as_str(), target.as_str(), ());
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(PhaseframeError::InvalidationCycle(format!(
                "invalidation loop in component '{name}' involving '{}'",
                cycle.node_id()
            )));
        }
    }
    Ok(())
}
