//! Runner configuration handling.
//!
//! The runner reads an optional `config.toml` next to the scene file. A
//! missing file is not an error; every field has a default so a scene can
//! run on its own.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Parameters steering one simulation run.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerConfig {
    /// Number of mobility ticks to simulate.
    pub max_steps: u32,
    /// Vehicle agents to spawn.
    pub num_vehicles: u32,
    /// Pedestrian agents to spawn.
    pub num_pedestrians: u32,
    /// Antenna height in meters used when registering agents.
    pub ue_height: f64,
    /// Seed for agent spawn positions and headings.
    pub mobility_seed: u64,
    /// Simulated seconds per tick.
    pub tick_seconds: f64,
    /// Output CSV with one row per agent per tick.
    pub rollout_path: String,
    /// Output CSV with one row per station per tick.
    pub utilization_path: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: 200,
            num_vehicles: 5,
            num_pedestrians: 5,
            ue_height: 1.5,
            mobility_seed: 7,
            tick_seconds: 1.0,
            rollout_path: "outputs/rollout.csv".to_string(),
            utilization_path: "outputs/sfc_metrics.csv".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Read a config file, falling back to defaults when it does not exist.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            log::debug!(
                "No runner config at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        toml::from_str(&data)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))
    }
}

/// The config file conventionally sits next to the scene file.
pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
    let parent = Path::new(scene_path)
        .parent()
        .unwrap_or_else(|| Path::new("."));
    parent.join("config.toml")
}
