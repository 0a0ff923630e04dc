//! Scene loading, parsing, and validation logic.
//!
//! A scene file describes one urban layout: world bounds, base stations,
//! building footprints, the radio parameters and the building height
//! assignment. Loading validates everything up front so the simulation
//! never starts from a scene it cannot model.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::simulation::obstacles::{
    DEFAULT_MAX_BUILDING_HEIGHT, DEFAULT_MIN_BUILDING_HEIGHT, ObstacleSet, ObstacleSetError,
};
use crate::simulation::propagation::RadioParameters;
use crate::simulation::types::{
    BaseStation, DEFAULT_BANDWIDTH_CAPACITY, DEFAULT_COMPUTE_CAPACITY, DEFAULT_MEMORY_CAPACITY,
    Point, ResourceBudget,
};

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// Seeded range buildings draw their heights from at load time.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct HeightAssignment {
    /// Minimum assigned height in meters.
    pub min_height: f64,
    /// Maximum assigned height in meters.
    pub max_height: f64,
    /// RNG seed; the same scene and seed always produce the same skyline.
    pub seed: u64,
}

impl Default for HeightAssignment {
    fn default() -> Self {
        Self {
            min_height: DEFAULT_MIN_BUILDING_HEIGHT,
            max_height: DEFAULT_MAX_BUILDING_HEIGHT,
            seed: 42,
        }
    }
}

/// One fixed base station in the scene.
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    pub station_id: u32,
    pub position: Point,
    /// Antenna height in meters.
    pub height: f64,
    /// Edge resource capacities; omitted dimensions fall back to the
    /// defaults (compute 10.0, memory 1024 MB, bandwidth 1000 Mbps).
    #[serde(default)]
    pub capacity: Option<ResourceBudget>,
}

impl StationConfig {
    fn capacity_or_default(&self) -> ResourceBudget {
        self.capacity.unwrap_or(ResourceBudget::new(
            DEFAULT_COMPUTE_CAPACITY,
            DEFAULT_MEMORY_CAPACITY,
            DEFAULT_BANDWIDTH_CAPACITY,
        ))
    }
}

/// One building footprint; the height is assigned at load time.
#[derive(Debug, Deserialize, Clone)]
pub struct BuildingConfig {
    /// Footprint polygon vertices in world meters, at least 3.
    pub footprint: Vec<Point>,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize)]
pub struct Scene {
    /// Top-left corner of the world coordinate system.
    pub world_top_left: Point,
    /// Bottom-right corner of the world coordinate system.
    pub world_bottom_right: Point,
    /// Radio propagation parameters; every missing field takes its default.
    #[serde(default)]
    pub radio_parameters: RadioParameters,
    /// Building height assignment range and seed.
    #[serde(default)]
    pub building_heights: HeightAssignment,
    /// All base stations present in the scene.
    pub stations: Vec<StationConfig>,
    /// Building footprints obstructing radio paths.
    pub buildings: Vec<BuildingConfig>,
}

impl Scene {
    /// Materialize the frozen obstacle set from the configured footprints
    /// and the seeded height range.
    pub fn build_obstacles(&self) -> Result<ObstacleSet, ObstacleSetError> {
        ObstacleSet::from_footprints(
            self.buildings.iter().map(|b| b.footprint.clone()).collect(),
            self.building_heights.min_height,
            self.building_heights.max_height,
            self.building_heights.seed,
        )
    }

    /// Materialize base stations with defaulted capacities.
    pub fn build_stations(&self) -> Vec<BaseStation> {
        self.stations
            .iter()
            .map(|config| {
                BaseStation::new(
                    config.station_id,
                    config.position,
                    config.height,
                    config.capacity_or_default(),
                )
            })
            .collect()
    }
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(e.to_string()))?;

    let scene: Scene = serde_json::from_str(&data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(e.to_string()))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;

    Ok(scene)
}

/// Validate scene configuration.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_STATIONS: usize = 1000;
    const MAX_ANTENNA_HEIGHT: f64 = 500.0;

    // World bounds must form a non-empty rectangle
    let bounds = [
        scene.world_top_left.x,
        scene.world_top_left.y,
        scene.world_bottom_right.x,
        scene.world_bottom_right.y,
    ];
    if bounds.iter().any(|v| !v.is_finite()) {
        return Err("World bounds must be finite".to_string());
    }
    if scene.world_top_left.x >= scene.world_bottom_right.x
        || scene.world_top_left.y >= scene.world_bottom_right.y
    {
        return Err(format!(
            "World bounds ({}, {}) to ({}, {}) do not form a non-empty rectangle",
            scene.world_top_left.x,
            scene.world_top_left.y,
            scene.world_bottom_right.x,
            scene.world_bottom_right.y
        ));
    }

    // Check station count
    if scene.stations.is_empty() {
        return Err("Scene must contain at least one base station".to_string());
    }
    if scene.stations.len() > MAX_STATIONS {
        return Err(format!(
            "Station count {} exceeds maximum of {}",
            scene.stations.len(),
            MAX_STATIONS
        ));
    }

    // Check for duplicate station IDs
    let mut station_ids = HashSet::new();
    for station in &scene.stations {
        if !station_ids.insert(station.station_id) {
            return Err(format!("Duplicate station_id found: {}", station.station_id));
        }
    }

    // Validate each station
    for station in &scene.stations {
        if !within_bounds(&station.position, scene) {
            return Err(format!(
                "Station {} position ({}, {}) is outside the world bounds",
                station.station_id, station.position.x, station.position.y
            ));
        }
        if !(station.height > 0.0) || station.height > MAX_ANTENNA_HEIGHT {
            return Err(format!(
                "Station {} antenna height {} m outside realistic range (0-{} m)",
                station.station_id, station.height, MAX_ANTENNA_HEIGHT
            ));
        }
        if let Some(capacity) = &station.capacity {
            let dims = [capacity.compute, capacity.memory, capacity.bandwidth];
            if dims.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(format!(
                    "Station {} capacity must be finite and non-negative",
                    station.station_id
                ));
            }
        }
    }

    // The line-of-sight model needs geometry to test against
    if scene.buildings.is_empty() {
        return Err("Scene must contain at least one building footprint".to_string());
    }
    for (idx, building) in scene.buildings.iter().enumerate() {
        if building.footprint.len() < 3 {
            return Err(format!(
                "Building {} footprint has {} vertices, polygons need at least 3",
                idx,
                building.footprint.len()
            ));
        }
        for vertex in &building.footprint {
            if !vertex.x.is_finite() || !vertex.y.is_finite() {
                return Err(format!("Building {} has a non-finite vertex", idx));
            }
            if !within_bounds(vertex, scene) {
                return Err(format!(
                    "Building {} vertex ({}, {}) is outside the world bounds",
                    idx, vertex.x, vertex.y
                ));
            }
        }
    }

    // Height assignment range
    let heights = &scene.building_heights;
    if !(heights.min_height > 0.0)
        || !(heights.max_height >= heights.min_height)
        || !heights.max_height.is_finite()
    {
        return Err(format!(
            "Invalid building height range [{}, {}], need 0 < min <= max",
            heights.min_height, heights.max_height
        ));
    }

    // Radio parameters
    let radio = &scene.radio_parameters;
    if !(radio.frequency_hz > 0.0) {
        return Err("Invalid frequency_hz, must be positive".to_string());
    }
    if !(radio.bandwidth_hz > 0.0) {
        return Err("Invalid bandwidth_hz, must be positive".to_string());
    }
    if !(radio.nlos_penalty_db >= 0.0) {
        return Err("Invalid nlos_penalty_db, must be non-negative".to_string());
    }
    let gains = [
        radio.tx_power_dbm,
        radio.noise_figure_db,
        radio.tx_antenna_gain_dbi,
        radio.rx_antenna_gain_dbi,
    ];
    if gains.iter().any(|v| !v.is_finite()) {
        return Err("Radio power, noise figure and gains must be finite".to_string());
    }

    Ok(())
}

fn within_bounds(point: &Point, scene: &Scene) -> bool {
    point.x >= scene.world_top_left.x
        && point.x <= scene.world_bottom_right.x
        && point.y >= scene.world_top_left.y
        && point.y <= scene.world_bottom_right.y
}
