//! Shared infrastructure for the simulation runner.
//!
//! Provides functionality for:
//! - Scene file loading and validation
//! - Runner configuration with per-scene overrides
//! - CSV feature and utilization output

pub mod features;
pub mod runner_config;
pub mod scene;

pub use runner_config::RunnerConfig;
pub use scene::load_scene;
