//! Radio access network simulation core.
//!
//! This module provides the connectivity and resource model for a set of
//! fixed base stations serving mobile user equipment in an urban layout.
//! It integrates:
//! - Deterministic free-space propagation with a 3D line-of-sight test
//! - Building obstacles with seeded, frozen height assignment
//! - Cell association and handover bookkeeping
//! - Per-station resource ledgers and greedy service chain placement
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (stations, UEs, VNFs, chains, snapshots)
//! - `geometry`: Ground-plane distance, polygon and crossing-span helpers
//! - `obstacles`: Building footprints with assigned heights
//! - `propagation`: Path loss, noise floor, LOS and link estimation
//! - `network`: `NetworkState`, the synchronous manager every operation
//!   goes through
//!
//! ## Public API
//!
//! The main entry point is `NetworkState`: construct it from scene data,
//! then drive it with UE position updates and VNF placement requests.

pub mod geometry;
pub mod network;
pub mod obstacles;
pub mod propagation;
pub mod types;

// Re-export the manager and the most commonly used types
pub use network::NetworkState;
pub use types::Point;
