//! Type definitions for the radio access network model.
//!
//! Contains the data structures shared across the simulation:
//! - Ground positions and per-station resource budgets
//! - VNF and service function chain descriptions
//! - Base station and user equipment runtime state
//! - Snapshot and utilization records serialized for downstream tooling

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Antenna height (meters) assumed for user equipment that shows up in a
/// position update before being registered explicitly.
pub const DEFAULT_UE_HEIGHT: f64 = 1.5;

/// Default compute capacity (CPU units) of a base station's edge host.
pub const DEFAULT_COMPUTE_CAPACITY: f64 = 10.0;
/// Default memory capacity (MB) of a base station's edge host.
pub const DEFAULT_MEMORY_CAPACITY: f64 = 1024.0;
/// Default bandwidth capacity (Mbps) of a base station's backhaul.
pub const DEFAULT_BANDWIDTH_CAPACITY: f64 = 1000.0;

/// Simple 2D ground point in world meters.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Three-dimensional resource quantity: compute units, memory in MB and
/// bandwidth in Mbps. Used both for station capacities and VNF demands.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ResourceBudget {
    pub compute: f64,
    pub memory: f64,
    pub bandwidth: f64,
}

impl ResourceBudget {
    pub fn new(compute: f64, memory: f64, bandwidth: f64) -> Self {
        Self {
            compute,
            memory,
            bandwidth,
        }
    }

    /// True when every dimension can absorb the requirement. Exact fits
    /// (remaining == required) are accepted.
    pub fn can_accommodate(&self, requirements: &VnfRequirements) -> bool {
        self.compute >= requirements.compute
            && self.memory >= requirements.memory
            && self.bandwidth >= requirements.bandwidth
    }

    /// Subtract a requirement from every dimension. Callers check
    /// `can_accommodate` first; no dimension goes negative on that path.
    pub fn allocate(&mut self, requirements: &VnfRequirements) {
        self.compute -= requirements.compute;
        self.memory -= requirements.memory;
        self.bandwidth -= requirements.bandwidth;
    }

    /// Return a previously allocated requirement to every dimension.
    pub fn deallocate(&mut self, requirements: &VnfRequirements) {
        self.compute += requirements.compute;
        self.memory += requirements.memory;
        self.bandwidth += requirements.bandwidth;
    }
}

/// Closed set of network function kinds an operator can deploy.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VnfType {
    Firewall,
    LoadBalancer,
    Nat,
    Dpi,
    Cache,
    Transcoder,
}

/// Resource demand of a single VNF instance.
///
/// `latency_constraint` is carried as descriptive data; placement does not
/// evaluate it.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct VnfRequirements {
    pub compute: f64,
    pub memory: f64,
    pub bandwidth: f64,
    /// Latency bound in milliseconds.
    pub latency_constraint: f64,
}

/// A virtual network function instance.
///
/// Instances move by value: the caller owns one until a deployment succeeds,
/// after which the hosting station owns it. Failed operations hand the
/// instance back through the error.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Vnf {
    pub id: String,
    pub vnf_type: VnfType,
    pub requirements: VnfRequirements,
    /// Station currently hosting this instance; `Some` exactly while the
    /// instance sits in that station's deployed map.
    pub deployed_station: Option<u32>,
}

impl Vnf {
    pub fn new(id: impl Into<String>, vnf_type: VnfType, requirements: VnfRequirements) -> Self {
        Self {
            id: id.into(),
            vnf_type,
            requirements,
            deployed_station: None,
        }
    }
}

/// An ordered service function chain submitted for placement.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ServiceFunctionChain {
    pub id: String,
    /// VNFs in traversal order.
    pub vnfs: Vec<Vnf>,
    /// End-to-end bandwidth demand in Mbps (descriptive).
    pub bandwidth_requirement: f64,
    /// End-to-end latency bound in milliseconds (descriptive).
    pub latency_requirement: f64,
}

/// Registry entry for a chain that is at least partially deployed.
#[derive(Debug, Serialize, Clone)]
pub struct ChainRecord {
    pub chain_id: String,
    /// VNF ids in original chain order.
    pub vnf_order: Vec<String>,
    /// Hosting station per still-deployed VNF id.
    pub placement: HashMap<String, u32>,
    pub bandwidth_requirement: f64,
    pub latency_requirement: f64,
}

/// A fixed base station with radio front-end and an edge resource pool.
#[derive(Debug, Clone)]
pub struct BaseStation {
    pub station_id: u32,
    pub position: Point,
    /// Antenna height in meters.
    pub height: f64,
    /// Capacity the station started with. Never mutated after construction.
    pub total: ResourceBudget,
    /// Capacity still available for new deployments.
    pub remaining: ResourceBudget,
    /// VNF instances this station currently hosts, keyed by VNF id.
    pub deployed_vnfs: HashMap<String, Vnf>,
    /// Chains with at least one VNF on this station.
    pub active_chains: HashSet<String>,
    /// UEs whose serving cell is this station.
    pub connected_ues: HashSet<u32>,
}

impl BaseStation {
    pub fn new(station_id: u32, position: Point, height: f64, capacity: ResourceBudget) -> Self {
        Self {
            station_id,
            position,
            height,
            total: capacity,
            remaining: capacity,
            deployed_vnfs: HashMap::new(),
            active_chains: HashSet::new(),
            connected_ues: HashSet::new(),
        }
    }
}

/// Runtime record for one user equipment.
///
/// Position and link fields stay `None` until the first position update
/// flows through the association manager.
#[derive(Debug, Clone)]
pub struct UserEquipment {
    pub ue_id: u32,
    /// Antenna height in meters.
    pub height: f64,
    pub position: Option<Point>,
    /// Serving cell, mirrored by that station's `connected_ues` set.
    pub serving_station: Option<u32>,
    pub snr_db: Option<f64>,
    pub los: Option<bool>,
}

impl UserEquipment {
    pub fn new(ue_id: u32, height: f64) -> Self {
        Self {
            ue_id,
            height,
            position: None,
            serving_station: None,
            snr_db: None,
            los: None,
        }
    }
}

/// Result of scoring every station for one UE position.
#[derive(Debug, Clone)]
pub struct CellSelection {
    /// Winning station (highest SNR, ties to the lowest id).
    pub station_id: u32,
    pub snr_db: f64,
    /// SNR per candidate station, for logging and analysis.
    pub scores: HashMap<u32, f64>,
}

/// Association outcome of one UE position update.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UeUpdate {
    pub serving_station: u32,
    pub snr_db: f64,
    pub los: bool,
}

/// Successful chain placement: hosting station per VNF id.
#[derive(Debug, Clone, Serialize)]
pub struct ChainPlacement {
    pub chain_id: String,
    pub assignments: HashMap<String, u32>,
}

/// Used/total/ratio triple for one resource dimension.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct DimensionUtilization {
    pub used: f64,
    pub total: f64,
    /// `used / total`, or 0.0 when the dimension has no capacity at all.
    pub utilization: f64,
}

impl DimensionUtilization {
    pub fn new(used: f64, total: f64) -> Self {
        let utilization = if total > 0.0 { used / total } else { 0.0 };
        Self {
            used,
            total,
            utilization,
        }
    }
}

/// Ledger utilization of one station across all three dimensions.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct StationUtilization {
    pub compute: DimensionUtilization,
    pub memory: DimensionUtilization,
    pub bandwidth: DimensionUtilization,
}

/// Serializable view of one UE for snapshots.
#[derive(Debug, Serialize, Clone)]
pub struct UeSnapshot {
    pub position: Option<Point>,
    pub serving_station: Option<u32>,
    pub snr_db: Option<f64>,
    pub los: Option<bool>,
}

/// Serializable view of one station for snapshots.
#[derive(Debug, Serialize, Clone)]
pub struct StationSnapshot {
    pub position: Point,
    pub height: f64,
    /// Connected UE ids in ascending order.
    pub connected_ues: Vec<u32>,
}

/// Aggregate view of the whole network at one instant. Keys are ordered so
/// repeated snapshots of the same state serialize identically.
#[derive(Debug, Serialize, Clone)]
pub struct NetworkSnapshot {
    pub ues: BTreeMap<u32, UeSnapshot>,
    pub stations: BTreeMap<u32, StationSnapshot>,
}
