//! Network resource and topology manager.
//!
//! `NetworkState` owns every base station and user-equipment record and
//! provides:
//! - Best-cell scoring and handover bookkeeping driven by the propagation model
//! - The per-station resource ledger with single-VNF deploy/undeploy
//! - Greedy service chain placement with transaction-log rollback
//! - Chain registry, utilization reporting and aggregate snapshots
//!
//! All operations are synchronous `&mut self` read-modify-write sequences
//! with no internal locking. Callers sharing an instance across threads must
//! serialize whole operations through one lock; finer-grained locking would
//! expose half-applied chain placements.
//!
//! Tie-breaking is deterministic everywhere: equal SNR or equal placement
//! scores resolve to the lowest station id, never to map iteration order.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::obstacles::ObstacleSet;
use super::propagation::{self, LinkEstimate, RadioParameters};
use super::types::{
    BaseStation, CellSelection, ChainPlacement, ChainRecord, DEFAULT_UE_HEIGHT,
    DimensionUtilization, NetworkSnapshot, Point, ResourceBudget, ServiceFunctionChain,
    StationSnapshot, StationUtilization, UeSnapshot, UeUpdate, UserEquipment, Vnf,
};

/// Why a single-VNF deployment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementFailure {
    /// Target station id is not part of the network.
    UnknownStation(u32),
    /// The target station already hosts a VNF with the same id.
    DuplicateVnf(u32),
    /// At least one resource dimension of the target station is short.
    InsufficientCapacity(u32),
}

impl std::fmt::Display for PlacementFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementFailure::UnknownStation(station_id) => {
                write!(f, "unknown station {}", station_id)
            }
            PlacementFailure::DuplicateVnf(station_id) => {
                write!(f, "VNF id already deployed on station {}", station_id)
            }
            PlacementFailure::InsufficientCapacity(station_id) => {
                write!(f, "insufficient capacity on station {}", station_id)
            }
        }
    }
}

/// Failed single-VNF deployment. Hands the instance back to the caller;
/// no station state changed.
#[derive(Debug)]
pub struct RejectedVnf {
    pub vnf: Vnf,
    pub failure: PlacementFailure,
}

impl std::fmt::Display for RejectedVnf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VNF '{}' rejected: {}", self.vnf.id, self.failure)
    }
}

impl std::error::Error for RejectedVnf {}

/// Why a whole chain was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFailure {
    /// A chain with this id is already active.
    DuplicateChain,
    /// The chain carries no VNFs.
    EmptyChain,
    /// Two members share one VNF id; placement records are keyed by id.
    DuplicateVnfId { vnf_id: String },
    /// No station could host this VNF at its turn in the greedy pass.
    NoFeasibleStation { vnf_id: String },
}

impl std::fmt::Display for ChainFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainFailure::DuplicateChain => write!(f, "chain id is already active"),
            ChainFailure::EmptyChain => write!(f, "chain has no VNFs"),
            ChainFailure::DuplicateVnfId { vnf_id } => {
                write!(f, "chain members share VNF id '{}'", vnf_id)
            }
            ChainFailure::NoFeasibleStation { vnf_id } => {
                write!(f, "no station can host VNF '{}'", vnf_id)
            }
        }
    }
}

/// Failed chain deployment. Every partial placement has been rolled back and
/// the complete chain, in original order, is handed back to the caller.
#[derive(Debug)]
pub struct RejectedChain {
    pub chain: ServiceFunctionChain,
    pub failure: ChainFailure,
}

impl std::fmt::Display for RejectedChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chain '{}' rejected: {}", self.chain.id, self.failure)
    }
}

impl std::error::Error for RejectedChain {}

/// Why an undeploy request failed. State is unchanged on every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndeployError {
    UnknownStation(u32),
    VnfNotDeployed { station_id: u32, vnf_id: String },
    UnknownChain(String),
}

impl std::fmt::Display for UndeployError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndeployError::UnknownStation(station_id) => {
                write!(f, "unknown station {}", station_id)
            }
            UndeployError::VnfNotDeployed { station_id, vnf_id } => {
                write!(f, "VNF '{}' is not deployed on station {}", vnf_id, station_id)
            }
            UndeployError::UnknownChain(chain_id) => {
                write!(f, "unknown chain '{}'", chain_id)
            }
        }
    }
}

impl std::error::Error for UndeployError {}

/// The whole network: stations, UEs, active chains and the propagation
/// context every association decision is scored against.
pub struct NetworkState {
    stations: HashMap<u32, BaseStation>,
    ues: HashMap<u32, UserEquipment>,
    chains: HashMap<String, ChainRecord>,
    obstacles: ObstacleSet,
    radio: RadioParameters,
}

impl NetworkState {
    pub fn new(stations: Vec<BaseStation>, obstacles: ObstacleSet, radio: RadioParameters) -> Self {
        let mut station_map = HashMap::with_capacity(stations.len());
        for station in stations {
            log::debug!(
                "station {} at ({}, {}) h={}m capacity {:?}",
                station.station_id,
                station.position.x,
                station.position.y,
                station.height,
                station.total
            );
            if let Some(previous) = station_map.insert(station.station_id, station) {
                log::warn!(
                    "duplicate station id {} in configuration, keeping the later entry",
                    previous.station_id
                );
            }
        }
        Self {
            stations: station_map,
            ues: HashMap::new(),
            chains: HashMap::new(),
            obstacles,
            radio,
        }
    }

    pub fn station(&self, station_id: u32) -> Option<&BaseStation> {
        self.stations.get(&station_id)
    }

    // ---------- Cell association ----------

    fn link_to(&self, station: &BaseStation, position: &Point, ue_height: f64) -> LinkEstimate {
        propagation::estimate(
            position,
            ue_height,
            &station.position,
            station.height,
            &self.obstacles,
            &self.radio,
        )
    }

    /// Score every station for a position and pick the winner.
    fn select_cell(
        &self,
        position: &Point,
        ue_height: f64,
    ) -> Option<(u32, LinkEstimate, HashMap<u32, f64>)> {
        let mut scores = HashMap::with_capacity(self.stations.len());
        let mut best: Option<(u32, LinkEstimate)> = None;
        for (&station_id, station) in &self.stations {
            let link = self.link_to(station, position, ue_height);
            scores.insert(station_id, link.snr_db);
            let replace = match &best {
                None => true,
                Some((best_id, best_link)) => {
                    link.snr_db > best_link.snr_db
                        || (link.snr_db == best_link.snr_db && station_id < *best_id)
                }
            };
            if replace {
                best = Some((station_id, link));
            }
        }
        best.map(|(station_id, link)| (station_id, link, scores))
    }

    /// Score every station for an arbitrary position without touching any
    /// UE state. Returns `None` when the network has no stations.
    pub fn best_cell(&self, position: &Point, ue_height: f64) -> Option<CellSelection> {
        self.select_cell(position, ue_height)
            .map(|(station_id, link, scores)| CellSelection {
                station_id,
                snr_db: link.snr_db,
                scores,
            })
    }

    /// Register a UE with an explicit antenna height. Re-registering an
    /// existing id keeps the current record untouched.
    pub fn register_ue(&mut self, ue_id: u32, height: f64) {
        self.ues
            .entry(ue_id)
            .or_insert_with(|| UserEquipment::new(ue_id, height));
    }

    /// Feed one position sample for a UE: re-score every station, store the
    /// link result and perform the handover when the best cell changed.
    ///
    /// Unknown UE ids are registered on the fly with the default antenna
    /// height. Returns `None` when the network has no stations, in which
    /// case nothing is registered or updated.
    pub fn update_ue(&mut self, ue_id: u32, position: Point) -> Option<UeUpdate> {
        let ue_height = self
            .ues
            .get(&ue_id)
            .map_or(DEFAULT_UE_HEIGHT, |ue| ue.height);
        let (best_id, link, _scores) = self.select_cell(&position, ue_height)?;

        let ue = self
            .ues
            .entry(ue_id)
            .or_insert_with(|| UserEquipment::new(ue_id, DEFAULT_UE_HEIGHT));
        let previous = ue.serving_station;
        ue.position = Some(position);
        ue.snr_db = Some(link.snr_db);
        ue.los = Some(link.los);
        ue.serving_station = Some(best_id);

        if previous != Some(best_id) {
            log::debug!(
                "ue {} handover {:?} -> {} (snr {:.1} dB, rx {:.1} dBm, pl {:.1} dB, los {})",
                ue.ue_id,
                previous,
                best_id,
                link.snr_db,
                link.received_power_dbm,
                link.path_loss_db,
                link.los
            );
            // Remove-then-insert keeps every UE in at most one connected set.
            if let Some(old_id) = previous {
                if let Some(old_station) = self.stations.get_mut(&old_id) {
                    old_station.connected_ues.remove(&ue_id);
                }
            }
            if let Some(new_station) = self.stations.get_mut(&best_id) {
                new_station.connected_ues.insert(ue_id);
            }
        }

        Some(UeUpdate {
            serving_station: best_id,
            snr_db: link.snr_db,
            los: link.los,
        })
    }

    /// Drop a UE and detach it from its serving station. Unknown ids are a
    /// no-op.
    pub fn remove_ue(&mut self, ue_id: u32) {
        if let Some(ue) = self.ues.remove(&ue_id) {
            if let Some(station_id) = ue.serving_station {
                if let Some(station) = self.stations.get_mut(&station_id) {
                    station.connected_ues.remove(&ue_id);
                }
            }
        }
    }

    // ---------- VNF placement ----------

    /// Deploy one VNF onto a specific station, taking ownership of the
    /// instance. On any failure the instance comes back in the error and the
    /// station is untouched.
    pub fn deploy_vnf(&mut self, vnf: Vnf, station_id: u32) -> Result<(), RejectedVnf> {
        let Some(station) = self.stations.get_mut(&station_id) else {
            return Err(RejectedVnf {
                vnf,
                failure: PlacementFailure::UnknownStation(station_id),
            });
        };
        if station.deployed_vnfs.contains_key(&vnf.id) {
            return Err(RejectedVnf {
                vnf,
                failure: PlacementFailure::DuplicateVnf(station_id),
            });
        }
        if !station.remaining.can_accommodate(&vnf.requirements) {
            return Err(RejectedVnf {
                vnf,
                failure: PlacementFailure::InsufficientCapacity(station_id),
            });
        }
        station.remaining.allocate(&vnf.requirements);
        let mut vnf = vnf;
        vnf.deployed_station = Some(station_id);
        station.deployed_vnfs.insert(vnf.id.clone(), vnf);
        Ok(())
    }

    /// Remove a VNF from a station, return its resources to the ledger and
    /// hand the instance back. Chain registry entries referencing the VNF
    /// are updated as well.
    pub fn undeploy_vnf(&mut self, vnf_id: &str, station_id: u32) -> Result<Vnf, UndeployError> {
        if !self.stations.contains_key(&station_id) {
            return Err(UndeployError::UnknownStation(station_id));
        }
        let Some(vnf) = self.take_vnf(vnf_id, station_id) else {
            return Err(UndeployError::VnfNotDeployed {
                station_id,
                vnf_id: vnf_id.to_string(),
            });
        };
        self.release_chain_member(vnf_id, station_id);
        Ok(vnf)
    }

    /// Pull a VNF out of a station: deallocate its requirements and clear
    /// the hosting reference. Registry bookkeeping is the caller's job.
    fn take_vnf(&mut self, vnf_id: &str, station_id: u32) -> Option<Vnf> {
        let station = self.stations.get_mut(&station_id)?;
        let mut vnf = station.deployed_vnfs.remove(vnf_id)?;
        station.remaining.deallocate(&vnf.requirements);
        vnf.deployed_station = None;
        Some(vnf)
    }

    /// Update the chain registry after one of its members left `station_id`:
    /// drop the placement entry, clear the station's active-chain marker if
    /// it hosts no other member, and forget the chain entirely once the last
    /// member is gone.
    fn release_chain_member(&mut self, vnf_id: &str, station_id: u32) {
        // A (vnf id, station) pair is unique across chains: a station hosts
        // at most one VNF per id, so at most one record can match.
        let chain_id = self
            .chains
            .values()
            .find(|record| record.placement.get(vnf_id) == Some(&station_id))
            .map(|record| record.chain_id.clone());
        let Some(chain_id) = chain_id else {
            return;
        };
        let Some(record) = self.chains.get_mut(&chain_id) else {
            return;
        };
        record.placement.remove(vnf_id);
        let still_hosting = record.placement.values().any(|&id| id == station_id);
        if !still_hosting {
            if let Some(station) = self.stations.get_mut(&station_id) {
                station.active_chains.remove(&chain_id);
            }
        }
        if record.placement.is_empty() {
            self.chains.remove(&chain_id);
        }
    }

    /// Feasible station with the most post-allocation compute+memory slack,
    /// ties to the lowest id. Stations already hosting the VNF id are not
    /// candidates.
    fn best_station_for(&self, vnf: &Vnf) -> Option<u32> {
        let mut best: Option<(u32, f64)> = None;
        for (&station_id, station) in &self.stations {
            if station.deployed_vnfs.contains_key(&vnf.id) {
                continue;
            }
            if !station.remaining.can_accommodate(&vnf.requirements) {
                continue;
            }
            let slack = (station.remaining.compute - vnf.requirements.compute)
                + (station.remaining.memory - vnf.requirements.memory);
            let replace = match best {
                None => true,
                Some((best_id, best_slack)) => {
                    slack > best_slack || (slack == best_slack && station_id < best_id)
                }
            };
            if replace {
                best = Some((station_id, slack));
            }
        }
        best.map(|(station_id, _)| station_id)
    }

    /// Place a whole chain greedily, one VNF at a time in chain order, with
    /// all-or-nothing semantics.
    ///
    /// Each VNF goes to the feasible station with the most remaining
    /// compute+memory slack after its allocation, so later members are
    /// scored against the ledger as left by earlier ones. If any VNF finds
    /// no feasible station, every placement made so far is undone in reverse
    /// order and the reassembled chain comes back in the error; the ledger
    /// is then exactly as before the call.
    pub fn deploy_chain(
        &mut self,
        chain: ServiceFunctionChain,
    ) -> Result<ChainPlacement, RejectedChain> {
        if chain.vnfs.is_empty() {
            return Err(RejectedChain {
                chain,
                failure: ChainFailure::EmptyChain,
            });
        }
        if self.chains.contains_key(&chain.id) {
            return Err(RejectedChain {
                chain,
                failure: ChainFailure::DuplicateChain,
            });
        }
        let mut member_ids: HashSet<&str> = HashSet::with_capacity(chain.vnfs.len());
        if let Some(repeat) = chain.vnfs.iter().find(|vnf| !member_ids.insert(vnf.id.as_str())) {
            let vnf_id = repeat.id.clone();
            return Err(RejectedChain {
                chain,
                failure: ChainFailure::DuplicateVnfId { vnf_id },
            });
        }

        let ServiceFunctionChain {
            id: chain_id,
            vnfs,
            bandwidth_requirement,
            latency_requirement,
        } = chain;

        // Transaction log of successful placements, in placement order.
        let mut placed: Vec<(String, u32)> = Vec::with_capacity(vnfs.len());
        let mut pending = vnfs.into_iter();
        let mut rejected: Option<Vnf> = None;

        for vnf in pending.by_ref() {
            let Some(station_id) = self.best_station_for(&vnf) else {
                rejected = Some(vnf);
                break;
            };
            let vnf_id = vnf.id.clone();
            match self.deploy_vnf(vnf, station_id) {
                Ok(()) => placed.push((vnf_id, station_id)),
                Err(error) => {
                    // Unreachable when scoring and deployment agree; treat
                    // as infeasible rather than trust a stale score.
                    log::warn!(
                        "chain '{}': placement of '{}' failed after scoring: {}",
                        chain_id,
                        error.vnf.id,
                        error.failure
                    );
                    rejected = Some(error.vnf);
                    break;
                }
            }
        }

        if let Some(failed_vnf) = rejected {
            // Compensating undeploys, newest first.
            let mut recovered: HashMap<String, Vnf> = HashMap::with_capacity(placed.len());
            for (vnf_id, station_id) in placed.iter().rev() {
                if let Some(vnf) = self.take_vnf(vnf_id, *station_id) {
                    recovered.insert(vnf.id.clone(), vnf);
                }
            }
            // Reassemble the chain in its original order.
            let failed_id = failed_vnf.id.clone();
            let mut vnfs = Vec::with_capacity(placed.len() + 1 + pending.len());
            for (vnf_id, _) in &placed {
                if let Some(vnf) = recovered.remove(vnf_id) {
                    vnfs.push(vnf);
                }
            }
            vnfs.push(failed_vnf);
            vnfs.extend(pending);
            return Err(RejectedChain {
                chain: ServiceFunctionChain {
                    id: chain_id,
                    vnfs,
                    bandwidth_requirement,
                    latency_requirement,
                },
                failure: ChainFailure::NoFeasibleStation { vnf_id: failed_id },
            });
        }

        let mut placement = HashMap::with_capacity(placed.len());
        let mut vnf_order = Vec::with_capacity(placed.len());
        let mut hosting: HashSet<u32> = HashSet::new();
        for (vnf_id, station_id) in placed {
            placement.insert(vnf_id.clone(), station_id);
            vnf_order.push(vnf_id);
            hosting.insert(station_id);
        }
        for station_id in hosting {
            if let Some(station) = self.stations.get_mut(&station_id) {
                station.active_chains.insert(chain_id.clone());
            }
        }
        self.chains.insert(
            chain_id.clone(),
            ChainRecord {
                chain_id: chain_id.clone(),
                vnf_order,
                placement: placement.clone(),
                bandwidth_requirement,
                latency_requirement,
            },
        );
        Ok(ChainPlacement {
            chain_id,
            assignments: placement,
        })
    }

    /// Undeploy every still-placed member of a chain, newest first, and
    /// return the reassembled chain to the caller.
    pub fn undeploy_chain(&mut self, chain_id: &str) -> Result<ServiceFunctionChain, UndeployError> {
        let Some(record) = self.chains.remove(chain_id) else {
            return Err(UndeployError::UnknownChain(chain_id.to_string()));
        };
        let mut recovered: HashMap<String, Vnf> = HashMap::with_capacity(record.placement.len());
        for vnf_id in record.vnf_order.iter().rev() {
            let Some(&station_id) = record.placement.get(vnf_id) else {
                // Already removed individually; nothing left to take.
                continue;
            };
            if let Some(vnf) = self.take_vnf(vnf_id, station_id) {
                recovered.insert(vnf.id.clone(), vnf);
            } else {
                log::warn!(
                    "chain '{}': registry lists VNF '{}' on station {} but the station does not hold it",
                    chain_id,
                    vnf_id,
                    station_id
                );
            }
        }
        for &station_id in record.placement.values() {
            if let Some(station) = self.stations.get_mut(&station_id) {
                station.active_chains.remove(chain_id);
            }
        }
        let mut vnfs = Vec::with_capacity(recovered.len());
        for vnf_id in &record.vnf_order {
            if let Some(vnf) = recovered.remove(vnf_id) {
                vnfs.push(vnf);
            }
        }
        Ok(ServiceFunctionChain {
            id: record.chain_id,
            vnfs,
            bandwidth_requirement: record.bandwidth_requirement,
            latency_requirement: record.latency_requirement,
        })
    }

    // ---------- Reporting ----------

    /// Ledger utilization per station, derived from the deployed VNFs so a
    /// drifting `remaining` would show up as a mismatch rather than stay
    /// hidden.
    pub fn resource_utilization(&self) -> HashMap<u32, StationUtilization> {
        self.stations
            .iter()
            .map(|(&station_id, station)| {
                let mut used = ResourceBudget::new(0.0, 0.0, 0.0);
                for vnf in station.deployed_vnfs.values() {
                    used.compute += vnf.requirements.compute;
                    used.memory += vnf.requirements.memory;
                    used.bandwidth += vnf.requirements.bandwidth;
                }
                (
                    station_id,
                    StationUtilization {
                        compute: DimensionUtilization::new(used.compute, station.total.compute),
                        memory: DimensionUtilization::new(used.memory, station.total.memory),
                        bandwidth: DimensionUtilization::new(
                            used.bandwidth,
                            station.total.bandwidth,
                        ),
                    },
                )
            })
            .collect()
    }

    /// Aggregate view of every UE and station, with deterministic ordering.
    pub fn snapshot(&self) -> NetworkSnapshot {
        let ues: BTreeMap<u32, UeSnapshot> = self
            .ues
            .iter()
            .map(|(&ue_id, ue)| {
                (
                    ue_id,
                    UeSnapshot {
                        position: ue.position,
                        serving_station: ue.serving_station,
                        snr_db: ue.snr_db,
                        los: ue.los,
                    },
                )
            })
            .collect();
        let stations: BTreeMap<u32, StationSnapshot> = self
            .stations
            .iter()
            .map(|(&station_id, station)| {
                let mut connected: Vec<u32> = station.connected_ues.iter().copied().collect();
                connected.sort_unstable();
                (
                    station_id,
                    StationSnapshot {
                        position: station.position,
                        height: station.height,
                        connected_ues: connected,
                    },
                )
            })
            .collect();
        NetworkSnapshot { ues, stations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::obstacles::Building;
    use crate::simulation::types::{VnfRequirements, VnfType};

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    /// One building far outside every test path, so the obstacle set is
    /// valid without affecting any link.
    fn distant_obstacles() -> ObstacleSet {
        ObstacleSet::from_buildings(vec![Building {
            footprint: vec![
                p(5000.0, 5000.0),
                p(5010.0, 5000.0),
                p(5010.0, 5010.0),
                p(5000.0, 5010.0),
            ],
            height: 40.0,
        }])
        .unwrap()
    }

    fn station(station_id: u32, x: f64, y: f64, height: f64) -> BaseStation {
        BaseStation::new(
            station_id,
            p(x, y),
            height,
            ResourceBudget::new(10.0, 1024.0, 1000.0),
        )
    }

    /// The three-station urban layout used across association tests.
    fn campus_network() -> NetworkState {
        NetworkState::new(
            vec![
                station(0, 615.0, 305.0, 25.0),
                station(1, 250.0, 120.0, 20.0),
                station(2, 900.0, 520.0, 30.0),
            ],
            distant_obstacles(),
            RadioParameters::default(),
        )
    }

    fn requirements(compute: f64, memory: f64, bandwidth: f64) -> VnfRequirements {
        VnfRequirements {
            compute,
            memory,
            bandwidth,
            latency_constraint: 10.0,
        }
    }

    fn vnf(id: &str, compute: f64, memory: f64, bandwidth: f64) -> Vnf {
        Vnf::new(id, VnfType::Firewall, requirements(compute, memory, bandwidth))
    }

    fn chain(id: &str, vnfs: Vec<Vnf>) -> ServiceFunctionChain {
        ServiceFunctionChain {
            id: id.to_string(),
            vnfs,
            bandwidth_requirement: 150.0,
            latency_requirement: 15.0,
        }
    }

    /// remaining + sum(deployed requirements) must equal total on every
    /// station, in every dimension.
    fn assert_ledger_conserved(net: &NetworkState) {
        for station in net.stations.values() {
            let mut used = ResourceBudget::new(0.0, 0.0, 0.0);
            for vnf in station.deployed_vnfs.values() {
                used.compute += vnf.requirements.compute;
                used.memory += vnf.requirements.memory;
                used.bandwidth += vnf.requirements.bandwidth;
            }
            assert!(
                (station.remaining.compute + used.compute - station.total.compute).abs() < 1e-9
            );
            assert!((station.remaining.memory + used.memory - station.total.memory).abs() < 1e-9);
            assert!(
                (station.remaining.bandwidth + used.bandwidth - station.total.bandwidth).abs()
                    < 1e-9
            );
        }
    }

    #[test]
    fn best_cell_picks_nearest_station_with_exact_snr() {
        let net = campus_network();
        let selection = net.best_cell(&p(615.0, 300.0), 1.5).unwrap();
        assert_eq!(selection.station_id, 0);
        assert_eq!(selection.scores.len(), 3);

        // 5 m ground distance, free space, default radio parameters.
        let path_loss = 20.0 * 5.0_f64.log10() + 20.0 * 3.5e9_f64.log10() - 147.55;
        let noise = -174.0 + 10.0 * 20e6_f64.log10() + 7.0;
        let expected = (30.0 - path_loss) - noise + 8.0;
        assert!((selection.snr_db - expected).abs() < 1e-9);
    }

    #[test]
    fn update_ue_registers_associates_and_reports_los() {
        let mut net = campus_network();
        net.register_ue(7, 1.5);
        let update = net.update_ue(7, p(615.0, 300.0)).unwrap();
        assert_eq!(update.serving_station, 0);
        assert!(update.los);

        let ue = net.ues.get(&7).unwrap();
        assert_eq!(ue.serving_station, Some(0));
        assert_eq!(ue.position, Some(p(615.0, 300.0)));
        assert!(net.stations[&0].connected_ues.contains(&7));
    }

    #[test]
    fn update_ue_unknown_id_gets_default_height() {
        let mut net = campus_network();
        let update = net.update_ue(3, p(250.0, 125.0)).unwrap();
        assert_eq!(update.serving_station, 1);
        assert_eq!(net.ues.get(&3).unwrap().height, DEFAULT_UE_HEIGHT);
    }

    #[test]
    fn handover_keeps_connected_sets_consistent() {
        let mut net = campus_network();
        net.register_ue(1, 1.5);

        net.update_ue(1, p(615.0, 300.0)).unwrap();
        assert!(net.stations[&0].connected_ues.contains(&1));

        let update = net.update_ue(1, p(900.0, 515.0)).unwrap();
        assert_eq!(update.serving_station, 2);
        assert!(!net.stations[&0].connected_ues.contains(&1));
        assert!(net.stations[&2].connected_ues.contains(&1));
        assert_eq!(net.ues.get(&1).unwrap().serving_station, Some(2));

        // Sample at the same spot: no churn.
        net.update_ue(1, p(901.0, 516.0)).unwrap();
        assert_eq!(net.stations[&2].connected_ues.len(), 1);
    }

    #[test]
    fn equal_snr_ties_break_to_lowest_station_id() {
        let mut net = NetworkState::new(
            vec![station(4, 0.0, 0.0, 20.0), station(2, 10.0, 0.0, 20.0)],
            distant_obstacles(),
            RadioParameters::default(),
        );
        // Equidistant from both stations, identical heights.
        let selection = net.best_cell(&p(5.0, 0.0), 1.5).unwrap();
        assert_eq!(selection.station_id, 2);
        let update = net.update_ue(11, p(5.0, 0.0)).unwrap();
        assert_eq!(update.serving_station, 2);
    }

    #[test]
    fn remove_ue_detaches_from_serving_station() {
        let mut net = campus_network();
        net.update_ue(5, p(615.0, 300.0)).unwrap();
        net.remove_ue(5);
        assert!(net.ues.is_empty());
        assert!(net.stations[&0].connected_ues.is_empty());

        // Unknown id is a no-op.
        net.remove_ue(99);
    }

    #[test]
    fn best_cell_on_empty_network_is_none() {
        let mut net = NetworkState::new(Vec::new(), distant_obstacles(), RadioParameters::default());
        assert!(net.best_cell(&p(0.0, 0.0), 1.5).is_none());
        assert!(net.update_ue(1, p(0.0, 0.0)).is_none());
        assert!(net.ues.is_empty());
    }

    #[test]
    fn deploy_vnf_allocates_and_marks_instance() {
        let mut net = campus_network();
        net.deploy_vnf(vnf("fw", 2.0, 128.0, 50.0), 1).unwrap();

        let station = net.station(1).unwrap();
        assert_eq!(station.remaining, ResourceBudget::new(8.0, 896.0, 950.0));
        assert_eq!(station.deployed_vnfs["fw"].deployed_station, Some(1));
        assert_ledger_conserved(&net);
    }

    #[test]
    fn deploy_vnf_unknown_station_hands_instance_back() {
        let mut net = campus_network();
        let err = net.deploy_vnf(vnf("fw", 1.0, 64.0, 10.0), 9).unwrap_err();
        assert_eq!(err.failure, PlacementFailure::UnknownStation(9));
        assert_eq!(err.vnf.id, "fw");
        assert_eq!(err.vnf.deployed_station, None);
        assert_ledger_conserved(&net);
    }

    #[test]
    fn deploy_vnf_insufficient_capacity_leaves_state_untouched() {
        let mut net = campus_network();
        let err = net.deploy_vnf(vnf("big", 11.0, 64.0, 10.0), 0).unwrap_err();
        assert_eq!(err.failure, PlacementFailure::InsufficientCapacity(0));
        let station = net.station(0).unwrap();
        assert_eq!(station.remaining, station.total);
        assert!(station.deployed_vnfs.is_empty());
    }

    #[test]
    fn deploy_vnf_duplicate_id_on_station_is_rejected() {
        let mut net = campus_network();
        net.deploy_vnf(vnf("fw", 1.0, 64.0, 10.0), 0).unwrap();
        let err = net.deploy_vnf(vnf("fw", 1.0, 64.0, 10.0), 0).unwrap_err();
        assert_eq!(err.failure, PlacementFailure::DuplicateVnf(0));
        assert_eq!(
            net.station(0).unwrap().remaining,
            ResourceBudget::new(9.0, 960.0, 990.0)
        );
    }

    #[test]
    fn undeploy_vnf_returns_instance_and_restores_ledger() {
        let mut net = campus_network();
        net.deploy_vnf(vnf("fw", 2.0, 128.0, 50.0), 0).unwrap();
        let recovered = net.undeploy_vnf("fw", 0).unwrap();
        assert_eq!(recovered.deployed_station, None);
        assert_eq!(recovered.id, "fw");

        let station = net.station(0).unwrap();
        assert_eq!(station.remaining, station.total);
        assert!(station.deployed_vnfs.is_empty());
    }

    #[test]
    fn undeploy_vnf_error_cases() {
        let mut net = campus_network();
        net.deploy_vnf(vnf("fw", 1.0, 64.0, 10.0), 0).unwrap();

        assert_eq!(
            net.undeploy_vnf("fw", 9).unwrap_err(),
            UndeployError::UnknownStation(9)
        );
        assert_eq!(
            net.undeploy_vnf("fw", 1).unwrap_err(),
            UndeployError::VnfNotDeployed {
                station_id: 1,
                vnf_id: "fw".to_string()
            }
        );
        // The instance is still where it was.
        assert!(net.station(0).unwrap().deployed_vnfs.contains_key("fw"));
    }

    #[test]
    fn chain_failure_rolls_back_every_placement() {
        // One station with compute 1.0; a chain of two compute-1.0 VNFs
        // places its first member, then fails and must undo it.
        let mut net = NetworkState::new(
            vec![BaseStation::new(
                0,
                p(0.0, 0.0),
                25.0,
                ResourceBudget::new(1.0, 1024.0, 1000.0),
            )],
            distant_obstacles(),
            RadioParameters::default(),
        );
        let err = net
            .deploy_chain(chain(
                "pair",
                vec![vnf("a", 1.0, 128.0, 10.0), vnf("b", 1.0, 128.0, 10.0)],
            ))
            .unwrap_err();

        assert_eq!(
            err.failure,
            ChainFailure::NoFeasibleStation {
                vnf_id: "b".to_string()
            }
        );
        // The whole chain comes back, original order, nothing deployed.
        assert_eq!(err.chain.id, "pair");
        let ids: Vec<&str> = err.chain.vnfs.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(err.chain.vnfs.iter().all(|v| v.deployed_station.is_none()));

        let station = net.station(0).unwrap();
        assert_eq!(station.remaining, station.total);
        assert!(station.deployed_vnfs.is_empty());
        assert!(station.active_chains.is_empty());
        assert!(net.chains.is_empty());
    }

    #[test]
    fn chain_placement_prefers_most_slack() {
        let mut net = NetworkState::new(
            vec![
                BaseStation::new(0, p(0.0, 0.0), 25.0, ResourceBudget::new(4.0, 100.0, 1000.0)),
                BaseStation::new(1, p(50.0, 0.0), 25.0, ResourceBudget::new(10.0, 100.0, 1000.0)),
            ],
            distant_obstacles(),
            RadioParameters::default(),
        );
        let placement = net
            .deploy_chain(chain("solo", vec![vnf("fw", 1.0, 10.0, 10.0)]))
            .unwrap();
        assert_eq!(placement.assignments["fw"], 1);
    }

    #[test]
    fn chain_scoring_sees_earlier_members_and_spreads() {
        // Both stations start equal; after the first member lands on the
        // lower id, the second no longer fits there and goes to the other.
        let mut net = NetworkState::new(
            vec![
                BaseStation::new(0, p(0.0, 0.0), 25.0, ResourceBudget::new(2.0, 256.0, 1000.0)),
                BaseStation::new(1, p(50.0, 0.0), 25.0, ResourceBudget::new(2.0, 256.0, 1000.0)),
            ],
            distant_obstacles(),
            RadioParameters::default(),
        );
        let placement = net
            .deploy_chain(chain(
                "spread",
                vec![vnf("a", 1.5, 0.0, 0.0), vnf("b", 1.5, 0.0, 0.0)],
            ))
            .unwrap();
        assert_eq!(placement.assignments["a"], 0);
        assert_eq!(placement.assignments["b"], 1);
        assert!(net.stations[&0].active_chains.contains("spread"));
        assert!(net.stations[&1].active_chains.contains("spread"));

        let record = net.chains.get("spread").unwrap();
        assert_eq!(record.vnf_order, ["a", "b"]);
        assert_eq!(record.placement.len(), 2);
        assert_ledger_conserved(&net);
    }

    #[test]
    fn chain_equal_scores_tie_to_lowest_station_id() {
        let mut net = NetworkState::new(
            vec![
                BaseStation::new(3, p(0.0, 0.0), 25.0, ResourceBudget::new(10.0, 1024.0, 1000.0)),
                BaseStation::new(1, p(50.0, 0.0), 25.0, ResourceBudget::new(10.0, 1024.0, 1000.0)),
            ],
            distant_obstacles(),
            RadioParameters::default(),
        );
        let placement = net
            .deploy_chain(chain("tie", vec![vnf("fw", 1.0, 64.0, 10.0)]))
            .unwrap();
        assert_eq!(placement.assignments["fw"], 1);
    }

    #[test]
    fn undeploying_chain_members_individually_restores_everything() {
        let mut net = NetworkState::new(
            vec![
                BaseStation::new(0, p(0.0, 0.0), 25.0, ResourceBudget::new(2.0, 256.0, 1000.0)),
                BaseStation::new(1, p(50.0, 0.0), 25.0, ResourceBudget::new(2.0, 256.0, 1000.0)),
            ],
            distant_obstacles(),
            RadioParameters::default(),
        );
        net.deploy_chain(chain(
            "spread",
            vec![vnf("a", 1.5, 0.0, 0.0), vnf("b", 1.5, 0.0, 0.0)],
        ))
        .unwrap();

        let a = net.undeploy_vnf("a", 0).unwrap();
        assert_eq!(a.deployed_station, None);
        // Registry keeps the chain alive while "b" is still placed.
        assert!(net.chains.contains_key("spread"));
        assert!(!net.stations[&0].active_chains.contains("spread"));
        assert!(net.stations[&1].active_chains.contains("spread"));

        net.undeploy_vnf("b", 1).unwrap();
        assert!(net.chains.is_empty());
        assert!(net.stations[&1].active_chains.is_empty());
        for station_id in [0, 1] {
            let station = net.station(station_id).unwrap();
            assert_eq!(station.remaining, station.total);
        }
    }

    #[test]
    fn undeploy_chain_returns_chain_and_restores_ledger() {
        let mut net = campus_network();
        net.deploy_chain(chain(
            "web",
            vec![vnf("fw", 1.0, 128.0, 50.0), vnf("lb", 2.0, 256.0, 100.0)],
        ))
        .unwrap();

        let returned = net.undeploy_chain("web").unwrap();
        assert_eq!(returned.id, "web");
        let ids: Vec<&str> = returned.vnfs.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["fw", "lb"]);
        assert!(returned.vnfs.iter().all(|v| v.deployed_station.is_none()));

        assert!(net.chains.is_empty());
        for station in net.stations.values() {
            assert_eq!(station.remaining, station.total);
            assert!(station.active_chains.is_empty());
        }

        assert_eq!(
            net.undeploy_chain("web").unwrap_err(),
            UndeployError::UnknownChain("web".to_string())
        );
    }

    #[test]
    fn chain_duplicate_id_is_rejected_whole() {
        let mut net = campus_network();
        net.deploy_chain(chain("web", vec![vnf("fw", 1.0, 128.0, 50.0)]))
            .unwrap();
        let err = net
            .deploy_chain(chain("web", vec![vnf("fw2", 1.0, 128.0, 50.0)]))
            .unwrap_err();
        assert_eq!(err.failure, ChainFailure::DuplicateChain);
        assert_eq!(err.chain.vnfs.len(), 1);
        assert_ledger_conserved(&net);
    }

    #[test]
    fn empty_chain_is_rejected() {
        let mut net = campus_network();
        let err = net.deploy_chain(chain("hollow", Vec::new())).unwrap_err();
        assert_eq!(err.failure, ChainFailure::EmptyChain);
        assert!(net.chains.is_empty());
    }

    #[test]
    fn chain_with_repeated_member_id_is_rejected_whole() {
        // Same-id members would land on two stations but collapse into one
        // placement record, so the guard must fire before anything deploys.
        let mut net = campus_network();
        let err = net
            .deploy_chain(chain(
                "dup",
                vec![vnf("x", 1.0, 64.0, 10.0), vnf("x", 1.0, 64.0, 10.0)],
            ))
            .unwrap_err();

        assert_eq!(
            err.failure,
            ChainFailure::DuplicateVnfId {
                vnf_id: "x".to_string()
            }
        );
        // Both instances come back untouched.
        assert_eq!(err.chain.id, "dup");
        assert_eq!(err.chain.vnfs.len(), 2);
        assert!(err.chain.vnfs.iter().all(|v| v.id == "x"));
        assert!(err.chain.vnfs.iter().all(|v| v.deployed_station.is_none()));

        assert!(net.chains.is_empty());
        for station in net.stations.values() {
            assert_eq!(station.remaining, station.total);
            assert!(station.deployed_vnfs.is_empty());
            assert!(station.active_chains.is_empty());
        }
        assert_ledger_conserved(&net);
    }

    #[test]
    fn ledger_stays_conserved_across_mixed_operations() {
        let mut net = campus_network();
        net.deploy_vnf(vnf("solo", 2.0, 100.0, 50.0), 2).unwrap();
        assert_ledger_conserved(&net);

        net.deploy_chain(chain(
            "web",
            vec![vnf("fw", 1.0, 128.0, 50.0), vnf("lb", 2.0, 256.0, 100.0)],
        ))
        .unwrap();
        assert_ledger_conserved(&net);

        // Oversized chain fails and must not disturb the ledger.
        let err = net
            .deploy_chain(chain("huge", vec![vnf("x", 100.0, 128.0, 50.0)]))
            .unwrap_err();
        assert!(matches!(err.failure, ChainFailure::NoFeasibleStation { .. }));
        assert_ledger_conserved(&net);

        net.undeploy_vnf("solo", 2).unwrap();
        assert_ledger_conserved(&net);

        net.undeploy_chain("web").unwrap();
        assert_ledger_conserved(&net);
        for station in net.stations.values() {
            assert_eq!(station.remaining, station.total);
        }
    }

    #[test]
    fn utilization_reports_ratios_and_zero_capacity() {
        let mut net = NetworkState::new(
            vec![
                BaseStation::new(0, p(0.0, 0.0), 25.0, ResourceBudget::new(10.0, 1024.0, 1000.0)),
                BaseStation::new(1, p(50.0, 0.0), 25.0, ResourceBudget::new(10.0, 1024.0, 0.0)),
            ],
            distant_obstacles(),
            RadioParameters::default(),
        );
        net.deploy_vnf(vnf("fw", 2.0, 256.0, 100.0), 0).unwrap();

        let utilization = net.resource_utilization();
        let s0 = &utilization[&0];
        assert!((s0.compute.utilization - 0.2).abs() < 1e-12);
        assert!((s0.memory.utilization - 0.25).abs() < 1e-12);
        assert!((s0.bandwidth.utilization - 0.1).abs() < 1e-12);
        assert_eq!(s0.compute.used, 2.0);
        assert_eq!(s0.compute.total, 10.0);

        // Zero-capacity dimension reports 0.0 instead of dividing by zero.
        let s1 = &utilization[&1];
        assert_eq!(s1.bandwidth.utilization, 0.0);
        assert_eq!(s1.compute.utilization, 0.0);
    }

    #[test]
    fn snapshot_orders_stations_and_connected_ues() {
        let mut net = campus_network();
        for ue_id in [9, 3, 7] {
            net.update_ue(ue_id, p(615.0, 300.0)).unwrap();
        }
        let snap = net.snapshot();
        assert_eq!(snap.stations.len(), 3);
        assert_eq!(snap.stations[&0].connected_ues, vec![3, 7, 9]);
        assert_eq!(snap.ues[&3].serving_station, Some(0));
        assert_eq!(snap.ues[&7].los, Some(true));

        let keys: Vec<u32> = snap.stations.keys().copied().collect();
        assert_eq!(keys, vec![0, 1, 2]);
    }
}
