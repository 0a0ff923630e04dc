use anyhow::Context;
use env_logger::Builder;
use log::{LevelFilter, debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

use crate::common::features::{FeatureLogger, FeatureRow, UtilizationLogger, UtilizationRow};
use crate::common::runner_config::config_path_from_scene;
use crate::common::{RunnerConfig, load_scene};
use crate::simulation::types::{ServiceFunctionChain, Vnf, VnfRequirements, VnfType};
use crate::simulation::{NetworkState, Point};

mod common;
mod simulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentKind {
    Vehicle,
    Pedestrian,
}

impl AgentKind {
    fn label(self) -> &'static str {
        match self {
            AgentKind::Vehicle => "veh",
            AgentKind::Pedestrian => "ped",
        }
    }
}

/// A mobile UE following a random-waypoint walk: straight-line motion at a
/// fixed speed, re-aimed whenever it hits the world boundary.
struct Walker {
    ue_id: u32,
    kind: AgentKind,
    position: Point,
    heading: f64,
    speed: f64,
}

impl Walker {
    fn spawn(
        ue_id: u32,
        kind: AgentKind,
        top_left: Point,
        bottom_right: Point,
        rng: &mut StdRng,
    ) -> Self {
        let speed = match kind {
            AgentKind::Vehicle => rng.gen_range(8.0..14.0),
            AgentKind::Pedestrian => rng.gen_range(0.8..2.0),
        };
        Self {
            ue_id,
            kind,
            position: Point {
                x: rng.gen_range(top_left.x..bottom_right.x),
                y: rng.gen_range(top_left.y..bottom_right.y),
            },
            heading: rng.gen_range(0.0..TAU),
            speed,
        }
    }

    fn advance(&mut self, dt: f64, top_left: Point, bottom_right: Point, rng: &mut StdRng) {
        self.position.x += self.heading.cos() * self.speed * dt;
        self.position.y += self.heading.sin() * self.speed * dt;

        let escaped = self.position.x < top_left.x
            || self.position.x > bottom_right.x
            || self.position.y < top_left.y
            || self.position.y > bottom_right.y;
        if escaped {
            self.position.x = self.position.x.clamp(top_left.x, bottom_right.x);
            self.position.y = self.position.y.clamp(top_left.y, bottom_right.y);
            self.heading = rng.gen_range(0.0..TAU);
        }
    }
}

/// Stand up the demo service layout: one pinned NAT instance plus two
/// chains placed by the greedy scorer.
fn deploy_demo_services(network: &mut NetworkState, nat_station: u32) -> anyhow::Result<()> {
    let nat = Vnf::new(
        "edge_nat",
        VnfType::Nat,
        VnfRequirements {
            compute: 0.5,
            memory: 64.0,
            bandwidth: 25.0,
            latency_constraint: 50.0,
        },
    );
    debug!(
        "Pinning {:?} instance {} to station {}",
        nat.vnf_type, nat.id, nat_station
    );
    network.deploy_vnf(nat, nat_station)?;

    let web_chain = ServiceFunctionChain {
        id: "web_service".to_string(),
        vnfs: vec![
            Vnf::new(
                "fw_web",
                VnfType::Firewall,
                VnfRequirements {
                    compute: 1.0,
                    memory: 128.0,
                    bandwidth: 50.0,
                    latency_constraint: 10.0,
                },
            ),
            Vnf::new(
                "lb_web",
                VnfType::LoadBalancer,
                VnfRequirements {
                    compute: 2.0,
                    memory: 256.0,
                    bandwidth: 100.0,
                    latency_constraint: 5.0,
                },
            ),
        ],
        bandwidth_requirement: 150.0,
        latency_requirement: 15.0,
    };

    let video_chain = ServiceFunctionChain {
        id: "video_service".to_string(),
        vnfs: vec![
            Vnf::new(
                "trans_video",
                VnfType::Transcoder,
                VnfRequirements {
                    compute: 3.0,
                    memory: 512.0,
                    bandwidth: 200.0,
                    latency_constraint: 20.0,
                },
            ),
            Vnf::new(
                "cache_video",
                VnfType::Cache,
                VnfRequirements {
                    compute: 1.0,
                    memory: 1024.0,
                    bandwidth: 300.0,
                    latency_constraint: 5.0,
                },
            ),
        ],
        bandwidth_requirement: 400.0,
        latency_requirement: 25.0,
    };

    for chain in [web_chain, video_chain] {
        let placement = network.deploy_chain(chain)?;
        let mut assignments: Vec<_> = placement
            .assignments
            .iter()
            .map(|(vnf_id, station_id)| (vnf_id.as_str(), *station_id))
            .collect();
        assignments.sort();
        info!("Chain {} placed: {:?}", placement.chain_id, assignments);
    }

    Ok(())
}

fn run(scene_path: &str) -> anyhow::Result<()> {
    let scene = load_scene(scene_path)
        .with_context(|| format!("Failed to load scene {}", scene_path))?;
    let config_path = config_path_from_scene(scene_path);
    let config = RunnerConfig::load_or_default(&config_path).map_err(anyhow::Error::msg)?;

    info!(
        "Scene {} loaded: {} stations, {} buildings",
        scene_path,
        scene.stations.len(),
        scene.buildings.len()
    );

    let obstacles = scene.build_obstacles()?;
    let mut network = NetworkState::new(scene.build_stations(), obstacles, scene.radio_parameters);

    // Validation guarantees at least one station.
    let nat_station = scene
        .stations
        .iter()
        .map(|s| s.station_id)
        .min()
        .unwrap_or(0);
    deploy_demo_services(&mut network, nat_station)?;

    let mut rng = StdRng::seed_from_u64(config.mobility_seed);
    let mut walkers = Vec::new();
    for i in 0..config.num_vehicles {
        walkers.push(Walker::spawn(
            i,
            AgentKind::Vehicle,
            scene.world_top_left,
            scene.world_bottom_right,
            &mut rng,
        ));
    }
    for i in 0..config.num_pedestrians {
        walkers.push(Walker::spawn(
            config.num_vehicles + i,
            AgentKind::Pedestrian,
            scene.world_top_left,
            scene.world_bottom_right,
            &mut rng,
        ));
    }

    for walker in &walkers {
        network.register_ue(walker.ue_id, config.ue_height);
        if let Some(selection) = network.best_cell(&walker.position, config.ue_height) {
            debug!(
                "Agent {} ({}) spawns in cell {} (SNR {:.1} dB, {} candidates)",
                walker.ue_id,
                walker.kind.label(),
                selection.station_id,
                selection.snr_db,
                selection.scores.len()
            );
        }
    }

    let mut rollout = FeatureLogger::create(&config.rollout_path)?;
    let mut utilization_log = UtilizationLogger::create(&config.utilization_path)?;

    for t in 0..config.max_steps {
        for walker in &mut walkers {
            walker.advance(
                config.tick_seconds,
                scene.world_top_left,
                scene.world_bottom_right,
                &mut rng,
            );
            if let Some(update) = network.update_ue(walker.ue_id, walker.position) {
                rollout.log(&FeatureRow {
                    t,
                    agent_id: walker.ue_id,
                    agent_type: walker.kind.label(),
                    x: walker.position.x,
                    y: walker.position.y,
                    v: walker.speed,
                    serving_cell: update.serving_station,
                    snr_db: (update.snr_db * 10.0).round() / 10.0,
                    los: update.los as u8,
                })?;
            }
        }

        let mut stations: Vec<_> = network.resource_utilization().into_iter().collect();
        stations.sort_by_key(|(station_id, _)| *station_id);
        for (station_id, usage) in stations {
            let (deployed_vnfs, active_chains) = match network.station(station_id) {
                Some(station) => (station.deployed_vnfs.len(), station.active_chains.len()),
                None => (0, 0),
            };
            utilization_log.log(&UtilizationRow {
                t,
                station_id,
                compute_used: usage.compute.used,
                compute_total: usage.compute.total,
                compute_util: usage.compute.utilization,
                memory_used: usage.memory.used,
                memory_total: usage.memory.total,
                memory_util: usage.memory.utilization,
                bandwidth_used: usage.bandwidth.used,
                bandwidth_total: usage.bandwidth.total,
                bandwidth_util: usage.bandwidth.utilization,
                deployed_vnfs,
                active_chains,
            })?;
        }

        if t % 50 == 0 {
            debug!("Tick {} of {}", t, config.max_steps);
        }
    }

    let usage = network.resource_utilization();
    let mut station_ids: Vec<_> = usage.keys().copied().collect();
    station_ids.sort_unstable();
    for station_id in station_ids {
        let stats = &usage[&station_id];
        info!(
            "Station {} utilization: compute {:.0}%, memory {:.0}%, bandwidth {:.0}%",
            station_id,
            stats.compute.utilization * 100.0,
            stats.memory.utilization * 100.0,
            stats.bandwidth.utilization * 100.0
        );
    }

    // Teardown returns every resource to its ledger, newest first.
    for chain_id in ["video_service", "web_service"] {
        let chain = network.undeploy_chain(chain_id)?;
        info!("Released chain {} ({} VNFs)", chain.id, chain.vnfs.len());
    }
    let nat = network.undeploy_vnf("edge_nat", nat_station)?;
    debug!("Reclaimed {} from station {}", nat.id, nat_station);
    for walker in &walkers {
        network.remove_ue(walker.ue_id);
    }

    rollout.flush()?;
    utilization_log.flush()?;

    debug!(
        "Final state: {}",
        serde_json::to_string(&network.snapshot())?
    );
    info!(
        "Run complete: {} ticks, {} agents, rollout in {}",
        config.max_steps,
        walkers.len(),
        config.rollout_path
    );

    Ok(())
}

fn main() {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("urban_ran_simulator"), LevelFilter::Debug)
        .init();

    info!("Starting up");

    let scene_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "scenes/campus.json".to_string());
    if let Err(e) = run(&scene_path) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
