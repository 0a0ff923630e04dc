//! Radio propagation and sensing model.
//!
//! Contains helpers for:
//! - Free-space path loss over the ground distance between UE and station
//! - Thermal noise floor from channel bandwidth and receiver noise figure
//! - A 3D-aware line-of-sight test against building footprints
//! - Full link estimation (SNR, received power, LOS flag)
//!
//! Units:
//! - Power: dBm; gains: dBi; losses and SNR: dB
//! - Frequency and bandwidth: Hz
//! - Distance and heights: meters
//!
//! Everything here is pure and deterministic: the same inputs against the
//! same frozen obstacle set always produce the same estimate.

use serde::Deserialize;

use super::geometry::{crossing_span, distance};
use super::obstacles::ObstacleSet;
use super::types::Point;

/// Radio parameters shared by every station in a scene.
///
/// Any field missing from the scene file falls back to its default:
/// 3.5 GHz carrier, 30 dBm transmit power, 20 MHz channel, 7 dB noise
/// figure, 8 dBi transmit gain, 0 dBi receive gain, 20 dB NLOS penalty.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RadioParameters {
    /// Carrier frequency in Hz.
    pub frequency_hz: f64,
    /// Transmit power at the station antenna port in dBm.
    pub tx_power_dbm: f64,
    /// Channel bandwidth in Hz; sets the thermal noise floor.
    pub bandwidth_hz: f64,
    /// Receiver noise figure in dB.
    pub noise_figure_db: f64,
    /// Station antenna gain in dBi.
    pub tx_antenna_gain_dbi: f64,
    /// UE antenna gain in dBi.
    pub rx_antenna_gain_dbi: f64,
    /// Extra attenuation in dB applied to the received power when the path
    /// is not line-of-sight. Applied exactly once; the SNR inherits it
    /// through the received power rather than subtracting it again.
    pub nlos_penalty_db: f64,
}

impl Default for RadioParameters {
    fn default() -> Self {
        Self {
            frequency_hz: 3.5e9,
            tx_power_dbm: 30.0,
            bandwidth_hz: 20e6,
            noise_figure_db: 7.0,
            tx_antenna_gain_dbi: 8.0,
            rx_antenna_gain_dbi: 0.0,
            nlos_penalty_db: 20.0,
        }
    }
}

/// Result of estimating one UE↔station link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkEstimate {
    pub snr_db: f64,
    pub los: bool,
    pub received_power_dbm: f64,
    pub path_loss_db: f64,
}

/// Check whether the 3D sight line between a UE and a station antenna is
/// clear of buildings.
///
/// The ground projection of the sight line is tested against every building
/// footprint. Where it crosses a footprint, the sight line's height is
/// interpolated at the midpoint of the crossed span:
///
/// ```text
/// h(t) = h_ue + (h_station - h_ue) × t
/// ```
///
/// and the building blocks the path iff its height exceeds that value. The
/// first blocking building short-circuits, so the answer is independent of
/// building order.
pub fn check_los(
    ue_position: &Point,
    ue_height: f64,
    station_position: &Point,
    station_height: f64,
    obstacles: &ObstacleSet,
) -> bool {
    for building in obstacles.buildings() {
        if let Some((entry, exit)) = crossing_span(ue_position, station_position, &building.footprint) {
            let t_mid = 0.5 * (entry + exit);
            let sight_height = ue_height + (station_height - ue_height) * t_mid;
            if building.height > sight_height {
                return false;
            }
        }
    }
    true
}

/// Free-space path loss in dB.
///
/// # Formula
///
/// ```text
/// PL(d) = 20 × log₁₀(d) + 20 × log₁₀(f) − 147.55
/// ```
///
/// with `d` in meters and `f` in Hz. Distances below 1 meter are clamped to
/// 1 meter so the loss never goes negative at close range.
pub fn free_space_path_loss(distance_m: f64, frequency_hz: f64) -> f64 {
    let d = distance_m.max(1.0);
    20.0 * d.log10() + 20.0 * frequency_hz.log10() - 147.55
}

/// Thermal noise floor in dBm for a given bandwidth and noise figure.
///
/// # Formula
///
/// ```text
/// N = −174 + 10 × log₁₀(BW) + NF
/// ```
pub fn noise_floor_dbm(bandwidth_hz: f64, noise_figure_db: f64) -> f64 {
    -174.0 + 10.0 * bandwidth_hz.log10() + noise_figure_db
}

/// Estimate the downlink from a station to a UE position.
///
/// Path loss uses the ground distance; antenna heights enter only through
/// the line-of-sight test. An obstructed path pays the NLOS penalty on the
/// received power, and the SNR adds both antenna gains on top:
///
/// ```text
/// P_rx = P_tx − PL(d) − penalty(¬LOS)
/// SNR  = P_rx − N + G_tx + G_rx
/// ```
pub fn estimate(
    ue_position: &Point,
    ue_height: f64,
    station_position: &Point,
    station_height: f64,
    obstacles: &ObstacleSet,
    params: &RadioParameters,
) -> LinkEstimate {
    let los = check_los(ue_position, ue_height, station_position, station_height, obstacles);
    let path_loss_db = free_space_path_loss(distance(ue_position, station_position), params.frequency_hz);
    let mut received_power_dbm = params.tx_power_dbm - path_loss_db;
    if !los {
        received_power_dbm -= params.nlos_penalty_db;
    }
    let noise_dbm = noise_floor_dbm(params.bandwidth_hz, params.noise_figure_db);
    let snr_db = received_power_dbm - noise_dbm + params.tx_antenna_gain_dbi + params.rx_antenna_gain_dbi;
    LinkEstimate {
        snr_db,
        los,
        received_power_dbm,
        path_loss_db,
    }
}
