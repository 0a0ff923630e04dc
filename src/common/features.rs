//! CSV output for downstream analysis.
//!
//! Two files per run: a rollout file with one row per agent per tick, and a
//! utilization file with one row per station per tick. Column names follow
//! the established dataset layout (`snr_dB`, `type`), so header renames here
//! are deliberate.

use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// One agent observation at one tick.
#[derive(Debug, Serialize)]
pub struct FeatureRow<'a> {
    pub t: u32,
    pub agent_id: u32,
    #[serde(rename = "type")]
    pub agent_type: &'a str,
    pub x: f64,
    pub y: f64,
    /// Speed in m/s.
    pub v: f64,
    pub serving_cell: u32,
    #[serde(rename = "snr_dB")]
    pub snr_db: f64,
    /// 1 when the serving link is line-of-sight.
    pub los: u8,
}

/// One station's resource ledger at one tick.
#[derive(Debug, Serialize)]
pub struct UtilizationRow {
    pub t: u32,
    pub station_id: u32,
    pub compute_used: f64,
    pub compute_total: f64,
    pub compute_util: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub memory_util: f64,
    pub bandwidth_used: f64,
    pub bandwidth_total: f64,
    pub bandwidth_util: f64,
    pub deployed_vnfs: usize,
    pub active_chains: usize,
}

/// Writer for the per-agent rollout file.
pub struct FeatureLogger {
    writer: csv::Writer<File>,
}

impl FeatureLogger {
    /// Create the output file, including missing parent directories. The
    /// header row is emitted with the first logged row.
    pub fn create(path: &str) -> Result<Self, csv::Error> {
        ensure_parent(path)?;
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }

    pub fn log(&mut self, row: &FeatureRow<'_>) -> Result<(), csv::Error> {
        self.writer.serialize(row)
    }

    pub fn flush(&mut self) -> Result<(), csv::Error> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writer for the per-station utilization file.
pub struct UtilizationLogger {
    writer: csv::Writer<File>,
}

impl UtilizationLogger {
    pub fn create(path: &str) -> Result<Self, csv::Error> {
        ensure_parent(path)?;
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }

    pub fn log(&mut self, row: &UtilizationRow) -> Result<(), csv::Error> {
        self.writer.serialize(row)
    }

    pub fn flush(&mut self) -> Result<(), csv::Error> {
        self.writer.flush()?;
        Ok(())
    }
}

fn ensure_parent(path: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
