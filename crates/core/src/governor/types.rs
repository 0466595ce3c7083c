//! Governor types and the pressure classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource thresholds, in percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub throttle_cpu: f32,
    pub pause_cpu: f32,
    pub throttle_ram: f32,
    pub pause_ram: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            throttle_cpu: 75.0,
            pause_cpu: 90.0,
            throttle_ram: 80.0,
            pause_ram: 95.0,
        }
    }
}

/// One host load reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LoadSample {
    /// CPU utilisation averaged over the sampling window.
    pub cpu_percent: f32,
    /// Used RAM as a share of total RAM.
    pub ram_percent: f32,
}

impl LoadSample {
    pub fn new(cpu_percent: f32, ram_percent: f32) -> Self {
        Self {
            cpu_percent,
            ram_percent,
        }
    }
}

/// Classification of the current moment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Pressure {
    /// Run normally.
    Ok,
    /// Process items with a longer inter-item delay.
    Throttle,
    /// Do not start any item this tick.
    Pause,
}

impl Pressure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pressure::Ok => "ok",
            Pressure::Throttle => "throttle",
            Pressure::Pause => "pause",
        }
    }
}

impl fmt::Display for Pressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a sample against thresholds. Pause wins over throttle.
pub fn evaluate(cpu: f32, ram: f32, thresholds: &Thresholds) -> Pressure {
    if cpu >= thresholds.pause_cpu || ram >= thresholds.pause_ram {
        Pressure::Pause
    } else if cpu >= thresholds.throttle_cpu || ram >= thresholds.throttle_ram {
        Pressure::Throttle
    } else {
        Pressure::Ok
    }
}

/// Result of one governor check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GovernorReading {
    /// `None` when telemetry is unavailable.
    pub sample: Option<LoadSample>,
    pub pressure: Pressure,
}
