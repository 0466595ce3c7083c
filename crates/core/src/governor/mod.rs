//! Resource governor: decides whether the pipeline runs normally, slows down, or halts
//! based on host CPU/RAM pressure.

mod sampler;
mod types;

pub use sampler::{LoadSampler, StaticSampler, SysinfoSampler};
pub use types::{evaluate, GovernorReading, LoadSample, Pressure, Thresholds};

use std::sync::Arc;

use tracing::debug;

/// Samples host load and classifies it against the current thresholds.
#[derive(Clone)]
pub struct ResourceGovernor {
    sampler: Arc<dyn LoadSampler>,
}

impl ResourceGovernor {
    pub fn new(sampler: Arc<dyn LoadSampler>) -> Self {
        Self { sampler }
    }

    /// Take a sample and classify it.
    ///
    /// Missing telemetry always reports `Pressure::Ok` so it never blocks production.
    pub async fn check(&self, thresholds: &Thresholds) -> GovernorReading {
        let sample = self.sampler.sample().await;
        let pressure = match sample {
            Some(s) => evaluate(s.cpu_percent, s.ram_percent, thresholds),
            None => Pressure::Ok,
        };

        if let Some(s) = sample {
            debug!(
                "Governor sample cpu={:.1}% ram={:.1}% -> {}",
                s.cpu_percent, s.ram_percent, pressure
            );
        }

        GovernorReading { sample, pressure }
    }
}
