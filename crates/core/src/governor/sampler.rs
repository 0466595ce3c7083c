//! Host load samplers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

use super::LoadSample;

/// Source of host CPU/RAM readings.
#[async_trait]
pub trait LoadSampler: Send + Sync {
    /// Take one reading. `None` means telemetry is unavailable on this platform.
    async fn sample(&self) -> Option<LoadSample>;
}

/// Sampler backed by `sysinfo`.
///
/// CPU usage is measured as the delta between two refreshes separated by the
/// sampling window, which smooths out single-tick spikes.
pub struct SysinfoSampler {
    system: Arc<Mutex<System>>,
    window: Duration,
}

impl SysinfoSampler {
    pub fn new(window: Duration) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        Self {
            system: Arc::new(Mutex::new(system)),
            window: window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }
}

#[async_trait]
impl LoadSampler for SysinfoSampler {
    async fn sample(&self) -> Option<LoadSample> {
        let system = Arc::clone(&self.system);
        let window = self.window;

        let result = tokio::task::spawn_blocking(move || {
            let mut sys = system.lock().ok()?;
            sys.refresh_cpu_usage();
            std::thread::sleep(window);
            sys.refresh_cpu_usage();
            sys.refresh_memory();

            let total = sys.total_memory();
            if total == 0 || sys.cpus().is_empty() {
                return None;
            }
            let ram = (sys.used_memory() as f64 / total as f64 * 100.0) as f32;
            Some(LoadSample::new(sys.global_cpu_usage(), ram))
        })
        .await;

        match result {
            Ok(sample) => sample,
            Err(e) => {
                debug!("Load sampling task failed: {}", e);
                None
            }
        }
    }
}

/// Sampler returning a fixed reading (or none). Used in tests and when
/// telemetry is disabled.
#[derive(Debug, Clone, Default)]
pub struct StaticSampler {
    sample: Arc<Mutex<Option<LoadSample>>>,
}

impl StaticSampler {
    /// Always report the given load.
    pub fn new(cpu_percent: f32, ram_percent: f32) -> Self {
        Self {
            sample: Arc::new(Mutex::new(Some(LoadSample::new(cpu_percent, ram_percent)))),
        }
    }

    /// Always report telemetry as unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Change the reported load.
    pub fn set(&self, sample: Option<LoadSample>) {
        if let Ok(mut current) = self.sample.lock() {
            *current = sample;
        }
    }
}

#[async_trait]
impl LoadSampler for StaticSampler {
    async fn sample(&self) -> Option<LoadSample> {
        self.sample.lock().ok().and_then(|s| *s)
    }
}
