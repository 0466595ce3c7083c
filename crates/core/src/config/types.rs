use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;
use crate::settings::SettingKey;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
    /// Initial runtime settings, seeded only when absent from the store.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Lock-wait timeout applied to every connection.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("conveyor.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Topic handed to the discovery collaborator.
    #[serde(default = "default_general")]
    pub seed_topic: String,
    /// Category for candidates that don't carry one.
    #[serde(default = "default_general")]
    pub category: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            seed_topic: default_general(),
            category: default_general(),
        }
    }
}

fn default_general() -> String {
    "General".to_string()
}

/// Resource governor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GovernorConfig {
    /// CPU averaging window per sample (milliseconds).
    #[serde(default = "default_sample_window")]
    pub sample_window_ms: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            sample_window_ms: default_sample_window(),
        }
    }
}

fn default_sample_window() -> u64 {
    300
}

/// Tracking link configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackingConfig {
    /// Base URL for tracking/redirect links. When unset, the raw destination is published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// External collaborator endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollaboratorsConfig {
    /// Bearer credential sent to every endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout (seconds).
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrich_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    /// Optional; without it items are published without media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_secs: default_collaborator_timeout(),
            discover_url: None,
            enrich_url: None,
            content_url: None,
            media_url: None,
            publish_url: None,
        }
    }
}

fn default_collaborator_timeout() -> u64 {
    120
}

/// Initial runtime settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_system_status")]
    pub system_status: String,
    #[serde(default = "default_daily_run_limit")]
    pub daily_run_limit: u32,
    #[serde(default = "default_throttle_cpu")]
    pub throttle_cpu: f32,
    #[serde(default = "default_pause_cpu")]
    pub pause_cpu: f32,
    #[serde(default = "default_throttle_ram")]
    pub throttle_ram: f32,
    #[serde(default = "default_pause_ram")]
    pub pause_ram: f32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            system_status: default_system_status(),
            daily_run_limit: default_daily_run_limit(),
            throttle_cpu: default_throttle_cpu(),
            pause_cpu: default_pause_cpu(),
            throttle_ram: default_throttle_ram(),
            pause_ram: default_pause_ram(),
        }
    }
}

impl DefaultsConfig {
    /// Values to seed into the settings table.
    pub fn seed_values(&self) -> Vec<(SettingKey, String)> {
        vec![
            (SettingKey::SystemStatus, self.system_status.clone()),
            (SettingKey::DailyRunLimit, self.daily_run_limit.to_string()),
            (SettingKey::ThrottleCpu, self.throttle_cpu.to_string()),
            (SettingKey::PauseCpu, self.pause_cpu.to_string()),
            (SettingKey::ThrottleRam, self.throttle_ram.to_string()),
            (SettingKey::PauseRam, self.pause_ram.to_string()),
        ]
    }
}

fn default_system_status() -> String {
    "RUNNING".to_string()
}

fn default_daily_run_limit() -> u32 {
    10
}

fn default_throttle_cpu() -> f32 {
    75.0
}

fn default_pause_cpu() -> f32 {
    90.0
}

fn default_throttle_ram() -> f32 {
    80.0
}

fn default_pause_ram() -> f32 {
    95.0
}

/// Sanitized configuration for API responses (no secrets)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub orchestrator: OrchestratorConfig,
    pub discovery: DiscoveryConfig,
    pub governor: GovernorConfig,
    pub tracking: TrackingConfig,
    pub collaborators: SanitizedCollaboratorsConfig,
    pub defaults: DefaultsConfig,
}

/// Collaborator config with the credential redacted
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCollaboratorsConfig {
    pub api_key_configured: bool,
    pub timeout_secs: u64,
    pub discover_url: Option<String>,
    pub enrich_url: Option<String>,
    pub content_url: Option<String>,
    pub media_url: Option<String>,
    pub publish_url: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let c = &config.collaborators;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            orchestrator: config.orchestrator.clone(),
            discovery: config.discovery.clone(),
            governor: config.governor.clone(),
            tracking: config.tracking.clone(),
            collaborators: SanitizedCollaboratorsConfig {
                api_key_configured: c.api_key.as_ref().is_some_and(|k| !k.trim().is_empty()),
                timeout_secs: c.timeout_secs,
                discover_url: c.discover_url.clone(),
                enrich_url: c.enrich_url.clone(),
                content_url: c.content_url.clone(),
                media_url: c.media_url.clone(),
                publish_url: c.publish_url.clone(),
            },
            defaults: config.defaults.clone(),
        }
    }
}
