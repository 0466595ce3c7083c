use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Database busy timeout is not 0
/// - Orchestrator retry ceiling, worker count and stage timeout are positive
/// - Backoff bounds are ordered
/// - Default thresholds are percentages and throttle does not exceed pause
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.database.busy_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "database.busy_timeout_ms cannot be 0".to_string(),
        ));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.max_retries == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_retries must be at least 1".to_string(),
        ));
    }
    if orchestrator.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_workers must be at least 1".to_string(),
        ));
    }
    if orchestrator.stage_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.stage_timeout_secs cannot be 0".to_string(),
        ));
    }
    if orchestrator.backoff_initial_ms > orchestrator.backoff_max_ms {
        return Err(ConfigError::ValidationError(
            "orchestrator.backoff_initial_ms cannot exceed backoff_max_ms".to_string(),
        ));
    }

    let defaults = &config.defaults;
    for (name, value) in [
        ("throttle_cpu", defaults.throttle_cpu),
        ("pause_cpu", defaults.pause_cpu),
        ("throttle_ram", defaults.throttle_ram),
        ("pause_ram", defaults.pause_ram),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.{} must be within 0..=100, got {}",
                name, value
            )));
        }
    }
    if defaults.throttle_cpu > defaults.pause_cpu {
        return Err(ConfigError::ValidationError(
            "defaults.throttle_cpu cannot exceed pause_cpu".to_string(),
        ));
    }
    if defaults.throttle_ram > defaults.pause_ram {
        return Err(ConfigError::ValidationError(
            "defaults.throttle_ram cannot exceed pause_ram".to_string(),
        ));
    }
    if defaults.system_status.parse::<crate::settings::SystemStatus>().is_err() {
        return Err(ConfigError::ValidationError(format!(
            "defaults.system_status must be RUNNING or STOPPED, got {}",
            defaults.system_status
        )));
    }

    Ok(())
}
