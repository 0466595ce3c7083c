//! Runtime settings: the operator-controlled switch, resource thresholds and daily limit.
//!
//! Settings live in the item store and are loaded fresh on every orchestrator tick,
//! so a change made through the API takes effect within one tick.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::governor::Thresholds;
use crate::item::{ItemError, ItemStore};

/// Errors raised while reading or writing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] ItemError),
}

/// Global run switch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemStatus {
    Running,
    Stopped,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::Running => "RUNNING",
            SystemStatus::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(SystemStatus::Running),
            "STOPPED" => Ok(SystemStatus::Stopped),
            _ => Err("expected RUNNING or STOPPED".to_string()),
        }
    }
}

/// Known setting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    SystemStatus,
    ThrottleCpu,
    PauseCpu,
    ThrottleRam,
    PauseRam,
    DailyRunLimit,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::SystemStatus,
        SettingKey::ThrottleCpu,
        SettingKey::PauseCpu,
        SettingKey::ThrottleRam,
        SettingKey::PauseRam,
        SettingKey::DailyRunLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::SystemStatus => "system_status",
            SettingKey::ThrottleCpu => "throttle_cpu",
            SettingKey::PauseCpu => "pause_cpu",
            SettingKey::ThrottleRam => "throttle_ram",
            SettingKey::PauseRam => "pause_ram",
            SettingKey::DailyRunLimit => "daily_run_limit",
        }
    }

    /// The (throttle, pause) pair a threshold key belongs to.
    pub fn threshold_pair(&self) -> Option<(SettingKey, SettingKey)> {
        match self {
            SettingKey::ThrottleCpu | SettingKey::PauseCpu => {
                Some((SettingKey::ThrottleCpu, SettingKey::PauseCpu))
            }
            SettingKey::ThrottleRam | SettingKey::PauseRam => {
                Some((SettingKey::ThrottleRam, SettingKey::PauseRam))
            }
            _ => None,
        }
    }

    /// Value used when the key is absent from the store.
    pub fn default_value(&self) -> &'static str {
        match self {
            SettingKey::SystemStatus => "RUNNING",
            SettingKey::ThrottleCpu => "75",
            SettingKey::PauseCpu => "90",
            SettingKey::ThrottleRam => "80",
            SettingKey::PauseRam => "95",
            SettingKey::DailyRunLimit => "10",
        }
    }

    /// Check that `value` parses for this key. Returns the normalized form.
    pub fn validate(&self, value: &str) -> Result<String, SettingsError> {
        let invalid = |reason: &str| SettingsError::Invalid {
            key: self.as_str().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            SettingKey::SystemStatus => value
                .parse::<SystemStatus>()
                .map(|s| s.as_str().to_string())
                .map_err(|e| invalid(e.as_str())),
            SettingKey::DailyRunLimit => value
                .trim()
                .parse::<u32>()
                .map(|n| n.to_string())
                .map_err(|_| invalid("expected a non-negative integer")),
            _ => {
                let pct = value
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| invalid("expected a percentage"))?;
                if !(0.0..=100.0).contains(&pct) {
                    return Err(invalid("percentage must be within 0..=100"));
                }
                Ok(value.trim().to_string())
            }
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownKey(s.to_string()))
    }
}

/// Snapshot of all runtime settings, taken once per tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RuntimeSettings {
    pub system_status: SystemStatus,
    pub thresholds: Thresholds,
    pub daily_run_limit: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            system_status: SystemStatus::Running,
            thresholds: Thresholds::default(),
            daily_run_limit: 10,
        }
    }
}

impl RuntimeSettings {
    /// Read every setting from the store, applying defaults for absent keys.
    pub fn load(store: &dyn ItemStore) -> Result<Self, SettingsError> {
        let read = |key: SettingKey| -> Result<String, SettingsError> {
            let raw = store
                .get_setting(key.as_str())?
                .unwrap_or_else(|| key.default_value().to_string());
            key.validate(&raw)
        };

        let percent = |key: SettingKey| -> Result<f32, SettingsError> {
            let value = read(key)?;
            value.parse::<f32>().map_err(|_| SettingsError::Invalid {
                key: key.as_str().to_string(),
                value,
                reason: "expected a percentage".to_string(),
            })
        };

        let system_status = read(SettingKey::SystemStatus)?
            .parse::<SystemStatus>()
            .map_err(|reason| SettingsError::Invalid {
                key: SettingKey::SystemStatus.as_str().to_string(),
                value: String::new(),
                reason,
            })?;

        let daily = read(SettingKey::DailyRunLimit)?;
        let daily_run_limit = daily.parse::<u32>().map_err(|_| SettingsError::Invalid {
            key: SettingKey::DailyRunLimit.as_str().to_string(),
            value: daily.clone(),
            reason: "expected a non-negative integer".to_string(),
        })?;

        Ok(Self {
            system_status,
            thresholds: Thresholds {
                throttle_cpu: percent(SettingKey::ThrottleCpu)?,
                pause_cpu: percent(SettingKey::PauseCpu)?,
                throttle_ram: percent(SettingKey::ThrottleRam)?,
                pause_ram: percent(SettingKey::PauseRam)?,
            },
            daily_run_limit,
        })
    }

    pub fn is_running(&self) -> bool {
        self.system_status == SystemStatus::Running
    }
}

/// Validate and persist a single setting. Returns the stored value.
pub fn update_setting(
    store: &dyn ItemStore,
    key: &str,
    value: &str,
) -> Result<String, SettingsError> {
    let key: SettingKey = key.parse()?;
    let normalized = key.validate(value)?;

    // A throttle above its pause threshold would never take effect
    if let Some((throttle_key, pause_key)) = key.threshold_pair() {
        let percent_of = |k: SettingKey| -> Result<f32, SettingsError> {
            let raw = if k == key {
                normalized.clone()
            } else {
                store
                    .get_setting(k.as_str())?
                    .unwrap_or_else(|| k.default_value().to_string())
            };
            raw.trim().parse::<f32>().map_err(|_| SettingsError::Invalid {
                key: k.as_str().to_string(),
                value: raw.clone(),
                reason: "expected a percentage".to_string(),
            })
        };

        let throttle = percent_of(throttle_key)?;
        let pause = percent_of(pause_key)?;
        if throttle > pause {
            return Err(SettingsError::Invalid {
                key: key.as_str().to_string(),
                value: value.to_string(),
                reason: format!(
                    "{} ({}) cannot exceed {} ({})",
                    throttle_key, throttle, pause_key, pause
                ),
            });
        }
    }

    store.set_setting(key.as_str(), &normalized)?;
    Ok(normalized)
}

/// Seed settings that are absent. Existing values are left untouched.
pub fn seed_defaults(
    store: &dyn ItemStore,
    values: &[(SettingKey, String)],
) -> Result<usize, SettingsError> {
    let mut seeded = 0;
    for (key, value) in values {
        let normalized = key.validate(value)?;
        if store.seed_setting(key.as_str(), &normalized)? {
            seeded += 1;
        }
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SqliteItemStore;

    #[test]
    fn test_defaults_when_absent() {
        let store = SqliteItemStore::in_memory().unwrap();
        let settings = RuntimeSettings::load(&store).unwrap();

        assert_eq!(settings, RuntimeSettings::default());
        assert!(settings.is_running());
        assert_eq!(settings.thresholds.pause_cpu, 90.0);
    }

    #[test]
    fn test_load_reads_fresh_values() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.set_setting("system_status", "STOPPED").unwrap();
        store.set_setting("daily_run_limit", "1").unwrap();
        store.set_setting("pause_cpu", "50").unwrap();

        let settings = RuntimeSettings::load(&store).unwrap();
        assert_eq!(settings.system_status, SystemStatus::Stopped);
        assert_eq!(settings.daily_run_limit, 1);
        assert_eq!(settings.thresholds.pause_cpu, 50.0);
    }

    #[test]
    fn test_invalid_stored_value_is_error() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.set_setting("daily_run_limit", "lots").unwrap();

        let result = RuntimeSettings::load(&store);
        assert!(matches!(result, Err(SettingsError::Invalid { .. })));
    }

    #[test]
    fn test_update_setting_validates() {
        let store = SqliteItemStore::in_memory().unwrap();

        assert_eq!(
            update_setting(&store, "system_status", "stopped").unwrap(),
            "STOPPED"
        );
        assert!(matches!(
            update_setting(&store, "pause_cpu", "140"),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            update_setting(&store, "colour", "blue"),
            Err(SettingsError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_update_setting_keeps_throttle_below_pause() {
        let store = SqliteItemStore::in_memory().unwrap();

        // Defaults are throttle 75 / pause 90
        assert!(matches!(
            update_setting(&store, "throttle_cpu", "95"),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            update_setting(&store, "pause_ram", "70"),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(store.get_setting("throttle_cpu").unwrap().is_none());
        assert!(store.get_setting("pause_ram").unwrap().is_none());

        // Raising pause first makes room for a higher throttle
        update_setting(&store, "pause_cpu", "98").unwrap();
        assert_eq!(update_setting(&store, "throttle_cpu", "95").unwrap(), "95");
        assert_eq!(update_setting(&store, "throttle_ram", "95").unwrap(), "95");
        assert!(matches!(
            update_setting(&store, "throttle_ram", "96"),
            Err(SettingsError::Invalid { .. })
        ));
    }

    #[test]
    fn test_seed_defaults_keeps_existing() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.set_setting("daily_run_limit", "4").unwrap();

        let seeded = seed_defaults(
            &store,
            &[
                (SettingKey::DailyRunLimit, "10".to_string()),
                (SettingKey::SystemStatus, "RUNNING".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(seeded, 1);
        assert_eq!(store.get_setting("daily_run_limit").unwrap().as_deref(), Some("4"));
    }
}
