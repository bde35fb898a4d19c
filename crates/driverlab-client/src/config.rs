//! Session tuning.

use serde::{Deserialize, Serialize};

use crate::log::{DEFAULT_CAPACITY, MAX_CAPACITY};

/// Settings for one [`SessionController`](crate::SessionController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// How many log entries to keep before evicting the oldest.
    pub log_capacity: usize,
    /// What `exec` does while a command is still running.
    pub overlap: OverlapPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_CAPACITY,
            overlap: OverlapPolicy::Allow,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_capacity == 0 {
            return Err(ConfigError::ZeroLogCapacity);
        }
        if self.log_capacity > MAX_CAPACITY {
            return Err(ConfigError::LogCapacityTooLarge(self.log_capacity));
        }
        Ok(())
    }
}

/// Policy for an `exec` issued while another command is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Forward it; the driver serializes commands on its stdin.
    #[default]
    Allow,
    /// Refuse it locally with [`Dispatch::Busy`](crate::Dispatch::Busy).
    Reject,
}

/// Invalid session settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("log_capacity must be at least 1")]
    ZeroLogCapacity,
    #[error("log_capacity must be at most {MAX_CAPACITY}, got {0}")]
    LogCapacityTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.log_capacity, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config: SessionConfig = serde_json::from_str(r#"{"log_capacity": 0}"#).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::ZeroLogCapacity));
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        let config = SessionConfig {
            log_capacity: usize::MAX / 2,
            ..SessionConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::LogCapacityTooLarge(usize::MAX / 2))
        );

        let config = SessionConfig {
            log_capacity: MAX_CAPACITY,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<SessionConfig>(r#"{"log_cap": 3}"#).is_err());
    }

    #[test]
    fn overlap_spelling() {
        let config: SessionConfig = serde_json::from_str(r#"{"overlap": "reject"}"#).unwrap();
        assert_eq!(config.overlap, OverlapPolicy::Reject);
    }
}
