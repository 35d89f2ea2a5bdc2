//! Game rules and server configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default health a player starts with (and the cap).
pub const DEFAULT_MAX_HEALTH: i32 = 100;

/// Default interval between ticks of the health-drain loop (~60Hz).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Periodic health loss while a game is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthDrain {
    /// Health removed from every player each period. Zero disables draining.
    pub amount: i32,
    /// Seconds of play time between drains.
    pub period_secs: u32,
}

impl Default for HealthDrain {
    fn default() -> Self {
        Self {
            amount: 1,
            period_secs: 3,
        }
    }
}

impl HealthDrain {
    pub fn period(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.period_secs))
    }

    pub fn is_enabled(&self) -> bool {
        self.amount > 0 && self.period_secs > 0
    }
}

/// Fixed rules a game is played under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameRules {
    /// Mark every cell of a word `knownCorrect` once it is filled correctly.
    pub mark_correct_words_on_fill: bool,
    pub time_health_drain: HealthDrain,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            mark_correct_words_on_fill: true,
            time_health_drain: HealthDrain::default(),
        }
    }
}

/// Server-side configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub rules: GameRules,
    /// Milliseconds between health-drain ticks.
    pub tick_interval_ms: u64,
    /// Max health assigned to newly connected players.
    pub max_health: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_health: DEFAULT_MAX_HEALTH,
        }
    }
}

impl ServerConfig {
    /// Parse a (possibly partial) JSON config; missing fields use defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn tick_interval(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.tick_interval_ms as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(config.rules.mark_correct_words_on_fill);
        assert_eq!(config.rules.time_health_drain.amount, 1);
        assert_eq!(config.rules.time_health_drain.period(), TimeDelta::seconds(3));
        assert_eq!(config.max_health, 100);
    }

    #[test]
    fn test_partial_json() {
        let config = ServerConfig::from_json(
            r#"{"rules": {"timeHealthDrain": {"amount": 5}}, "tickIntervalMs": 100}"#,
        )
        .unwrap();

        assert_eq!(config.rules.time_health_drain.amount, 5);
        assert_eq!(config.rules.time_health_drain.period_secs, 3);
        assert!(config.rules.mark_correct_words_on_fill);
        assert_eq!(config.tick_interval(), TimeDelta::milliseconds(100));
    }

    #[test]
    fn test_invalid_json() {
        assert!(ServerConfig::from_json("{").is_err());
        assert!(ServerConfig::from_json(r#"{"maxHealth": "lots"}"#).is_err());
    }

    #[test]
    fn test_drain_disabled() {
        let drain = HealthDrain {
            amount: 0,
            period_secs: 3,
        };
        assert!(!drain.is_enabled());
    }
}
