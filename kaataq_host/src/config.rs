//! Host configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use kaataq::RoomConfig;
use kaataq::bot::BotDifficulty;
use std::time::Duration;

/// Complete host configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Display name of the autopiloted human host
    pub host_name: String,
    /// Number of bots seated before the game starts
    pub bots: usize,
    /// Difficulty for every bot (`None` picks one at random per bot)
    pub bot_difficulty: Option<BotDifficulty>,
    /// How long the host lingers on each round's results
    pub results_pause: Duration,
    /// Rules of the hosted room
    pub room: RoomConfig,
}

/// Values given on the command line, preferred over the environment
#[derive(Debug, Clone, Default)]
pub struct HostOverrides {
    pub host_name: Option<String>,
    pub bots: Option<usize>,
    pub bot_difficulty: Option<BotDifficulty>,
    pub target_score: Option<u32>,
}

impl HostConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if `KAATAQ_BOT_DIFFICULTY` names an unknown tier
    pub fn from_env(overrides: HostOverrides) -> Result<Self, ConfigError> {
        let defaults = RoomConfig::default();

        let host_name = overrides
            .host_name
            .or_else(|| std::env::var("KAATAQ_HOST_NAME").ok())
            .unwrap_or_else(|| "Host".to_string());

        let bot_difficulty = match overrides.bot_difficulty {
            Some(difficulty) => Some(difficulty),
            None => parse_difficulty(std::env::var("KAATAQ_BOT_DIFFICULTY").ok())?,
        };

        let room = RoomConfig {
            min_players: parse_env_or("KAATAQ_MIN_PLAYERS", defaults.min_players),
            max_players: parse_env_or("KAATAQ_MAX_PLAYERS", defaults.max_players),
            target_score: overrides
                .target_score
                .unwrap_or_else(|| parse_env_or("KAATAQ_TARGET_SCORE", defaults.target_score)),
            max_rounds: parse_env_or("KAATAQ_MAX_ROUNDS", defaults.max_rounds),
            voting_time_secs: parse_env_or("KAATAQ_VOTING_TIME_SECS", defaults.voting_time_secs),
            room_code_attempts: parse_env_or(
                "KAATAQ_ROOM_CODE_ATTEMPTS",
                defaults.room_code_attempts,
            ),
        };

        Ok(HostConfig {
            host_name,
            bots: overrides
                .bots
                .unwrap_or_else(|| parse_env_or("KAATAQ_BOTS", 3)),
            bot_difficulty,
            results_pause: Duration::from_millis(parse_env_or("KAATAQ_RESULTS_PAUSE_MS", 1500)),
            room,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "KAATAQ_HOST_NAME".to_string(),
                reason: "Must not be blank".to_string(),
            });
        }

        self.room.validate().map_err(|reason| ConfigError::Invalid {
            var: "room rules".to_string(),
            reason,
        })?;

        // The host occupies one seat
        let players = self.bots + 1;
        if players < self.room.min_players {
            return Err(ConfigError::Invalid {
                var: "KAATAQ_BOTS".to_string(),
                reason: format!(
                    "Need at least {} bot(s) to reach {} players",
                    self.room.min_players - 1,
                    self.room.min_players
                ),
            });
        }

        if players > self.room.max_players {
            return Err(ConfigError::Invalid {
                var: "KAATAQ_BOTS".to_string(),
                reason: format!(
                    "Cannot exceed max players ({}) with the host seated",
                    self.room.max_players
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// `random` (or unset) leaves the tier to chance
fn parse_difficulty(value: Option<String>) -> Result<Option<BotDifficulty>, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("random") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|reason| ConfigError::Invalid {
                var: "KAATAQ_BOT_DIFFICULTY".to_string(),
                reason,
            }),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
