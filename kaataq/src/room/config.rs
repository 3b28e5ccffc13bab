//! Room rule configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Game rules shared by every client of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Minimum players needed to start (default: 2)
    pub min_players: usize,

    /// Maximum players including bots (default: 8)
    pub max_players: usize,

    /// Score that ends the game (default: 5)
    pub target_score: u32,

    /// Round cap (default: 10)
    pub max_rounds: u32,

    /// Voting window in seconds (default: 30)
    pub voting_time_secs: u64,

    /// Fresh codes tried before room creation gives up (default: 8)
    pub room_code_attempts: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 8,
            target_score: 5,
            max_rounds: 10,
            voting_time_secs: 30,
            room_code_attempts: 8,
        }
    }
}

impl RoomConfig {
    pub fn voting_time(&self) -> Duration {
        Duration::from_secs(self.voting_time_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.min_players < 2 {
            return Err("Minimum players must be at least 2".to_string());
        }

        if self.max_players < self.min_players {
            return Err("Maximum players must be >= minimum players".to_string());
        }

        if self.target_score == 0 {
            return Err("Target score must be positive".to_string());
        }

        if self.max_rounds == 0 {
            return Err("Round cap must be positive".to_string());
        }

        if self.voting_time_secs == 0 {
            return Err("Voting time must be positive".to_string());
        }

        if self.room_code_attempts == 0 {
            return Err("Room code attempts must be positive".to_string());
        }

        Ok(())
    }
}
