//! Bot difficulty tiers and personality profiles.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

/// Bot difficulty presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotDifficulty {
    Easy,   // Mostly random, slow to react
    Medium, // Avoids repeating itself, reads the holder's last move
    Hard,   // Pattern avoidance as holder, pattern reading as guesser
}

impl BotDifficulty {
    pub const ALL: [BotDifficulty; 3] = [
        BotDifficulty::Easy,
        BotDifficulty::Medium,
        BotDifficulty::Hard,
    ];

    /// Pick a tier uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for BotDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotDifficulty::Easy => write!(f, "easy"),
            BotDifficulty::Medium => write!(f, "medium"),
            BotDifficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for BotDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(BotDifficulty::Easy),
            "medium" => Ok(BotDifficulty::Medium),
            "hard" => Ok(BotDifficulty::Hard),
            other => Err(format!("Unknown bot difficulty: {other}")),
        }
    }
}

/// Bounds of the simulated thinking time, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTime {
    pub min: u64,
    pub max: u64,
}

impl ReactionTime {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.min.max(self.max))
    }
}

/// Decision profile derived from a difficulty tier.
///
/// Stored alongside the bot in the room document so every client sees the
/// same profile; never mutated after the bot is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotPersonality {
    /// Tendency to bluff as holder (profile attribute, reported to clients)
    pub bluff_chance: f64,

    /// Probability of using the tier strategy when guessing
    pub smart_guess_chance: f64,

    /// Probability of using the tier strategy when hiding
    pub consistency: f64,

    /// Thinking delay bounds
    pub reaction_time: ReactionTime,
}

impl BotPersonality {
    /// Easy: mostly random, slow
    pub fn easy() -> Self {
        Self {
            bluff_chance: 0.3,
            smart_guess_chance: 0.2,
            consistency: 0.4,
            reaction_time: ReactionTime {
                min: 1000,
                max: 3000,
            },
        }
    }

    /// Medium: strategic more often than not
    pub fn medium() -> Self {
        Self {
            bluff_chance: 0.5,
            smart_guess_chance: 0.6,
            consistency: 0.7,
            reaction_time: ReactionTime {
                min: 800,
                max: 2500,
            },
        }
    }

    /// Hard: almost always strategic, quick
    pub fn hard() -> Self {
        Self {
            bluff_chance: 0.7,
            smart_guess_chance: 0.8,
            consistency: 0.9,
            reaction_time: ReactionTime { min: 500, max: 2000 },
        }
    }

    /// Get the profile for a given difficulty
    pub fn from_difficulty(difficulty: BotDifficulty) -> Self {
        match difficulty {
            BotDifficulty::Easy => Self::easy(),
            BotDifficulty::Medium => Self::medium(),
            BotDifficulty::Hard => Self::hard(),
        }
    }
}
