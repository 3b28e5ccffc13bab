//! Bot players with difficulty presets.
//!
//! This module implements:
//! - BotPersonality: numeric decision profile derived from a difficulty tier
//! - BotDecisionMaker: delayed, probabilistic concealment and guessing
//! - BotNamePool: per-session display-name allocation
//! - BotCoordinator: host-only driver that acts for every bot in a room
//!
//! ## Difficulty Presets
//!
//! ### Easy
//! - Uses its strategy 40% of the time when hiding, 20% when guessing
//! - Strategy is itself uniform random
//! - Thinks for 1-3 s
//!
//! ### Medium
//! - Strategic 70% of the time when hiding, 60% when guessing
//! - Hides away from its own previous hand
//! - Predicts a holder switches after two or more of their rounds
//! - Thinks for 0.8-2.5 s
//!
//! ### Hard
//! - Strategic 90% of the time when hiding, 80% when guessing
//! - Avoids the hand that dominated the last three rounds
//! - Reads a holder's lopsided habits, otherwise sometimes follows the crowd
//! - Thinks for 0.5-2 s
//!
//! ## Example
//!
//! ```
//! use kaataq::bot::{BotDecisionMaker, BotDifficulty, BotPersonality};
//! use kaataq::bot::decision::BotDecisionContext;
//! use std::collections::BTreeMap;
//!
//! let personality = BotPersonality::from_difficulty(BotDifficulty::Hard);
//! let mut maker = BotDecisionMaker::with_seed(7);
//! let votes = BTreeMap::new();
//! let ctx = BotDecisionContext {
//!     holder_id: "player_1",
//!     history: &[],
//!     current_votes: &votes,
//! };
//! let guess = maker.choose_guess(&personality, BotDifficulty::Hard, ctx);
//! println!("Bot guesses {}", guess);
//! ```

pub mod coordinator;
pub mod decision;
pub mod models;
pub mod names;

pub use coordinator::{BotCoordinator, PendingAction};
pub use decision::BotDecisionMaker;
pub use models::{BotDifficulty, BotPersonality, ReactionTime};
pub use names::BotNamePool;
