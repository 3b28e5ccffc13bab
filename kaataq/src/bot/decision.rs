//! Bot decision-making logic with difficulty-based behavior.

use super::models::{BotDifficulty, BotPersonality};
use crate::room::models::{Hand, PlayerId, RoundRecord, VoteTally};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the tier strategies.
///
/// Each value is a probability in [0.0, 1.0] except the ratio and window.
/// The personality decides *whether* a strategy is used at all
/// (`consistency` when hiding, `smart_guess_chance` when guessing); these
/// values shape the strategy once it is.
///
/// # Examples
///
/// ```
/// use kaataq::bot::decision::BotDecisionConfig;
///
/// let config = BotDecisionConfig::default();
/// assert_eq!(config.hard_pattern_window, 3);
/// assert_eq!(config.hard_avoid_pattern_probability, 0.7);
/// ```
#[derive(Debug, Clone)]
pub struct BotDecisionConfig {
    /// Chance a medium holder switches away from their previous hand.
    ///
    /// **Range**: 0.5-0.8 (typical: 0.6)
    /// **Effect**: 0.6 = switches 60% of the time, uniform otherwise
    pub medium_switch_probability: f64,

    /// Number of recent rounds a hard holder inspects.
    ///
    /// **Range**: 2-5 (typical: 3)
    pub hard_pattern_window: usize,

    /// Chance a hard holder picks the less used hand of the window.
    ///
    /// **Range**: 0.6-0.8 (typical: 0.7)
    /// **Higher** = more predictable anti-pattern play
    pub hard_avoid_pattern_probability: f64,

    /// Chance a medium guesser predicts the holder switches.
    ///
    /// **Range**: 0.3-0.7 (typical: 0.5)
    pub medium_predict_switch_probability: f64,

    /// Holder records a medium guesser needs before predicting.
    ///
    /// **Range**: 1-3 (typical: 2)
    pub medium_min_holder_records: usize,

    /// How lopsided a holder's history must be for a hard guesser to read it.
    ///
    /// **Range**: 1.2-2.0 (typical: 1.5)
    /// **Effect**: 1.5 = one hand must appear more than 1.5x the other
    pub hard_dominance_ratio: f64,

    /// Chance a hard guesser follows the holder's dominant hand.
    ///
    /// **Range**: 0.6-0.8 (typical: 0.7)
    pub hard_follow_pattern_probability: f64,

    /// Chance a hard guesser follows the current vote majority.
    ///
    /// **Range**: 0.2-0.5 (typical: 0.4)
    /// **Higher** = more herd behavior
    pub hard_follow_crowd_probability: f64,
}

impl Default for BotDecisionConfig {
    fn default() -> Self {
        Self {
            // Hiding
            medium_switch_probability: 0.6,
            hard_pattern_window: 3,
            hard_avoid_pattern_probability: 0.7,
            // Guessing
            medium_predict_switch_probability: 0.5,
            medium_min_holder_records: 2,
            hard_dominance_ratio: 1.5,
            hard_follow_pattern_probability: 0.7,
            hard_follow_crowd_probability: 0.4,
        }
    }
}

/// What a bot can see when it decides
#[derive(Debug, Clone, Copy)]
pub struct BotDecisionContext<'a> {
    /// Current holder
    pub holder_id: &'a str,

    /// Completed rounds, oldest first
    pub history: &'a [RoundRecord],

    /// Votes cast so far this round
    pub current_votes: &'a BTreeMap<PlayerId, Hand>,
}

/// Bot decision maker
pub struct BotDecisionMaker {
    /// Random number generator
    rng: StdRng,
    /// Strategy configuration
    config: BotDecisionConfig,
}

impl BotDecisionMaker {
    /// Create a new decision maker with default config
    pub fn new() -> Self {
        Self::with_config(BotDecisionConfig::default())
    }

    /// Create a new decision maker with custom config
    pub fn with_config(config: BotDecisionConfig) -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
            config,
        }
    }

    /// Deterministic decision maker, for reproducible games and tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config: BotDecisionConfig::default(),
        }
    }

    /// Sample a thinking delay from the personality's reaction range
    pub fn think_delay(&mut self, personality: &BotPersonality) -> Duration {
        let min = personality.reaction_time.min_delay();
        let max = personality.reaction_time.max_delay();
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Hide the stick after a thinking delay
    ///
    /// # Arguments
    ///
    /// * `personality` - Bot's decision profile
    /// * `difficulty` - Bot's tier, selects the strategy
    /// * `ctx` - Holder and history (the bot itself is the holder)
    ///
    /// # Returns
    ///
    /// * `Hand` - Where the stick goes
    pub async fn decide_concealment(
        &mut self,
        personality: &BotPersonality,
        difficulty: BotDifficulty,
        ctx: BotDecisionContext<'_>,
    ) -> Hand {
        let delay = self.think_delay(personality);
        tokio::time::sleep(delay).await;
        self.choose_concealment(personality, difficulty, ctx)
    }

    /// Guess the hidden hand after a thinking delay
    pub async fn decide_guess(
        &mut self,
        personality: &BotPersonality,
        difficulty: BotDifficulty,
        ctx: BotDecisionContext<'_>,
    ) -> Hand {
        let delay = self.think_delay(personality);
        tokio::time::sleep(delay).await;
        self.choose_guess(personality, difficulty, ctx)
    }

    /// Concealment without the delay
    pub fn choose_concealment(
        &mut self,
        personality: &BotPersonality,
        difficulty: BotDifficulty,
        ctx: BotDecisionContext<'_>,
    ) -> Hand {
        // Inconsistent moment: play randomly
        if !self.rng.random_bool(personality.consistency.clamp(0.0, 1.0)) {
            return self.random_hand();
        }

        match difficulty {
            BotDifficulty::Easy => self.random_hand(),
            BotDifficulty::Medium => self.medium_concealment(ctx),
            BotDifficulty::Hard => self.hard_concealment(ctx),
        }
    }

    /// Guess without the delay
    pub fn choose_guess(
        &mut self,
        personality: &BotPersonality,
        difficulty: BotDifficulty,
        ctx: BotDecisionContext<'_>,
    ) -> Hand {
        if !self
            .rng
            .random_bool(personality.smart_guess_chance.clamp(0.0, 1.0))
        {
            return self.random_hand();
        }

        match difficulty {
            BotDifficulty::Easy => self.random_hand(),
            BotDifficulty::Medium => self.medium_guess(ctx),
            BotDifficulty::Hard => self.hard_guess(ctx),
        }
    }

    fn random_hand(&mut self) -> Hand {
        if self.rng.random_bool(0.5) {
            Hand::Left
        } else {
            Hand::Right
        }
    }

    /// `favored` with probability `p`, the other hand otherwise
    fn lean_towards(&mut self, favored: Hand, p: f64) -> Hand {
        if self.rng.random_bool(p) {
            favored
        } else {
            favored.opposite()
        }
    }

    /// Switch away from this holder's previous hand
    fn medium_concealment(&mut self, ctx: BotDecisionContext<'_>) -> Hand {
        let previous = ctx
            .history
            .iter()
            .rev()
            .find(|r| r.holder_id == ctx.holder_id)
            .map(|r| r.stick_choice);

        match previous {
            Some(hand) if self.rng.random_bool(self.config.medium_switch_probability) => {
                hand.opposite()
            }
            _ => self.random_hand(),
        }
    }

    /// Avoid whichever hand dominated the most recent rounds
    fn hard_concealment(&mut self, ctx: BotDecisionContext<'_>) -> Hand {
        let window = self.config.hard_pattern_window;
        let start = ctx.history.len().saturating_sub(window);
        let recent = VoteTally::from_votes(ctx.history[start..].iter().map(|r| &r.stick_choice));

        match recent.leader() {
            Some(common) => {
                self.lean_towards(common.opposite(), self.config.hard_avoid_pattern_probability)
            }
            None => self.random_hand(),
        }
    }

    /// Predict the holder switches from their last hand
    fn medium_guess(&mut self, ctx: BotDecisionContext<'_>) -> Hand {
        let holder_records: Vec<&RoundRecord> = ctx
            .history
            .iter()
            .filter(|r| r.holder_id == ctx.holder_id)
            .collect();

        if holder_records.len() >= self.config.medium_min_holder_records
            && self
                .rng
                .random_bool(self.config.medium_predict_switch_probability)
            && let Some(last) = holder_records.last()
        {
            return last.stick_choice.opposite();
        }

        self.random_hand()
    }

    /// Read the holder's habits, then the crowd
    fn hard_guess(&mut self, ctx: BotDecisionContext<'_>) -> Hand {
        let habits = VoteTally::from_votes(
            ctx.history
                .iter()
                .filter(|r| r.holder_id == ctx.holder_id)
                .map(|r| &r.stick_choice),
        );

        let ratio = self.config.hard_dominance_ratio;
        if habits.total() > 0 {
            if habits.left as f64 > habits.right as f64 * ratio {
                return self.lean_towards(Hand::Left, self.config.hard_follow_pattern_probability);
            }
            if habits.right as f64 > habits.left as f64 * ratio {
                return self.lean_towards(Hand::Right, self.config.hard_follow_pattern_probability);
            }
        }

        // Social pressure
        let crowd = VoteTally::from_votes(ctx.current_votes.values());
        if let Some(majority) = crowd.leader()
            && self.rng.random_bool(self.config.hard_follow_crowd_probability)
        {
            return majority;
        }

        self.random_hand()
    }
}

impl Default for BotDecisionMaker {
    fn default() -> Self {
        Self::new()
    }
}
