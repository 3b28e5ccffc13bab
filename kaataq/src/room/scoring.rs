//! Round scoring and history records.
//!
//! Scoring runs once per round, when voting closes:
//! - a vote is correct iff it matches the hidden hand
//! - every correct voter gains one point
//! - the holder gains one point iff fewer than half the votes were correct
//!   (`2C < V`), or nobody voted at all
//!
//! A tie (`2C == V`) does not award the holder.

use super::models::{Hand, Player, PlayerId, RoundRecord};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub total_votes: usize,
    pub correct_votes: usize,
    pub correct_guessers: BTreeSet<PlayerId>,
    pub holder_awarded: bool,
}

/// Whether the holder scores, given the vote counts.
///
/// Zero votes awards the holder.
pub fn holder_wins(total_votes: usize, correct_votes: usize) -> bool {
    total_votes == 0 || correct_votes * 2 < total_votes
}

/// Score a round from the hidden hand and the votes cast
pub fn score_round(choice: Hand, votes: &BTreeMap<PlayerId, Hand>) -> RoundOutcome {
    let correct_guessers: BTreeSet<PlayerId> = votes
        .iter()
        .filter(|(_, hand)| **hand == choice)
        .map(|(id, _)| id.clone())
        .collect();

    let total_votes = votes.len();
    let correct_votes = correct_guessers.len();

    RoundOutcome {
        total_votes,
        correct_votes,
        holder_awarded: holder_wins(total_votes, correct_votes),
        correct_guessers,
    }
}

/// Points gained per player; players absent from the map gain nothing
pub fn score_deltas(outcome: &RoundOutcome, holder_id: &str) -> BTreeMap<PlayerId, u32> {
    let mut deltas = BTreeMap::new();
    for id in &outcome.correct_guessers {
        *deltas.entry(id.clone()).or_insert(0) += 1;
    }
    if outcome.holder_awarded {
        *deltas.entry(holder_id.to_string()).or_insert(0) += 1;
    }
    deltas
}

/// History record for a closed round
pub fn round_record(
    round: u32,
    holder: &Player,
    choice: Hand,
    votes: BTreeMap<PlayerId, Hand>,
    outcome: &RoundOutcome,
    completed_at: DateTime<Utc>,
) -> RoundRecord {
    RoundRecord {
        round,
        holder_id: holder.id.clone(),
        holder_name: holder.name.clone(),
        stick_choice: choice,
        votes,
        correct_guessers: outcome.correct_guessers.clone(),
        completed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn votes(entries: &[(&str, Hand)]) -> BTreeMap<PlayerId, Hand> {
        entries.iter().map(|(id, h)| (id.to_string(), *h)).collect()
    }

    #[test]
    fn test_split_vote_does_not_award_holder() {
        let outcome = score_round(Hand::Left, &votes(&[("b", Hand::Left), ("c", Hand::Right)]));
        assert_eq!(outcome.total_votes, 2);
        assert_eq!(outcome.correct_votes, 1);
        assert!(!outcome.holder_awarded);

        let deltas = score_deltas(&outcome, "a");
        assert_eq!(deltas.get("b"), Some(&1));
        assert_eq!(deltas.get("a"), None);
        assert_eq!(deltas.get("c"), None);
    }

    #[test]
    fn test_zero_votes_awards_holder() {
        let outcome = score_round(Hand::Right, &BTreeMap::new());
        assert!(outcome.holder_awarded);
        assert_eq!(score_deltas(&outcome, "a"), votes_to_deltas(&[("a", 1)]));
    }

    #[test]
    fn test_minority_correct_awards_holder() {
        let outcome = score_round(
            Hand::Right,
            &votes(&[("b", Hand::Left), ("c", Hand::Left), ("d", Hand::Right)]),
        );
        assert!(outcome.holder_awarded);
        assert_eq!(
            score_deltas(&outcome, "a"),
            votes_to_deltas(&[("a", 1), ("d", 1)])
        );
    }

    fn votes_to_deltas(entries: &[(&str, u32)]) -> BTreeMap<PlayerId, u32> {
        entries.iter().map(|(id, n)| (id.to_string(), *n)).collect()
    }

    proptest! {
        #[test]
        fn prop_scoring_invariant(guesses in prop::collection::vec(any::<bool>(), 0..12), right in any::<bool>()) {
            let choice = if right { Hand::Right } else { Hand::Left };
            let votes: BTreeMap<PlayerId, Hand> = guesses
                .iter()
                .enumerate()
                .map(|(i, correct)| {
                    let hand = if *correct { choice } else { choice.opposite() };
                    (format!("p{i}"), hand)
                })
                .collect();

            let outcome = score_round(choice, &votes);
            let deltas = score_deltas(&outcome, "holder");

            let v = guesses.len();
            let c = guesses.iter().filter(|g| **g).count();
            prop_assert_eq!(outcome.correct_votes, c);
            prop_assert_eq!(deltas.contains_key("holder"), v == 0 || 2 * c < v);

            for (i, correct) in guesses.iter().enumerate() {
                let gained = deltas.get(&format!("p{i}")).copied().unwrap_or(0);
                prop_assert_eq!(gained, u32::from(*correct));
            }
            prop_assert!(deltas.values().all(|d| *d == 1));
        }
    }
}
