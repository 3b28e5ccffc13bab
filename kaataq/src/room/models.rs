//! Room document models.
//!
//! These types mirror the JSON layout stored under `rooms/{roomCode}`. Field
//! names are camelCase on the wire; collections are keyed maps because the
//! store addresses every entry by path.

use crate::bot::{BotDifficulty, BotPersonality};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opaque player or bot identifier
pub type PlayerId = String;

/// Four-digit shareable room code
pub type RoomCode = String;

/// Player colors, assigned by seat
pub const PLAYER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
];

/// Color for the player sitting in `seat`
pub fn color_for_seat(seat: u32) -> &'static str {
    PLAYER_COLORS[seat as usize % PLAYER_COLORS.len()]
}

/// Which hand holds the wee stick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn opposite(self) -> Self {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Hand> for Value {
    fn from(hand: Hand) -> Self {
        Value::String(hand.as_str().to_string())
    }
}

/// Position within a round's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    #[default]
    Waiting,
    Choosing,
    Voting,
    Results,
    Finished,
}

impl RoundPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundPhase::Waiting => "waiting",
            RoundPhase::Choosing => "choosing",
            RoundPhase::Voting => "voting",
            RoundPhase::Results => "results",
            RoundPhase::Finished => "finished",
        }
    }

    /// Position within a single round, used to tell whether a room has
    /// already moved past a given step
    pub fn ordinal(self) -> u8 {
        match self {
            RoundPhase::Waiting => 0,
            RoundPhase::Choosing => 1,
            RoundPhase::Voting => 2,
            RoundPhase::Results => 3,
            RoundPhase::Finished => 4,
        }
    }

    /// Whether `next` directly follows `self`
    ///
    /// Round flow only. A departure that leaves fewer than the minimum
    /// players finishes the game from choosing or voting without passing
    /// through results; that write guards the observed phase instead.
    pub fn can_transition_to(self, next: RoundPhase) -> bool {
        matches!(
            (self, next),
            (RoundPhase::Waiting, RoundPhase::Choosing)
                | (RoundPhase::Choosing, RoundPhase::Voting)
                | (RoundPhase::Voting, RoundPhase::Results)
                | (RoundPhase::Results, RoundPhase::Choosing)
                | (RoundPhase::Results, RoundPhase::Finished)
                | (RoundPhase::Finished, RoundPhase::Waiting)
        )
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RoundPhase> for Value {
    fn from(phase: RoundPhase) -> Self {
        Value::String(phase.as_str().to_string())
    }
}

/// A human or bot participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub score: u32,
    pub color: String,
    /// Join sequence; defines the stable player ordering
    #[serde(default)]
    pub seat: u32,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_difficulty: Option<BotDifficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_personality: Option<BotPersonality>,
}

impl Player {
    pub fn human(id: impl Into<PlayerId>, name: impl Into<String>, seat: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
            color: color_for_seat(seat).to_string(),
            seat,
            is_host: false,
            is_bot: false,
            bot_difficulty: None,
            bot_personality: None,
        }
    }

    pub fn bot(
        id: impl Into<PlayerId>,
        name: impl Into<String>,
        seat: u32,
        difficulty: BotDifficulty,
    ) -> Self {
        Self {
            is_bot: true,
            bot_difficulty: Some(difficulty),
            bot_personality: Some(BotPersonality::from_difficulty(difficulty)),
            ..Self::human(id, name, seat)
        }
    }

    /// Difficulty and personality of a bot.
    ///
    /// Documents written without a stored personality fall back to the
    /// profile derived from the tier, and an unknown tier to easy.
    pub fn bot_profile(&self) -> Option<(BotDifficulty, BotPersonality)> {
        if !self.is_bot {
            return None;
        }
        let difficulty = self.bot_difficulty.unwrap_or(BotDifficulty::Easy);
        let personality = self
            .bot_personality
            .unwrap_or_else(|| BotPersonality::from_difficulty(difficulty));
        Some((difficulty, personality))
    }
}

/// Immutable record of a completed round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub round: u32,
    pub holder_id: PlayerId,
    pub holder_name: String,
    pub stick_choice: Hand,
    #[serde(default)]
    pub votes: BTreeMap<PlayerId, Hand>,
    #[serde(default)]
    pub correct_guessers: BTreeSet<PlayerId>,
    pub completed_at: DateTime<Utc>,
}

/// Final winner summary, written when the game finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
}

/// Left/right split of a vote map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub left: usize,
    pub right: usize,
}

impl VoteTally {
    pub fn from_votes<'a>(votes: impl IntoIterator<Item = &'a Hand>) -> Self {
        votes.into_iter().fold(Self::default(), |mut tally, hand| {
            match hand {
                Hand::Left => tally.left += 1,
                Hand::Right => tally.right += 1,
            }
            tally
        })
    }

    pub fn total(&self) -> usize {
        self.left + self.right
    }

    /// The hand with strictly more votes
    pub fn leader(&self) -> Option<Hand> {
        match self.left.cmp(&self.right) {
            std::cmp::Ordering::Greater => Some(Hand::Left),
            std::cmp::Ordering::Less => Some(Hand::Right),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// One game room, as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_code: RoomCode,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    pub host: PlayerId,
    #[serde(default)]
    pub game_started: bool,
    #[serde(default)]
    pub game_ended: bool,
    #[serde(default = "first_round")]
    pub current_round: u32,
    #[serde(default)]
    pub current_holder_index: usize,
    #[serde(default)]
    pub round_phase: RoundPhase,
    #[serde(default)]
    pub stick_choice: Option<Hand>,
    #[serde(default)]
    pub players: BTreeMap<PlayerId, Player>,
    #[serde(default)]
    pub votes: BTreeMap<PlayerId, Hand>,
    #[serde(default)]
    pub game_history: BTreeMap<u32, RoundRecord>,
    #[serde(default)]
    pub winner: Option<Winner>,
}

fn first_round() -> u32 {
    1
}

impl Room {
    /// Fresh room in the waiting phase with `host` as its only player
    pub fn new(room_code: impl Into<RoomCode>, mut host: Player, created_at: DateTime<Utc>) -> Self {
        host.is_host = true;
        let mut players = BTreeMap::new();
        let host_id = host.id.clone();
        players.insert(host_id.clone(), host);

        Self {
            room_code: room_code.into(),
            created_at,
            host: host_id,
            game_started: false,
            game_ended: false,
            current_round: 1,
            current_holder_index: 0,
            round_phase: RoundPhase::Waiting,
            stick_choice: None,
            players,
            votes: BTreeMap::new(),
            game_history: BTreeMap::new(),
            winner: None,
        }
    }

    /// Decode a store snapshot
    pub fn from_snapshot(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host == id
    }

    /// Game started and not yet finished
    pub fn is_active(&self) -> bool {
        self.game_started && !self.game_ended
    }

    /// Players in seat order (ties broken by id)
    pub fn ordered_players(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| a.seat.cmp(&b.seat).then_with(|| a.id.cmp(&b.id)));
        players
    }

    /// Position of `id` in the stable ordering
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.ordered_players().iter().position(|p| p.id == id)
    }

    /// Seat for the next player to join
    pub fn next_seat(&self) -> u32 {
        self.players
            .values()
            .map(|p| p.seat + 1)
            .max()
            .unwrap_or(0)
    }

    /// Current holder, resolved modulo the player count
    pub fn holder(&self) -> Option<&Player> {
        let players = self.ordered_players();
        if players.is_empty() {
            return None;
        }
        Some(players[self.current_holder_index % players.len()])
    }

    pub fn is_holder(&self, id: &str) -> bool {
        self.holder().is_some_and(|p| p.id == id)
    }

    /// Everyone expected to vote this round
    pub fn voters(&self) -> Vec<&Player> {
        let holder_id = self.holder().map(|p| p.id.as_str());
        self.ordered_players()
            .into_iter()
            .filter(|p| Some(p.id.as_str()) != holder_id)
            .collect()
    }

    pub fn has_voted(&self, id: &str) -> bool {
        self.votes.contains_key(id)
    }

    /// Every present non-holder has a vote recorded
    pub fn all_votes_in(&self) -> bool {
        self.voters().iter().all(|p| self.has_voted(&p.id))
    }

    /// Votes cast by players still in the room
    pub fn counted_votes(&self) -> BTreeMap<PlayerId, Hand> {
        self.votes
            .iter()
            .filter(|(id, _)| self.players.contains_key(*id))
            .map(|(id, hand)| (id.clone(), *hand))
            .collect()
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally::from_votes(self.votes.values())
    }

    /// Completed rounds, oldest first
    pub fn history(&self) -> Vec<RoundRecord> {
        self.game_history.values().cloned().collect()
    }

    /// Players by score (highest first), then seat
    pub fn standings(&self) -> Vec<&Player> {
        let mut players = self.ordered_players();
        players.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.seat.cmp(&b.seat)));
        players
    }

    pub fn max_score(&self) -> u32 {
        self.players.values().map(|p| p.score).max().unwrap_or(0)
    }

    pub fn bots(&self) -> Vec<&Player> {
        self.ordered_players().into_iter().filter(|p| p.is_bot).collect()
    }

    pub fn humans(&self) -> Vec<&Player> {
        self.ordered_players().into_iter().filter(|p| !p.is_bot).collect()
    }

    /// `(round, phase)` progress marker; later steps compare greater
    pub fn progress(&self) -> (u32, u8) {
        (self.current_round, self.round_phase.ordinal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three_player_room() -> Room {
        let mut room = Room::new("4821", Player::human("a", "Ann", 0), Utc::now());
        room.players.insert("c".into(), Player::human("c", "Cy", 2));
        room.players.insert("b".into(), Player::human("b", "Bea", 1));
        room
    }

    #[test]
    fn test_ordering_uses_seat() {
        let room = three_player_room();
        let ids: Vec<&str> = room.ordered_players().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(room.next_seat(), 3);
    }

    #[test]
    fn test_holder_wraps_modulo_player_count() {
        let mut room = three_player_room();
        room.current_holder_index = 4;
        assert_eq!(room.holder().unwrap().id, "b");

        let voters: Vec<&str> = room.voters().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(voters, vec!["a", "c"]);
    }

    #[test]
    fn test_all_votes_in() {
        let mut room = three_player_room();
        assert!(!room.all_votes_in());
        room.votes.insert("b".into(), Hand::Left);
        assert!(!room.all_votes_in());
        room.votes.insert("c".into(), Hand::Right);
        assert!(room.all_votes_in());
    }

    #[test]
    fn test_standings_break_ties_by_seat() {
        let mut room = three_player_room();
        room.players.get_mut("c").unwrap().score = 2;
        room.players.get_mut("a").unwrap().score = 2;
        let ids: Vec<&str> = room.standings().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(room.max_score(), 2);
    }

    #[test]
    fn test_phase_transitions_never_skip() {
        use RoundPhase::*;
        assert!(Waiting.can_transition_to(Choosing));
        assert!(Results.can_transition_to(Finished));
        assert!(Finished.can_transition_to(Waiting));
        assert!(!Waiting.can_transition_to(Voting));
        assert!(!Choosing.can_transition_to(Results));
        assert!(!Voting.can_transition_to(Choosing));
    }

    #[test]
    fn test_decodes_sparse_document() {
        // Empty collections are pruned by the store
        let room = Room::from_snapshot(json!({
            "roomCode": "1234",
            "host": "a",
            "gameStarted": true,
            "currentRound": 2,
            "currentHolderIndex": 1,
            "roundPhase": "voting",
            "stickChoice": "left",
            "players": {
                "a": {"id": "a", "name": "Ann", "color": "#FF6B6B", "isHost": true},
                "bot_1": {"id": "bot_1", "name": "🤖 Eve", "color": "#4ECDC4", "seat": 1,
                          "isBot": true, "botDifficulty": "hard"}
            }
        }))
        .unwrap();

        assert_eq!(room.round_phase, RoundPhase::Voting);
        assert_eq!(room.stick_choice, Some(Hand::Left));
        assert!(room.votes.is_empty());
        assert!(room.game_history.is_empty());

        let (difficulty, personality) = room.player("bot_1").unwrap().bot_profile().unwrap();
        assert_eq!(difficulty, BotDifficulty::Hard);
        assert_eq!(personality, BotPersonality::hard());
    }

    #[test]
    fn test_wire_field_names() {
        let room = three_player_room();
        let value = serde_json::to_value(&room).unwrap();
        assert_eq!(value["roundPhase"], "waiting");
        assert_eq!(value["currentHolderIndex"], 0);
        assert_eq!(value["players"]["a"]["isHost"], true);
        assert!(value["players"]["a"].get("botDifficulty").is_none());
    }

    #[test]
    fn test_vote_tally_leader() {
        let tally = VoteTally::from_votes(&[Hand::Left, Hand::Right, Hand::Left]);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.leader(), Some(Hand::Left));
        assert_eq!(VoteTally::default().leader(), None);
    }
}
