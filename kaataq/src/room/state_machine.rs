//! Room state machine.
//!
//! Every legal mutation of a room is planned here from a snapshot, without
//! touching the store. A plan is a [`RoomUpdate`]: the sub-path writes plus
//! the guards that must still hold when the write lands. Clients submit the
//! plan through [`Store::update_if`](crate::store::Store::update_if), so two
//! observers racing to perform the same transition cannot both succeed.
//!
//! Phase flow:
//!
//! ```text
//! waiting -> choosing -> voting -> results -> choosing (next round)
//!                                          -> finished -> waiting (reset)
//! ```
//!
//! Planners return [`RoomError::Superseded`] when the room has already moved
//! past the step the caller aimed at; callers treat that as a lost race.

use super::config::RoomConfig;
use super::errors::{RoomError, RoomResult};
use super::models::{Hand, Player, PlayerId, Room, RoundPhase, Winner};
use super::paths::{
    self, CURRENT_HOLDER_INDEX, CURRENT_ROUND, GAME_ENDED, GAME_HISTORY, GAME_STARTED, HOST,
    PLAYERS, ROUND_PHASE, STICK_CHOICE, VOTES, WINNER,
};
use super::scoring;
use crate::store::{Fields, Guard};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Guarded partial update of one room document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomUpdate {
    pub guards: Vec<Guard>,
    pub fields: Fields,
}

impl RoomUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to still hold `value`
    pub fn expect(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.guards.push(Guard::eq(field, value));
        self
    }

    /// Require `field` to be absent
    pub fn expect_absent(&mut self, field: impl Into<String>) -> &mut Self {
        self.guards.push(Guard::absent(field));
        self
    }

    /// Require the roster to be exactly what the snapshot shows
    pub fn expect_roster(&mut self, room: &Room) -> RoomResult<&mut Self> {
        let roster = serde_json::to_value(&room.players)?;
        Ok(self.expect(PLAYERS, roster))
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn set_serialized<T: Serialize>(
        &mut self,
        field: impl Into<String>,
        value: &T,
    ) -> RoomResult<&mut Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.set(field, value))
    }

    /// Remove `field`
    pub fn clear(&mut self, field: impl Into<String>) -> &mut Self {
        self.set(field, Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Guarded phase move; rejects anything outside the phase flow
    fn move_phase(&mut self, room: &Room, next: RoundPhase) -> RoomResult<&mut Self> {
        if !room.round_phase.can_transition_to(next) {
            return Err(RoomError::InvalidTransition {
                from: room.round_phase,
                to: next,
            });
        }
        Ok(self
            .expect(ROUND_PHASE, room.round_phase)
            .set(ROUND_PHASE, next))
    }

    fn finish(&mut self, winner: Option<&Player>) -> RoomResult<&mut Self> {
        self.set(GAME_ENDED, true)
            .set(ROUND_PHASE, RoundPhase::Finished);
        match winner {
            Some(player) => self.set_serialized(
                WINNER,
                &Winner {
                    id: player.id.clone(),
                    name: player.name.clone(),
                    score: player.score,
                },
            ),
            None => Ok(self.clear(WINNER)),
        }
    }
}

/// What a departing player's request turns into
#[derive(Debug, Clone, PartialEq)]
pub enum LeavePlan {
    /// Remove the player (and transfer the host role if needed)
    Update(RoomUpdate),
    /// Last human left; delete the room
    Dissolve,
}

/// Why voting is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    AllVoted,
    TimerExpired,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::AllVoted => write!(f, "all votes in"),
            CloseReason::TimerExpired => write!(f, "timer expired"),
        }
    }
}

fn require_host(room: &Room, actor: &str) -> RoomResult<()> {
    if room.is_host(actor) {
        Ok(())
    } else {
        Err(RoomError::NotHost)
    }
}

fn require_active(room: &Room) -> RoomResult<()> {
    if room.is_active() {
        Ok(())
    } else {
        Err(RoomError::GameNotStarted)
    }
}

fn require_phase(room: &Room, expected: RoundPhase) -> RoomResult<()> {
    if room.round_phase == expected {
        Ok(())
    } else {
        Err(RoomError::InvalidPhase {
            expected,
            actual: room.round_phase,
        })
    }
}

fn require_round(room: &Room, round: u32) -> RoomResult<()> {
    if room.current_round == round {
        Ok(())
    } else {
        Err(RoomError::Superseded)
    }
}

fn require_bot<'a>(room: &'a Room, bot_id: &str) -> RoomResult<&'a Player> {
    let bot = room
        .player(bot_id)
        .ok_or_else(|| RoomError::PlayerNotFound(bot_id.to_string()))?;
    if bot.is_bot {
        Ok(bot)
    } else {
        Err(RoomError::NotABot(bot_id.to_string()))
    }
}

fn require_human<'a>(room: &'a Room, id: &str) -> RoomResult<&'a Player> {
    let player = room
        .player(id)
        .ok_or_else(|| RoomError::PlayerNotFound(id.to_string()))?;
    if player.is_bot {
        Err(RoomError::BotNotAllowed)
    } else {
        Ok(player)
    }
}

fn holder(room: &Room) -> RoomResult<&Player> {
    room.holder()
        .ok_or_else(|| RoomError::Inconsistent("active room has no players".to_string()))
}

fn ensure_capacity(room: &Room, config: &RoomConfig) -> RoomResult<()> {
    if room.player_count() >= config.max_players {
        Err(RoomError::RoomFull {
            max: config.max_players,
        })
    } else {
        Ok(())
    }
}

/// Seat a new human player
pub fn plan_join(room: &Room, player: &Player, config: &RoomConfig) -> RoomResult<RoomUpdate> {
    if player.name.trim().is_empty() {
        return Err(RoomError::InvalidName);
    }
    if room.players.contains_key(&player.id) {
        return Err(RoomError::Superseded);
    }
    if room.game_started {
        return Err(RoomError::GameAlreadyInProgress);
    }
    ensure_capacity(room, config)?;

    let mut update = RoomUpdate::new();
    update.expect(GAME_STARTED, false).expect_roster(room)?;
    update.set_serialized(paths::player(&player.id), player)?;
    Ok(update)
}

/// Seat a bot; host only, before the game starts
pub fn plan_add_bot(
    room: &Room,
    actor: &str,
    bot: &Player,
    config: &RoomConfig,
) -> RoomResult<RoomUpdate> {
    require_host(room, actor)?;
    if room.game_started || room.round_phase != RoundPhase::Waiting {
        return Err(RoomError::GameAlreadyInProgress);
    }
    ensure_capacity(room, config)?;

    let mut update = RoomUpdate::new();
    update
        .expect(HOST, actor)
        .expect(GAME_STARTED, false)
        .expect_roster(room)?;
    update.set_serialized(paths::player(&bot.id), bot)?;
    Ok(update)
}

/// Drop `target` from the roster, keeping the holder rotation consistent.
///
/// Mid-game departures shift the holder index so the same player keeps the
/// stick. If the holder itself leaves during choosing or voting, the next
/// player restarts the round's concealment; during results the index steps
/// back one seat so the next advance reaches that player. If too few players
/// remain the game ends straight from the current phase.
fn removal_update(room: &Room, target: &str, config: &RoomConfig) -> RoomResult<RoomUpdate> {
    let mut update = RoomUpdate::new();
    update.expect_roster(room)?;
    update.clear(paths::player(target)).clear(paths::vote(target));

    if !room.is_active() {
        return Ok(update);
    }

    let order = room.ordered_players();
    let Some(position) = order.iter().position(|p| p.id == target) else {
        return Err(RoomError::PlayerNotFound(target.to_string()));
    };
    let current = room.current_holder_index % order.len();
    let remaining = order.len() - 1;

    if remaining < config.min_players {
        let winner = room.standings().into_iter().find(|p| p.id != target);
        update.expect(ROUND_PHASE, room.round_phase);
        update.finish(winner)?;
        return Ok(update);
    }

    let holder_leaving = position == current;
    let next_index = if position < current {
        current - 1
    } else if holder_leaving && room.round_phase == RoundPhase::Results {
        // Land on the player before the next holder so the advance reaches them
        (current + remaining - 1) % remaining
    } else {
        current % remaining
    };
    update
        .expect(CURRENT_HOLDER_INDEX, room.current_holder_index)
        .set(CURRENT_HOLDER_INDEX, next_index);

    if holder_leaving && matches!(room.round_phase, RoundPhase::Choosing | RoundPhase::Voting)
    {
        update
            .expect(ROUND_PHASE, room.round_phase)
            .set(ROUND_PHASE, RoundPhase::Choosing)
            .clear(STICK_CHOICE)
            .clear(VOTES);
    }

    Ok(update)
}

/// Host removes another player (human or bot)
pub fn plan_remove_player(
    room: &Room,
    actor: &str,
    target: &str,
    config: &RoomConfig,
) -> RoomResult<RoomUpdate> {
    require_host(room, actor)?;
    if actor == target {
        return Err(RoomError::CannotRemoveSelf);
    }
    if room.player(target).is_none() {
        return Err(RoomError::PlayerNotFound(target.to_string()));
    }

    let mut update = removal_update(room, target, config)?;
    update.expect(HOST, actor);
    Ok(update)
}

/// A player leaves; the host role moves to the lowest-seated remaining human
pub fn plan_leave(room: &Room, actor: &str, config: &RoomConfig) -> RoomResult<LeavePlan> {
    if room.player(actor).is_none() {
        return Err(RoomError::PlayerNotFound(actor.to_string()));
    }

    if !room.is_host(actor) {
        return Ok(LeavePlan::Update(removal_update(room, actor, config)?));
    }

    let Some(successor) = room.humans().into_iter().find(|p| p.id != actor) else {
        return Ok(LeavePlan::Dissolve);
    };

    let mut update = removal_update(room, actor, config)?;
    update
        .expect(HOST, actor)
        .set(HOST, successor.id.as_str())
        .set(paths::player_is_host(&successor.id), true);
    Ok(LeavePlan::Update(update))
}

/// Host starts the game: `waiting -> choosing`
pub fn plan_start(room: &Room, actor: &str, config: &RoomConfig) -> RoomResult<RoomUpdate> {
    require_host(room, actor)?;
    if room.is_active() {
        return Err(RoomError::Superseded);
    }
    require_phase(room, RoundPhase::Waiting)?;

    let count = room.player_count();
    if count < config.min_players {
        return Err(RoomError::NotEnoughPlayers {
            min: config.min_players,
        });
    }
    if count > config.max_players {
        return Err(RoomError::TooManyPlayers {
            max: config.max_players,
        });
    }

    let mut update = RoomUpdate::new();
    update.move_phase(room, RoundPhase::Choosing)?;
    update
        .expect(HOST, actor)
        .expect(GAME_STARTED, false)
        .expect_roster(room)?
        .set(GAME_STARTED, true)
        .set(GAME_ENDED, false)
        .set(CURRENT_ROUND, 1u32)
        .set(CURRENT_HOLDER_INDEX, 0usize)
        .clear(STICK_CHOICE)
        .clear(VOTES)
        .clear(WINNER);
    Ok(update)
}

fn concealment_update(room: &Room, hand: Hand) -> RoomResult<RoomUpdate> {
    if room.stick_choice.is_some() {
        return Err(RoomError::AlreadyChosen);
    }
    require_phase(room, RoundPhase::Choosing)?;

    let mut update = RoomUpdate::new();
    update.move_phase(room, RoundPhase::Voting)?;
    update
        .expect(CURRENT_ROUND, room.current_round)
        .expect(CURRENT_HOLDER_INDEX, room.current_holder_index)
        .expect_absent(STICK_CHOICE)
        .set(STICK_CHOICE, hand)
        .clear(VOTES);
    Ok(update)
}

/// Human holder hides the stick: `choosing -> voting`
pub fn plan_conceal(room: &Room, actor: &str, hand: Hand) -> RoomResult<RoomUpdate> {
    require_active(room)?;
    require_human(room, actor)?;
    if holder(room)?.id != actor {
        return Err(RoomError::NotHolder);
    }
    concealment_update(room, hand)
}

/// Host writes a bot holder's concealment for `round`
pub fn plan_bot_conceal(
    room: &Room,
    host: &str,
    bot_id: &str,
    round: u32,
    hand: Hand,
) -> RoomResult<RoomUpdate> {
    require_host(room, host)?;
    require_round(room, round)?;
    require_active(room)?;
    require_bot(room, bot_id)?;
    if holder(room)?.id != bot_id {
        return Err(RoomError::NotHolder);
    }

    let mut update = concealment_update(room, hand)?;
    update.expect(HOST, host);
    Ok(update)
}

fn vote_update(room: &Room, voter: &str, hand: Hand) -> RoomResult<RoomUpdate> {
    require_phase(room, RoundPhase::Voting)?;
    if holder(room)?.id == voter {
        return Err(RoomError::HolderCannotVote);
    }
    if room.has_voted(voter) {
        return Err(RoomError::AlreadyVoted);
    }

    let mut update = RoomUpdate::new();
    update
        .expect(ROUND_PHASE, RoundPhase::Voting)
        .expect(CURRENT_ROUND, room.current_round)
        .expect(CURRENT_HOLDER_INDEX, room.current_holder_index)
        .expect(paths::player_id(voter), voter)
        .expect_absent(paths::vote(voter))
        .set(paths::vote(voter), hand);
    Ok(update)
}

/// Human non-holder casts a vote
pub fn plan_vote(room: &Room, voter: &str, hand: Hand) -> RoomResult<RoomUpdate> {
    require_active(room)?;
    require_human(room, voter)?;
    vote_update(room, voter, hand)
}

/// Host writes a bot's vote for `round`
pub fn plan_bot_vote(
    room: &Room,
    host: &str,
    bot_id: &str,
    round: u32,
    hand: Hand,
) -> RoomResult<RoomUpdate> {
    require_host(room, host)?;
    require_round(room, round)?;
    require_active(room)?;
    require_bot(room, bot_id)?;

    let mut update = vote_update(room, bot_id, hand)?;
    update.expect(HOST, host);
    Ok(update)
}

/// Close voting for `round` and score it: `voting -> results`.
///
/// The write is conditional on the votes being exactly those scored and on
/// the history slot being empty, so the round is scored at most once.
pub fn plan_close_voting(
    room: &Room,
    round: u32,
    reason: CloseReason,
    now: DateTime<Utc>,
) -> RoomResult<RoomUpdate> {
    if room.progress() > (round, RoundPhase::Voting.ordinal()) || room.game_ended {
        return Err(RoomError::Superseded);
    }
    require_active(room)?;
    require_round(room, round)?;
    require_phase(room, RoundPhase::Voting)?;
    if reason == CloseReason::AllVoted && !room.all_votes_in() {
        return Err(RoomError::VotingStillOpen);
    }

    let choice = room
        .stick_choice
        .ok_or_else(|| RoomError::Inconsistent("voting without a hidden hand".to_string()))?;
    let holder = holder(room)?;
    let votes = room.counted_votes();
    let outcome = scoring::score_round(choice, &votes);
    let record = scoring::round_record(round, holder, choice, votes, &outcome, now);

    let mut update = RoomUpdate::new();
    update.move_phase(room, RoundPhase::Results)?;
    update
        .expect(CURRENT_ROUND, round)
        .expect(CURRENT_HOLDER_INDEX, room.current_holder_index)
        .expect(STICK_CHOICE, choice)
        .expect(VOTES, serde_json::to_value(&room.votes)?)
        .expect_absent(paths::history_entry(round));

    for (id, delta) in scoring::score_deltas(&outcome, &holder.id) {
        if let Some(player) = room.player(&id) {
            update
                .expect(paths::player_score(&id), player.score)
                .set(paths::player_score(&id), player.score + delta);
        }
    }

    update.set_serialized(paths::history_entry(round), &record)?;
    Ok(update)
}

/// Whether the game ends after the results of the current round
pub fn game_over(room: &Room, config: &RoomConfig) -> bool {
    room.max_score() >= config.target_score || room.current_round >= config.max_rounds
}

/// Human advances from `results` to the next round or to `finished`
pub fn plan_advance(
    room: &Room,
    actor: &str,
    round: u32,
    config: &RoomConfig,
) -> RoomResult<RoomUpdate> {
    if room.progress() > (round, RoundPhase::Results.ordinal()) {
        return Err(RoomError::Superseded);
    }
    require_human(room, actor)?;
    require_active(room)?;
    require_round(room, round)?;
    require_phase(room, RoundPhase::Results)?;

    let mut update = RoomUpdate::new();
    update.expect(CURRENT_ROUND, round);

    if game_over(room, config) {
        update.move_phase(room, RoundPhase::Finished)?;
        update.finish(room.standings().first().copied())?;
        return Ok(update);
    }

    let count = room.player_count();
    let next_index = (room.current_holder_index % count + 1) % count;
    update.move_phase(room, RoundPhase::Choosing)?;
    update
        .expect(CURRENT_HOLDER_INDEX, room.current_holder_index)
        .set(CURRENT_ROUND, round + 1)
        .set(CURRENT_HOLDER_INDEX, next_index)
        .clear(STICK_CHOICE)
        .clear(VOTES);
    Ok(update)
}

/// Host resets a finished game back to `waiting`, keeping the roster
pub fn plan_reset(room: &Room, actor: &str) -> RoomResult<RoomUpdate> {
    require_host(room, actor)?;
    if room.round_phase == RoundPhase::Waiting && !room.game_started {
        return Err(RoomError::Superseded);
    }
    require_phase(room, RoundPhase::Finished)?;

    let mut update = RoomUpdate::new();
    update.move_phase(room, RoundPhase::Waiting)?;
    // Scores are written per player; a departed player must not reappear
    update
        .expect(HOST, actor)
        .expect_roster(room)?
        .set(GAME_STARTED, false)
        .set(GAME_ENDED, false)
        .set(CURRENT_ROUND, 1u32)
        .set(CURRENT_HOLDER_INDEX, 0usize)
        .clear(STICK_CHOICE)
        .clear(VOTES)
        .clear(GAME_HISTORY)
        .clear(WINNER);

    let ids: Vec<&PlayerId> = room.players.keys().collect();
    for id in ids {
        update.set(paths::player_score(id), 0u32);
    }
    Ok(update)
}
