//! Room operations against the shared store.
//!
//! A [`RoomClient`] is one participant's handle on one room. Each operation
//! reads a fresh snapshot, plans the mutation with the state machine and
//! submits it as a guarded write. When the guard fails because another
//! client wrote first, the operation re-reads and re-plans; if the room has
//! moved past the intended step the result is [`WriteOutcome::Stale`].

use super::config::RoomConfig;
use super::errors::{RoomError, RoomResult, WriteOutcome};
use super::ids;
use super::models::{Hand, Player, PlayerId, Room, RoomCode};
use super::paths;
use super::state_machine::{self as sm, CloseReason, LeavePlan, RoomUpdate};
use crate::bot::{BotDifficulty, BotNamePool};
use crate::store::{Fields, Guard, Store, StoreError};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Attempts per operation before a contended write gives up as stale
const MAX_WRITE_ATTEMPTS: usize = 5;

/// One participant's handle on a room
#[derive(Clone)]
pub struct RoomClient {
    store: Arc<dyn Store>,
    config: RoomConfig,
    room_code: RoomCode,
    player_id: PlayerId,
}

impl std::fmt::Debug for RoomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomClient")
            .field("room_code", &self.room_code)
            .field("player_id", &self.player_id)
            .finish()
    }
}

fn validated_name(name: &str) -> RoomResult<String> {
    let name = name.trim();
    if name.is_empty() {
        Err(RoomError::InvalidName)
    } else {
        Ok(name.to_string())
    }
}

impl RoomClient {
    /// Handle for an existing membership
    pub fn new(
        store: Arc<dyn Store>,
        config: RoomConfig,
        room_code: impl Into<RoomCode>,
        player_id: impl Into<PlayerId>,
    ) -> Self {
        Self {
            store,
            config,
            room_code: room_code.into(),
            player_id: player_id.into(),
        }
    }

    /// Create a room with `host_name` as its host.
    ///
    /// Codes already in use are skipped; after `room_code_attempts`
    /// collisions creation fails with [`RoomError::CodeSpaceExhausted`].
    pub async fn create_room(
        store: Arc<dyn Store>,
        config: RoomConfig,
        host_name: &str,
    ) -> RoomResult<Self> {
        let name = validated_name(host_name)?;
        let host_id = ids::player_id();

        for attempt in 1..=config.room_code_attempts {
            let code = ids::room_code();
            let host = Player::human(host_id.clone(), name.clone(), 0);
            let room = Room::new(code.clone(), host, Utc::now());
            let document = serde_json::to_value(&room)?;

            match store.create(&paths::room(&code), document).await {
                Ok(()) => {
                    log::info!("Room {} created by {} ({})", code, name, host_id);
                    return Ok(Self::new(store, config, code, host_id));
                }
                Err(StoreError::AlreadyExists(_)) => {
                    log::debug!("Room code {} taken (attempt {})", code, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RoomError::CodeSpaceExhausted {
            attempts: config.room_code_attempts,
        })
    }

    /// Join an existing room as a human player
    pub async fn join_room(
        store: Arc<dyn Store>,
        config: RoomConfig,
        room_code: &str,
        name: &str,
    ) -> RoomResult<Self> {
        let name = validated_name(name)?;
        let client = Self::new(store, config, room_code.trim(), ids::player_id());

        let mut player = None;
        let outcome = client
            .apply_with(|room| {
                let joining =
                    Player::human(client.player_id.clone(), name.clone(), room.next_seat());
                let update = sm::plan_join(room, &joining, &client.config);
                player = Some(joining);
                update
            })
            .await?;

        match (outcome, player) {
            (WriteOutcome::Applied, Some(player)) => {
                log::info!(
                    "{} ({}) joined room {} in seat {}",
                    player.name, player.id, client.room_code, player.seat
                );
                Ok(client)
            }
            _ => Err(RoomError::Contended),
        }
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Absolute store path of the room document
    pub fn room_path(&self) -> String {
        paths::room(&self.room_code)
    }

    /// Read the current room snapshot
    pub async fn fetch(&self) -> RoomResult<Room> {
        match self.store.read(&self.room_path()).await? {
            Some(value) => Ok(Room::from_snapshot(value)?),
            None => Err(RoomError::RoomNotFound(self.room_code.clone())),
        }
    }

    async fn submit(&self, update: RoomUpdate) -> RoomResult<bool> {
        Ok(self
            .store
            .update_if(&self.room_path(), &update.guards, update.fields)
            .await?)
    }

    /// Plan against a fresh snapshot and write; re-plan when a guard fails
    async fn apply_with<F>(&self, mut plan: F) -> RoomResult<WriteOutcome>
    where
        F: FnMut(&Room) -> RoomResult<RoomUpdate> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let room = self.fetch().await?;
            let update = match plan(&room) {
                Ok(update) => update,
                Err(RoomError::Superseded) => return Ok(WriteOutcome::Stale),
                Err(e) => return Err(e),
            };

            if self.submit(update).await? {
                return Ok(WriteOutcome::Applied);
            }
            log::debug!(
                "Room {}: guarded write lost a race (attempt {})",
                self.room_code, attempt
            );
        }

        Ok(WriteOutcome::Stale)
    }

    /// Like [`apply_with`](Self::apply_with), but any validation failure is
    /// a stale decision rather than an error
    async fn apply_decision<F>(&self, what: &str, plan: F) -> RoomResult<WriteOutcome>
    where
        F: FnMut(&Room) -> RoomResult<RoomUpdate> + Send,
    {
        match self.apply_with(plan).await {
            Err(e) if e.is_validation() => {
                log::debug!("Room {}: discarded stale {}: {}", self.room_code, what, e);
                Ok(WriteOutcome::Stale)
            }
            other => other,
        }
    }

    /// Host starts the game
    pub async fn start_game(&self) -> RoomResult<WriteOutcome> {
        let outcome = self
            .apply_with(|room| sm::plan_start(room, &self.player_id, &self.config))
            .await?;
        if outcome.is_applied() {
            log::info!("Room {}: game started", self.room_code);
        }
        Ok(outcome)
    }

    /// Current holder hides the stick
    pub async fn choose_hand(&self, hand: Hand) -> RoomResult<WriteOutcome> {
        self.apply_with(|room| sm::plan_conceal(room, &self.player_id, hand))
            .await
    }

    /// Cast a vote; closes voting when it was the last one missing
    pub async fn cast_vote(&self, hand: Hand) -> RoomResult<WriteOutcome> {
        let mut round = None;
        let outcome = self
            .apply_with(|room| {
                round = Some(room.current_round);
                sm::plan_vote(room, &self.player_id, hand)
            })
            .await?;

        // The vote stands even if closing fails; the host's timer closes later
        if let (WriteOutcome::Applied, Some(round)) = (outcome, round)
            && let Err(e) = self.close_voting_if_complete(round).await
        {
            log::warn!(
                "Room {}: vote recorded but closing round {} failed: {}",
                self.room_code, round, e
            );
        }
        Ok(outcome)
    }

    /// Close voting for `round` if every voter has voted
    pub async fn close_voting_if_complete(&self, round: u32) -> RoomResult<WriteOutcome> {
        let outcome = self
            .apply_with(|room| {
                sm::plan_close_voting(room, round, CloseReason::AllVoted, Utc::now())
            })
            .await;

        match outcome {
            Err(RoomError::VotingStillOpen) => Ok(WriteOutcome::Stale),
            Ok(WriteOutcome::Applied) => {
                log::info!("Room {}: round {} closed (all votes in)", self.room_code, round);
                Ok(WriteOutcome::Applied)
            }
            other => other,
        }
    }

    /// Close voting for `round` because its timer ran out
    pub async fn expire_voting(&self, round: u32) -> RoomResult<WriteOutcome> {
        let outcome = self
            .apply_with(|room| {
                sm::plan_close_voting(room, round, CloseReason::TimerExpired, Utc::now())
            })
            .await?;
        if outcome.is_applied() {
            log::info!("Room {}: round {} closed (timer expired)", self.room_code, round);
        }
        Ok(outcome)
    }

    /// Leave the results of `round` for the next round (or the end)
    pub async fn advance_round(&self, round: u32) -> RoomResult<WriteOutcome> {
        let mut finished = false;
        let outcome = self
            .apply_with(|room| {
                finished = sm::game_over(room, &self.config);
                sm::plan_advance(room, &self.player_id, round, &self.config)
            })
            .await?;

        if outcome.is_applied() && finished {
            log::info!("Room {}: game finished after round {}", self.room_code, round);
        }
        Ok(outcome)
    }

    /// Host resets a finished game
    pub async fn reset_game(&self) -> RoomResult<WriteOutcome> {
        let outcome = self
            .apply_with(|room| sm::plan_reset(room, &self.player_id))
            .await?;
        if outcome.is_applied() {
            log::info!("Room {}: game reset", self.room_code);
        }
        Ok(outcome)
    }

    /// Host seats a bot; a random tier is used when none is given
    pub async fn add_bot(
        &self,
        names: &mut BotNamePool,
        difficulty: Option<BotDifficulty>,
    ) -> RoomResult<Player> {
        let difficulty = difficulty.unwrap_or_else(|| BotDifficulty::random(&mut rand::rng()));
        let name = BotNamePool::display_name(&names.allocate());
        let bot_id = ids::bot_id();

        let mut bot = None;
        let result = self
            .apply_with(|room| {
                let seated =
                    Player::bot(bot_id.clone(), name.clone(), room.next_seat(), difficulty);
                let update = sm::plan_add_bot(room, &self.player_id, &seated, &self.config);
                bot = Some(seated);
                update
            })
            .await;

        match (result, bot) {
            (Ok(WriteOutcome::Applied), Some(bot)) => {
                log::info!(
                    "Room {}: added {} bot {} ({})",
                    self.room_code, difficulty, bot.name, bot.id
                );
                Ok(bot)
            }
            (Ok(_), _) => {
                names.release(&name);
                Err(RoomError::Contended)
            }
            (Err(e), _) => {
                names.release(&name);
                Err(e)
            }
        }
    }

    /// Host removes another player; returns who was removed
    pub async fn remove_player(&self, target: &str) -> RoomResult<Player> {
        let mut removed = None;
        let outcome = self
            .apply_with(|room| {
                removed = room.player(target).cloned();
                sm::plan_remove_player(room, &self.player_id, target, &self.config)
            })
            .await?;

        match (outcome, removed) {
            (WriteOutcome::Applied, Some(player)) => {
                log::info!(
                    "Room {}: removed {} ({})",
                    self.room_code, player.name, player.id
                );
                Ok(player)
            }
            _ => Err(RoomError::Contended),
        }
    }

    /// Leave the room; the last human leaving dissolves it
    pub async fn leave(&self) -> RoomResult<()> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let room = match self.fetch().await {
                Ok(room) => room,
                Err(RoomError::RoomNotFound(_)) => return Ok(()),
                Err(e) => return Err(e),
            };

            match sm::plan_leave(&room, &self.player_id, &self.config) {
                Ok(LeavePlan::Dissolve) => {
                    if self.dissolve(&room).await? {
                        log::info!("Room {} dissolved", self.room_code);
                        return Ok(());
                    }
                    log::debug!(
                        "Room {}: roster changed before dissolving (attempt {})",
                        self.room_code, attempt
                    );
                }
                Ok(LeavePlan::Update(update)) => {
                    if self.submit(update).await? {
                        log::info!("{} left room {}", self.player_id, self.room_code);
                        return Ok(());
                    }
                    log::debug!(
                        "Room {}: leave lost a race (attempt {})",
                        self.room_code, attempt
                    );
                }
                Err(RoomError::PlayerNotFound(_)) => return Ok(()),
                Err(e) => return Err(e),
            }
        }

        Err(RoomError::Contended)
    }

    /// Delete the room iff its roster and host still match `room`
    async fn dissolve(&self, room: &Room) -> RoomResult<bool> {
        let code = &self.room_code;
        let guards = [
            Guard::eq(
                format!("{code}/{}", paths::PLAYERS),
                serde_json::to_value(&room.players)?,
            ),
            Guard::eq(format!("{code}/{}", paths::HOST), room.host.as_str()),
        ];
        let mut fields = Fields::new();
        fields.insert(code.clone(), Value::Null);
        Ok(self.store.update_if(paths::ROOMS, &guards, fields).await?)
    }

    /// Write a bot holder's concealment decided for `round`
    pub async fn submit_bot_concealment(
        &self,
        bot_id: &str,
        round: u32,
        hand: Hand,
    ) -> RoomResult<WriteOutcome> {
        self.apply_decision("concealment", |room| {
            sm::plan_bot_conceal(room, &self.player_id, bot_id, round, hand)
        })
        .await
    }

    /// Write a bot's vote decided for `round`
    pub async fn submit_bot_vote(
        &self,
        bot_id: &str,
        round: u32,
        hand: Hand,
    ) -> RoomResult<WriteOutcome> {
        self.apply_decision("vote", |room| {
            sm::plan_bot_vote(room, &self.player_id, bot_id, round, hand)
        })
        .await
    }
}
