//! Host-side driver for bot players.
//!
//! Only the client whose player id is the room's `host` acts for bots; on
//! every other client the coordinator stays idle. Each room notification
//! prunes decisions that no longer apply and schedules the missing ones:
//! - `choosing`: one concealment task for a bot holder
//! - `voting`: one vote task per bot voter, the voting timer, and the close
//!   once every voter has voted
//!
//! At most one task exists per [`PendingAction`]. Tasks are tagged with the
//! round they were scheduled for and aborted as soon as that round, phase or
//! bot is gone, so a late decision can never be written.

use super::decision::{BotDecisionContext, BotDecisionMaker};
use crate::room::client::RoomClient;
use crate::room::errors::WriteOutcome;
use crate::room::models::{PlayerId, Room, RoundPhase};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::AbortHandle;

/// Work the coordinator can have in flight
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingAction {
    /// A bot holder deciding where to hide the stick
    Conceal(PlayerId),
    /// A bot deciding its vote
    Vote(PlayerId),
    /// Closing a round whose votes are all in
    CloseVoting,
    /// Voting deadline
    VotingTimer,
}

struct PendingTask {
    round: u32,
    handle: AbortHandle,
}

type PendingMap = HashMap<PendingAction, PendingTask>;

/// Bot action coordinator for one room client
pub struct BotCoordinator {
    /// Room handle used for every write
    client: Arc<RoomClient>,

    /// In-flight tasks
    pending: Arc<Mutex<PendingMap>>,
}

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Whether a task scheduled for `round` still matches the room
fn still_relevant(room: &Room, action: &PendingAction, round: u32) -> bool {
    if room.current_round != round || !room.is_active() {
        return false;
    }

    match action {
        PendingAction::Conceal(bot_id) => {
            room.round_phase == RoundPhase::Choosing
                && room.stick_choice.is_none()
                && room.is_holder(bot_id)
        }
        PendingAction::Vote(bot_id) => {
            room.round_phase == RoundPhase::Voting
                && room.player(bot_id).is_some()
                && !room.is_holder(bot_id)
        }
        PendingAction::CloseVoting | PendingAction::VotingTimer => {
            room.round_phase == RoundPhase::Voting
        }
    }
}

impl BotCoordinator {
    /// Create a coordinator acting through `client`
    pub fn new(client: Arc<RoomClient>) -> Self {
        Self {
            client,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// React to a room snapshot
    pub fn on_room_update(&self, room: &Room) {
        if !room.is_host(self.client.player_id()) || !room.is_active() {
            self.cancel_all();
            return;
        }

        let mut pending = lock(&self.pending);
        pending.retain(|action, task| {
            let keep = still_relevant(room, action, task.round);
            if !keep {
                task.handle.abort();
                log::debug!(
                    "Room {}: dropped pending {:?} from round {}",
                    room.room_code,
                    action,
                    task.round
                );
            }
            keep
        });

        match room.round_phase {
            RoundPhase::Choosing => self.schedule_concealment(&mut pending, room),
            RoundPhase::Voting => {
                self.schedule_voting_timer(&mut pending, room);
                self.schedule_votes(&mut pending, room);
                if room.all_votes_in() {
                    self.schedule_close(&mut pending, room);
                }
            }
            RoundPhase::Waiting | RoundPhase::Results | RoundPhase::Finished => {}
        }
    }

    /// Abort everything pending for one bot (removal)
    pub fn cancel_bot(&self, bot_id: &str) {
        let mut pending = lock(&self.pending);
        for action in [
            PendingAction::Conceal(bot_id.to_string()),
            PendingAction::Vote(bot_id.to_string()),
        ] {
            if let Some(task) = pending.remove(&action) {
                task.handle.abort();
                log::debug!("Cancelled pending {:?}", action);
            }
        }
    }

    /// Abort every pending task (room left or host role lost)
    pub fn cancel_all(&self) {
        let mut pending = lock(&self.pending);
        for (_, task) in pending.drain() {
            task.handle.abort();
        }
    }

    /// Number of tasks in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_pending(&self, action: &PendingAction) -> bool {
        lock(&self.pending).contains_key(action)
    }

    /// Spawn `task` unless `action` is already in flight
    fn spawn<F>(&self, pending: &mut PendingMap, action: PendingAction, round: u32, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if pending.contains_key(&action) {
            return;
        }

        let registry = Arc::clone(&self.pending);
        let key = action.clone();
        let handle = tokio::spawn(async move {
            task.await;
            let mut pending = lock(&registry);
            if pending.get(&key).is_some_and(|t| t.round == round) {
                pending.remove(&key);
            }
        });

        pending.insert(
            action,
            PendingTask {
                round,
                handle: handle.abort_handle(),
            },
        );
    }

    fn schedule_concealment(&self, pending: &mut PendingMap, room: &Room) {
        let Some(holder) = room.holder() else {
            return;
        };
        if room.stick_choice.is_some() {
            return;
        }
        let Some((difficulty, personality)) = holder.bot_profile() else {
            return;
        };

        let client = Arc::clone(&self.client);
        let bot_id = holder.id.clone();
        let round = room.current_round;
        let history = room.history();

        self.spawn(pending, PendingAction::Conceal(bot_id.clone()), round, async move {
            let no_votes = BTreeMap::new();
            let ctx = BotDecisionContext {
                holder_id: &bot_id,
                history: &history,
                current_votes: &no_votes,
            };
            let hand = BotDecisionMaker::new()
                .decide_concealment(&personality, difficulty, ctx)
                .await;

            match client.submit_bot_concealment(&bot_id, round, hand).await {
                Ok(WriteOutcome::Applied) => log::debug!(
                    "Room {}: bot {} hid the stick for round {}",
                    client.room_code(),
                    bot_id,
                    round
                ),
                Ok(WriteOutcome::Stale) => {}
                Err(e) => log::warn!(
                    "Room {}: concealment for bot {} failed: {}",
                    client.room_code(),
                    bot_id,
                    e
                ),
            }
        });
    }

    fn schedule_votes(&self, pending: &mut PendingMap, room: &Room) {
        let Some(holder) = room.holder() else {
            return;
        };
        let round = room.current_round;
        let history = Arc::new(room.history());
        let votes = Arc::new(room.votes.clone());

        for bot in room.bots() {
            if bot.id == holder.id || room.has_voted(&bot.id) {
                continue;
            }
            let Some((difficulty, personality)) = bot.bot_profile() else {
                continue;
            };

            let client = Arc::clone(&self.client);
            let bot_id = bot.id.clone();
            let holder_id = holder.id.clone();
            let history = Arc::clone(&history);
            let votes = Arc::clone(&votes);

            self.spawn(pending, PendingAction::Vote(bot_id.clone()), round, async move {
                let ctx = BotDecisionContext {
                    holder_id: &holder_id,
                    history: &history,
                    current_votes: &votes,
                };
                let hand = BotDecisionMaker::new()
                    .decide_guess(&personality, difficulty, ctx)
                    .await;

                match client.submit_bot_vote(&bot_id, round, hand).await {
                    Ok(WriteOutcome::Applied) => log::debug!(
                        "Room {}: bot {} voted {} in round {}",
                        client.room_code(),
                        bot_id,
                        hand,
                        round
                    ),
                    Ok(WriteOutcome::Stale) => {}
                    Err(e) => log::warn!(
                        "Room {}: vote for bot {} failed: {}",
                        client.room_code(),
                        bot_id,
                        e
                    ),
                }
            });
        }
    }

    fn schedule_voting_timer(&self, pending: &mut PendingMap, room: &Room) {
        let client = Arc::clone(&self.client);
        let round = room.current_round;
        let voting_time = client.config().voting_time();

        self.spawn(pending, PendingAction::VotingTimer, round, async move {
            tokio::time::sleep(voting_time).await;
            if let Err(e) = client.expire_voting(round).await {
                log::warn!(
                    "Room {}: closing expired round {} failed: {}",
                    client.room_code(),
                    round,
                    e
                );
            }
        });
    }

    fn schedule_close(&self, pending: &mut PendingMap, room: &Room) {
        let client = Arc::clone(&self.client);
        let round = room.current_round;

        self.spawn(pending, PendingAction::CloseVoting, round, async move {
            if let Err(e) = client.close_voting_if_complete(round).await {
                log::warn!(
                    "Room {}: closing round {} failed: {}",
                    client.room_code(),
                    round,
                    e
                );
            }
        });
    }
}

impl Drop for BotCoordinator {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
