/// Integration tests for room flow scenarios
///
/// These tests drive several clients against one in-memory store and verify
/// phase transitions, scoring, history and the race-safety of transitions.
use async_trait::async_trait;
use kaataq::{
    Hand, MemoryStore, RoomClient, RoomConfig, RoomError, RoundPhase, Store, StoreError,
    WriteOutcome,
    bot::{BotDifficulty, BotNamePool},
    room::{paths, state_machine},
    store::{Fields, Guard, Snapshot, StoreResult, Subscription, SubscriptionId},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Table {
    store: Arc<MemoryStore>,
    a: RoomClient,
    b: RoomClient,
    c: RoomClient,
}

async fn three_players(config: RoomConfig) -> Table {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn Store> = store.clone();
    let a = RoomClient::create_room(shared.clone(), config.clone(), "Ann")
        .await
        .unwrap();
    let b = RoomClient::join_room(shared.clone(), config.clone(), a.room_code(), "Bea")
        .await
        .unwrap();
    let c = RoomClient::join_room(shared, config, a.room_code(), "Cy")
        .await
        .unwrap();
    Table { store, a, b, c }
}

/// A starts, hides `left`
async fn started_with_left(table: &Table) {
    assert_eq!(table.a.start_game().await.unwrap(), WriteOutcome::Applied);
    assert_eq!(
        table.a.choose_hand(Hand::Left).await.unwrap(),
        WriteOutcome::Applied
    );
}

#[tokio::test]
async fn test_split_vote_round() {
    let table = three_players(RoomConfig::default()).await;
    started_with_left(&table).await;

    table.b.cast_vote(Hand::Left).await.unwrap();
    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Voting);

    table.c.cast_vote(Hand::Right).await.unwrap();
    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Results);

    let score = |id: &str| room.player(id).unwrap().score;
    assert_eq!(score(table.a.player_id()), 0);
    assert_eq!(score(table.b.player_id()), 1);
    assert_eq!(score(table.c.player_id()), 0);

    let history = room.history();
    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.round, 1);
    assert_eq!(record.holder_id, table.a.player_id());
    assert_eq!(record.holder_name, "Ann");
    assert_eq!(record.stick_choice, Hand::Left);
    assert_eq!(record.votes.len(), 2);
    assert_eq!(record.votes[table.b.player_id()], Hand::Left);
    assert_eq!(record.votes[table.c.player_id()], Hand::Right);
    assert_eq!(record.correct_guessers.len(), 1);
    assert!(record.correct_guessers.contains(table.b.player_id()));
}

#[tokio::test]
async fn test_zero_votes_award_holder_on_expiry() {
    let table = three_players(RoomConfig::default()).await;
    started_with_left(&table).await;

    assert_eq!(
        table.a.expire_voting(1).await.unwrap(),
        WriteOutcome::Applied
    );

    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Results);
    assert_eq!(room.player(table.a.player_id()).unwrap().score, 1);
    assert!(room.history()[0].votes.is_empty());
}

#[tokio::test]
async fn test_closing_twice_scores_once() {
    let table = three_players(RoomConfig::default()).await;
    started_with_left(&table).await;
    table.b.cast_vote(Hand::Left).await.unwrap();
    table.c.cast_vote(Hand::Left).await.unwrap();

    // Timer and last voter racing to close the same round
    assert_eq!(table.a.expire_voting(1).await.unwrap(), WriteOutcome::Stale);
    assert_eq!(
        table.b.close_voting_if_complete(1).await.unwrap(),
        WriteOutcome::Stale
    );

    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.game_history.len(), 1);
    assert_eq!(room.player(table.b.player_id()).unwrap().score, 1);
    assert_eq!(room.player(table.c.player_id()).unwrap().score, 1);
    assert_eq!(room.player(table.a.player_id()).unwrap().score, 0);
}

#[tokio::test]
async fn test_concurrent_advance_moves_one_round() {
    let table = three_players(RoomConfig::default()).await;
    started_with_left(&table).await;
    table.a.expire_voting(1).await.unwrap();

    let (first, second) = tokio::join!(table.b.advance_round(1), table.c.advance_round(1));
    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(
        outcomes.iter().filter(|o| **o == WriteOutcome::Applied).count(),
        1
    );

    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.current_round, 2);
    assert_eq!(room.round_phase, RoundPhase::Choosing);
    assert_eq!(room.holder().unwrap().id, table.b.player_id());
    assert!(room.votes.is_empty());
    assert!(room.stick_choice.is_none());
}

#[tokio::test]
async fn test_history_indexed_by_round() {
    let table = three_players(RoomConfig::default()).await;
    table.a.start_game().await.unwrap();

    let clients = [&table.a, &table.b, &table.c];
    for round in 1..=3u32 {
        let room = table.a.fetch().await.unwrap();
        let holder = room.holder().unwrap().id.clone();
        let holder_client = clients.iter().find(|c| c.player_id() == holder).unwrap();
        holder_client.choose_hand(Hand::Right).await.unwrap();
        table.a.expire_voting(round).await.unwrap();
        table.a.advance_round(round).await.unwrap();
    }

    let room = table.a.fetch().await.unwrap();
    let history = room.history();
    assert_eq!(history.len(), 3);
    for (i, record) in history.iter().enumerate() {
        assert_eq!(record.round, i as u32 + 1);
    }
    assert_eq!(history[1].holder_id, table.b.player_id());
    assert_eq!(history[2].holder_id, table.c.player_id());
}

#[tokio::test]
async fn test_target_score_finishes_game() {
    let table = three_players(RoomConfig::default()).await;
    table
        .store
        .write_field(
            &format!(
                "{}/{}",
                table.a.room_path(),
                paths::player_score(table.b.player_id())
            ),
            json!(4),
        )
        .await
        .unwrap();

    started_with_left(&table).await;
    table.b.cast_vote(Hand::Left).await.unwrap();
    table.c.cast_vote(Hand::Right).await.unwrap();

    assert_eq!(
        table.c.advance_round(1).await.unwrap(),
        WriteOutcome::Applied
    );
    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Finished);
    assert!(room.game_ended);
    let winner = room.winner.unwrap();
    assert_eq!(winner.id, table.b.player_id());
    assert_eq!(winner.score, 5);
}

#[tokio::test]
async fn test_round_cap_finishes_game() {
    let config = RoomConfig {
        max_rounds: 2,
        ..Default::default()
    };
    let table = three_players(config).await;
    started_with_left(&table).await;
    table.a.expire_voting(1).await.unwrap();
    table.a.advance_round(1).await.unwrap();

    table.b.choose_hand(Hand::Right).await.unwrap();
    table.b.expire_voting(2).await.unwrap();
    table.b.advance_round(2).await.unwrap();

    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Finished);
    assert_eq!(room.current_round, 2);
}

#[tokio::test]
async fn test_reset_keeps_roster() {
    let config = RoomConfig {
        max_rounds: 1,
        ..Default::default()
    };
    let table = three_players(config).await;
    started_with_left(&table).await;
    table.a.expire_voting(1).await.unwrap();
    table.a.advance_round(1).await.unwrap();

    assert!(matches!(
        table.b.reset_game().await,
        Err(RoomError::NotHost)
    ));
    assert_eq!(table.a.reset_game().await.unwrap(), WriteOutcome::Applied);

    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Waiting);
    assert!(!room.game_started);
    assert_eq!(room.player_count(), 3);
    assert!(room.players.values().all(|p| p.score == 0));
    assert!(room.game_history.is_empty());
    assert!(room.winner.is_none());

    // And it can be played again
    assert_eq!(table.a.start_game().await.unwrap(), WriteOutcome::Applied);
}

#[tokio::test]
async fn test_validation_errors_write_nothing() {
    let table = three_players(RoomConfig::default()).await;

    assert!(matches!(table.b.start_game().await, Err(RoomError::NotHost)));
    started_with_left(&table).await;
    let before = table.a.fetch().await.unwrap();

    assert!(matches!(
        table.a.cast_vote(Hand::Left).await,
        Err(RoomError::HolderCannotVote)
    ));
    assert!(matches!(
        table.b.choose_hand(Hand::Right).await,
        Err(RoomError::NotHolder)
    ));
    assert!(matches!(
        table.b.advance_round(1).await,
        Err(RoomError::InvalidPhase { .. })
    ));

    assert_eq!(table.a.fetch().await.unwrap(), before);
}

#[tokio::test]
async fn test_duplicate_start_is_stale() {
    let table = three_players(RoomConfig::default()).await;
    assert_eq!(table.a.start_game().await.unwrap(), WriteOutcome::Applied);
    assert_eq!(table.a.start_game().await.unwrap(), WriteOutcome::Stale);
}

#[tokio::test]
async fn test_join_rejections() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let config = RoomConfig {
        max_players: 2,
        ..Default::default()
    };
    let host = RoomClient::create_room(store.clone(), config.clone(), "Ann")
        .await
        .unwrap();

    assert!(matches!(
        RoomClient::join_room(store.clone(), config.clone(), host.room_code(), "   ").await,
        Err(RoomError::InvalidName)
    ));
    assert!(matches!(
        RoomClient::join_room(store.clone(), config.clone(), "0000", "Bea").await,
        Err(RoomError::RoomNotFound(_))
    ));

    RoomClient::join_room(store.clone(), config.clone(), host.room_code(), "Bea")
        .await
        .unwrap();
    assert!(matches!(
        RoomClient::join_room(store.clone(), config.clone(), host.room_code(), "Cy").await,
        Err(RoomError::RoomFull { max: 2 })
    ));

    host.start_game().await.unwrap();
    let roomy = RoomConfig::default();
    assert!(matches!(
        RoomClient::join_room(store, roomy, host.room_code(), "Cy").await,
        Err(RoomError::GameAlreadyInProgress)
    ));
}

#[tokio::test]
async fn test_not_enough_players() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let host = RoomClient::create_room(store, RoomConfig::default(), "Ann")
        .await
        .unwrap();
    assert!(matches!(
        host.start_game().await,
        Err(RoomError::NotEnoughPlayers { min: 2 })
    ));
}

#[tokio::test]
async fn test_host_leave_transfers_host() {
    let table = three_players(RoomConfig::default()).await;
    table.a.leave().await.unwrap();

    let room = table.b.fetch().await.unwrap();
    assert_eq!(room.host, table.b.player_id());
    assert!(room.player(table.b.player_id()).unwrap().is_host);
    assert!(room.player(table.a.player_id()).is_none());
    assert_eq!(room.player_count(), 2);

    // The new host can start the game
    assert_eq!(table.b.start_game().await.unwrap(), WriteOutcome::Applied);
}

#[tokio::test]
async fn test_last_human_leaving_dissolves_room() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let host = RoomClient::create_room(store.clone(), RoomConfig::default(), "Ann")
        .await
        .unwrap();
    let mut names = BotNamePool::with_seed(1);
    host.add_bot(&mut names, Some(BotDifficulty::Medium))
        .await
        .unwrap();

    host.leave().await.unwrap();
    assert!(store.read(&host.room_path()).await.unwrap().is_none());
    assert!(matches!(host.fetch().await, Err(RoomError::RoomNotFound(_))));
}

#[tokio::test]
async fn test_add_bot_host_only_and_before_start() {
    let table = three_players(RoomConfig::default()).await;
    let mut names = BotNamePool::with_seed(2);

    assert!(matches!(
        table.b.add_bot(&mut names, None).await,
        Err(RoomError::NotHost)
    ));
    assert_eq!(names.in_use_count(), 0);

    let bot = table.a.add_bot(&mut names, None).await.unwrap();
    assert!(bot.is_bot);
    assert!(bot.name.starts_with("🤖 "));
    assert_eq!(bot.seat, 3);
    assert!(bot.bot_personality.is_some());

    table.a.start_game().await.unwrap();
    assert!(matches!(
        table.a.add_bot(&mut names, Some(BotDifficulty::Easy)).await,
        Err(RoomError::GameAlreadyInProgress)
    ));
}

#[tokio::test]
async fn test_bot_writes_rejected_for_non_host() {
    let table = three_players(RoomConfig::default()).await;
    let mut names = BotNamePool::with_seed(3);
    let bot = table.a.add_bot(&mut names, Some(BotDifficulty::Hard)).await.unwrap();
    started_with_left(&table).await;

    // Only the host may write on behalf of bots
    assert_eq!(
        table.b.submit_bot_vote(&bot.id, 1, Hand::Left).await.unwrap(),
        WriteOutcome::Stale
    );
    assert!(!table.a.fetch().await.unwrap().has_voted(&bot.id));

    assert_eq!(
        table.a.submit_bot_vote(&bot.id, 1, Hand::Left).await.unwrap(),
        WriteOutcome::Applied
    );
    // Decided for a round that is no longer current
    assert_eq!(
        table.a.submit_bot_vote(&bot.id, 0, Hand::Right).await.unwrap(),
        WriteOutcome::Stale
    );
}

#[tokio::test]
async fn test_kick_removes_player_and_vote() {
    let table = three_players(RoomConfig::default()).await;
    started_with_left(&table).await;
    table.c.cast_vote(Hand::Right).await.unwrap();

    let removed = table.a.remove_player(table.c.player_id()).await.unwrap();
    assert_eq!(removed.name, "Cy");
    assert!(matches!(
        table.a.remove_player(table.a.player_id()).await,
        Err(RoomError::CannotRemoveSelf)
    ));

    let room = table.a.fetch().await.unwrap();
    assert!(room.player(table.c.player_id()).is_none());
    assert!(!room.has_voted(table.c.player_id()));
    assert_eq!(room.holder().unwrap().id, table.a.player_id());

    // B is now the only voter
    table.b.cast_vote(Hand::Left).await.unwrap();
    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Results);
}

#[tokio::test]
async fn test_disconnected_store_surfaces_error() {
    let table = three_players(RoomConfig::default()).await;
    table.store.set_online(false);

    let err = table.a.start_game().await.unwrap_err();
    assert!(matches!(err, RoomError::Store(StoreError::Disconnected)));
    assert!(!err.is_validation());

    table.store.set_online(true);
    assert_eq!(table.a.start_game().await.unwrap(), WriteOutcome::Applied);
}

#[tokio::test]
async fn test_reset_after_leave_drops_departed_player() {
    let config = RoomConfig {
        max_rounds: 1,
        ..Default::default()
    };
    let table = three_players(config).await;
    started_with_left(&table).await;
    table.a.expire_voting(1).await.unwrap();
    table.a.advance_round(1).await.unwrap();

    // Cy leaves between A planning the reset and writing it
    let room = table.a.fetch().await.unwrap();
    let update = state_machine::plan_reset(&room, table.a.player_id()).unwrap();
    table.c.leave().await.unwrap();
    assert!(
        !table
            .store
            .update_if(&table.a.room_path(), &update.guards, update.fields)
            .await
            .unwrap()
    );

    let room = table.a.fetch().await.unwrap();
    assert!(room.player(table.c.player_id()).is_none());
    assert_eq!(room.round_phase, RoundPhase::Finished);

    assert_eq!(table.a.reset_game().await.unwrap(), WriteOutcome::Applied);
    let room = table.a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Waiting);
    assert_eq!(room.player_count(), 2);
    assert!(room.player(table.c.player_id()).is_none());
}

#[tokio::test]
async fn test_start_after_leave_needs_enough_players() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let a = RoomClient::create_room(store.clone(), RoomConfig::default(), "Ann")
        .await
        .unwrap();
    let b = RoomClient::join_room(store.clone(), RoomConfig::default(), a.room_code(), "Bea")
        .await
        .unwrap();

    // Bea leaves between A planning the start and writing it
    let room = a.fetch().await.unwrap();
    let update = state_machine::plan_start(&room, a.player_id(), a.config()).unwrap();
    b.leave().await.unwrap();
    assert!(
        !store
            .update_if(&a.room_path(), &update.guards, update.fields)
            .await
            .unwrap()
    );

    assert!(matches!(
        a.start_game().await,
        Err(RoomError::NotEnoughPlayers { min: 2 })
    ));
    let room = a.fetch().await.unwrap();
    assert!(!room.game_started);
    assert_eq!(room.round_phase, RoundPhase::Waiting);
}

#[tokio::test]
async fn test_holder_leaving_results_keeps_rotation() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let config = RoomConfig::default();
    let a = RoomClient::create_room(store.clone(), config.clone(), "Ann")
        .await
        .unwrap();
    let mut others = Vec::new();
    for name in ["Bea", "Cy", "Dot"] {
        others.push(
            RoomClient::join_room(store.clone(), config.clone(), a.room_code(), name)
                .await
                .unwrap(),
        );
    }
    let (b, c) = (&others[0], &others[1]);

    a.start_game().await.unwrap();
    a.choose_hand(Hand::Left).await.unwrap();
    a.expire_voting(1).await.unwrap();
    a.advance_round(1).await.unwrap();

    // Round 2 belongs to Bea; she leaves while its results are showing
    b.choose_hand(Hand::Right).await.unwrap();
    a.expire_voting(2).await.unwrap();
    b.leave().await.unwrap();

    assert_eq!(a.advance_round(2).await.unwrap(), WriteOutcome::Applied);
    let room = a.fetch().await.unwrap();
    assert_eq!(room.holder().unwrap().id, c.player_id());
}

/// Store whose guarded writes start failing once a budget runs out
struct FlakyStore {
    inner: MemoryStore,
    updates_left: AtomicUsize,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            updates_left: AtomicUsize::new(usize::MAX),
        }
    }

    fn allow_updates(&self, n: usize) {
        self.updates_left.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn create(&self, path: &str, document: Value) -> StoreResult<()> {
        self.inner.create(path, document).await
    }

    async fn read(&self, path: &str) -> StoreResult<Snapshot> {
        self.inner.read(path).await
    }

    async fn write_field(&self, path: &str, value: Value) -> StoreResult<()> {
        self.inner.write_field(path, value).await
    }

    async fn write_fields(&self, path: &str, fields: Fields) -> StoreResult<()> {
        self.inner.write_fields(path, fields).await
    }

    async fn update_if(&self, path: &str, guards: &[Guard], fields: Fields) -> StoreResult<bool> {
        let budget = self
            .updates_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if budget.is_err() {
            return Err(StoreError::Disconnected);
        }
        self.inner.update_if(path, guards, fields).await
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.inner.remove(path).await
    }

    async fn subscribe(&self, path: &str) -> StoreResult<Subscription> {
        self.inner.subscribe(path).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()> {
        self.inner.unsubscribe(id).await
    }
}

#[tokio::test]
async fn test_vote_stands_when_closing_fails() {
    let flaky = Arc::new(FlakyStore::new());
    let store: Arc<dyn Store> = flaky.clone();
    let a = RoomClient::create_room(store.clone(), RoomConfig::default(), "Ann")
        .await
        .unwrap();
    let b = RoomClient::join_room(store, RoomConfig::default(), a.room_code(), "Bea")
        .await
        .unwrap();
    a.start_game().await.unwrap();
    a.choose_hand(Hand::Left).await.unwrap();

    // The vote lands; the follow-up close hits a dropped connection
    flaky.allow_updates(1);
    assert_eq!(b.cast_vote(Hand::Left).await.unwrap(), WriteOutcome::Applied);

    flaky.allow_updates(usize::MAX);
    let room = a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Voting);
    assert!(room.has_voted(b.player_id()));

    assert_eq!(
        a.close_voting_if_complete(1).await.unwrap(),
        WriteOutcome::Applied
    );
    let room = a.fetch().await.unwrap();
    assert_eq!(room.round_phase, RoundPhase::Results);
    assert_eq!(room.player(b.player_id()).unwrap().score, 1);
}
