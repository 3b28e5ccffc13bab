//! Live room session: subscription loop plus bot coordination.

use super::client::RoomClient;
use super::config::RoomConfig;
use super::errors::{RoomError, RoomResult};
use super::models::{Player, Room};
use crate::bot::{BotCoordinator, BotDifficulty, BotNamePool};
use crate::store::{Store, Subscription};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;

/// Task that turns store snapshots into room views
struct RoomWatcher {
    client: Arc<RoomClient>,
    coordinator: Arc<BotCoordinator>,
    subscription: Subscription,
    view: watch::Sender<Option<Room>>,
    shutdown: oneshot::Receiver<()>,
}

impl RoomWatcher {
    async fn run(mut self) {
        let code = self.client.room_code().to_string();
        log::debug!("Watching room {} as {}", code, self.client.player_id());

        loop {
            tokio::select! {
                _ = &mut self.shutdown => break,
                snapshot = self.subscription.recv() => match snapshot {
                    Some(Some(value)) => self.apply(value),
                    Some(None) => {
                        log::info!("Room {} no longer exists", code);
                        self.view.send_replace(None);
                        break;
                    }
                    None => {
                        log::debug!("Room {} feed closed", code);
                        break;
                    }
                },
            }
        }

        self.coordinator.cancel_all();
        if let Err(e) = self
            .client
            .store()
            .unsubscribe(self.subscription.id())
            .await
        {
            log::debug!("Room {}: unsubscribe failed: {}", code, e);
        }
    }

    fn apply(&self, value: Value) {
        match Room::from_snapshot(value) {
            Ok(room) => {
                self.coordinator.on_room_update(&room);
                self.view.send_replace(Some(room));
            }
            Err(e) => log::error!(
                "Room {}: ignoring malformed snapshot: {}",
                self.client.room_code(),
                e
            ),
        }
    }
}

/// One participant's live membership in a room.
///
/// Keeps a watch channel with the latest room snapshot and, while this
/// participant is the host, drives the room's bots. Dropping the session
/// stops the watcher and aborts every in-flight bot action.
pub struct GameSession {
    client: Arc<RoomClient>,
    coordinator: Arc<BotCoordinator>,
    names: Mutex<BotNamePool>,
    view: watch::Receiver<Option<Room>>,
    shutdown: Option<oneshot::Sender<()>>,
    watcher: Option<JoinHandle<()>>,
}

impl GameSession {
    /// Create a room and host it
    pub async fn create(
        store: Arc<dyn Store>,
        config: RoomConfig,
        host_name: &str,
    ) -> RoomResult<Self> {
        let client = RoomClient::create_room(store, config, host_name).await?;
        Self::attach(client).await
    }

    /// Join a room by code
    pub async fn join(
        store: Arc<dyn Store>,
        config: RoomConfig,
        room_code: &str,
        name: &str,
    ) -> RoomResult<Self> {
        let client = RoomClient::join_room(store, config, room_code, name).await?;
        Self::attach(client).await
    }

    /// Start watching the room `client` belongs to
    pub async fn attach(client: RoomClient) -> RoomResult<Self> {
        let client = Arc::new(client);
        let subscription = client.store().subscribe(&client.room_path()).await?;
        let coordinator = Arc::new(BotCoordinator::new(Arc::clone(&client)));
        let (view_tx, view_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let watcher = RoomWatcher {
            client: Arc::clone(&client),
            coordinator: Arc::clone(&coordinator),
            subscription,
            view: view_tx,
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(watcher.run());

        Ok(Self {
            client,
            coordinator,
            names: Mutex::new(BotNamePool::new()),
            view: view_rx,
            shutdown: Some(shutdown_tx),
            watcher: Some(handle),
        })
    }

    pub fn client(&self) -> &RoomClient {
        &self.client
    }

    pub fn coordinator(&self) -> &BotCoordinator {
        &self.coordinator
    }

    pub fn room_code(&self) -> &str {
        self.client.room_code()
    }

    pub fn player_id(&self) -> &str {
        self.client.player_id()
    }

    /// Receiver of room snapshots (`None` once the room is gone)
    pub fn view(&self) -> watch::Receiver<Option<Room>> {
        self.view.clone()
    }

    /// Latest snapshot seen
    pub fn current(&self) -> Option<Room> {
        self.view.borrow().clone()
    }

    /// Wait for the first snapshot satisfying `predicate`
    pub async fn wait_until<F>(&self, mut predicate: F) -> RoomResult<Room>
    where
        F: FnMut(&Room) -> bool,
    {
        let mut view = self.view.clone();
        loop {
            {
                let current = view.borrow_and_update();
                if let Some(room) = current.as_ref()
                    && predicate(room)
                {
                    return Ok(room.clone());
                }
            }
            if view.changed().await.is_err() {
                return Err(RoomError::RoomNotFound(self.room_code().to_string()));
            }
        }
    }

    /// Host seats a bot (random tier when `difficulty` is `None`)
    pub async fn add_bot(&self, difficulty: Option<BotDifficulty>) -> RoomResult<Player> {
        let room = self.client.fetch().await?;
        let mut names = self.names.lock().await;
        names.reserve(room.bots().iter().map(|bot| bot.name.as_str()));
        self.client.add_bot(&mut names, difficulty).await
    }

    /// Host removes a player; a bot's pending decisions are aborted first
    pub async fn remove_player(&self, player_id: &str) -> RoomResult<Player> {
        self.coordinator.cancel_bot(player_id);
        let removed = self.client.remove_player(player_id).await?;
        if removed.is_bot {
            self.names.lock().await.release(&removed.name);
        }
        Ok(removed)
    }

    /// Stop watching the room and abort all bot work
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(watcher) = self.watcher.take()
            && let Err(e) = watcher.await
        {
            log::debug!("Room {}: watcher ended abnormally: {}", self.room_code(), e);
        }
        self.coordinator.cancel_all();
    }

    /// Stop the session and leave the room
    pub async fn leave(mut self) -> RoomResult<()> {
        self.stop().await;
        self.client.leave().await
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.coordinator.cancel_all();
    }
}
