//! # Kaataq
//!
//! Shared game-room state machine and bot players for Kaataq, a party game
//! where one player hides a stick in one hand and everyone else votes on
//! which hand holds it.
//!
//! Every participant reads and writes one shared room document through a
//! key-path [`Store`](store::Store). There is no game server: transitions are
//! planned locally and written with compare-and-set guards, so concurrent
//! clients (including the host acting for bots) cannot corrupt the room.
//!
//! ## Round lifecycle
//!
//! - **Waiting**: players join, the host adds bots and starts the game
//! - **Choosing**: the holder hides the stick in the left or right hand
//! - **Voting**: everyone else guesses; closes when all voted or on timeout
//! - **Results**: scores are updated and the round is recorded
//! - **Finished**: a player reached the target score or the round cap hit
//!
//! ## Core Modules
//!
//! - [`store`]: store contract and the in-memory implementation
//! - [`room`]: room document, state machine, scoring, client and session
//! - [`bot`]: bot personalities, decisions, names and the host-side coordinator
//!
//! ## Example
//!
//! ```no_run
//! use kaataq::{GameSession, MemoryStore, RoomConfig};
//! use kaataq::bot::BotDifficulty;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kaataq::RoomError> {
//!     let store = Arc::new(MemoryStore::new());
//!     let session = GameSession::create(store, RoomConfig::default(), "Ann").await?;
//!     session.add_bot(Some(BotDifficulty::Hard)).await?;
//!     session.client().start_game().await?;
//!     println!("Room {} started", session.room_code());
//!     Ok(())
//! }
//! ```

/// Bot players: personalities, decisions and coordination.
pub mod bot;

/// Game room document, rules and operations.
pub mod room;

/// Key-path document store.
pub mod store;

pub use room::{
    GameSession, Hand, Player, Room, RoomClient, RoomConfig, RoomError, RoundPhase, WriteOutcome,
};
pub use store::{MemoryStore, Store, StoreError};
