//! Game room: shared document, state machine, and client operations.
//!
//! A room lives in the store under `rooms/{roomCode}` and is the single
//! source of truth for every participant. Clients never keep a private
//! mutable copy; they read snapshots, plan a transition with
//! [`state_machine`], and write it back with a compare-and-set so racing
//! clients cannot double-advance a round or double-score it.

pub mod client;
pub mod config;
pub mod errors;
pub mod ids;
pub mod models;
pub mod paths;
pub mod scoring;
pub mod session;
pub mod state_machine;

pub use client::RoomClient;
pub use config::RoomConfig;
pub use errors::{RoomError, RoomResult, WriteOutcome};
pub use models::{Hand, Player, PlayerId, Room, RoomCode, RoundPhase, RoundRecord, Winner};
pub use session::GameSession;
pub use state_machine::{CloseReason, LeavePlan, RoomUpdate};
