//! Key paths of the room document, relative to `rooms/{roomCode}`.

pub const ROOMS: &str = "rooms";

pub const HOST: &str = "host";
pub const GAME_STARTED: &str = "gameStarted";
pub const GAME_ENDED: &str = "gameEnded";
pub const CURRENT_ROUND: &str = "currentRound";
pub const CURRENT_HOLDER_INDEX: &str = "currentHolderIndex";
pub const ROUND_PHASE: &str = "roundPhase";
pub const STICK_CHOICE: &str = "stickChoice";
pub const WINNER: &str = "winner";
pub const PLAYERS: &str = "players";
pub const VOTES: &str = "votes";
pub const GAME_HISTORY: &str = "gameHistory";

/// Absolute path of a room document
pub fn room(code: &str) -> String {
    format!("{ROOMS}/{code}")
}

pub fn player(id: &str) -> String {
    format!("{PLAYERS}/{id}")
}

pub fn player_id(id: &str) -> String {
    format!("{PLAYERS}/{id}/id")
}

pub fn player_score(id: &str) -> String {
    format!("{PLAYERS}/{id}/score")
}

pub fn player_is_host(id: &str) -> String {
    format!("{PLAYERS}/{id}/isHost")
}

pub fn vote(id: &str) -> String {
    format!("{VOTES}/{id}")
}

/// Round N lives at history position N - 1
pub fn history_entry(round: u32) -> String {
    format!("{GAME_HISTORY}/{}", round.saturating_sub(1))
}
