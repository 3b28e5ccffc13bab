//! Structured logging setup.
//!
//! The library logs through the `log` facade; the subscriber installed here
//! picks those records up alongside native `tracing` events.

use kaataq::Room;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info`.
///
/// # Example
///
/// ```no_run
/// kaataq_host::logging::init();
/// tracing::info!("Host starting");
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Logging initialized");
}

/// Log one finished round with structured fields
pub fn log_round(room: &Room) {
    let history = room.history();
    let Some(record) = history.last() else {
        return;
    };

    tracing::info!(
        room = %room.room_code,
        round = record.round,
        holder = %record.holder_name,
        hidden = %record.stick_choice,
        votes = record.votes.len(),
        correct = record.correct_guessers.len(),
        "Round finished"
    );
}

/// Log the final standings, highest score first
pub fn log_standings(room: &Room) {
    if let Some(winner) = &room.winner {
        tracing::info!(
            room = %room.room_code,
            winner = %winner.name,
            score = winner.score,
            "Game over"
        );
    }

    for (place, player) in room.standings().iter().enumerate() {
        tracing::info!(
            place = place + 1,
            name = %player.name,
            score = player.score,
            bot = player.is_bot,
            "Standing"
        );
    }
}
