//! Headless Kaataq room host.
//!
//! Creates a room on an in-memory store, seats bots, and plays a whole game
//! with the host on autopilot while its session drives the bots.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::Error;
use config::{HostConfig, HostOverrides};
use ctrlc::set_handler;
use kaataq::{GameSession, Hand, MemoryStore, Room, RoundPhase, Store};
use log::info;
use pico_args::Arguments;
use rand::Rng;

const HELP: &str = "\
Host a Kaataq room and play one full game against bots

USAGE:
  kaataq_host [OPTIONS]

OPTIONS:
  --name         NAME    Host display name             [default: env KAATAQ_HOST_NAME or Host]
  --bots         N       Bots seated before the start  [default: env KAATAQ_BOTS or 3]
  --difficulty   TIER    easy, medium or hard          [default: env KAATAQ_BOT_DIFFICULTY or random]
  --target       SCORE   Score that ends the game      [default: env KAATAQ_TARGET_SCORE or 5]

FLAGS:
  -h, --help             Print help information

ENVIRONMENT:
  KAATAQ_MAX_ROUNDS        Round cap
  KAATAQ_VOTING_TIME_SECS  Voting window in seconds
  KAATAQ_RESULTS_PAUSE_MS  Pause on each round's results
  RUST_LOG                 Log filter (e.g., kaataq=debug)
";

/// Step the autopilot already acted on
type Step = (u32, RoundPhase);

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = HostOverrides {
        host_name: pargs.opt_value_from_str("--name")?,
        bots: pargs.opt_value_from_str("--bots")?,
        bot_difficulty: pargs.opt_value_from_str("--difficulty")?,
        target_score: pargs.opt_value_from_str("--target")?,
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();

    let config = HostConfig::from_env(overrides)?;
    config.validate()?;

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let session = GameSession::create(store, config.room.clone(), &config.host_name).await?;
    info!("Hosting room {} as {}", session.room_code(), config.host_name);

    for _ in 0..config.bots {
        let bot = session.add_bot(config.bot_difficulty).await?;
        let tier = bot
            .bot_difficulty
            .map(|d| d.to_string())
            .unwrap_or_default();
        info!("Seated {} ({})", bot.name, tier);
    }

    session.client().start_game().await?;
    let room = autopilot(&session, &config).await?;
    logging::log_standings(&room);

    session.leave().await?;
    info!("Host finished");

    Ok(())
}

/// Play the host's part until the game is finished
async fn autopilot(session: &GameSession, config: &HostConfig) -> Result<Room, Error> {
    let mut view = session.view();
    let mut acted: Option<Step> = None;

    loop {
        let room = view.borrow_and_update().clone();
        let Some(room) = room else {
            anyhow::bail!("Room {} disappeared mid-game", session.room_code());
        };

        if room.round_phase == RoundPhase::Finished {
            return Ok(room);
        }

        let step = (room.current_round, room.round_phase);
        if acted != Some(step) && take_turn(session, config, &room).await? {
            acted = Some(step);
        }

        if view.changed().await.is_err() {
            anyhow::bail!("Room {} feed closed", session.room_code());
        }
    }
}

/// Act on one snapshot; returns whether the host did something this step
async fn take_turn(session: &GameSession, config: &HostConfig, room: &Room) -> Result<bool, Error> {
    let me = session.player_id();
    let client = session.client();

    match room.round_phase {
        RoundPhase::Choosing if room.is_holder(me) => {
            client.choose_hand(random_hand()).await?;
            Ok(true)
        }
        RoundPhase::Voting if !room.is_holder(me) && !room.has_voted(me) => {
            client.cast_vote(random_hand()).await?;
            Ok(true)
        }
        RoundPhase::Results => {
            logging::log_round(room);
            tokio::time::sleep(config.results_pause).await;
            client.advance_round(room.current_round).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn random_hand() -> Hand {
    if rand::rng().random_bool(0.5) {
        Hand::Left
    } else {
        Hand::Right
    }
}
