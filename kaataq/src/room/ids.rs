//! Room code and player identifier generation.

use super::models::{PlayerId, RoomCode};
use rand::Rng;
use uuid::Uuid;

/// Random four-digit room code (1000..=9999)
pub fn room_code() -> RoomCode {
    room_code_with(&mut rand::rng())
}

pub fn room_code_with<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    rng.random_range(1000..=9999u32).to_string()
}

/// Opaque human player identifier
pub fn player_id() -> PlayerId {
    format!("player_{}", short_token())
}

/// Opaque bot identifier
pub fn bot_id() -> PlayerId {
    format!("bot_{}", short_token())
}

fn short_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(9);
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    #[test]
    fn test_room_code_is_four_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let code = room_code_with(&mut rng);
            assert_eq!(code.len(), 4);
            let n: u32 = code.parse().unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_identifiers_are_prefixed_and_unique() {
        let ids: HashSet<PlayerId> = (0..200).map(|_| player_id()).collect();
        assert_eq!(ids.len(), 200);
        assert!(ids.iter().all(|id| id.starts_with("player_") && id.len() == 16));

        let bot = bot_id();
        assert!(bot.starts_with("bot_"));
        assert_eq!(bot.len(), 13);
    }
}
