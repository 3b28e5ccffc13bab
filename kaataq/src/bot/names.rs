//! Bot display-name allocation.
//!
//! Names are drawn from a fixed pool without replacement. The in-use set
//! belongs to one [`BotNamePool`] (one per hosting session), so unrelated
//! rooms never compete for names.

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use std::collections::HashSet;

/// Names handed out before falling back to synthetic ones
pub const BOT_NAMES: [&str; 12] = [
    "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry", "Iris", "Jack", "Kate",
    "Liam",
];

/// Decorative prefix shown in front of bot names
pub const BOT_MARKER: &str = "🤖 ";

/// Upper bound of the numeric suffix tried for synthetic names
const SYNTHETIC_RANGE: u32 = 1000;

/// Per-session bot name allocator
#[derive(Debug)]
pub struct BotNamePool {
    /// Pool names currently handed out
    in_use: HashSet<String>,
    /// Synthetic names currently handed out
    synthetic: HashSet<String>,
    rng: StdRng,
}

impl BotNamePool {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_rng(&mut rand::rng()))
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            in_use: HashSet::new(),
            synthetic: HashSet::new(),
            rng,
        }
    }

    /// Name with the bot marker prepended
    pub fn display_name(name: &str) -> String {
        format!("{BOT_MARKER}{name}")
    }

    /// Name without the bot marker
    pub fn bare_name(name: &str) -> &str {
        name.strip_prefix(BOT_MARKER).unwrap_or(name).trim()
    }

    /// Allocate a bare name.
    ///
    /// Once every pool name is taken the pool starts over and this call
    /// hands out a synthetic `Bot<n>` name instead.
    pub fn allocate(&mut self) -> String {
        let available: Vec<&str> = BOT_NAMES
            .iter()
            .copied()
            .filter(|name| !self.in_use.contains(*name))
            .collect();

        if let Some(name) = available.choose(&mut self.rng) {
            let name = name.to_string();
            self.in_use.insert(name.clone());
            return name;
        }

        self.in_use.clear();
        let name = self.synthetic_name();
        self.synthetic.insert(name.clone());
        name
    }

    fn synthetic_name(&mut self) -> String {
        for _ in 0..SYNTHETIC_RANGE {
            let candidate = format!("Bot{}", self.rng.random_range(0..SYNTHETIC_RANGE));
            if !self.synthetic.contains(&candidate) {
                return candidate;
            }
        }

        // Random probing kept colliding; take the first free number
        (SYNTHETIC_RANGE..)
            .map(|n| format!("Bot{n}"))
            .find(|candidate| !self.synthetic.contains(candidate))
            .unwrap_or_else(|| "Bot".to_string())
    }

    /// Mark names already seated in a room as taken
    pub fn reserve<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            let bare = Self::bare_name(name);
            if BOT_NAMES.contains(&bare) {
                self.in_use.insert(bare.to_string());
            } else {
                self.synthetic.insert(bare.to_string());
            }
        }
    }

    /// Return a name to the pool; accepts bare or decorated names
    pub fn release(&mut self, name: &str) -> bool {
        let bare = Self::bare_name(name);
        self.in_use.remove(bare) | self.synthetic.remove(bare)
    }

    pub fn is_taken(&self, name: &str) -> bool {
        let bare = Self::bare_name(name);
        self.in_use.contains(bare) || self.synthetic.contains(bare)
    }

    /// Names currently handed out
    pub fn in_use_count(&self) -> usize {
        self.in_use.len() + self.synthetic.len()
    }
}

impl Default for BotNamePool {
    fn default() -> Self {
        Self::new()
    }
}
