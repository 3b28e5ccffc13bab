//! Key-path document store consumed by the room core.
//!
//! The room core never talks to a concrete backend. It reads and mutates
//! JSON documents addressed by slash-separated key paths
//! (`rooms/4821/players/player_x/score`) through the [`Store`] trait and
//! learns about changes from push-based [`Subscription`]s.
//!
//! Semantics every implementation must honor:
//! - writing `null` to a path removes it, and empty objects are not stored
//! - partial updates (`write_fields`, `update_if`) leave unspecified fields alone
//! - `update_if` is atomic: either every guard matches and every field is
//!   written, or nothing changes
//! - each subscriber observes snapshots in the order writes were applied
//!
//! [`MemoryStore`] is the in-process implementation used by tests and by the
//! headless host.

pub mod errors;
pub mod memory;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Partial update: relative sub-path -> new value (`null` removes)
pub type Fields = serde_json::Map<String, Value>;

/// A snapshot of a path; `None` when the path holds no data
pub type Snapshot = Option<Value>;

/// Compare-and-set precondition on a relative sub-path.
///
/// An expected value of `null` matches an absent field.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub field: String,
    pub expected: Value,
}

impl Guard {
    /// Require `field` to currently equal `expected`
    pub fn eq(field: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Require `field` to be absent
    pub fn absent(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: Value::Null,
        }
    }
}

/// Subscription handle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Push-based change feed for one path.
///
/// The current snapshot is delivered first, then one snapshot per applied
/// write that touches the path.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, receiver: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next snapshot; `None` once the store dropped the feed
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }
}

/// External key-path store contract
#[async_trait]
pub trait Store: Send + Sync {
    /// Write a whole document; fails if the path already holds data
    async fn create(&self, path: &str, document: Value) -> StoreResult<()>;

    /// Read the document at `path`
    async fn read(&self, path: &str) -> StoreResult<Snapshot>;

    /// Replace the value at `path` (`null` removes it)
    async fn write_field(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Write several relative sub-paths under `path` in one step
    async fn write_fields(&self, path: &str, fields: Fields) -> StoreResult<()>;

    /// Atomically write `fields` under `path` iff every guard matches.
    ///
    /// Returns `false` (and writes nothing) when a guard does not match.
    async fn update_if(&self, path: &str, guards: &[Guard], fields: Fields) -> StoreResult<bool>;

    /// Remove everything at `path`
    async fn remove(&self, path: &str) -> StoreResult<()>;

    /// Start receiving snapshots of `path`
    async fn subscribe(&self, path: &str) -> StoreResult<Subscription>;

    /// Stop a subscription; its receiver sees the end of the feed
    async fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()>;
}

/// Split a key path into segments, rejecting empty ones
pub fn split_path(path: &str) -> StoreResult<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }

    Ok(segments)
}

/// Join a base path and a relative sub-path
pub fn join_path(base: &str, field: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        field.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("rooms/1234").unwrap(), vec!["rooms", "1234"]);
        assert_eq!(split_path("/rooms/1234/").unwrap(), vec!["rooms", "1234"]);
        assert!(split_path("").is_err());
        assert!(split_path("/").is_err());
        assert!(split_path("rooms//1234").is_err());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("rooms/1", "votes/p1"), "rooms/1/votes/p1");
        assert_eq!(join_path("rooms/1/", "/votes"), "rooms/1/votes");
    }
}
