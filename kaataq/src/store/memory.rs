//! In-process implementation of the key-path store.

use super::{
    Fields, Guard, Snapshot, Store, StoreError, StoreResult, Subscription, SubscriptionId,
    split_path,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::mpsc;

/// A registered change listener
#[derive(Debug)]
struct Subscriber {
    path: Vec<String>,
    sender: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Debug)]
struct Inner {
    root: Value,
    subscribers: HashMap<SubscriptionId, Subscriber>,
    next_subscription: u64,
    online: bool,
}

/// Shared JSON tree with last-write-wins partial updates, compare-and-set and
/// ordered change notification.
///
/// Every operation runs under a single lock, so writes are applied (and
/// notified) in one total order.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, connected store
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: Value::Object(Map::new()),
                subscribers: HashMap::new(),
                next_subscription: 1,
                online: true,
            }),
        }
    }

    /// Simulate losing (or regaining) connectivity.
    ///
    /// While offline every operation fails with [`StoreError::Disconnected`]
    /// and no notifications are delivered.
    pub fn set_online(&self, online: bool) {
        let mut inner = self.lock();
        inner.online = online;
        log::info!(
            "Memory store is now {}",
            if online { "online" } else { "offline" }
        );
    }

    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn ensure_online(&self) -> StoreResult<()> {
        if self.online {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    fn get(&self, segments: &[&str]) -> Option<&Value> {
        segments
            .iter()
            .try_fold(&self.root, |node, segment| node.get(*segment))
    }

    fn set(&mut self, segments: &[&str], value: Value) {
        match normalize(value) {
            Some(value) => insert_at(&mut self.root, segments, value),
            None => {
                remove_at(&mut self.root, segments);
            }
        }
    }

    /// Push the current snapshot to every subscriber whose path overlaps
    /// `touched`, dropping subscribers whose receiver is gone.
    fn notify(&mut self, touched: &[&str]) {
        let root = &self.root;
        self.subscribers.retain(|id, subscriber| {
            if !overlaps(&subscriber.path, touched) {
                return true;
            }

            let segments: Vec<&str> = subscriber.path.iter().map(String::as_str).collect();
            let snapshot = segments
                .iter()
                .try_fold(root, |node, segment| node.get(*segment))
                .cloned();

            match subscriber.sender.send(snapshot) {
                Ok(()) => true,
                Err(_) => {
                    log::debug!("Subscriber {} disconnected, removing", id);
                    false
                }
            }
        });
    }
}

/// Drop nulls and empty objects so that "absent" has a single representation
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| normalize(value).map(|value| (key, value)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        other => Some(other),
    }
}

fn insert_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

/// Remove the value at `segments`; returns true when `node` is left empty
fn remove_at(node: &mut Value, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };

    let Value::Object(map) = node else {
        return false;
    };

    if rest.is_empty() {
        map.remove(*first);
    } else if let Some(child) = map.get_mut(*first)
        && remove_at(child, rest)
    {
        map.remove(*first);
    }

    map.is_empty()
}

fn overlaps(subscribed: &[String], touched: &[&str]) -> bool {
    subscribed
        .iter()
        .zip(touched.iter())
        .all(|(a, b)| a.as_str() == *b)
}

fn guard_matches(current: Option<&Value>, guard: &Guard) -> bool {
    normalize(current.cloned().unwrap_or(Value::Null)) == normalize(guard.expected.clone())
}

#[async_trait]
impl Store for MemoryStore {
    async fn create(&self, path: &str, document: Value) -> StoreResult<()> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        inner.ensure_online()?;

        if inner.get(&segments).is_some() {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }

        inner.set(&segments, document);
        inner.notify(&segments);
        Ok(())
    }

    async fn read(&self, path: &str) -> StoreResult<Snapshot> {
        let segments = split_path(path)?;
        let inner = self.lock();
        inner.ensure_online()?;
        Ok(inner.get(&segments).cloned())
    }

    async fn write_field(&self, path: &str, value: Value) -> StoreResult<()> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        inner.ensure_online()?;
        inner.set(&segments, value);
        inner.notify(&segments);
        Ok(())
    }

    async fn write_fields(&self, path: &str, fields: Fields) -> StoreResult<()> {
        self.update_if(path, &[], fields).await.map(|_| ())
    }

    async fn update_if(&self, path: &str, guards: &[Guard], fields: Fields) -> StoreResult<bool> {
        let base = split_path(path)?;

        // Resolve every relative path before touching the tree
        let mut guard_paths = Vec::with_capacity(guards.len());
        for guard in guards {
            let mut full = base.clone();
            full.extend(split_path(&guard.field)?);
            guard_paths.push((full, guard));
        }

        let mut writes = Vec::with_capacity(fields.len());
        for (field, value) in fields.iter() {
            let mut full = base.clone();
            full.extend(split_path(field)?);
            writes.push((full, value.clone()));
        }

        let mut inner = self.lock();
        inner.ensure_online()?;

        for (full, guard) in &guard_paths {
            if !guard_matches(inner.get(full), guard) {
                log::trace!("Guard on {}/{} did not match", path, guard.field);
                return Ok(false);
            }
        }

        for (full, value) in writes {
            inner.set(&full, value);
        }
        inner.notify(&base);
        Ok(true)
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.write_field(path, Value::Null).await
    }

    async fn subscribe(&self, path: &str) -> StoreResult<Subscription> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        inner.ensure_online()?;

        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        // Initial snapshot; the receiver is still held here so this cannot fail
        let _ = sender.send(inner.get(&segments).cloned());

        inner.subscribers.insert(
            id,
            Subscriber {
                path: segments.iter().map(|s| s.to_string()).collect(),
                sender,
            },
        );
        log::debug!("Subscription {} opened on {}", id, path);

        Ok(Subscription::new(id, receiver))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()> {
        let mut inner = self.lock();
        match inner.subscribers.remove(&id) {
            Some(_) => {
                log::debug!("Subscription {} closed", id);
                Ok(())
            }
            None => Err(StoreError::SubscriptionNotFound(id.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("fields must be an object"),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_existing_path() {
        let store = MemoryStore::new();
        store.create("rooms/1234", json!({"host": "a"})).await.unwrap();

        let err = store
            .create("rooms/1234", json!({"host": "b"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let doc = store.read("rooms/1234/host").await.unwrap();
        assert_eq!(doc, Some(json!("a")));
    }

    #[tokio::test]
    async fn test_write_fields_is_partial() {
        let store = MemoryStore::new();
        store
            .create("rooms/1", json!({"a": 1, "b": {"c": 2, "d": 3}}))
            .await
            .unwrap();

        store
            .write_fields("rooms/1", fields(json!({"b/c": 20, "e": true})))
            .await
            .unwrap();

        let doc = store.read("rooms/1").await.unwrap().unwrap();
        assert_eq!(doc, json!({"a": 1, "b": {"c": 20, "d": 3}, "e": true}));
    }

    #[tokio::test]
    async fn test_null_removes_and_prunes_empty_parents() {
        let store = MemoryStore::new();
        store
            .create("rooms/1", json!({"votes": {"p1": "left"}, "round": 1}))
            .await
            .unwrap();

        store.write_field("rooms/1/votes/p1", Value::Null).await.unwrap();

        let doc = store.read("rooms/1").await.unwrap().unwrap();
        assert_eq!(doc, json!({"round": 1}));
        assert_eq!(store.read("rooms/1/votes").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_if_applies_only_when_guards_match() {
        let store = MemoryStore::new();
        store
            .create("rooms/1", json!({"phase": "voting", "round": 2}))
            .await
            .unwrap();

        let guards = [Guard::eq("phase", "voting"), Guard::eq("round", 2)];
        let first = store
            .update_if("rooms/1", &guards, fields(json!({"phase": "results"})))
            .await
            .unwrap();
        let second = store
            .update_if("rooms/1", &guards, fields(json!({"phase": "results"})))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_absent_guard_matches_missing_and_empty_values() {
        let store = MemoryStore::new();
        store.create("rooms/1", json!({"round": 1})).await.unwrap();

        let applied = store
            .update_if(
                "rooms/1",
                &[Guard::absent("stickChoice"), Guard::eq("votes", json!({}))],
                fields(json!({"stickChoice": "left"})),
            )
            .await
            .unwrap();
        assert!(applied);

        let applied_again = store
            .update_if(
                "rooms/1",
                &[Guard::absent("stickChoice")],
                fields(json!({"stickChoice": "right"})),
            )
            .await
            .unwrap();
        assert!(!applied_again);
    }

    #[tokio::test]
    async fn test_subscription_receives_initial_and_ordered_snapshots() {
        let store = MemoryStore::new();
        store.create("rooms/1", json!({"n": 0})).await.unwrap();

        let mut sub = store.subscribe("rooms/1").await.unwrap();
        assert_eq!(sub.recv().await, Some(Some(json!({"n": 0}))));

        for n in 1..=3 {
            store.write_field("rooms/1/n", json!(n)).await.unwrap();
        }
        // Unrelated path does not notify
        store.write_field("rooms/2/n", json!(9)).await.unwrap();

        for n in 1..=3 {
            assert_eq!(sub.recv().await, Some(Some(json!({"n": n}))));
        }

        store.remove("rooms/1").await.unwrap();
        assert_eq!(sub.recv().await, Some(None));

        store.unsubscribe(sub.id()).await.unwrap();
        assert_eq!(sub.recv().await, None);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_store_rejects_operations() {
        let store = MemoryStore::new();
        store.set_online(false);

        let err = store.read("rooms/1").await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.create("rooms/1", json!({"a": 1})).await.is_err());

        store.set_online(true);
        store.create("rooms/1", json!({"a": 1})).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_field_path_writes_nothing() {
        let store = MemoryStore::new();
        store.create("rooms/1", json!({"a": 1})).await.unwrap();

        let result = store
            .write_fields("rooms/1", fields(json!({"b": 2, "c//d": 3})))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
        assert_eq!(store.read("rooms/1/b").await.unwrap(), None);
    }
}
