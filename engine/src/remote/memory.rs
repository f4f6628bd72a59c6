//! In-memory live collection
//!
//! Serves tests and single-device operation: documents live in a per-user
//! map and every mutation re-broadcasts the full set to that user's
//! subscribers, which is exactly the delivery contract a server-backed
//! adapter provides.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use stride_shared::Entity;
use tokio::sync::mpsc;
use tracing::debug;

use super::{RemoteCollection, SnapshotEvent, SnapshotReceiver};

struct RemoteInner<E> {
    /// Documents per user, keyed by entity id.
    docs: HashMap<String, BTreeMap<String, E>>,
    /// Live subscriptions per user.
    subscribers: Vec<(String, mpsc::UnboundedSender<SnapshotEvent<E>>)>,
}

/// In-process remote collection with live snapshot delivery.
pub struct MemoryRemote<E> {
    inner: Mutex<RemoteInner<E>>,
    fail_pushes: AtomicBool,
}

impl<E: Entity> MemoryRemote<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RemoteInner {
                docs: HashMap::new(),
                subscribers: Vec::new(),
            }),
            fail_pushes: AtomicBool::new(false),
        }
    }

    /// Test support: reject subsequent pushes and deletes.
    pub fn set_fail_pushes(&self, failing: bool) {
        self.fail_pushes.store(failing, Ordering::SeqCst);
    }

    /// Current documents for a user, sorted by id.
    pub fn documents(&self, user_id: &str) -> Vec<E> {
        let inner = self.inner.lock().unwrap();
        inner
            .docs
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace a user's document set outright and notify subscribers, as
    /// if another device had written to the collection.
    pub fn emit(&self, user_id: &str, entities: Vec<E>) {
        let mut inner = self.inner.lock().unwrap();
        let set = entities
            .into_iter()
            .map(|e| (e.id().to_string(), e))
            .collect();
        inner.docs.insert(user_id.to_string(), set);
        Self::broadcast(&mut inner, user_id);
    }

    /// Deliver an error event to a user's subscribers.
    pub fn emit_error(&self, user_id: &str, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        let event = SnapshotEvent::Error(message.to_string());
        inner
            .subscribers
            .retain(|(uid, tx)| uid != user_id || tx.send(event.clone()).is_ok());
    }

    fn broadcast(inner: &mut RemoteInner<E>, user_id: &str) {
        let snapshot: Vec<E> = inner
            .docs
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        debug!(
            collection = E::COLLECTION,
            user = user_id,
            documents = snapshot.len(),
            "broadcasting snapshot"
        );
        inner.subscribers.retain(|(uid, tx)| {
            uid != user_id || tx.send(SnapshotEvent::Snapshot(snapshot.clone())).is_ok()
        });
    }
}

impl<E: Entity> Default for MemoryRemote<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RemoteCollection<E> for MemoryRemote<E> {
    async fn subscribe(&self, user_id: &str) -> Result<SnapshotReceiver<E>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        let snapshot: Vec<E> = inner
            .docs
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        // The current set is delivered immediately on subscribe
        let _ = tx.send(SnapshotEvent::Snapshot(snapshot));
        inner.subscribers.push((user_id.to_string(), tx));
        Ok(rx)
    }

    async fn push(&self, user_id: &str, entity: &E) -> Result<()> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            bail!("remote push failure injected");
        }
        let mut inner = self.inner.lock().unwrap();
        inner
            .docs
            .entry(user_id.to_string())
            .or_default()
            .insert(entity.id().to_string(), entity.clone());
        Self::broadcast(&mut inner, user_id);
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            bail!("remote delete failure injected");
        }
        let mut inner = self.inner.lock().unwrap();
        if let Some(docs) = inner.docs.get_mut(user_id) {
            docs.remove(id);
        }
        Self::broadcast(&mut inner, user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stride_shared::{Habit, HabitCategory, HabitFrequency};

    fn habit(name: &str) -> Habit {
        Habit::new(
            name,
            HabitCategory::Health,
            HabitFrequency::Daily,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_set_first() {
        let remote = MemoryRemote::new();
        let h = habit("Walk");
        remote.push("user-1", &h).await.unwrap();

        let mut rx = remote.subscribe("user-1").await.unwrap();
        match rx.recv().await.unwrap() {
            SnapshotEvent::Snapshot(docs) => assert_eq!(docs, vec![h]),
            SnapshotEvent::Error(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_mutations_rebroadcast() {
        let remote = MemoryRemote::new();
        let mut rx = remote.subscribe("user-1").await.unwrap();
        // initial empty snapshot
        assert!(matches!(
            rx.recv().await.unwrap(),
            SnapshotEvent::Snapshot(docs) if docs.is_empty()
        ));

        let h = habit("Walk");
        remote.push("user-1", &h).await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            SnapshotEvent::Snapshot(docs) if docs.len() == 1
        ));

        remote.delete("user-1", &h.id).await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            SnapshotEvent::Snapshot(docs) if docs.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let remote = MemoryRemote::new();
        let mut other = remote.subscribe("user-2").await.unwrap();
        let _ = other.recv().await.unwrap();

        remote.push("user-1", &habit("Walk")).await.unwrap();
        assert!(remote.documents("user-2").is_empty());
        // no further delivery for the other user
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_events_are_delivered() {
        let remote: MemoryRemote<Habit> = MemoryRemote::new();
        let mut rx = remote.subscribe("user-1").await.unwrap();
        let _ = rx.recv().await.unwrap();

        remote.emit_error("user-1", "stream reset");
        assert!(matches!(
            rx.recv().await.unwrap(),
            SnapshotEvent::Error(msg) if msg == "stream reset"
        ));
    }
}
