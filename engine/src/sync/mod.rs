//! Local/remote reconciliation engine
//!
//! One [`CollectionSync`] owns the canonical in-memory view of a single
//! entity collection and keeps it consistent with both the local store and
//! the remote live collection.
//!
//! All mutations to a collection's view run through one `Mutex`-guarded
//! critical section: a reconciliation pass is mutually exclusive with other
//! passes and with local-origin mutations. Remote pushes happen after the
//! critical section is released, so a slow network never blocks the view.
//!
//! Remote snapshots must be applied in delivery order; the tracker drives
//! each subscription from a single consumer task to guarantee this.

use std::collections::HashMap;
use std::sync::Arc;

use stride_shared::Entity;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::remote::{RemoteCollection, SnapshotReceiver};
use crate::store::{LocalStore, StoreBatch};

/// Lifecycle of a synced collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    /// The local cache was read successfully at least once.
    LocalLoaded,
    /// A reconciliation pass is in flight.
    Syncing,
    /// The view reflects the most recent remote snapshot.
    Reconciled,
}

/// One entity's outcome from a reconciliation pass.
#[derive(Debug, Clone)]
pub enum Change<E> {
    /// Present remotely, was absent locally.
    Added(E),
    /// Present locally, absent from the snapshot; deleted locally.
    Removed(E),
    /// Present on both sides with different content; the remote document
    /// replaced the local one.
    Updated { before: E, after: E },
}

struct ViewInner<E> {
    view: Vec<E>,
    state: SyncState,
}

/// Canonical view of one collection, reconciled against a local store and
/// a remote live collection.
pub struct CollectionSync<E: Entity> {
    store: Arc<dyn LocalStore<E>>,
    remote: Arc<dyn RemoteCollection<E>>,
    inner: Mutex<ViewInner<E>>,
    view_tx: watch::Sender<Vec<E>>,
}

impl<E: Entity> CollectionSync<E> {
    pub fn new(store: Arc<dyn LocalStore<E>>, remote: Arc<dyn RemoteCollection<E>>) -> Self {
        let (view_tx, _rx) = watch::channel(Vec::new());
        Self {
            store,
            remote,
            inner: Mutex::new(ViewInner {
                view: Vec::new(),
                state: SyncState::Uninitialized,
            }),
            view_tx,
        }
    }

    /// Watch the canonical view; a new value is published after every
    /// successful mutation and reconciliation pass.
    pub fn watch_view(&self) -> watch::Receiver<Vec<E>> {
        self.view_tx.subscribe()
    }

    /// Snapshot of the canonical view, in user-visible order.
    pub async fn view(&self) -> Vec<E> {
        self.inner.lock().await.view.clone()
    }

    pub async fn get(&self, id: &str) -> Option<E> {
        self.inner
            .lock()
            .await
            .view
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    pub async fn state(&self) -> SyncState {
        self.inner.lock().await.state
    }

    /// Best-effort read of the local cache into the view.
    ///
    /// Failure leaves the view untouched; the caller may proceed to the
    /// remote subscription regardless.
    pub async fn load_local(&self) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        let mut rows = self
            .store
            .fetch_all()
            .await
            .map_err(EngineError::local_store)?;
        rows.sort_by(E::view_order);
        debug!(
            collection = E::COLLECTION,
            entities = rows.len(),
            "loaded local cache"
        );
        inner.view = rows;
        inner.state = SyncState::LocalLoaded;
        self.publish(&inner);
        Ok(())
    }

    /// Open the remote subscription for a user.
    pub async fn subscribe_remote(&self, user_id: &str) -> EngineResult<SnapshotReceiver<E>> {
        self.remote
            .subscribe(user_id)
            .await
            .map_err(|err| EngineError::RemoteSubscription(format!("{err:#}")))
    }

    /// One reconciliation pass: diff the incoming remote document set
    /// against the local store, mutate the store as a single batch, and
    /// republish the canonical view. The remote set is authoritative for
    /// membership; documents present on both sides are overwritten whole
    /// from the remote copy.
    ///
    /// If the store batch fails, the remote set is still presented as the
    /// canonical view; persistence is skipped for this pass and the store
    /// catches up on the next one.
    ///
    /// Returns the applied change set so callers can react to edits that
    /// arrived from the other side of the sync boundary. The change set is
    /// diffed against the canonical view, not the store: a store left
    /// behind by a failed batch must not cause already-reported changes to
    /// be re-emitted when a later snapshot repeats them.
    pub async fn apply_snapshot(&self, remote_docs: Vec<E>) -> Vec<Change<E>> {
        let mut inner = self.inner.lock().await;
        inner.state = SyncState::Syncing;

        let mut changes = Vec::new();
        {
            let mut view_by_id: HashMap<&str, &E> =
                inner.view.iter().map(|e| (e.id(), e)).collect();
            for doc in &remote_docs {
                match view_by_id.remove(doc.id()) {
                    None => changes.push(Change::Added(doc.clone())),
                    Some(before) if before != doc => changes.push(Change::Updated {
                        before: before.clone(),
                        after: doc.clone(),
                    }),
                    Some(_) => {} // identical on both sides
                }
            }
            // Whatever remains in the view is absent from the snapshot
            for (_, row) in view_by_id {
                changes.push(Change::Removed(row.clone()));
            }
        }

        // The store batch diffs against the store's own contents, which
        // may lag the view after an earlier failed batch.
        let local: Vec<E> = match self.store.fetch_all().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    collection = E::COLLECTION,
                    error = %format!("{err:#}"),
                    "local read failed during reconciliation; diffing against in-memory view"
                );
                inner.view.clone()
            }
        };
        let mut local_by_id: HashMap<&str, &E> =
            local.iter().map(|e| (e.id(), e)).collect();

        let mut batch = StoreBatch::default();
        for doc in &remote_docs {
            match local_by_id.remove(doc.id()) {
                None => batch.inserts.push(doc.clone()),
                Some(before) if before != doc => batch.updates.push(doc.clone()),
                Some(_) => {}
            }
        }
        for (id, _) in local_by_id {
            batch.deletes.push(id.to_string());
        }

        if !batch.is_empty() {
            if let Err(err) = self.store.apply_batch(batch).await {
                warn!(
                    collection = E::COLLECTION,
                    error = %format!("{err:#}"),
                    "store batch failed; presenting remote set without persistence"
                );
            }
        }

        let mut view = remote_docs;
        view.sort_by(E::view_order);
        info!(
            collection = E::COLLECTION,
            entities = view.len(),
            changes = changes.len(),
            "reconciled remote snapshot"
        );
        inner.view = view;
        inner.state = SyncState::Reconciled;
        self.publish(&inner);

        changes
    }

    /// Local-origin create: write through to the store and the view.
    ///
    /// The remote push is a separate step ([`Self::push_remote`]) so it
    /// runs outside the critical section.
    pub async fn insert_local(&self, entity: E) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        self.store
            .insert(&entity)
            .await
            .map_err(EngineError::local_store)?;
        inner.view.push(entity);
        inner.view.sort_by(E::view_order);
        self.publish(&inner);
        Ok(())
    }

    /// Local-origin edit: read-modify-write under the collection lock.
    ///
    /// On store failure the view is left at its pre-mutation value.
    pub async fn mutate_local<F>(&self, id: &str, mutate: F) -> EngineResult<E>
    where
        F: FnOnce(&mut E),
    {
        let mut inner = self.inner.lock().await;
        let position = inner
            .view
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| EngineError::NotFound(format!("{} {id}", E::COLLECTION)))?;

        let mut updated = inner.view[position].clone();
        mutate(&mut updated);

        self.store
            .update(&updated)
            .await
            .map_err(EngineError::local_store)?;

        inner.view[position] = updated.clone();
        inner.view.sort_by(E::view_order);
        self.publish(&inner);
        Ok(updated)
    }

    /// Local-origin delete.
    pub async fn remove_local(&self, id: &str) -> EngineResult<E> {
        let mut inner = self.inner.lock().await;
        let position = inner
            .view
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| EngineError::NotFound(format!("{} {id}", E::COLLECTION)))?;

        self.store
            .delete(id)
            .await
            .map_err(EngineError::local_store)?;

        let removed = inner.view.remove(position);
        self.publish(&inner);
        Ok(removed)
    }

    /// Best-effort remote upload. A failure is surfaced but the local
    /// write it follows is never rolled back.
    pub async fn push_remote(&self, user_id: &str, entity: &E) -> EngineResult<()> {
        if let Err(err) = self.remote.push(user_id, entity).await {
            warn!(
                collection = E::COLLECTION,
                id = entity.id(),
                error = %format!("{err:#}"),
                "remote push failed; local state retained"
            );
            return Err(EngineError::remote_push(err));
        }
        Ok(())
    }

    /// Best-effort remote delete.
    pub async fn delete_remote(&self, user_id: &str, id: &str) -> EngineResult<()> {
        if let Err(err) = self.remote.delete(user_id, id).await {
            warn!(
                collection = E::COLLECTION,
                id,
                error = %format!("{err:#}"),
                "remote delete failed; local state retained"
            );
            return Err(EngineError::remote_push(err));
        }
        Ok(())
    }

    /// Subscription failure: keep the last-known local cache visible, or
    /// clear the view when no cache was ever loaded.
    pub async fn on_subscription_error(&self, message: &str) {
        let mut inner = self.inner.lock().await;
        warn!(
            collection = E::COLLECTION,
            error = message,
            "remote subscription error"
        );
        if inner.state == SyncState::Uninitialized {
            inner.view.clear();
            self.publish(&inner);
        }
    }

    /// Tear down for identity change: the next user must not see this
    /// user's data.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.view.clear();
        inner.state = SyncState::Uninitialized;
        self.publish(&inner);
    }

    fn publish(&self, inner: &ViewInner<E>) {
        self.view_tx.send_replace(inner.view.clone());
    }
}
