//! Remote Live Collection Adapter
//!
//! A server-pushed collection: subscribers receive the full current
//! document set whenever it changes, in the order the remote emits them.
//! The engine never sees raw bytes; the adapter delivers decoded entities.

use anyhow::Result;
use async_trait::async_trait;
use stride_shared::Entity;
use tokio::sync::mpsc;

pub mod memory;

pub use memory::MemoryRemote;

/// One delivery on a live subscription.
#[derive(Debug, Clone)]
pub enum SnapshotEvent<E> {
    /// The full current document set.
    Snapshot(Vec<E>),
    /// The subscription hit an error; the stream may keep delivering.
    Error(String),
}

/// Receiver side of a live subscription. Dropping it closes the
/// subscription.
pub type SnapshotReceiver<E> = mpsc::UnboundedReceiver<SnapshotEvent<E>>;

/// A server-side document collection with live updates.
#[async_trait]
pub trait RemoteCollection<E: Entity>: Send + Sync {
    /// Open a live subscription for one user's documents. The current set
    /// is delivered immediately, then again on every change.
    async fn subscribe(&self, user_id: &str) -> Result<SnapshotReceiver<E>>;

    /// Upload one document, replacing any existing one with the same id.
    async fn push(&self, user_id: &str, entity: &E) -> Result<()>;

    /// Remove one document by id.
    async fn delete(&self, user_id: &str, id: &str) -> Result<()>;
}
