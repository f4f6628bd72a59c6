//! Local Store Adapter
//!
//! A durable per-device keyed collection. The reconciliation engine only
//! depends on this contract; implementations report failures as
//! `anyhow::Error` and are mapped to the typed taxonomy at the engine
//! boundary.

use anyhow::Result;
use async_trait::async_trait;
use stride_shared::Entity;

pub mod memory;
pub mod sled;

pub use memory::MemoryStore;
pub use self::sled::SledStore;

/// Mutations applied as one atomic scope during a reconciliation pass.
#[derive(Debug, Clone)]
pub struct StoreBatch<E> {
    pub inserts: Vec<E>,
    pub updates: Vec<E>,
    pub deletes: Vec<String>,
}

impl<E> Default for StoreBatch<E> {
    fn default() -> Self {
        Self {
            inserts: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<E> StoreBatch<E> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Durable keyed storage for one entity collection.
#[async_trait]
pub trait LocalStore<E: Entity>: Send + Sync {
    /// All stored entities, in no particular order.
    async fn fetch_all(&self) -> Result<Vec<E>>;

    async fn insert(&self, entity: &E) -> Result<()>;

    async fn update(&self, entity: &E) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Apply a reconciliation batch atomically: either every mutation in
    /// the batch lands or none do.
    async fn apply_batch(&self, batch: StoreBatch<E>) -> Result<()>;
}
