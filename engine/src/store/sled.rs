//! Sled-backed local store
//!
//! One sled tree per entity collection, values serialized as JSON. A
//! reconciliation batch maps onto `sled::Batch`, which a tree applies
//! atomically.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sled::{Batch, Db, Tree};
use stride_shared::Entity;
use tracing::debug;

use super::{LocalStore, StoreBatch};

/// Durable per-device store shared by all collections.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open (or create) the database directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening sled database");
        let db = sled::open(path).context("Failed to open sled database")?;
        Ok(Self { db })
    }

    /// Open a throwaway database backed by a temporary location.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .context("Failed to open temporary sled database")?;
        Ok(Self { db })
    }

    fn tree<E: Entity>(&self) -> Result<Tree> {
        self.db
            .open_tree(E::COLLECTION)
            .with_context(|| format!("Failed to open {} tree", E::COLLECTION))
    }

    fn encode<E: Entity>(entity: &E) -> Result<Vec<u8>> {
        serde_json::to_vec(entity).context("Failed to serialize entity")
    }

    fn put<E: Entity>(&self, entity: &E) -> Result<()> {
        let tree = self.tree::<E>()?;
        let value = Self::encode(entity)?;
        tree.insert(entity.id().as_bytes(), value)
            .context("Failed to write entity")?;
        self.db.flush().context("Failed to flush database")?;
        debug!(collection = E::COLLECTION, id = entity.id(), "stored entity");
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> LocalStore<E> for SledStore {
    async fn fetch_all(&self) -> Result<Vec<E>> {
        let tree = self.tree::<E>()?;
        let mut entities = Vec::new();
        for item in tree.iter() {
            let (_key, value) = item.context("Failed to iterate entities")?;
            let entity: E =
                serde_json::from_slice(&value).context("Failed to deserialize entity")?;
            entities.push(entity);
        }
        Ok(entities)
    }

    async fn insert(&self, entity: &E) -> Result<()> {
        self.put(entity)
    }

    async fn update(&self, entity: &E) -> Result<()> {
        self.put(entity)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let tree = self.tree::<E>()?;
        tree.remove(id.as_bytes()).context("Failed to delete entity")?;
        self.db.flush().context("Failed to flush database")?;
        debug!(collection = E::COLLECTION, id, "deleted entity");
        Ok(())
    }

    async fn apply_batch(&self, batch: StoreBatch<E>) -> Result<()> {
        let tree = self.tree::<E>()?;
        let mut sled_batch = Batch::default();
        for entity in batch.inserts.iter().chain(batch.updates.iter()) {
            sled_batch.insert(entity.id().as_bytes(), Self::encode(entity)?);
        }
        for id in &batch.deletes {
            sled_batch.remove(id.as_bytes());
        }
        tree.apply_batch(sled_batch)
            .context("Failed to apply store batch")?;
        self.db.flush().context("Failed to flush database")?;
        debug!(
            collection = E::COLLECTION,
            inserts = batch.inserts.len(),
            updates = batch.updates.len(),
            deletes = batch.deletes.len(),
            "applied store batch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stride_shared::{Goal, GoalTimeframe, GoalType, Habit, HabitCategory, HabitFrequency};

    fn habit(name: &str) -> Habit {
        Habit::new(
            name,
            HabitCategory::Fitness,
            HabitFrequency::Daily,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = SledStore::temporary().unwrap();
        let mut h = habit("Stretch");
        h.completions
            .insert(NaiveDate::from_ymd_opt(2026, 8, 10).unwrap());
        store.insert(&h).await.unwrap();

        let all: Vec<Habit> = store.fetch_all().await.unwrap();
        assert_eq!(all, vec![h]);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = SledStore::temporary().unwrap();
        store.insert(&habit("Stretch")).await.unwrap();

        let goals: Vec<Goal> = store.fetch_all().await.unwrap();
        assert!(goals.is_empty());

        let goal = Goal::new(
            "user-1",
            "Run more",
            GoalType::WorkoutCount,
            10.0,
            GoalTimeframe::Monthly,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        );
        store.insert(&goal).await.unwrap();

        let habits: Vec<Habit> = store.fetch_all().await.unwrap();
        assert_eq!(habits.len(), 1);
        let goals: Vec<Goal> = store.fetch_all().await.unwrap();
        assert_eq!(goals.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_inserts_and_deletes() {
        let store = SledStore::temporary().unwrap();
        let stale = habit("Stale");
        store.insert(&stale).await.unwrap();

        let fresh = habit("Fresh");
        let batch = StoreBatch {
            inserts: vec![fresh.clone()],
            updates: vec![],
            deletes: vec![stale.id.clone()],
        };
        LocalStore::<Habit>::apply_batch(&store, batch).await.unwrap();

        let all: Vec<Habit> = store.fetch_all().await.unwrap();
        assert_eq!(all, vec![fresh]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let h = habit("Journal");
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.insert(&h).await.unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        let all: Vec<Habit> = store.fetch_all().await.unwrap();
        assert_eq!(all, vec![h]);
    }
}
