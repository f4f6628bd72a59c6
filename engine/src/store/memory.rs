//! In-memory local store
//!
//! Backs ephemeral mode and tests. The failure switch lets tests exercise
//! the degraded reconciliation path without a real disk fault.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use stride_shared::Entity;

use super::{LocalStore, StoreBatch};

/// Non-durable keyed store.
#[derive(Debug)]
pub struct MemoryStore<E> {
    rows: Mutex<HashMap<String, E>>,
    failing: AtomicBool,
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Test support: make every subsequent operation fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("memory store failure injected");
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> LocalStore<E> for MemoryStore<E> {
    async fn fetch_all(&self) -> Result<Vec<E>> {
        self.check()?;
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn insert(&self, entity: &E) -> Result<()> {
        self.check()?;
        self.rows
            .lock()
            .unwrap()
            .insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn update(&self, entity: &E) -> Result<()> {
        self.check()?;
        self.rows
            .lock()
            .unwrap()
            .insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check()?;
        self.rows.lock().unwrap().remove(id);
        Ok(())
    }

    async fn apply_batch(&self, batch: StoreBatch<E>) -> Result<()> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        for entity in batch.inserts.into_iter().chain(batch.updates) {
            rows.insert(entity.id().to_string(), entity);
        }
        for id in batch.deletes {
            rows.remove(&id);
        }
        Ok(())
    }
}
