//! Per-entity mutual exclusion.
//!
//! Mutations of one account (or one budget's alert state) are serialized;
//! different entities never contend. A lock that cannot be obtained within
//! the configured timeout surfaces as [`EngineError::ConcurrencyConflict`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Debug)]
pub(crate) struct EntityLocks {
    label: &'static str,
    timeout: Duration,
    entries: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of a mutation; released on drop.
pub(crate) type EntityGuard = OwnedMutexGuard<()>;

impl EntityLocks {
    pub(crate) fn new(label: &'static str, timeout: Duration) -> Self {
        Self {
            label,
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(id).or_default())
    }

    pub(crate) async fn acquire(&self, id: Uuid) -> ResultEngine<EntityGuard> {
        let handle = self.handle(id);
        match tokio::time::timeout(self.timeout, handle.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(
                    entity = self.label,
                    %id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "lock timeout"
                );
                Err(EngineError::ConcurrencyConflict(format!(
                    "{} {id} is busy, retry",
                    self.label
                )))
            }
        }
    }

    /// Acquires several locks in ascending id order, so two multi-entity
    /// operations can never wait on each other crosswise.
    pub(crate) async fn acquire_many(&self, ids: &[Uuid]) -> ResultEngine<Vec<EntityGuard>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.acquire(id).await?);
        }
        Ok(guards)
    }
}
