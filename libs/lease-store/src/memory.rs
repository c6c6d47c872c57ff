use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Lease, LeaseKey, LeaseStore};

/// In-memory [`LeaseStore`] backed by a mutex-guarded map. Every method holds
/// the lock for its whole body, which is what makes each single-record
/// operation atomic here.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<LeaseKey, Lease>>>,
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("lease already exists in memory store: {0}")]
    KeyExists(LeaseKey),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    type Error = MemoryError;

    async fn insert(&self, lease: &Lease) -> Result<(), Self::Error> {
        let mut guard = self.inner.lock().expect("memory store lock poisoned");
        let key = lease.key();
        if guard.contains_key(&key) {
            return Err(MemoryError::KeyExists(key));
        }
        guard.insert(key, lease.clone());
        Ok(())
    }

    async fn get(&self, key: &LeaseKey) -> Result<Option<Lease>, Self::Error> {
        let guard = self.inner.lock().expect("memory store lock poisoned");
        Ok(guard.get(key).cloned())
    }

    async fn list_slice(&self, slice_name: &str) -> Result<Vec<Lease>, Self::Error> {
        let guard = self.inner.lock().expect("memory store lock poisoned");
        Ok(guard
            .values()
            .filter(|lease| lease.slice_name == slice_name)
            .cloned()
            .collect())
    }

    async fn slice_names(&self) -> Result<Vec<String>, Self::Error> {
        let guard = self.inner.lock().expect("memory store lock poisoned");
        let mut names: Vec<String> = guard.values().map(|l| l.slice_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn update(&self, lease: &Lease) -> Result<Option<Lease>, Self::Error> {
        let mut guard = self.inner.lock().expect("memory store lock poisoned");
        let key = lease.key();
        if let Some(entry) = guard.get_mut(&key) {
            *entry = lease.clone();
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    async fn delete(&self, key: &LeaseKey) -> Result<Option<Lease>, Self::Error> {
        let mut guard = self.inner.lock().expect("memory store lock poisoned");
        Ok(guard.remove(key))
    }

    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, Self::Error> {
        let guard = self.inner.lock().expect("memory store lock poisoned");
        Ok(guard
            .values()
            .filter(|lease| lease.expires_at < now)
            .cloned()
            .collect())
    }
}
