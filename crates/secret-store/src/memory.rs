//! In-process secret store
//!
//! Holds encoded records in a `HashMap` behind a tokio Mutex. Used for local
//! development (`backend = "memory"`) and as the store in tests. Records are
//! kept in their encoded string form so the memory backend exercises the
//! same encode/decode path as the external store.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::SessionRecord;
use crate::{SecretStore, StoreFuture};

/// Thread-safe in-memory record store. The lock is held only for map access.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }
}

impl SecretStore for MemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    fn create<'a>(&'a self, key: &'a str, record: &'a SessionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.contains_key(key) {
                return Err(Error::Unavailable(format!("secret {key} already exists")));
            }
            state.insert(key.to_owned(), record.encode());
            debug!(backend = "memory", "created record");
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, SessionRecord> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state
                .get(key)
                .map(|value| SessionRecord::decode(value))
                .ok_or_else(|| Error::NotFound(key.to_owned()))
        })
    }

    fn put<'a>(&'a self, key: &'a str, record: &'a SessionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let value = state
                .get_mut(key)
                .ok_or_else(|| Error::NotFound(key.to_owned()))?;
            *value = record.encode();
            debug!(backend = "memory", "updated record");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let removed = self.state.lock().await.remove(key);
            if removed.is_some() {
                debug!(backend = "memory", "deleted record");
            }
            Ok(())
        })
    }
}
