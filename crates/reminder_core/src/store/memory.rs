//! Map-backed key-value store with failure injection.

use crate::store::{KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

/// In-process [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    state: Mutex<MemoryState>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one raw value, bypassing failure injection.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.state
            .lock()
            .entries
            .insert(key.to_string(), value.to_string());
    }

    /// Reads one raw value, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Makes every `get` fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Makes every `set`/`delete` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let state = self.state.lock();
        if state.fail_reads {
            return Err(StoreError::Unavailable(format!("read of `{key}` refused")));
        }
        Ok(state.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable(format!("write of `{key}` refused")));
        }
        state.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable(format!("delete of `{key}` refused")));
        }
        state.entries.remove(key);
        Ok(())
    }
}
