use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard};

use dashmap::DashMap;

use crate::{
    cache::Cache,
    error,
    http::Request,
    io::Response,
};

use crate::Result;

/// Concurrent in-process response store.
///
/// Reads, inserts and removals run under the shared side of the lock and
/// only contend per `DashMap` shard. `invalidate` takes the exclusive side,
/// so a clear is all-or-nothing for concurrent readers.
pub struct InMemoryCache<K = Request> {
    cache: RwLock<DashMap<K, Response>>,
}

impl<K: Eq + Hash> Default for InMemoryCache<K> {
    fn default() -> Self {
        Self {
            cache: RwLock::new(DashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> InMemoryCache<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<RwLockReadGuard<'_, DashMap<K, Response>>> {
        self.cache
            .read()
            .map_err(|_| error::store("in-memory cache lock poisoned"))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }
}

impl<K: Eq + Hash + Clone> Cache<K> for InMemoryCache<K> {
    fn get(&self, key: &K) -> Result<Option<Response>> {
        Ok(self
            .entries()?
            .get(key)
            .map(|response| response.value().clone()))
    }

    fn set(&self, key: &K, value: &Response) -> Result<()> {
        self.entries()?.insert(key.clone(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn invalidate(&self) -> Result<()> {
        let entries = self
            .cache
            .write()
            .map_err(|_| error::store("in-memory cache lock poisoned"))?;
        entries.clear();
        Ok(())
    }
}
