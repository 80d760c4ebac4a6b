use crate::error::Result;
use crate::table::Table;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct CacheEntry {
    table: Arc<Table>,
    loaded_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Bumped on every invalidation of a table name
    generations: HashMap<String, u64>,
}

impl CacheState {
    fn generation(&self, name: &str) -> u64 {
        self.generations.get(name).copied().unwrap_or(0)
    }
}

/// Per-table cache with a bounded time-to-live
///
/// A `ttl` of zero disables caching; every lookup goes to the loader.
pub struct TableCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl TableCache {
    pub fn new(ttl: Duration) -> Self {
        TableCache {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Return the cached table if still fresh, otherwise run `load` and cache its result.
    ///
    /// Errors from `load` are returned as-is and never cached. A result whose
    /// table was invalidated while `load` ran is returned but not cached.
    pub fn get_or_load<F>(&self, name: &str, load: F) -> Result<Arc<Table>>
    where
        F: FnOnce() -> Result<Table>,
    {
        if let Some(table) = self.get(name) {
            debug!("cache hit for table '{}'", name);
            return Ok(table);
        }

        let started = self.lock().generation(name);
        let table = Arc::new(load()?);
        if !self.ttl.is_zero() {
            let mut state = self.lock();
            if state.generation(name) == started {
                state.entries.insert(
                    name.to_string(),
                    CacheEntry {
                        table: Arc::clone(&table),
                        loaded_at: Instant::now(),
                    },
                );
            } else {
                debug!("table '{}' changed during load, not caching", name);
            }
        }
        Ok(table)
    }

    /// Fresh cached table, if any; expired entries are evicted
    pub fn get(&self, name: &str) -> Option<Arc<Table>> {
        let mut state = self.lock();
        match state.entries.get(name) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => Some(Arc::clone(&entry.table)),
            Some(_) => {
                state.entries.remove(name);
                None
            }
            None => None,
        }
    }

    /// Drop one table so the next lookup reloads it; returns whether it was cached
    ///
    /// Loads already running for this table will not cache their result.
    pub fn invalidate(&self, name: &str) -> bool {
        let mut state = self.lock();
        *state.generations.entry(name.to_string()).or_insert(0) += 1;
        state.entries.remove(name).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
