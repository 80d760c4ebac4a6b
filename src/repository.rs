use crate::cache::TableCache;
use crate::config::Settings;
use crate::error::Result;
use crate::loader::TableStore;
use crate::table::Table;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Read side of the repository: a backing store behind a TTL cache
pub struct Repository {
    store: Box<dyn TableStore>,
    cache: TableCache,
}

impl Repository {
    pub fn new(store: Box<dyn TableStore>, ttl: Duration) -> Self {
        Repository {
            store,
            cache: TableCache::new(ttl),
        }
    }

    /// Open the configured store with the configured cache TTL
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = settings.store.open()?;
        info!(
            "opened {} (cache ttl {}s)",
            store.describe(),
            settings.cache.ttl_secs
        );
        Ok(Repository::new(store, settings.cache.ttl()))
    }

    pub fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }

    /// Load a table by name
    ///
    /// The first raw row becomes the header and rows with a blank first column
    /// are dropped. Results are cached per table name until the TTL expires or
    /// the table is refreshed.
    ///
    /// # Errors
    /// * `SourceUnavailable` - the store could not be reached, even after one retry
    /// * `TableNotFound` - the store holds no table with this name
    /// * `MalformedRow` - a row does not fit the header
    pub fn load(&self, name: &str) -> Result<Arc<Table>> {
        self.cache.get_or_load(name, || {
            info!("loading table '{}' from {}", name, self.store.describe());
            let raw = with_retry("read", || self.store.read_rows(name))?;
            let table = Table::from_raw(name, raw)?;
            info!("loaded {} rows from '{}'", table.len(), name);
            Ok(table)
        })
    }

    /// Names of all tables in the store
    pub fn table_names(&self) -> Result<Vec<String>> {
        with_retry("list", || self.store.table_names())
    }

    /// Drop the cached copy of a table so the next load hits the store
    pub fn refresh(&self, name: &str) -> bool {
        let was_cached = self.cache.invalidate(name);
        info!("refreshed table '{}' (was cached: {})", name, was_cached);
        was_cached
    }
}

/// Run a store call, retrying exactly once when the failure is transient
pub fn with_retry<T>(what: &str, mut call: impl FnMut() -> Result<T>) -> Result<T> {
    match call() {
        Err(e) if e.is_transient() => {
            warn!("store {} failed, retrying once: {}", what, e);
            call()
        }
        other => other,
    }
}
