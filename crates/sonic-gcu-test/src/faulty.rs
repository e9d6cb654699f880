//! Stores that misbehave on purpose.

use crate::fixtures::ConfigChange;
use sonic_gcu::store::{ConfigStore, MemoryConfigStore, StoreError, StoreResult};
use sonic_gcu::ConfigValue;
use std::cell::RefCell;
use std::rc::Rc;

/// Handle on the data behind a [`FaultyStore`], readable after the store
/// has been handed to an updater.
pub type SharedStore = Rc<RefCell<MemoryConfigStore>>;

/// In-memory CONFIG_DB that can fail a write or be changed by a
/// simulated second writer after a number of successful writes.
pub struct FaultyStore {
    inner: SharedStore,
    writes: usize,
    fail_at: Option<usize>,
    drift: Option<(usize, ConfigChange)>,
    drop_empty_tables: bool,
}

impl FaultyStore {
    pub fn new(tree: ConfigValue) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryConfigStore::new(tree))),
            writes: 0,
            fail_at: None,
            drift: None,
            drop_empty_tables: false,
        }
    }

    /// Makes write number `n` (zero based) fail.
    pub fn fail_write(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Applies `change` behind the updater's back once `n` writes succeeded.
    pub fn drift_after(mut self, n: usize, change: ConfigChange) -> Self {
        self.drift = Some((n, change));
        self
    }

    /// Behaves like Redis: a table disappears with its last entry.
    pub fn drop_empty_tables(mut self) -> Self {
        self.drop_empty_tables = true;
        self.prune_empty_tables();
        self
    }

    pub fn handle(&self) -> SharedStore {
        Rc::clone(&self.inner)
    }

    fn write<F>(&mut self, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut MemoryConfigStore) -> StoreResult<()>,
    {
        if self.fail_at == Some(self.writes) {
            return Err(StoreError::backend("write", "injected failure"));
        }
        f(&mut self.inner.borrow_mut())?;
        self.writes += 1;
        if self.drop_empty_tables {
            self.prune_empty_tables();
        }

        if let Some((after, change)) = &self.drift {
            if *after == self.writes {
                let mut inner = self.inner.borrow_mut();
                let mut tree = inner.snapshot();
                change.apply_to(&mut tree);
                *inner = MemoryConfigStore::new(tree);
            }
        }
        Ok(())
    }
}

impl FaultyStore {
    fn prune_empty_tables(&mut self) {
        let mut inner = self.inner.borrow_mut();
        let mut tree = inner.snapshot();
        if let Some(tables) = tree.as_object_mut() {
            tables.retain(|_, t| t.as_object().map_or(true, |entries| !entries.is_empty()));
        }
        *inner = MemoryConfigStore::new(tree);
    }
}

impl ConfigStore for FaultyStore {
    fn get_config(&self) -> StoreResult<ConfigValue> {
        self.inner.borrow().get_config()
    }

    fn get_table(&self, table: &str) -> StoreResult<Option<ConfigValue>> {
        self.inner.borrow().get_table(table)
    }

    fn get_entry(&self, table: &str, key: &str) -> StoreResult<Option<ConfigValue>> {
        self.inner.borrow().get_entry(table, key)
    }

    fn set_entry(&mut self, table: &str, key: &str, value: &ConfigValue) -> StoreResult<()> {
        self.write(|s| s.set_entry(table, key, value))
    }

    fn delete_entry(&mut self, table: &str, key: &str) -> StoreResult<()> {
        self.write(|s| s.delete_entry(table, key))
    }

    fn delete_table(&mut self, table: &str) -> StoreResult<()> {
        self.write(|s| s.delete_table(table))
    }

    fn set_table(&mut self, table: &str, value: &ConfigValue) -> StoreResult<()> {
        self.write(|s| s.set_table(table, value))
    }
}
