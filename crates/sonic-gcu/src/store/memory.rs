//! In-memory stores.

use super::{ConfigStore, StateStore, StoreResult};
use crate::scope::Scope;
use crate::value::{ConfigObject, ConfigValue};
use std::collections::BTreeMap;

/// CONFIG_DB held in memory. Empty tables are kept.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    tree: ConfigObject,
}

impl MemoryConfigStore {
    /// Creates a store from a configuration tree; non-object trees start empty.
    pub fn new(tree: ConfigValue) -> Self {
        match tree {
            ConfigValue::Object(tree) => Self { tree },
            _ => Self::default(),
        }
    }

    /// Current content.
    pub fn snapshot(&self) -> ConfigValue {
        ConfigValue::Object(self.tree.clone())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_config(&self) -> StoreResult<ConfigValue> {
        Ok(self.snapshot())
    }

    fn get_table(&self, table: &str) -> StoreResult<Option<ConfigValue>> {
        Ok(self.tree.get(table).cloned())
    }

    fn get_entry(&self, table: &str, key: &str) -> StoreResult<Option<ConfigValue>> {
        Ok(self.tree.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn set_entry(&mut self, table: &str, key: &str, value: &ConfigValue) -> StoreResult<()> {
        let slot = self
            .tree
            .entry(table.to_string())
            .or_insert_with(ConfigValue::empty_object);
        if !slot.is_object() {
            *slot = ConfigValue::empty_object();
        }
        if let Some(entries) = slot.as_object_mut() {
            entries.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn delete_entry(&mut self, table: &str, key: &str) -> StoreResult<()> {
        if let Some(entries) = self.tree.get_mut(table).and_then(ConfigValue::as_object_mut) {
            entries.remove(key);
        }
        Ok(())
    }

    fn delete_table(&mut self, table: &str) -> StoreResult<()> {
        self.tree.remove(table);
        Ok(())
    }

    fn set_table(&mut self, table: &str, value: &ConfigValue) -> StoreResult<()> {
        self.tree.insert(table.to_string(), value.clone());
        Ok(())
    }
}

/// STATE_DB snapshots per scope held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    scopes: BTreeMap<Scope, ConfigValue>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `tree` (`table → key → field`) as the state of `scope`.
    pub fn with_tree(mut self, scope: Scope, tree: ConfigValue) -> Self {
        self.scopes.insert(scope, tree);
        self
    }

    /// Sets one field, creating the table and entry as needed.
    pub fn set_field(&mut self, scope: Scope, table: &str, key: &str, field: &str, value: &str) {
        let mut store = MemoryConfigStore::new(self.scopes.remove(&scope).unwrap_or_default());
        let mut entry = store
            .get_entry(table, key)
            .ok()
            .flatten()
            .and_then(|e| e.as_object().cloned())
            .unwrap_or_default();
        entry.insert(field.to_string(), ConfigValue::string(value));
        let _ = store.set_entry(table, key, &ConfigValue::Object(entry));
        self.scopes.insert(scope, store.snapshot());
    }
}

impl StateStore for MemoryStateStore {
    fn get_field(
        &self,
        scope: Scope,
        table: &str,
        key: &str,
        field: &str,
    ) -> StoreResult<Option<String>> {
        Ok(self
            .scopes
            .get(&scope)
            .and_then(|tree| tree.get(table))
            .and_then(|t| t.get(key))
            .and_then(|e| e.get(field))
            .and_then(ConfigValue::scalar_string))
    }
}
