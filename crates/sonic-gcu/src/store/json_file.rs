//! File-backed stores (`config_db.json` and STATE_DB snapshots).

use super::{ConfigStore, MemoryConfigStore, StateStore, StoreError, StoreResult};
use crate::scope::Scope;
use crate::value::ConfigValue;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

fn read_tree(path: &Path) -> StoreResult<ConfigValue> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path.display().to_string(), e))?;
    serde_json::from_str(&text).map_err(|e| StoreError::parse(path.display().to_string(), e.to_string()))
}

/// CONFIG_DB persisted as a JSON file.
///
/// Every read goes to disk, and every write replaces the file atomically
/// (temporary file in the same directory, then rename).
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    /// Opens an existing configuration file.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        read_tree(&path)?;
        Ok(Self { path })
    }

    /// Creates (or truncates) a configuration file holding `tree`.
    pub fn create(path: impl Into<PathBuf>, tree: &ConfigValue) -> StoreResult<Self> {
        let store = Self { path: path.into() };
        store.save(tree)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<MemoryConfigStore> {
        Ok(MemoryConfigStore::new(read_tree(&self.path)?))
    }

    fn save(&self, tree: &ConfigValue) -> StoreResult<()> {
        let shown = self.path.display().to_string();
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let text = serde_json::to_string_pretty(tree)
            .map_err(|e| StoreError::parse(shown.clone(), e.to_string()))?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(shown.clone(), e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.write_all(b"\n"))
            .map_err(|e| StoreError::io(shown.clone(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(shown.clone(), e.error))?;
        debug!(path = %shown, "Wrote configuration file");
        Ok(())
    }

    fn modify<F>(&mut self, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut MemoryConfigStore) -> StoreResult<()>,
    {
        let mut memory = self.load()?;
        f(&mut memory)?;
        self.save(&memory.snapshot())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get_config(&self) -> StoreResult<ConfigValue> {
        read_tree(&self.path)
    }

    fn get_table(&self, table: &str) -> StoreResult<Option<ConfigValue>> {
        self.load()?.get_table(table)
    }

    fn get_entry(&self, table: &str, key: &str) -> StoreResult<Option<ConfigValue>> {
        self.load()?.get_entry(table, key)
    }

    fn set_entry(&mut self, table: &str, key: &str, value: &ConfigValue) -> StoreResult<()> {
        self.modify(|m| m.set_entry(table, key, value))
    }

    fn delete_entry(&mut self, table: &str, key: &str) -> StoreResult<()> {
        self.modify(|m| m.delete_entry(table, key))
    }

    fn delete_table(&mut self, table: &str) -> StoreResult<()> {
        self.modify(|m| m.delete_table(table))
    }

    fn set_table(&mut self, table: &str, value: &ConfigValue) -> StoreResult<()> {
        self.modify(|m| m.set_table(table, value))
    }
}

/// STATE_DB snapshots stored as JSON files, one per scope.
///
/// A scope without a file, or a missing file, simply has no data.
#[derive(Debug, Clone, Default)]
pub struct JsonStateStore {
    files: BTreeMap<Scope, PathBuf>,
}

impl JsonStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, scope: Scope, path: impl Into<PathBuf>) -> Self {
        self.files.insert(scope, path.into());
        self
    }
}

impl StateStore for JsonStateStore {
    fn get_field(
        &self,
        scope: Scope,
        table: &str,
        key: &str,
        field: &str,
    ) -> StoreResult<Option<String>> {
        let Some(path) = self.files.get(&scope) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let tree = read_tree(path)?;
        Ok(tree
            .get(table)
            .and_then(|t| t.get(key))
            .and_then(|e| e.get(field))
            .and_then(ConfigValue::scalar_string))
    }
}
