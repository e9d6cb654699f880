//! Named configuration checkpoints.
//!
//! A checkpoint is a full CONFIG_DB snapshot stored as
//! `<dir>/<name>.cp.json`. Rollback replaces the running configuration with
//! a checkpoint through the normal update pipeline.

use crate::error::{GcuError, GcuResult};
use crate::value::ConfigValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File suffix of checkpoint files.
pub const CHECKPOINT_EXT: &str = ".cp.json";

/// Default checkpoint directory on a switch.
pub const DEFAULT_CHECKPOINT_DIR: &str = "/etc/sonic/checkpoints";

static CHECKPOINT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{0,127}$").expect("Invalid regex pattern"));

/// Checks that `name` can be used as a checkpoint file name.
pub fn validate_name(name: &str) -> GcuResult<()> {
    if CHECKPOINT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(GcuError::checkpoint(
            name,
            "names must start with a letter or digit and contain only letters, digits, '_', '-' or '.'",
        ))
    }
}

/// Directory of checkpoint files.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, CHECKPOINT_EXT))
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.file(name).is_file()
    }

    /// Saves `config` as checkpoint `name`, replacing any previous one.
    pub fn create(&self, name: &str, config: &ConfigValue) -> GcuResult<PathBuf> {
        validate_name(name)?;
        let io_err = |e: io::Error| GcuError::checkpoint(name, e.to_string());

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let text = serde_json::to_string_pretty(config)
            .map_err(|e| GcuError::checkpoint(name, e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(text.as_bytes()).map_err(io_err)?;
        let path = self.file(name);
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        info!(name, path = %path.display(), "Checkpoint created");
        Ok(path)
    }

    /// Reads checkpoint `name`.
    pub fn load(&self, name: &str) -> GcuResult<ConfigValue> {
        validate_name(name)?;
        let path = self.file(name);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GcuError::checkpoint(name, "checkpoint does not exist"),
            _ => GcuError::checkpoint(name, e.to_string()),
        })?;
        let config: ConfigValue = serde_json::from_str(&text)
            .map_err(|e| GcuError::checkpoint(name, format!("invalid checkpoint file: {}", e)))?;
        if !config.is_object() {
            return Err(GcuError::checkpoint(name, "checkpoint is not a configuration object"));
        }
        Ok(config)
    }

    /// Deletes checkpoint `name`; deleting a missing checkpoint is an error.
    pub fn delete(&self, name: &str) -> GcuResult<()> {
        validate_name(name)?;
        fs::remove_file(self.file(name)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GcuError::checkpoint(name, "checkpoint does not exist"),
            _ => GcuError::checkpoint(name, e.to_string()),
        })?;
        info!(name, "Checkpoint deleted");
        Ok(())
    }

    /// Names of all checkpoints, sorted.
    pub fn list(&self) -> GcuResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GcuError::checkpoint("*", e.to_string())),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GcuError::checkpoint("*", e.to_string()))?;
            let file_name = entry.file_name();
            if let Some(name) = file_name
                .to_str()
                .and_then(|f| f.strip_suffix(CHECKPOINT_EXT))
            {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_name_validation() {
        for ok in ["before-upgrade", "cp_1", "2024.10.19"] {
            assert!(validate_name(ok).is_ok(), "{}", ok);
        }
        for bad in ["", "../etc", ".hidden", "a/b", "with space"] {
            assert!(validate_name(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_create_load_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoints"));
        assert!(store.list().unwrap().is_empty());

        let config = ConfigValue::from(json!({"VLAN": {"Vlan10": {"vlanid": "10"}}}));
        let path = store.create("b", &config).unwrap();
        assert!(path.ends_with("b.cp.json"));
        store.create("a", &ConfigValue::empty_object()).unwrap();
        fs::write(dir.path().join("checkpoints").join("notes.txt"), "x").unwrap();

        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.load("b").unwrap(), config);
        assert!(store.exists("a"));

        store.delete("a").unwrap();
        assert!(!store.exists("a"));
        assert!(matches!(store.delete("a"), Err(GcuError::Checkpoint { .. })));
        assert!(matches!(store.load("a"), Err(GcuError::Checkpoint { .. })));
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.cp.json"), "[1, 2]").unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load("bad").is_err());
    }
}
