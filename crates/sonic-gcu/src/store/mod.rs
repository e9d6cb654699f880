//! Configuration and state stores.
//!
//! The engine reads and writes CONFIG_DB through [`ConfigStore`] and reads
//! platform capabilities from STATE_DB through [`StateStore`]. Every call is
//! blocking; the apply loop re-reads the live store before each write.

mod json_file;
mod memory;
#[cfg(feature = "redis")]
mod redis_db;

pub use json_file::{JsonFileConfigStore, JsonStateStore};
pub use memory::{MemoryConfigStore, MemoryStateStore};
#[cfg(feature = "redis")]
pub use redis_db::{RedisConfig, RedisConfigStore, RedisDb, RedisStateStore};

use crate::scope::Scope;
use crate::value::ConfigValue;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Backend operation failed: {operation}: {message}")]
    Backend { operation: String, message: String },

    #[error("Invalid value for {table}|{key}: {message}")]
    InvalidValue {
        table: String,
        key: String,
        message: String,
    },
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid_value(
        table: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            table: table.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Live CONFIG_DB access.
///
/// A configuration is `table → key → entry`. Entries are usually objects of
/// fields; backends that can only store strings reject anything else.
pub trait ConfigStore {
    /// Full snapshot of the configuration.
    fn get_config(&self) -> StoreResult<ConfigValue>;

    /// One table, `None` when it does not exist.
    fn get_table(&self, table: &str) -> StoreResult<Option<ConfigValue>>;

    /// One entry, `None` when it does not exist.
    fn get_entry(&self, table: &str, key: &str) -> StoreResult<Option<ConfigValue>>;

    /// Creates or overwrites an entry.
    fn set_entry(&mut self, table: &str, key: &str, value: &ConfigValue) -> StoreResult<()>;

    /// Deletes an entry; deleting a missing entry is not an error.
    fn delete_entry(&mut self, table: &str, key: &str) -> StoreResult<()>;

    /// Deletes a whole table.
    fn delete_table(&mut self, table: &str) -> StoreResult<()>;

    /// Replaces a whole table with `value` (an object of entries).
    fn set_table(&mut self, table: &str, value: &ConfigValue) -> StoreResult<()> {
        let entries = value
            .as_object()
            .ok_or_else(|| StoreError::invalid_value(table, "", "table must be an object"))?;
        self.delete_table(table)?;
        for (key, entry) in entries {
            self.set_entry(table, key, entry)?;
        }
        Ok(())
    }
}

/// Read access to STATE_DB capability fields.
pub trait StateStore {
    fn get_field(
        &self,
        scope: Scope,
        table: &str,
        key: &str,
        field: &str,
    ) -> StoreResult<Option<String>>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for Box<T> {
    fn get_config(&self) -> StoreResult<ConfigValue> {
        (**self).get_config()
    }

    fn get_table(&self, table: &str) -> StoreResult<Option<ConfigValue>> {
        (**self).get_table(table)
    }

    fn get_entry(&self, table: &str, key: &str) -> StoreResult<Option<ConfigValue>> {
        (**self).get_entry(table, key)
    }

    fn set_entry(&mut self, table: &str, key: &str, value: &ConfigValue) -> StoreResult<()> {
        (**self).set_entry(table, key, value)
    }

    fn delete_entry(&mut self, table: &str, key: &str) -> StoreResult<()> {
        (**self).delete_entry(table, key)
    }

    fn delete_table(&mut self, table: &str) -> StoreResult<()> {
        (**self).delete_table(table)
    }

    fn set_table(&mut self, table: &str, value: &ConfigValue) -> StoreResult<()> {
        (**self).set_table(table, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::backend("hgetall", "connection refused");
        assert_eq!(
            err.to_string(),
            "Backend operation failed: hgetall: connection refused"
        );
        let err = StoreError::invalid_value("PORT", "Ethernet0", "entry must be an object");
        assert_eq!(
            err.to_string(),
            "Invalid value for PORT|Ethernet0: entry must be an object"
        );
    }
}
