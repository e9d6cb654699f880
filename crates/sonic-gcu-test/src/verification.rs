//! Verification helpers for CONFIG_DB state
//!
//! Provides assertion helpers to verify what an update left in the store

use sonic_gcu::store::{ConfigStore, StoreError};
use sonic_gcu::ConfigValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Expected entry '{table}|{key}' not found in CONFIG_DB")]
    EntryNotFound { table: String, key: String },

    #[error("Entry '{table}|{key}' should not exist")]
    UnexpectedEntry { table: String, key: String },

    #[error("Expected field '{field}' not found in '{table}|{key}'")]
    FieldNotFound {
        table: String,
        key: String,
        field: String,
    },

    #[error("Value mismatch for {table}|{key}:{field}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        table: String,
        key: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Expected {expected} entries in table '{table}', found {actual}")]
    EntryCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// CONFIG_DB verification helper
pub struct ConfigDbVerifier<'a> {
    store: &'a dyn ConfigStore,
}

impl<'a> ConfigDbVerifier<'a> {
    /// Create a new CONFIG_DB verifier
    pub fn new(store: &'a dyn ConfigStore) -> Self {
        Self { store }
    }

    fn entry(&self, table: &str, key: &str) -> VerifyResult<ConfigValue> {
        self.store
            .get_entry(table, key)?
            .ok_or_else(|| VerificationError::EntryNotFound {
                table: table.to_string(),
                key: key.to_string(),
            })
    }

    /// Verify that an entry exists
    pub fn assert_entry_exists(&self, table: &str, key: &str) -> VerifyResult<()> {
        self.entry(table, key).map(|_| ())
    }

    /// Verify that an entry does not exist
    pub fn assert_entry_not_exists(&self, table: &str, key: &str) -> VerifyResult<()> {
        if self.store.get_entry(table, key)?.is_some() {
            return Err(VerificationError::UnexpectedEntry {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Verify that a field has a specific value
    pub fn assert_field_value(
        &self,
        table: &str,
        key: &str,
        field: &str,
        expected: &str,
    ) -> VerifyResult<()> {
        let entry = self.entry(table, key)?;
        match entry.get(field).and_then(ConfigValue::scalar_string) {
            None => Err(VerificationError::FieldNotFound {
                table: table.to_string(),
                key: key.to_string(),
                field: field.to_string(),
            }),
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(VerificationError::ValueMismatch {
                table: table.to_string(),
                key: key.to_string(),
                field: field.to_string(),
                expected: expected.to_string(),
                actual,
            }),
        }
    }

    /// Verify that all fields match expected values
    pub fn assert_all_fields(
        &self,
        table: &str,
        key: &str,
        expected: &BTreeMap<String, String>,
    ) -> VerifyResult<()> {
        for (field, value) in expected {
            self.assert_field_value(table, key, field, value)?;
        }
        Ok(())
    }

    /// Verify the number of entries in a table; a missing table has none
    pub fn assert_entry_count(&self, table: &str, expected: usize) -> VerifyResult<()> {
        let actual = self
            .store
            .get_table(table)?
            .and_then(|t| t.as_object().map(|entries| entries.len()))
            .unwrap_or(0);
        if actual != expected {
            return Err(VerificationError::EntryCountMismatch {
                table: table.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify the whole configuration
    pub fn assert_config(&self, expected: &ConfigValue) -> VerifyResult<()> {
        let actual = self.store.get_config()?;
        if actual != *expected {
            return Err(VerificationError::ValueMismatch {
                table: "*".to_string(),
                key: "*".to_string(),
                field: "*".to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}
