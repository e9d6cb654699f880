//! Integration test infrastructure for the generic configuration updater
//!
//! Provides:
//! - CONFIG_DB fixtures built from table/key/field changes
//! - Platform fixtures for the validator gate
//! - Stores that fail or drift mid-apply
//! - CONFIG_DB verification helpers

mod faulty;
pub mod fixtures;
mod verification;

pub use faulty::{FaultyStore, SharedStore};
pub use fixtures::*;
pub use verification::*;
