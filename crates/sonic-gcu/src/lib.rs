//! Generic Configuration Update (GCU) engine for SONiC CONFIG_DB
//!
//! Turns a JSON Patch (or a full target configuration) into an ordered list
//! of atomic moves and applies them to the running configuration so that
//! every intermediate state stays valid.
//!
//! Key features:
//! - JSON pointer resolution over the configuration tree
//! - Differ producing add/remove/replace moves with preconditions
//! - Move sorter searching for an order accepted by a structural oracle
//! - Validator gate with static rules and per-table field operation validators
//! - Applier re-checking every move against the live store before writing
//! - Checkpoints, rollback and multi-ASIC scope handling

pub mod applier;
pub mod checkpoint;
pub mod config;
pub mod diff;
pub mod error;
pub mod key;
pub mod patch;
pub mod path;
pub mod scope;
pub mod sorter;
pub mod store;
pub mod tables;
pub mod updater;
pub mod validator;
pub mod value;

pub use applier::{apply, CommitReport};
pub use checkpoint::CheckpointStore;
pub use config::{ConfigError, GcuConfig, StoreBackend};
pub use diff::diff;
pub use error::{GcuError, GcuResult};
pub use key::EntryKey;
pub use patch::{apply_operations, parse_patch, Move, MoveOp, PatchOp, PatchOperation};
pub use path::{Path, ResolveError};
pub use scope::Scope;
pub use sorter::{MoveSorter, ReferentialOracle, StructuralOracle};
pub use store::{ConfigStore, MemoryConfigStore, MemoryStateStore, StateStore, StoreError};
pub use updater::{GenericUpdater, ScopePlan, UpdateReport};
pub use validator::{PlatformInfo, RuleMetadata, ValidatorGate};
pub use value::{ConfigTree, ConfigValue};
