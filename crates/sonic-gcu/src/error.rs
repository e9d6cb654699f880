//! Error types for configuration updates.
//!
//! Every failure the engine reports is a [`GcuError`]. Planning failures
//! (`PathResolution`, `Structural`, `IllegalPatchOperation`, `InvalidPatch`)
//! are raised before anything is written. Only `ConcurrentModification` and
//! `Apply` can leave a partially updated store, and both carry the number of
//! moves that were committed before the failure.

use crate::config::ConfigError;
use crate::patch::PreconditionError;
use crate::store::StoreError;
use crate::validator::rules::RuleError;
use thiserror::Error;

/// Result type alias for update operations.
pub type GcuResult<T> = Result<T, GcuError>;

/// Errors that can occur while planning or applying an update.
#[derive(Debug, Error)]
pub enum GcuError {
    /// A move's path could not be resolved against any reachable tree state.
    #[error("Path resolution failed for move {index:?} at '{path}': {source}")]
    PathResolution {
        /// Position of the offending move in its input list, if known.
        index: Option<usize>,
        /// JSON pointer of the move.
        path: String,
        #[source]
        source: PreconditionError,
    },

    /// No ordering of the moves keeps every intermediate tree valid.
    #[error("No valid ordering found after exploring {explored} states: {reason}")]
    Structural {
        /// Last rejection reported by the structural oracle.
        reason: String,
        /// Number of search states visited.
        explored: usize,
    },

    /// A move is not permitted on this platform or is statically forbidden.
    #[error("Modification of {table} table field '{field}' is illegal ({rule}): {reason}")]
    IllegalPatchOperation {
        table: String,
        field: String,
        /// Name of the rule or validator that denied the change.
        rule: String,
        reason: String,
    },

    /// The live store no longer matches what the plan expected.
    #[error("Concurrent modification detected at move {index} '{path}' ({committed} committed): {reason}")]
    ConcurrentModification {
        index: usize,
        path: String,
        /// Moves written before the drift was detected.
        committed: usize,
        reason: String,
    },

    /// A store write failed mid-patch.
    #[error("Apply failed at move {index} '{path}' ({committed} committed): {source}")]
    Apply {
        index: usize,
        path: String,
        committed: usize,
        #[source]
        source: StoreError,
    },

    /// The input patch document is malformed or cannot be simulated.
    #[error("Invalid patch: {message}")]
    InvalidPatch { message: String },

    /// Store access outside of the apply loop failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Rule metadata could not be loaded.
    #[error("Rule metadata error: {0}")]
    Rules(#[from] RuleError),

    /// Configuration file problem.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Checkpoint management failed.
    #[error("Checkpoint '{name}': {message}")]
    Checkpoint { name: String, message: String },

    /// Platform facts could not be determined.
    #[error("Platform detection failed: {message}")]
    Platform { message: String },
}

impl GcuError {
    /// Creates a path resolution error.
    pub fn path_resolution(
        index: Option<usize>,
        path: impl Into<String>,
        source: PreconditionError,
    ) -> Self {
        Self::PathResolution {
            index,
            path: path.into(),
            source,
        }
    }

    /// Creates a structural error.
    pub fn structural(reason: impl Into<String>, explored: usize) -> Self {
        Self::Structural {
            reason: reason.into(),
            explored,
        }
    }

    /// Creates an illegal patch operation error.
    pub fn illegal_operation(
        table: impl Into<String>,
        field: impl Into<String>,
        rule: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::IllegalPatchOperation {
            table: table.into(),
            field: field.into(),
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid patch error.
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            message: message.into(),
        }
    }

    /// Creates a checkpoint error.
    pub fn checkpoint(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Checkpoint {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a platform error.
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Number of moves already written when the error was raised.
    pub fn committed(&self) -> usize {
        match self {
            GcuError::ConcurrentModification { committed, .. } | GcuError::Apply { committed, .. } => {
                *committed
            }
            _ => 0,
        }
    }

    /// Returns true if the store is guaranteed untouched by the failed update.
    pub fn is_zero_effect(&self) -> bool {
        self.committed() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_operation_display() {
        let err = GcuError::illegal_operation(
            "LOOPBACK_INTERFACE",
            "Loopback0",
            "static",
            "removal is not allowed",
        );
        assert_eq!(
            err.to_string(),
            "Modification of LOOPBACK_INTERFACE table field 'Loopback0' is illegal (static): removal is not allowed"
        );
        assert!(err.is_zero_effect());
    }

    #[test]
    fn test_structural_display() {
        let err = GcuError::structural("VLAN_MEMBER requires VLAN|Vlan10", 42);
        assert!(err.to_string().contains("42 states"));
        assert!(err.to_string().contains("Vlan10"));
    }

    #[test]
    fn test_committed_count() {
        let err = GcuError::ConcurrentModification {
            index: 2,
            path: "/PORT/Ethernet0/mtu".to_string(),
            committed: 2,
            reason: "value changed".to_string(),
        };
        assert_eq!(err.committed(), 2);
        assert!(!err.is_zero_effect());

        let err = GcuError::Apply {
            index: 0,
            path: "/PORT".to_string(),
            committed: 0,
            source: StoreError::backend("set_entry", "connection refused"),
        };
        assert!(err.is_zero_effect());
    }
}
