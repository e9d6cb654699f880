//! Patch documents and planned moves.
//!
//! A [`PatchOperation`] is one entry of an RFC 6902 JSON Patch as supplied by
//! the user. A [`Move`] is one atomic edit produced by the differ: it only
//! ever adds, removes or replaces, and it records the precondition that held
//! when it was planned so the applier can detect drift in the live store.

use crate::error::{GcuError, GcuResult};
use crate::path::{self, Path, ResolveError};
use crate::value::ConfigValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// JSON Patch verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Replace => "replace",
            PatchOp::Move => "move",
            PatchOp::Copy => "copy",
            PatchOp::Test => "test",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a JSON Patch document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConfigValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Path>,
}

impl PatchOperation {
    pub fn add(path: Path, value: ConfigValue) -> Self {
        Self {
            op: PatchOp::Add,
            path,
            value: Some(value),
            from: None,
        }
    }

    pub fn remove(path: Path) -> Self {
        Self {
            op: PatchOp::Remove,
            path,
            value: None,
            from: None,
        }
    }

    pub fn replace(path: Path, value: ConfigValue) -> Self {
        Self {
            op: PatchOp::Replace,
            path,
            value: Some(value),
            from: None,
        }
    }

    pub fn element(&self) -> PatchElement<'_> {
        PatchElement {
            op: self.op,
            path: &self.path,
            value: self.value.as_ref(),
        }
    }
}

/// Parses a JSON Patch document.
pub fn parse_patch(text: &str) -> GcuResult<Vec<PatchOperation>> {
    serde_json::from_str(text).map_err(|e| GcuError::invalid_patch(e.to_string()))
}

/// Read-only view of an edit handed to the validators.
#[derive(Debug, Clone, Copy)]
pub struct PatchElement<'a> {
    pub op: PatchOp,
    pub path: &'a Path,
    pub value: Option<&'a ConfigValue>,
}

/// Verb of a planned move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveOp {
    Add,
    Remove,
    Replace,
}

impl From<MoveOp> for PatchOp {
    fn from(op: MoveOp) -> Self {
        match op {
            MoveOp::Add => PatchOp::Add,
            MoveOp::Remove => PatchOp::Remove,
            MoveOp::Replace => PatchOp::Replace,
        }
    }
}

/// State a move expects to find at its path before it runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Precondition {
    /// Nothing exists at the path, but its parent does.
    Absent,
    /// The path holds exactly this value.
    Equals(ConfigValue),
}

/// Why a precondition does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error(transparent)]
    Unresolvable(#[from] ResolveError),

    #[error("'{path}' already exists")]
    AlreadyPresent { path: String },

    #[error("'{path}' is {actual}, expected {expected}")]
    Mismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

/// One atomic planned edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Move {
    pub op: MoveOp,
    pub path: Path,
    pub value: Option<ConfigValue>,
    pub precondition: Precondition,
}

impl Move {
    pub fn add(path: Path, value: ConfigValue) -> Self {
        Self {
            op: MoveOp::Add,
            path,
            value: Some(value),
            precondition: Precondition::Absent,
        }
    }

    pub fn remove(path: Path, prior: ConfigValue) -> Self {
        Self {
            op: MoveOp::Remove,
            path,
            value: None,
            precondition: Precondition::Equals(prior),
        }
    }

    pub fn replace(path: Path, prior: ConfigValue, value: ConfigValue) -> Self {
        Self {
            op: MoveOp::Replace,
            path,
            value: Some(value),
            precondition: Precondition::Equals(prior),
        }
    }

    /// Value expected at the path before the move, if any.
    pub fn prior(&self) -> Option<&ConfigValue> {
        match &self.precondition {
            Precondition::Absent => None,
            Precondition::Equals(v) => Some(v),
        }
    }

    /// Checks the planned precondition against `tree`.
    pub fn check_precondition(&self, tree: &ConfigValue) -> Result<(), PreconditionError> {
        match &self.precondition {
            Precondition::Absent => {
                if let Some(parent) = self.path.parent() {
                    let holder = path::resolve(tree, &parent)?;
                    if !holder.is_object() && !holder.is_array() {
                        return Err(ResolveError::NotAContainer {
                            at: parent.to_string(),
                            token: self.path.segment(parent.len()).unwrap_or_default(),
                            kind: holder.kind(),
                        }
                        .into());
                    }
                }
                if path::exists(tree, &self.path) {
                    return Err(PreconditionError::AlreadyPresent {
                        path: self.path.to_string(),
                    });
                }
                Ok(())
            }
            Precondition::Equals(expected) => {
                let actual = path::resolve(tree, &self.path)?;
                if actual != expected {
                    return Err(PreconditionError::Mismatch {
                        path: self.path.to_string(),
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Applies the move to `tree` without checking the precondition.
    pub fn apply_to(&self, tree: &mut ConfigValue) -> Result<(), ResolveError> {
        match self.op {
            MoveOp::Add => path::insert(tree, &self.path, self.value.clone().unwrap_or_default()),
            MoveOp::Remove => path::remove(tree, &self.path).map(|_| ()),
            MoveOp::Replace => {
                path::replace(tree, &self.path, self.value.clone().unwrap_or_default()).map(|_| ())
            }
        }
    }

    pub fn element(&self) -> PatchElement<'_> {
        PatchElement {
            op: self.op.into(),
            path: &self.path,
            value: self.value.as_ref(),
        }
    }

    /// JSON Patch form of the move, for reporting.
    pub fn to_operation(&self) -> PatchOperation {
        PatchOperation {
            op: self.op.into(),
            path: self.path.clone(),
            value: self.value.clone(),
            from: None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", PatchOp::from(self.op), self.path)
    }
}

/// Applies a literal JSON Patch to a copy of `tree` (RFC 6902 semantics).
pub fn apply_operations(tree: &ConfigValue, ops: &[PatchOperation]) -> GcuResult<ConfigValue> {
    let mut working = tree.clone();
    for (index, op) in ops.iter().enumerate() {
        apply_operation(&mut working, op)
            .map_err(|e| e.into_gcu_error(index, &op.path))?;
    }
    Ok(working)
}

enum SimulationError {
    Resolve(ResolveError),
    Invalid(String),
}

impl From<ResolveError> for SimulationError {
    fn from(e: ResolveError) -> Self {
        SimulationError::Resolve(e)
    }
}

impl SimulationError {
    fn into_gcu_error(self, index: usize, path: &Path) -> GcuError {
        match self {
            SimulationError::Resolve(e) => {
                GcuError::path_resolution(Some(index), path.to_string(), e.into())
            }
            SimulationError::Invalid(message) => {
                GcuError::invalid_patch(format!("operation {} at '{}': {}", index, path, message))
            }
        }
    }
}

fn apply_operation(tree: &mut ConfigValue, op: &PatchOperation) -> Result<(), SimulationError> {
    let value = || {
        op.value
            .clone()
            .ok_or_else(|| SimulationError::Invalid(format!("'{}' requires a value", op.op)))
    };
    let from = || {
        op.from
            .clone()
            .ok_or_else(|| SimulationError::Invalid(format!("'{}' requires 'from'", op.op)))
    };
    match op.op {
        PatchOp::Add => path::insert(tree, &op.path, value()?)?,
        PatchOp::Remove => {
            path::remove(tree, &op.path)?;
        }
        PatchOp::Replace => {
            path::replace(tree, &op.path, value()?)?;
        }
        PatchOp::Move => {
            let from = from()?;
            if op.path.is_descendant_of(&from) {
                return Err(SimulationError::Invalid(format!(
                    "cannot move '{}' into its own child",
                    from
                )));
            }
            let moved = path::remove(tree, &from)?;
            path::insert(tree, &op.path, moved)?;
        }
        PatchOp::Copy => {
            let copied = path::resolve(tree, &from()?)?.clone();
            path::insert(tree, &op.path, copied)?;
        }
        PatchOp::Test => {
            let expected = value()?;
            let actual = path::resolve(tree, &op.path)?;
            if *actual != expected {
                return Err(SimulationError::Invalid(format!(
                    "test failed: found {}, expected {}",
                    actual, expected
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn p(pointer: &str) -> Path {
        Path::parse(pointer).unwrap()
    }

    fn tree() -> ConfigValue {
        ConfigValue::from(json!({
            "PORT": {"Ethernet0": {"mtu": "9100", "admin_status": "up"}},
            "VLAN": {}
        }))
    }

    #[test]
    fn test_parse_patch_document() {
        let ops = parse_patch(
            r#"[{"op": "replace", "path": "/PORT/Ethernet0/mtu", "value": "1500"},
                {"op": "move", "from": "/PORT/Ethernet0/mtu", "path": "/PORT/Ethernet0/x"}]"#,
        )
        .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].op, PatchOp::Replace);
        assert_eq!(ops[1].from, Some(p("/PORT/Ethernet0/mtu")));
        assert!(parse_patch(r#"[{"op": "frobnicate", "path": "/x"}]"#).is_err());
    }

    #[test]
    fn test_apply_operations_all_verbs() {
        let ops = vec![
            PatchOperation::replace(p("/PORT/Ethernet0/mtu"), "1500".into()),
            PatchOperation::add(p("/VLAN/Vlan10"), ConfigValue::from(json!({"vlanid": "10"}))),
            PatchOperation {
                op: PatchOp::Copy,
                path: p("/VLAN/Vlan20"),
                value: None,
                from: Some(p("/VLAN/Vlan10")),
            },
            PatchOperation {
                op: PatchOp::Move,
                path: p("/PORT/Ethernet0/state"),
                value: None,
                from: Some(p("/PORT/Ethernet0/admin_status")),
            },
            PatchOperation {
                op: PatchOp::Test,
                path: p("/PORT/Ethernet0/state"),
                value: Some("up".into()),
                from: None,
            },
            PatchOperation::remove(p("/VLAN/Vlan20")),
        ];
        let out = apply_operations(&tree(), &ops).unwrap();
        assert_eq!(
            out.to_json(),
            json!({
                "PORT": {"Ethernet0": {"mtu": "1500", "state": "up"}},
                "VLAN": {"Vlan10": {"vlanid": "10"}}
            })
        );
    }

    #[test]
    fn test_apply_operations_reports_index() {
        let ops = vec![
            PatchOperation::replace(p("/PORT/Ethernet0/mtu"), "1500".into()),
            PatchOperation::remove(p("/PORT/Ethernet4")),
        ];
        match apply_operations(&tree(), &ops) {
            Err(GcuError::PathResolution { index, path, .. }) => {
                assert_eq!(index, Some(1));
                assert_eq!(path, "/PORT/Ethernet4");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_failed_test_op_is_invalid_patch() {
        let ops = vec![PatchOperation {
            op: PatchOp::Test,
            path: p("/PORT/Ethernet0/mtu"),
            value: Some("1500".into()),
            from: None,
        }];
        assert!(matches!(
            apply_operations(&tree(), &ops),
            Err(GcuError::InvalidPatch { .. })
        ));
    }

    #[test]
    fn test_move_preconditions() {
        let t = tree();
        let add = Move::add(p("/VLAN/Vlan10"), ConfigValue::from(json!({"vlanid": "10"})));
        assert!(add.check_precondition(&t).is_ok());

        let dup = Move::add(p("/PORT/Ethernet0"), ConfigValue::empty_object());
        assert!(matches!(
            dup.check_precondition(&t),
            Err(PreconditionError::AlreadyPresent { .. })
        ));

        let orphan = Move::add(p("/VLAN_MEMBER/Vlan10|Ethernet0"), ConfigValue::empty_object());
        assert!(matches!(
            orphan.check_precondition(&t),
            Err(PreconditionError::Unresolvable(_))
        ));

        let stale = Move::replace(p("/PORT/Ethernet0/mtu"), "1500".into(), "9000".into());
        assert!(matches!(
            stale.check_precondition(&t),
            Err(PreconditionError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_move_apply_and_display() {
        let mut t = tree();
        let m = Move::replace(p("/PORT/Ethernet0/mtu"), "9100".into(), "1500".into());
        m.apply_to(&mut t).unwrap();
        assert_eq!(
            path::resolve(&t, &p("/PORT/Ethernet0/mtu")).unwrap(),
            &ConfigValue::string("1500")
        );
        assert_eq!(m.to_string(), "replace /PORT/Ethernet0/mtu");
        assert_eq!(
            serde_json::to_value(m.to_operation()).unwrap(),
            json!({"op": "replace", "path": "/PORT/Ethernet0/mtu", "value": "1500"})
        );
    }
}
