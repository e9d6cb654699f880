//! Update scopes on multi-ASIC switches.
//!
//! A single-ASIC switch has one CONFIG_DB, the host scope. A multi-ASIC
//! switch has one more per ASIC namespace (`asic0`, `asic1`, ...). Patches
//! for such a switch prefix every path with the scope name
//! (`/asic0/PORT/Ethernet0/mtu`); they are split here into one patch per
//! scope before planning.

use crate::error::{GcuError, GcuResult};
use crate::patch::PatchOperation;
use crate::path::{Path, Token};
use crate::value::ConfigValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the host scope.
pub const HOST_NAMESPACE: &str = "localhost";

static ASIC_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^asic(\d+)$").expect("Invalid regex pattern"));

/// A CONFIG_DB instance on the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Scope {
    #[default]
    Host,
    Asic(u32),
}

impl Scope {
    /// Linux network namespace name, `None` for the host.
    pub fn namespace(&self) -> Option<String> {
        match self {
            Scope::Host => None,
            Scope::Asic(id) => Some(format!("asic{}", id)),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Scope::Host)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Host => f.write_str(HOST_NAMESPACE),
            Scope::Asic(id) => write!(f, "asic{}", id),
        }
    }
}

impl FromStr for Scope {
    type Err = GcuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == HOST_NAMESPACE {
            return Ok(Scope::Host);
        }
        ASIC_NAMESPACE
            .captures(s)
            .and_then(|caps| caps[1].parse().ok())
            .map(Scope::Asic)
            .ok_or_else(|| GcuError::invalid_patch(format!("unknown scope '{}'", s)))
    }
}

/// Strips the scope token from the front of `path`.
fn split_path(path: &Path) -> GcuResult<(Scope, Path)> {
    let Some(first) = path.tokens().first() else {
        return Err(GcuError::invalid_patch(
            "multi-ASIC patch paths must start with a scope such as /localhost or /asic0",
        ));
    };
    let scope: Scope = first.as_string().parse()?;
    let rest: Vec<Token> = path.tokens()[1..].to_vec();
    Ok((scope, Path::new(rest)))
}

/// Groups a patch by scope.
///
/// Without multi-ASIC every operation belongs to the host scope unchanged.
/// With multi-ASIC each path (and `from`) must start with a scope name,
/// which is removed; `move`/`copy` may not cross scopes.
pub fn split_operations(
    ops: Vec<PatchOperation>,
    multi_asic: bool,
) -> GcuResult<BTreeMap<Scope, Vec<PatchOperation>>> {
    let mut by_scope: BTreeMap<Scope, Vec<PatchOperation>> = BTreeMap::new();
    if !multi_asic {
        if !ops.is_empty() {
            by_scope.insert(Scope::Host, ops);
        }
        return Ok(by_scope);
    }
    for op in ops {
        let (scope, path) = split_path(&op.path)?;
        let from = match &op.from {
            Some(from) => {
                let (from_scope, from_path) = split_path(from)?;
                if from_scope != scope {
                    return Err(GcuError::invalid_patch(format!(
                        "'{}' from {} to {} crosses scopes",
                        op.op, from_scope, scope
                    )));
                }
                Some(from_path)
            }
            None => None,
        };
        by_scope.entry(scope).or_default().push(PatchOperation {
            op: op.op,
            path,
            value: op.value,
            from,
        });
    }
    Ok(by_scope)
}

/// Splits a whole-switch configuration keyed by scope name.
pub fn split_config(tree: ConfigValue, multi_asic: bool) -> GcuResult<BTreeMap<Scope, ConfigValue>> {
    let mut by_scope = BTreeMap::new();
    if !multi_asic {
        by_scope.insert(Scope::Host, tree);
        return Ok(by_scope);
    }
    let ConfigValue::Object(scopes) = tree else {
        return Err(GcuError::invalid_patch("multi-ASIC configuration must be an object keyed by scope"));
    };
    for (name, config) in scopes {
        by_scope.insert(name.parse()?, config);
    }
    Ok(by_scope)
}
