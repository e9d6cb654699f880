//! Structural validity checks used by the move sorter.
//!
//! The sorter never interprets configuration semantics itself. It asks a
//! [`StructuralOracle`] whether a whole tree is acceptable and backtracks when
//! the answer is no. [`ReferentialOracle`] covers the dependencies the update
//! engine has to respect on SONiC: compound keys that need their parent entry
//! and fields that name an entry in another table.

use crate::key::EntryKey;
use crate::tables::*;
use crate::value::{ConfigObject, ConfigValue};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Reason a tree was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRejection {
    pub reason: String,
}

impl OracleRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for OracleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Decides whether a configuration tree is structurally valid.
pub trait StructuralOracle {
    fn validate(&self, tree: &ConfigValue) -> Result<(), OracleRejection>;
}

/// Oracle that accepts every tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl StructuralOracle for AcceptAll {
    fn validate(&self, _tree: &ConfigValue) -> Result<(), OracleRejection> {
        Ok(())
    }
}

/// Runs several oracles in order; the first rejection wins.
#[derive(Default)]
pub struct CompositeOracle {
    oracles: Vec<Box<dyn StructuralOracle>>,
}

impl CompositeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, oracle: impl StructuralOracle + 'static) -> Self {
        self.oracles.push(Box::new(oracle));
        self
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }
}

impl StructuralOracle for CompositeOracle {
    fn validate(&self, tree: &ConfigValue) -> Result<(), OracleRejection> {
        self.oracles.iter().try_for_each(|o| o.validate(tree))
    }
}

/// Entries of `table` need the entry named by their first key component in
/// `parent_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentKeyRule {
    pub table: String,
    pub parent_table: String,
    /// Only check compound keys (`Loopback0|10.1.0.32/32`), not plain ones.
    pub compound_only: bool,
}

impl ParentKeyRule {
    pub fn new(table: &str, parent_table: &str, compound_only: bool) -> Self {
        Self {
            table: table.to_string(),
            parent_table: parent_table.to_string(),
            compound_only,
        }
    }
}

/// `table.field` holds one or more names of entries in `target_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReferenceRule {
    pub table: String,
    pub field: String,
    pub target_table: String,
}

impl FieldReferenceRule {
    pub fn new(table: &str, field: &str, target_table: &str) -> Self {
        Self {
            table: table.to_string(),
            field: field.to_string(),
            target_table: target_table.to_string(),
        }
    }
}

/// Legacy reference form: `[BUFFER_PROFILE|ingress_lossless_profile]`.
static LEGACY_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^|\]]+)\|([^\]]+)\]$").expect("Invalid regex pattern"));

/// Oracle enforcing parent-key and field-reference rules.
#[derive(Debug, Clone, Default)]
pub struct ReferentialOracle {
    parent_rules: Vec<ParentKeyRule>,
    reference_rules: Vec<FieldReferenceRule>,
}

impl ReferentialOracle {
    pub fn new(parent_rules: Vec<ParentKeyRule>, reference_rules: Vec<FieldReferenceRule>) -> Self {
        Self {
            parent_rules,
            reference_rules,
        }
    }

    /// Dependency rules for the tables the update engine commonly touches.
    pub fn sonic_default() -> Self {
        let parent_rules = vec![
            ParentKeyRule::new(CFG_LOOPBACK_INTERFACE_TABLE, CFG_LOOPBACK_INTERFACE_TABLE, true),
            ParentKeyRule::new(CFG_INTF_TABLE, CFG_INTF_TABLE, true),
            ParentKeyRule::new(CFG_VLAN_INTF_TABLE, CFG_VLAN_INTF_TABLE, true),
            ParentKeyRule::new(CFG_VLAN_INTF_TABLE, CFG_VLAN_TABLE, false),
            ParentKeyRule::new(CFG_LAG_INTF_TABLE, CFG_LAG_INTF_TABLE, true),
            ParentKeyRule::new(CFG_LAG_INTF_TABLE, CFG_LAG_TABLE, false),
            ParentKeyRule::new(CFG_VLAN_MEMBER_TABLE, CFG_VLAN_TABLE, true),
            ParentKeyRule::new(CFG_LAG_MEMBER_TABLE, CFG_LAG_TABLE, true),
        ];
        let reference_rules = vec![
            FieldReferenceRule::new(CFG_BUFFER_PG_TABLE, reference_fields::PROFILE, CFG_BUFFER_PROFILE_TABLE),
            FieldReferenceRule::new(CFG_BUFFER_QUEUE_TABLE, reference_fields::PROFILE, CFG_BUFFER_PROFILE_TABLE),
            FieldReferenceRule::new(CFG_BUFFER_PROFILE_TABLE, buffer_profile_fields::POOL, CFG_BUFFER_POOL_TABLE),
            FieldReferenceRule::new(
                CFG_BUFFER_PORT_INGRESS_PROFILE_LIST,
                reference_fields::PROFILE_LIST,
                CFG_BUFFER_PROFILE_TABLE,
            ),
            FieldReferenceRule::new(
                CFG_BUFFER_PORT_EGRESS_PROFILE_LIST,
                reference_fields::PROFILE_LIST,
                CFG_BUFFER_PROFILE_TABLE,
            ),
            FieldReferenceRule::new(CFG_QUEUE_TABLE, reference_fields::SCHEDULER, CFG_SCHEDULER_TABLE),
            FieldReferenceRule::new(CFG_QUEUE_TABLE, reference_fields::WRED_PROFILE, CFG_WRED_PROFILE_TABLE),
            FieldReferenceRule::new(
                CFG_PORT_QOS_MAP_TABLE,
                reference_fields::DSCP_TO_TC_MAP,
                CFG_DSCP_TO_TC_MAP_TABLE,
            ),
            FieldReferenceRule::new(
                CFG_PORT_QOS_MAP_TABLE,
                reference_fields::TC_TO_QUEUE_MAP,
                CFG_TC_TO_QUEUE_MAP_TABLE,
            ),
            FieldReferenceRule::new(
                CFG_PORT_QOS_MAP_TABLE,
                reference_fields::TC_TO_PG_MAP,
                CFG_TC_TO_PRIORITY_GROUP_MAP_TABLE,
            ),
            FieldReferenceRule::new(
                CFG_PORT_QOS_MAP_TABLE,
                reference_fields::PFC_TO_QUEUE_MAP,
                CFG_PFC_PRIORITY_TO_QUEUE_MAP_TABLE,
            ),
        ];
        Self::new(parent_rules, reference_rules)
    }

    pub fn parent_rules(&self) -> &[ParentKeyRule] {
        &self.parent_rules
    }

    pub fn reference_rules(&self) -> &[FieldReferenceRule] {
        &self.reference_rules
    }

    fn check_parent(&self, tree: &ConfigValue, rule: &ParentKeyRule) -> Result<(), OracleRejection> {
        let Some(entries) = table(tree, &rule.table) else {
            return Ok(());
        };
        for raw_key in entries.keys() {
            let key = EntryKey::parse(raw_key);
            if rule.compound_only && !key.is_compound() {
                continue;
            }
            if !has_entry(tree, &rule.parent_table, key.base()) {
                return Err(OracleRejection::new(format!(
                    "{}|{} requires {}|{}",
                    rule.table,
                    key,
                    rule.parent_table,
                    key.base()
                )));
            }
        }
        Ok(())
    }

    fn check_reference(
        &self,
        tree: &ConfigValue,
        rule: &FieldReferenceRule,
    ) -> Result<(), OracleRejection> {
        let Some(entries) = table(tree, &rule.table) else {
            return Ok(());
        };
        for (key, entry) in entries {
            let Some(value) = entry.get(&rule.field) else {
                continue;
            };
            for name in referenced_names(value) {
                if !has_entry(tree, &rule.target_table, &name) {
                    return Err(OracleRejection::new(format!(
                        "{}|{} field '{}' references missing {}|{}",
                        rule.table, key, rule.field, rule.target_table, name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl StructuralOracle for ReferentialOracle {
    fn validate(&self, tree: &ConfigValue) -> Result<(), OracleRejection> {
        for rule in &self.parent_rules {
            self.check_parent(tree, rule)?;
        }
        for rule in &self.reference_rules {
            self.check_reference(tree, rule)?;
        }
        Ok(())
    }
}

fn table<'a>(tree: &'a ConfigValue, name: &str) -> Option<&'a ConfigObject> {
    tree.get(name).and_then(ConfigValue::as_object)
}

fn has_entry(tree: &ConfigValue, table_name: &str, key: &str) -> bool {
    table(tree, table_name).is_some_and(|entries| entries.contains_key(key))
}

/// Extracts entry names from a reference field.
///
/// Accepts plain names, comma-separated lists, the legacy `[TABLE|name]`
/// form and arrays of any of those.
fn referenced_names(value: &ConfigValue) -> Vec<String> {
    match value {
        ConfigValue::Array(items) => items.iter().flat_map(referenced_names).collect(),
        other => other
            .scalar_string()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| match LEGACY_REFERENCE.captures(part) {
                        Some(caps) => caps[2].to_string(),
                        None => part.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}
