//! Validator gate.
//!
//! Every edit of a patch is checked before anything is written, and a single
//! denial vetoes the whole patch. Two kinds of checks run:
//!
//! - a static list of operations that are never allowed, such as removing
//!   `Loopback0`;
//! - per-table [`FieldOperationValidator`]s, looked up in a registry fixed at
//!   compile time, that check the edit against platform capabilities, the
//!   ASIC family and the build version.
//!
//! Edits at the root of the tree are split per table first, and edits
//! carrying whole entries or tables are expanded to the leaf fields they
//! touch.

pub mod asic;
pub mod platform;
mod port;
mod rdma;
pub mod rules;

pub use asic::{AsicFamilyMap, UNKNOWN_ASIC};
pub use platform::{parse_build_number, PlatformInfo};
pub use port::PortConfigValidator;
pub use rdma::{BufferProfileValidator, RdmaConfigValidator};
pub use rules::{RuleError, RuleMetadata, ValidatorRule, RDMA_VALIDATOR};

use crate::error::{GcuError, GcuResult};
use crate::patch::{Move, PatchElement, PatchOp, PatchOperation};
use crate::path::Path;
use crate::scope::Scope;
use crate::store::StateStore;
use crate::tables::*;
use crate::value::ConfigValue;
use tracing::{debug, warn};

/// Everything a validator may consult.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub platform: &'a PlatformInfo,
    pub rules: &'a RuleMetadata,
    pub state: &'a dyn StateStore,
}

/// Checks edits of one CONFIG_DB table.
pub trait FieldOperationValidator {
    /// Name reported when the validator denies an edit.
    fn name(&self) -> &'static str;

    /// Returns `IllegalPatchOperation` when `element` is not permitted.
    fn validate(
        &self,
        ctx: &ValidationContext<'_>,
        scope: Scope,
        element: &PatchElement<'_>,
    ) -> GcuResult<()>;
}

const PORT_VALIDATORS: &[&dyn FieldOperationValidator] = &[&PortConfigValidator];
const RDMA_VALIDATORS: &[&dyn FieldOperationValidator] = &[&RdmaConfigValidator];
const BUFFER_PROFILE_VALIDATORS: &[&dyn FieldOperationValidator] = &[&BufferProfileValidator];

/// Validators registered for `table`, in the order they run.
pub fn validators_for(table: &str) -> &'static [&'static dyn FieldOperationValidator] {
    match table {
        CFG_PORT_TABLE => PORT_VALIDATORS,
        CFG_PFC_WD_TABLE | CFG_BUFFER_POOL_TABLE => RDMA_VALIDATORS,
        CFG_BUFFER_PROFILE_TABLE => BUFFER_PROFILE_VALIDATORS,
        _ => &[],
    }
}

/// An operation that is refused regardless of platform.
#[derive(Debug, Clone, Copy)]
pub struct IllegalOperation {
    pub op: PatchOp,
    pub path: &'static str,
    pub reason: &'static str,
}

/// Operations refused on every platform.
pub const ILLEGAL_OPERATIONS: &[IllegalOperation] = &[
    IllegalOperation {
        op: PatchOp::Remove,
        path: "/PFC_WD/GLOBAL/POLL_INTERVAL",
        reason: "the PFC watchdog poll interval cannot be removed",
    },
    IllegalOperation {
        op: PatchOp::Remove,
        path: "/LOOPBACK_INTERFACE/Loopback0",
        reason: "Loopback0 carries the router ID and cannot be removed",
    },
];

/// How much of the tree an edit addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// The whole configuration.
    Root,
    /// `/TABLE`
    Table,
    /// `/TABLE/key`
    Entry,
    /// `/TABLE/key/field` or deeper.
    Field,
}

impl Granularity {
    pub fn of(path: &Path) -> Self {
        match path.len() {
            0 => Granularity::Root,
            1 => Granularity::Table,
            2 => Granularity::Entry,
            _ => Granularity::Field,
        }
    }
}

/// One field touched by an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTouch<'a> {
    pub key: String,
    pub field: String,
    /// New value of the field, when the edit supplies one.
    pub value: Option<&'a ConfigValue>,
}

/// Expands an edit into the leaf fields it touches.
///
/// Field-level edits touch one field. Entry- and table-level edits touch
/// every field of the value they carry; an edit without a value (a removal)
/// touches nothing at field level.
pub fn leaf_fields<'a>(element: &PatchElement<'a>) -> Vec<FieldTouch<'a>> {
    let path = element.path;
    match Granularity::of(path) {
        Granularity::Root => Vec::new(),
        Granularity::Field => vec![FieldTouch {
            key: path.entry_key().unwrap_or_default(),
            field: path.segment(2).unwrap_or_default(),
            value: if path.len() == 3 { element.value } else { None },
        }],
        Granularity::Entry => {
            let key = path.entry_key().unwrap_or_default();
            entry_fields(&key, element.value)
        }
        Granularity::Table => element
            .value
            .and_then(ConfigValue::as_object)
            .map(|entries| {
                entries
                    .iter()
                    .flat_map(|(key, entry)| entry_fields(key, Some(entry)))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn entry_fields<'a>(key: &str, entry: Option<&'a ConfigValue>) -> Vec<FieldTouch<'a>> {
    entry
        .and_then(ConfigValue::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(field, value)| FieldTouch {
                    key: key.to_string(),
                    field: field.clone(),
                    value: Some(value),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Accepts or vetoes whole patches.
pub struct ValidatorGate<'a> {
    ctx: ValidationContext<'a>,
}

impl<'a> ValidatorGate<'a> {
    pub fn new(ctx: ValidationContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ValidationContext<'a> {
        &self.ctx
    }

    /// Validates planned moves for `scope`.
    pub fn validate(&self, scope: Scope, moves: &[Move]) -> GcuResult<()> {
        for m in moves {
            self.check(scope, &m.element())?;
        }
        debug!(scope = %scope, moves = moves.len(), "Validator gate accepted moves");
        Ok(())
    }

    /// Validates the literal operations of a user patch for `scope`.
    ///
    /// `test` operations change nothing and are not checked.
    pub fn validate_operations(&self, scope: Scope, ops: &[PatchOperation]) -> GcuResult<()> {
        for op in ops.iter().filter(|op| op.op != PatchOp::Test) {
            self.check(scope, &op.element())?;
        }
        Ok(())
    }

    fn check(&self, scope: Scope, element: &PatchElement<'_>) -> GcuResult<()> {
        if element.path.is_root() {
            if let Some(tables) = element.value.and_then(ConfigValue::as_object) {
                for (table, value) in tables {
                    let path = Path::root().child(table.as_str());
                    let split = PatchElement {
                        op: element.op,
                        path: &path,
                        value: Some(value),
                    };
                    self.check(scope, &split)?;
                }
            }
            return Ok(());
        }

        check_static(element)?;

        let table = element.path.table().unwrap_or_default();
        for validator in validators_for(&table) {
            if let Err(e) = validator.validate(&self.ctx, scope, element) {
                warn!(
                    validator = validator.name(),
                    op = %element.op,
                    path = %element.path,
                    error = %e,
                    "Field operation denied"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

fn check_static(element: &PatchElement<'_>) -> GcuResult<()> {
    let rendered = element.path.to_string();
    for illegal in ILLEGAL_OPERATIONS {
        if illegal.op == element.op && illegal.path == rendered {
            let field = element.path.tokens()[1..]
                .iter()
                .map(|t| t.as_string())
                .collect::<Vec<_>>()
                .join("/");
            return Err(GcuError::illegal_operation(
                element.path.table().unwrap_or_default(),
                field,
                "static",
                illegal.reason,
            ));
        }
    }
    Ok(())
}

/// Builds the denial error for `validator`.
pub(crate) fn deny(
    validator: &str,
    element: &PatchElement<'_>,
    field: impl Into<String>,
    reason: impl Into<String>,
) -> GcuError {
    GcuError::illegal_operation(
        element.path.table().unwrap_or_default(),
        field,
        validator,
        reason,
    )
}
