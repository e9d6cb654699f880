//! Platform and build-version gated validators for RDMA tuning tables.

use super::rules::RDMA_VALIDATOR;
use super::{deny, leaf_fields, FieldOperationValidator, Granularity, ValidationContext};
use crate::error::GcuResult;
use crate::patch::{PatchElement, PatchOp};
use crate::scope::Scope;
use crate::tables::{pfc_wd_fields, CFG_BUFFER_POOL_TABLE, CFG_PFC_WD_TABLE};
use crate::validator::asic::UNKNOWN_ASIC;
use tracing::debug;

/// Gates PFC watchdog and buffer pool edits by ASIC family and build.
pub struct RdmaConfigValidator;

impl FieldOperationValidator for RdmaConfigValidator {
    fn name(&self) -> &'static str {
        RDMA_VALIDATOR
    }

    fn validate(
        &self,
        ctx: &ValidationContext<'_>,
        _scope: Scope,
        element: &PatchElement<'_>,
    ) -> GcuResult<()> {
        check_rdma_rules(ctx, element)
    }
}

/// Gates BUFFER_PROFILE edits.
///
/// Whole profiles may be added, removed or replaced freely; individual
/// fields go through the RDMA rules.
pub struct BufferProfileValidator;

impl BufferProfileValidator {
    const NAME: &'static str = "buffer_profile_config_update_validator";
}

impl FieldOperationValidator for BufferProfileValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(
        &self,
        ctx: &ValidationContext<'_>,
        _scope: Scope,
        element: &PatchElement<'_>,
    ) -> GcuResult<()> {
        if Granularity::of(element.path) != Granularity::Field {
            return match element.op {
                PatchOp::Add | PatchOp::Remove | PatchOp::Replace => Ok(()),
                op => Err(deny(
                    Self::NAME,
                    element,
                    element.path.entry_key().unwrap_or_default(),
                    format!("'{}' of a whole buffer profile is not supported", op),
                )),
            };
        }
        check_rdma_rules(ctx, element)
    }
}

/// Name under which a touched field appears in the rule metadata.
fn rule_field_name(table: &str, key: &str, field: &str) -> String {
    match table {
        CFG_BUFFER_POOL_TABLE => format!("{}/{}", key, field),
        CFG_PFC_WD_TABLE if key == pfc_wd_fields::GLOBAL_KEY => {
            format!("global/{}", field.to_lowercase())
        }
        _ => field.to_string(),
    }
}

fn check_rdma_rules(ctx: &ValidationContext<'_>, element: &PatchElement<'_>) -> GcuResult<()> {
    // Whole entries and tables may always be removed.
    if element.op == PatchOp::Remove && Granularity::of(element.path) != Granularity::Field {
        return Ok(());
    }

    let table = element.path.table().unwrap_or_default();
    let shown = element.path.tokens()[1..]
        .iter()
        .map(|t| t.as_string())
        .collect::<Vec<_>>()
        .join("/");

    let asic = ctx
        .rules
        .asic_map()
        .resolve(&ctx.platform.asic_type, &ctx.platform.hwsku);
    if asic == UNKNOWN_ASIC {
        return Err(deny(
            RDMA_VALIDATOR,
            element,
            shown,
            format!(
                "ASIC family of hwsku '{}' ({}) is unknown",
                ctx.platform.hwsku, ctx.platform.asic_type
            ),
        ));
    }
    let Some(build) = ctx.platform.build_number() else {
        return Err(deny(
            RDMA_VALIDATOR,
            element,
            shown,
            format!("no build number in version '{}'", ctx.platform.build_version),
        ));
    };

    for touch in leaf_fields(element) {
        let field = rule_field_name(&table, &touch.key, &touch.field);
        let Some(rule) = ctx.rules.find_rule(&table, RDMA_VALIDATOR, &field) else {
            return Err(deny(
                RDMA_VALIDATOR,
                element,
                field,
                "no rule permits modifying this field",
            ));
        };
        if rule.operations.is_empty() {
            return Err(deny(
                RDMA_VALIDATOR,
                element,
                field,
                format!("rule '{}' allows no operations", rule.name),
            ));
        }
        if !rule.allows(element.op) {
            return Err(deny(
                RDMA_VALIDATOR,
                element,
                field,
                format!("rule '{}' does not allow '{}'", rule.name, element.op),
            ));
        }
        if element.op == PatchOp::Remove {
            continue;
        }
        match rule.min_version(&asic) {
            None => {
                return Err(deny(
                    RDMA_VALIDATOR,
                    element,
                    field,
                    format!("rule '{}' does not support ASIC family {}", rule.name, asic),
                ))
            }
            Some(min) if build < min => {
                return Err(deny(
                    RDMA_VALIDATOR,
                    element,
                    field,
                    format!(
                        "rule '{}' requires build {} or later on {}, running {}",
                        rule.name, min, asic, build
                    ),
                ))
            }
            Some(_) => {
                debug!(table = %table, field = %field, asic = %asic, build, "Field operation permitted");
            }
        }
    }
    Ok(())
}
