//! PORT capability checks against STATE_DB.

use super::{deny, leaf_fields, FieldOperationValidator, ValidationContext};
use crate::error::GcuResult;
use crate::patch::{PatchElement, PatchOp};
use crate::scope::Scope;
use crate::tables::{port_fields, port_state_fields, NOT_AVAILABLE, STATE_PORT_TABLE};
use crate::value::ConfigValue;
use std::collections::BTreeSet;
use tracing::debug;

/// FEC modes assumed when the platform publishes no `supported_fecs`.
pub const DEFAULT_SUPPORTED_FECS: &[&str] = &["rs", "fc", "none", "auto"];

/// Checks `speed` and `fec` against what the port advertises.
pub struct PortConfigValidator;

impl PortConfigValidator {
    const NAME: &'static str = "port_config_update_validator";

    fn check_speed(
        &self,
        ctx: &ValidationContext<'_>,
        scope: Scope,
        element: &PatchElement<'_>,
        port: &str,
        value: &ConfigValue,
    ) -> GcuResult<()> {
        if ctx.platform.chassis {
            return Ok(());
        }
        let supported = ctx.state.get_field(
            scope,
            STATE_PORT_TABLE,
            port,
            port_state_fields::SUPPORTED_SPEEDS,
        )?;
        let supported: BTreeSet<u64> = match supported {
            Some(list) if !list.trim().is_empty() => list
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect(),
            _ => {
                debug!(port = %port, "No supported_speeds published, allowing speed change");
                return Ok(());
            }
        };

        let field = format!("{}/{}", port, port_fields::SPEED);
        let raw = value.scalar_string().unwrap_or_default();
        let Ok(speed) = raw.trim().parse::<u64>() else {
            return Err(deny(
                Self::NAME,
                element,
                field,
                format!("speed '{}' is not an integer", raw),
            ));
        };
        if !supported.contains(&speed) {
            return Err(deny(
                Self::NAME,
                element,
                field,
                format!("speed {} is not supported by {}", speed, port),
            ));
        }
        Ok(())
    }

    fn check_fec(
        &self,
        ctx: &ValidationContext<'_>,
        scope: Scope,
        element: &PatchElement<'_>,
        port: &str,
        value: &ConfigValue,
    ) -> GcuResult<()> {
        let published = ctx.state.get_field(
            scope,
            STATE_PORT_TABLE,
            port,
            port_state_fields::SUPPORTED_FECS,
        )?;
        let supported: BTreeSet<String> = match published.as_deref() {
            None => DEFAULT_SUPPORTED_FECS.iter().map(|s| s.to_string()).collect(),
            Some(NOT_AVAILABLE) => BTreeSet::new(),
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        let fec = value.scalar_string().unwrap_or_default();
        if !supported.contains(fec.trim()) {
            return Err(deny(
                Self::NAME,
                element,
                format!("{}/{}", port, port_fields::FEC),
                format!("fec '{}' is not supported by {}", fec, port),
            ));
        }
        Ok(())
    }
}

impl FieldOperationValidator for PortConfigValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(
        &self,
        ctx: &ValidationContext<'_>,
        scope: Scope,
        element: &PatchElement<'_>,
    ) -> GcuResult<()> {
        if element.op == PatchOp::Remove {
            return Ok(());
        }
        for touch in leaf_fields(element) {
            let Some(value) = touch.value else {
                continue;
            };
            match touch.field.as_str() {
                port_fields::SPEED => self.check_speed(ctx, scope, element, &touch.key, value)?,
                port_fields::FEC => self.check_fec(ctx, scope, element, &touch.key, value)?,
                _ => {}
            }
        }
        Ok(())
    }
}
