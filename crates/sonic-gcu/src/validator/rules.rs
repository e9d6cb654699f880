//! Field operation rule metadata.
//!
//! The rule document is JSON:
//!
//! ```json
//! {
//!   "helper_data": {"rdma_config_update_validator": {"mellanox_asics": {...}, "broadcom_asics": {...}}},
//!   "tables": {
//!     "PFC_WD": {"validator_data": {"rdma_config_update_validator": {
//!       "PFCWD enable/disable": {"fields": [...], "operations": [...], "platforms": {"spc1": "20181100"}}
//!     }}}
//!   }
//! }
//! ```
//!
//! A copy ships inside the binary; an alternative file can be loaded from
//! disk. Either way the document is parsed once and then shared.

use super::asic::AsicFamilyMap;
use crate::patch::PatchOp;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Validator name under which version/platform rules are published.
pub const RDMA_VALIDATOR: &str = "rdma_config_update_validator";

const BUILTIN_RULES_JSON: &str = include_str!("../../data/gcu_field_operation_validators.conf.json");

static BUILTIN_RULES: Lazy<RuleMetadata> = Lazy::new(|| {
    RuleMetadata::from_json(BUILTIN_RULES_JSON).expect("Invalid embedded validator rules")
});

/// Errors raised while loading rule metadata.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rule metadata: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid minimum version '{value}' for {platform} in {table}/{rule}")]
    InvalidVersion {
        table: String,
        rule: String,
        platform: String,
        value: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    helper_data: RawHelperData,
    #[serde(default)]
    tables: BTreeMap<String, RawTable>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHelperData {
    #[serde(default)]
    rdma_config_update_validator: AsicFamilyMap,
}

#[derive(Debug, Default, Deserialize)]
struct RawTable {
    #[serde(default)]
    validator_data: BTreeMap<String, BTreeMap<String, RawRule>>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    operations: Vec<PatchOp>,
    #[serde(default)]
    platforms: BTreeMap<String, String>,
}

/// One named rule: which fields may be touched, how, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorRule {
    pub table: String,
    pub validator: String,
    pub name: String,
    pub fields: Vec<String>,
    pub operations: Vec<PatchOp>,
    /// Minimum build number per ASIC family.
    pub platforms: BTreeMap<String, u32>,
}

impl ValidatorRule {
    pub fn covers(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn allows(&self, op: PatchOp) -> bool {
        self.operations.contains(&op)
    }

    pub fn min_version(&self, asic: &str) -> Option<u32> {
        self.platforms.get(asic).copied()
    }
}

/// Parsed rule document.
#[derive(Debug, Clone, Default)]
pub struct RuleMetadata {
    asic_map: AsicFamilyMap,
    rules: Vec<ValidatorRule>,
}

impl RuleMetadata {
    /// Parses a rule document.
    pub fn from_json(text: &str) -> Result<Self, RuleError> {
        let raw: RawDocument = serde_json::from_str(text)?;
        let mut rules = Vec::new();
        for (table, raw_table) in raw.tables {
            for (validator, named) in raw_table.validator_data {
                for (name, rule) in named {
                    let mut platforms = BTreeMap::new();
                    for (platform, value) in rule.platforms {
                        let version = value.trim().parse::<u32>().map_err(|_| {
                            RuleError::InvalidVersion {
                                table: table.clone(),
                                rule: name.clone(),
                                platform: platform.clone(),
                                value: value.clone(),
                            }
                        })?;
                        platforms.insert(platform, version);
                    }
                    rules.push(ValidatorRule {
                        table: table.clone(),
                        validator: validator.clone(),
                        name,
                        fields: rule.fields,
                        operations: rule.operations,
                        platforms,
                    });
                }
            }
        }
        Ok(Self {
            asic_map: raw.helper_data.rdma_config_update_validator,
            rules,
        })
    }

    /// Loads a rule document from disk.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let text = fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let metadata = Self::from_json(&text)?;
        info!(path = %path.display(), rules = metadata.rules.len(), "Loaded validator rules");
        Ok(metadata)
    }

    /// Rule document compiled into the binary.
    pub fn builtin() -> &'static RuleMetadata {
        &BUILTIN_RULES
    }

    pub fn asic_map(&self) -> &AsicFamilyMap {
        &self.asic_map
    }

    pub fn rules(&self) -> &[ValidatorRule] {
        &self.rules
    }

    /// First rule of `validator` on `table` whose fields include `field`.
    pub fn find_rule(&self, table: &str, validator: &str, field: &str) -> Option<&ValidatorRule> {
        self.rules
            .iter()
            .find(|r| r.table == table && r.validator == validator && r.covers(field))
    }
}
