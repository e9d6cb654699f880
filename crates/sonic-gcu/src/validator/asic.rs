//! Hardware SKU → ASIC family resolution.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Family reported when a SKU cannot be mapped.
pub const UNKNOWN_ASIC: &str = "unknown";

/// ASIC types whose family name is the type itself.
const PASSTHROUGH_ASIC_TYPES: &[&str] = &["cisco-8000", "marvell-teralynx"];

/// SKU lists per ASIC family, as published in the rule metadata.
///
/// Mellanox SKUs are matched exactly, Broadcom SKUs by substring, both
/// ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AsicFamilyMap {
    #[serde(default)]
    pub mellanox_asics: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub broadcom_asics: BTreeMap<String, Vec<String>>,
}

impl AsicFamilyMap {
    /// Resolves the ASIC family for a switch.
    ///
    /// Returns [`UNKNOWN_ASIC`] when nothing matches.
    pub fn resolve(&self, asic_type: &str, hwsku: &str) -> String {
        let sku = hwsku.to_lowercase();
        let family = match asic_type {
            "mellanox" => self.exact_match(&sku),
            "broadcom" => self.substring_match(&sku),
            "vs" => self.exact_match(&sku).or_else(|| self.substring_match(&sku)),
            other if PASSTHROUGH_ASIC_TYPES.contains(&other) => Some(other.to_string()),
            _ => None,
        };
        debug!(asic_type, hwsku, family = ?family, "Resolved ASIC family");
        family.unwrap_or_else(|| UNKNOWN_ASIC.to_string())
    }

    fn exact_match(&self, sku: &str) -> Option<String> {
        self.mellanox_asics
            .iter()
            .find(|(_, skus)| skus.iter().any(|s| s.to_lowercase() == sku))
            .map(|(family, _)| family.clone())
    }

    fn substring_match(&self, sku: &str) -> Option<String> {
        self.broadcom_asics
            .iter()
            .find(|(_, skus)| skus.iter().any(|s| sku.contains(&s.to_lowercase())))
            .map(|(family, _)| family.clone())
    }
}
