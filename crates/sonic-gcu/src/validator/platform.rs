//! Facts about the running switch used by the validators.

use crate::error::{GcuError, GcuResult};
use crate::store::ConfigStore;
use crate::tables::{
    device_metadata_fields, CFG_DEVICE_METADATA_TABLE, CHASSIS_SWITCH_TYPES,
    DEVICE_METADATA_LOCALHOST,
};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{debug, info};

/// Platform description consulted by version/ASIC gated validators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Vendor ASIC type from `sonic_version.yml` (`mellanox`, `broadcom`, ...).
    pub asic_type: String,
    /// Hardware SKU from `DEVICE_METADATA|localhost`.
    pub hwsku: String,
    /// Raw build version string (`SONiC.20220530`, `20241211.49`, ...).
    pub build_version: String,
    /// True on chassis line cards and fabric cards.
    pub chassis: bool,
}

/// Subset of `/etc/sonic/sonic_version.yml`.
#[derive(Debug, Deserialize)]
struct SonicVersion {
    #[serde(default)]
    build_version: String,
    #[serde(default)]
    asic_type: String,
}

impl PlatformInfo {
    pub fn new(
        asic_type: impl Into<String>,
        hwsku: impl Into<String>,
        build_version: impl Into<String>,
    ) -> Self {
        Self {
            asic_type: asic_type.into(),
            hwsku: hwsku.into(),
            build_version: build_version.into(),
            chassis: false,
        }
    }

    pub fn with_chassis(mut self, chassis: bool) -> Self {
        self.chassis = chassis;
        self
    }

    /// Branch date of the build, e.g. `20220530`.
    pub fn build_number(&self) -> Option<u32> {
        parse_build_number(&self.build_version)
    }

    /// Reads platform facts from the version file and DEVICE_METADATA.
    ///
    /// `chassis_override` replaces the `switch_type` based detection.
    pub fn detect(
        version_file: &std::path::Path,
        config: &dyn ConfigStore,
        chassis_override: Option<bool>,
    ) -> GcuResult<Self> {
        let text = fs::read_to_string(version_file).map_err(|e| {
            GcuError::platform(format!("reading {}: {}", version_file.display(), e))
        })?;
        let version: SonicVersion = serde_yaml::from_str(&text).map_err(|e| {
            GcuError::platform(format!("parsing {}: {}", version_file.display(), e))
        })?;

        let metadata = config.get_entry(CFG_DEVICE_METADATA_TABLE, DEVICE_METADATA_LOCALHOST)?;
        let field = |name: &str| {
            metadata
                .as_ref()
                .and_then(|entry| entry.get(name))
                .and_then(|v| v.scalar_string())
                .unwrap_or_default()
        };
        let hwsku = field(device_metadata_fields::HWSKU);
        let switch_type = field(device_metadata_fields::SWITCH_TYPE);
        let chassis =
            chassis_override.unwrap_or_else(|| CHASSIS_SWITCH_TYPES.contains(&switch_type.as_str()));

        debug!(switch_type = %switch_type, "Read DEVICE_METADATA");
        let info = Self {
            asic_type: version.asic_type,
            hwsku,
            build_version: version.build_version,
            chassis,
        };
        info!(
            asic_type = %info.asic_type,
            hwsku = %info.hwsku,
            build_version = %info.build_version,
            chassis = info.chassis,
            "Detected platform"
        );
        Ok(info)
    }
}

/// Extracts the last eight-digit dot-separated component of a build version.
pub fn parse_build_number(build_version: &str) -> Option<u32> {
    build_version
        .rsplit('.')
        .find(|part| part.len() == 8 && part.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|part| part.parse().ok())
}
