//! Test fixtures for common configuration patterns
//!
//! Provides reusable CONFIG_DB trees, patches and platforms

use serde_json::{json, Value};
use sonic_gcu::{ConfigValue, PlatformInfo};
use std::collections::BTreeMap;

/// Configuration change operation type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOp {
    /// SET operation (add or update)
    Set,
    /// DEL operation (delete)
    Del,
}

/// Represents a CONFIG_DB entry change
#[derive(Debug, Clone)]
pub struct ConfigChange {
    /// Table name (e.g., "PORT", "VLAN", "BUFFER_PROFILE")
    pub table: String,
    /// Key within the table
    pub key: String,
    /// Operation type
    pub op: ConfigOp,
    /// Field-value pairs (for SET operations)
    pub fields: BTreeMap<String, String>,
}

impl ConfigChange {
    /// Create a SET operation
    pub fn set(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            op: ConfigOp::Set,
            fields: BTreeMap::new(),
        }
    }

    /// Create a DEL operation
    pub fn del(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            op: ConfigOp::Del,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field to a SET operation
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Add multiple fields to a SET operation
    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in fields {
            self.fields.insert(k.into(), v.into());
        }
        self
    }

    /// Entry value as stored in CONFIG_DB
    pub fn entry(&self) -> ConfigValue {
        ConfigValue::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), ConfigValue::string(v.as_str())))
                .collect(),
        )
    }

    /// JSON pointer of the entry
    pub fn pointer(&self) -> String {
        format!("/{}/{}", escape(&self.table), escape(&self.key))
    }

    /// Applies the change to a configuration tree. SET replaces the whole entry.
    pub fn apply_to(&self, tree: &mut ConfigValue) {
        if !tree.is_object() {
            *tree = ConfigValue::empty_object();
        }
        let Some(tables) = tree.as_object_mut() else {
            return;
        };
        match self.op {
            ConfigOp::Set => {
                let table = tables
                    .entry(self.table.clone())
                    .or_insert_with(ConfigValue::empty_object);
                if let Some(entries) = table.as_object_mut() {
                    entries.insert(self.key.clone(), self.entry());
                }
            }
            ConfigOp::Del => {
                if let Some(entries) = tables.get_mut(&self.table).and_then(ConfigValue::as_object_mut) {
                    entries.remove(&self.key);
                }
            }
        }
    }

    /// JSON Patch operation equivalent to the change
    pub fn to_patch_op(&self) -> Value {
        match self.op {
            ConfigOp::Set => json!({"op": "add", "path": self.pointer(), "value": self.entry()}),
            ConfigOp::Del => json!({"op": "remove", "path": self.pointer()}),
        }
    }
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Builds a configuration tree from a sequence of changes
pub fn config_from(changes: &[ConfigChange]) -> ConfigValue {
    let mut tree = ConfigValue::empty_object();
    for change in changes {
        change.apply_to(&mut tree);
    }
    tree
}

/// Renders changes as a JSON Patch document
pub fn patch_from(changes: &[ConfigChange]) -> String {
    Value::Array(changes.iter().map(ConfigChange::to_patch_op).collect()).to_string()
}

/// Common port configuration fixtures
pub mod port_fixtures {
    use super::*;

    /// Standard Ethernet port with default configuration
    pub fn ethernet_port_default(port_name: &str) -> ConfigChange {
        ConfigChange::set("PORT", port_name)
            .with_field("mtu", "9100")
            .with_field("admin_status", "up")
            .with_field("speed", "100000")
    }

    /// Delete port
    pub fn delete_port(port_name: &str) -> ConfigChange {
        ConfigChange::del("PORT", port_name)
    }
}

/// Common VLAN configuration fixtures
pub mod vlan_fixtures {
    use super::*;

    /// Create VLAN
    pub fn vlan(vlan_id: u16) -> ConfigChange {
        ConfigChange::set("VLAN", format!("Vlan{}", vlan_id))
            .with_field("vlanid", vlan_id.to_string())
    }

    /// Add member to VLAN
    pub fn vlan_member(vlan_id: u16, port: &str, tagging_mode: &str) -> ConfigChange {
        ConfigChange::set("VLAN_MEMBER", format!("Vlan{}|{}", vlan_id, port))
            .with_field("tagging_mode", tagging_mode)
    }

    /// VLAN interface and its address
    pub fn vlan_interface(vlan_id: u16, prefix: &str) -> Vec<ConfigChange> {
        vec![
            ConfigChange::set("VLAN_INTERFACE", format!("Vlan{}", vlan_id)),
            ConfigChange::set("VLAN_INTERFACE", format!("Vlan{}|{}", vlan_id, prefix)),
        ]
    }

    /// Delete VLAN
    pub fn delete_vlan(vlan_id: u16) -> ConfigChange {
        ConfigChange::del("VLAN", format!("Vlan{}", vlan_id))
    }
}

/// Loopback interface fixtures
pub mod loopback_fixtures {
    use super::*;

    /// Loopback interface with one address
    pub fn loopback(name: &str, prefix: &str) -> Vec<ConfigChange> {
        vec![
            ConfigChange::set("LOOPBACK_INTERFACE", name),
            ConfigChange::set("LOOPBACK_INTERFACE", format!("{}|{}", name, prefix)),
        ]
    }

    /// Loopback0 and Loopback1, as on a typical T1 switch
    pub fn two_loopbacks() -> ConfigValue {
        let mut changes = loopback("Loopback0", "10.1.0.32/32");
        changes.extend(loopback("Loopback1", "10.1.0.33/32"));
        config_from(&changes)
    }
}

/// Buffer and QoS fixtures
pub mod buffer_fixtures {
    use super::*;

    pub fn pool(name: &str, size: &str) -> ConfigChange {
        ConfigChange::set("BUFFER_POOL", name)
            .with_field("mode", "dynamic")
            .with_field("size", size)
            .with_field("type", "ingress")
    }

    pub fn profile(name: &str, pool: &str) -> ConfigChange {
        ConfigChange::set("BUFFER_PROFILE", name)
            .with_field("pool", pool)
            .with_field("size", "0")
            .with_field("dynamic_th", "7")
    }

    pub fn priority_group(port: &str, pgs: &str, profile: &str) -> ConfigChange {
        ConfigChange::set("BUFFER_PG", format!("{}|{}", port, pgs)).with_field("profile", profile)
    }

    /// Pool, lossless profile and PG 3-4 on Ethernet0
    pub fn lossless_buffers() -> ConfigValue {
        config_from(&[
            pool("ingress_lossless_pool", "12766208"),
            profile("pg_lossless_100000_5m_profile", "ingress_lossless_pool"),
            priority_group("Ethernet0", "3-4", "pg_lossless_100000_5m_profile"),
        ])
    }
}

/// PFC watchdog fixtures
pub mod pfc_wd_fixtures {
    use super::*;

    pub fn global(poll_interval: &str) -> ConfigChange {
        ConfigChange::set("PFC_WD", "GLOBAL").with_field("POLL_INTERVAL", poll_interval)
    }

    pub fn port(port: &str, action: &str) -> ConfigChange {
        ConfigChange::set("PFC_WD", port)
            .with_field("action", action)
            .with_field("detection_time", "200")
            .with_field("restoration_time", "200")
    }
}

/// Platform fixtures for the validator gate
pub mod platform_fixtures {
    use super::*;

    /// Spectrum-1 switch on a 202205 build
    pub fn mellanox_spc1() -> PlatformInfo {
        PlatformInfo::new("mellanox", "ACS-MSN2700", "SONiC.20220530")
    }

    /// Spectrum-3 switch on a 202111 build
    pub fn mellanox_spc3_old() -> PlatformInfo {
        PlatformInfo::new("mellanox", "ACS-MSN4700", "SONiC.20211130.5")
    }

    /// Tomahawk-5 switch on a 202412 build
    pub fn broadcom_th5() -> PlatformInfo {
        PlatformInfo::new("broadcom", "Arista-7060X6-64PE", "SONiC.20241211.49")
    }

    /// Virtual switch running a Mellanox SKU
    pub fn vs(hwsku: &str) -> PlatformInfo {
        PlatformInfo::new("vs", hwsku, "SONiC.20230531.3")
    }

    /// Platform whose ASIC family is not in the rule metadata
    pub fn unknown_asic() -> PlatformInfo {
        PlatformInfo::new("barefoot", "montara", "SONiC.20230531.3")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_change_set() {
        let change = ConfigChange::set("PORT", "Ethernet0")
            .with_field("mtu", "9100")
            .with_field("admin_status", "up");

        assert_eq!(change.op, ConfigOp::Set);
        assert_eq!(change.fields.len(), 2);
        assert_eq!(change.entry().to_json(), json!({"admin_status": "up", "mtu": "9100"}));
    }

    #[test]
    fn test_pointer_escapes_slash() {
        let change = ConfigChange::set("LOOPBACK_INTERFACE", "Loopback0|10.1.0.32/32");
        assert_eq!(change.pointer(), "/LOOPBACK_INTERFACE/Loopback0|10.1.0.32~132");
    }

    #[test]
    fn test_config_from_changes() {
        let tree = config_from(&[
            vlan_fixtures::vlan(10),
            vlan_fixtures::vlan(20),
            vlan_fixtures::delete_vlan(10),
        ]);
        assert_eq!(tree.to_json(), json!({"VLAN": {"Vlan20": {"vlanid": "20"}}}));
    }

    #[test]
    fn test_patch_from_changes() {
        let patch = patch_from(&[port_fixtures::delete_port("Ethernet0")]);
        assert_eq!(patch, r#"[{"op":"remove","path":"/PORT/Ethernet0"}]"#);
    }

    #[test]
    fn test_loopback_fixture() {
        let tree = loopback_fixtures::two_loopbacks();
        let table = tree.get("LOOPBACK_INTERFACE").and_then(ConfigValue::as_object).unwrap();
        assert_eq!(table.len(), 4);
    }
}
