//! Table and field name constants for the update engine

// CONFIG_DB tables
pub const CFG_DEVICE_METADATA_TABLE: &str = "DEVICE_METADATA";
pub const CFG_PORT_TABLE: &str = "PORT";
pub const CFG_PORT_QOS_MAP_TABLE: &str = "PORT_QOS_MAP";
pub const CFG_PFC_WD_TABLE: &str = "PFC_WD";
pub const CFG_BUFFER_POOL_TABLE: &str = "BUFFER_POOL";
pub const CFG_BUFFER_PROFILE_TABLE: &str = "BUFFER_PROFILE";
pub const CFG_BUFFER_PG_TABLE: &str = "BUFFER_PG";
pub const CFG_BUFFER_QUEUE_TABLE: &str = "BUFFER_QUEUE";
pub const CFG_BUFFER_PORT_INGRESS_PROFILE_LIST: &str = "BUFFER_PORT_INGRESS_PROFILE_LIST";
pub const CFG_BUFFER_PORT_EGRESS_PROFILE_LIST: &str = "BUFFER_PORT_EGRESS_PROFILE_LIST";
pub const CFG_QUEUE_TABLE: &str = "QUEUE";
pub const CFG_SCHEDULER_TABLE: &str = "SCHEDULER";
pub const CFG_WRED_PROFILE_TABLE: &str = "WRED_PROFILE";
pub const CFG_DSCP_TO_TC_MAP_TABLE: &str = "DSCP_TO_TC_MAP";
pub const CFG_TC_TO_QUEUE_MAP_TABLE: &str = "TC_TO_QUEUE_MAP";
pub const CFG_TC_TO_PRIORITY_GROUP_MAP_TABLE: &str = "TC_TO_PRIORITY_GROUP_MAP";
pub const CFG_PFC_PRIORITY_TO_QUEUE_MAP_TABLE: &str = "MAP_PFC_PRIORITY_TO_QUEUE";
pub const CFG_LOOPBACK_INTERFACE_TABLE: &str = "LOOPBACK_INTERFACE";
pub const CFG_INTF_TABLE: &str = "INTERFACE";
pub const CFG_VLAN_TABLE: &str = "VLAN";
pub const CFG_VLAN_MEMBER_TABLE: &str = "VLAN_MEMBER";
pub const CFG_VLAN_INTF_TABLE: &str = "VLAN_INTERFACE";
pub const CFG_LAG_TABLE: &str = "PORTCHANNEL";
pub const CFG_LAG_MEMBER_TABLE: &str = "PORTCHANNEL_MEMBER";
pub const CFG_LAG_INTF_TABLE: &str = "PORTCHANNEL_INTERFACE";

// STATE_DB tables
pub const STATE_PORT_TABLE: &str = "PORT_TABLE";

/// DEVICE_METADATA entry holding the local switch facts
pub const DEVICE_METADATA_LOCALHOST: &str = "localhost";

/// DEVICE_METADATA fields
pub mod device_metadata_fields {
    pub const HWSKU: &str = "hwsku";
    pub const SWITCH_TYPE: &str = "switch_type";
    pub const PLATFORM: &str = "platform";
}

/// PORT table fields
pub mod port_fields {
    pub const SPEED: &str = "speed";
    pub const FEC: &str = "fec";
}

/// STATE_DB PORT_TABLE capability fields
pub mod port_state_fields {
    pub const SUPPORTED_SPEEDS: &str = "supported_speeds";
    pub const SUPPORTED_FECS: &str = "supported_fecs";
}

/// PFC_WD table fields and keys
pub mod pfc_wd_fields {
    pub const GLOBAL_KEY: &str = "GLOBAL";
    pub const POLL_INTERVAL: &str = "POLL_INTERVAL";
}

/// BUFFER_PROFILE table fields
pub mod buffer_profile_fields {
    pub const POOL: &str = "pool";
}

/// Fields holding references to other tables
pub mod reference_fields {
    pub const PROFILE: &str = "profile";
    pub const PROFILE_LIST: &str = "profile_list";
    pub const SCHEDULER: &str = "scheduler";
    pub const WRED_PROFILE: &str = "wred_profile";
    pub const DSCP_TO_TC_MAP: &str = "dscp_to_tc_map";
    pub const TC_TO_QUEUE_MAP: &str = "tc_to_queue_map";
    pub const TC_TO_PG_MAP: &str = "tc_to_pg_map";
    pub const PFC_TO_QUEUE_MAP: &str = "pfc_to_queue_map";
}

/// Switch types that run on a chassis
pub const CHASSIS_SWITCH_TYPES: &[&str] = &["voq", "chassis-packet", "fabric"];

/// Value STATE_DB publishes for an empty capability list
pub const NOT_AVAILABLE: &str = "N/A";
