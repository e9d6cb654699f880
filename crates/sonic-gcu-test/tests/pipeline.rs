//! End-to-end update pipeline tests
//!
//! Patches go through simulation, the validator gate, the move sorter and
//! the applier against in-memory and file-backed stores.

use pretty_assertions::assert_eq;
use serde_json::json;
use sonic_gcu::store::JsonFileConfigStore;
use sonic_gcu::{
    parse_patch, ConfigStore, ConfigValue, GcuError, GenericUpdater, MemoryConfigStore,
};
use sonic_gcu_test::{
    buffer_fixtures, config_from, loopback_fixtures, patch_from, platform_fixtures,
    vlan_fixtures, ConfigChange, ConfigDbVerifier, FaultyStore,
};

fn updater_with(tree: ConfigValue) -> (GenericUpdater, sonic_gcu_test::SharedStore) {
    let store = FaultyStore::new(tree);
    let handle = store.handle();
    (
        GenericUpdater::new(Box::new(store), platform_fixtures::mellanox_spc1()),
        handle,
    )
}

fn paths(report: &sonic_gcu::UpdateReport) -> Vec<String> {
    report.scopes[0]
        .moves
        .iter()
        .map(|op| format!("{} {}", op.op, op.path))
        .collect()
}

/// Scenario:
/// 1. Start with Loopback0 and Loopback1, each with one address
/// 2. Remove Loopback1 and its address in one patch
/// 3. The address goes first, Loopback0 is untouched
#[test]
fn test_remove_loopback1_succeeds() {
    let (mut updater, handle) = updater_with(loopback_fixtures::two_loopbacks());
    let patch = patch_from(&[
        ConfigChange::del("LOOPBACK_INTERFACE", "Loopback1"),
        ConfigChange::del("LOOPBACK_INTERFACE", "Loopback1|10.1.0.33/32"),
    ]);

    let report = updater.apply_patch(parse_patch(&patch).unwrap()).unwrap();
    assert_eq!(
        paths(&report),
        vec![
            "remove /LOOPBACK_INTERFACE/Loopback1|10.1.0.33~132".to_string(),
            "remove /LOOPBACK_INTERFACE/Loopback1".to_string(),
        ]
    );

    let store = handle.borrow();
    let verifier = ConfigDbVerifier::new(&*store);
    verifier.assert_entry_count("LOOPBACK_INTERFACE", 2).unwrap();
    verifier.assert_entry_exists("LOOPBACK_INTERFACE", "Loopback0").unwrap();
    verifier
        .assert_entry_exists("LOOPBACK_INTERFACE", "Loopback0|10.1.0.32/32")
        .unwrap();
    verifier
        .assert_entry_not_exists("LOOPBACK_INTERFACE", "Loopback1")
        .unwrap();
}

/// Removing Loopback0 is always refused and nothing is written
#[test]
fn test_remove_loopback0_is_illegal() {
    let initial = loopback_fixtures::two_loopbacks();
    let (mut updater, handle) = updater_with(initial.clone());
    let patch = patch_from(&[
        ConfigChange::del("LOOPBACK_INTERFACE", "Loopback0|10.1.0.32/32"),
        ConfigChange::del("LOOPBACK_INTERFACE", "Loopback0"),
    ]);

    let err = updater.apply_patch(parse_patch(&patch).unwrap()).unwrap_err();
    match &err {
        GcuError::IllegalPatchOperation { table, field, .. } => {
            assert_eq!(table, "LOOPBACK_INTERFACE");
            assert_eq!(field, "Loopback0");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_zero_effect());
    ConfigDbVerifier::new(&*handle.borrow())
        .assert_config(&initial)
        .unwrap();
}

/// Members and interfaces listed before their VLAN are still written after it
#[test]
fn test_vlan_parents_written_first() {
    let (mut updater, handle) = updater_with(ConfigValue::empty_object());
    let mut changes = vlan_fixtures::vlan_interface(100, "192.168.0.1/21");
    changes.push(vlan_fixtures::vlan_member(100, "Ethernet0", "untagged"));
    changes.push(vlan_fixtures::vlan(100));
    let target = config_from(&changes);

    let report = updater.replace(target.clone()).unwrap();
    let order = paths(&report);
    assert_eq!(order[0], "add /VLAN");
    assert_eq!(order.len(), 3);

    ConfigDbVerifier::new(&*handle.borrow())
        .assert_config(&target)
        .unwrap();
}

/// A VLAN cannot be removed while a member still needs it, unless the member goes too
#[test]
fn test_vlan_removal_order() {
    let initial = config_from(&[
        vlan_fixtures::vlan(10),
        vlan_fixtures::vlan(20),
        vlan_fixtures::vlan_member(10, "Ethernet0", "tagged"),
    ]);
    let (mut updater, handle) = updater_with(initial);

    let err = updater
        .apply_patch(parse_patch(&patch_from(&[vlan_fixtures::delete_vlan(10)])).unwrap())
        .unwrap_err();
    assert!(matches!(err, GcuError::Structural { .. }), "{:?}", err);

    let patch = patch_from(&[
        vlan_fixtures::delete_vlan(10),
        ConfigChange::del("VLAN_MEMBER", "Vlan10|Ethernet0"),
    ]);
    updater.apply_patch(parse_patch(&patch).unwrap()).unwrap();

    let store = handle.borrow();
    let verifier = ConfigDbVerifier::new(&*store);
    verifier.assert_entry_not_exists("VLAN", "Vlan10").unwrap();
    verifier.assert_entry_exists("VLAN", "Vlan20").unwrap();
    verifier.assert_entry_count("VLAN_MEMBER", 0).unwrap();
}

/// Profiles are created before the priority groups that use them and
/// removed after
#[test]
fn test_buffer_profile_reference_order() {
    let initial = config_from(&[buffer_fixtures::pool("ingress_lossless_pool", "12766208")]);
    let target = buffer_fixtures::lossless_buffers();
    let (mut updater, handle) = updater_with(initial.clone());

    let report = updater.replace(target.clone()).unwrap();
    assert_eq!(
        paths(&report),
        vec!["add /BUFFER_PROFILE".to_string(), "add /BUFFER_PG".to_string()]
    );
    ConfigDbVerifier::new(&*handle.borrow())
        .assert_config(&target)
        .unwrap();

    let report = updater.replace(initial.clone()).unwrap();
    assert_eq!(
        paths(&report),
        vec!["remove /BUFFER_PG".to_string(), "remove /BUFFER_PROFILE".to_string()]
    );
    ConfigDbVerifier::new(&*handle.borrow())
        .assert_config(&initial)
        .unwrap();
}

/// Literal JSON Patch verbs beyond add/remove/replace are simulated first
#[test]
fn test_literal_patch_verbs() {
    let (mut updater, handle) = updater_with(config_from(&[
        vlan_fixtures::vlan(10),
        ConfigChange::set("DEVICE_METADATA", "localhost").with_field("hostname", "sw1"),
    ]));
    let ops = parse_patch(
        r#"[
            {"op": "test", "path": "/DEVICE_METADATA/localhost/hostname", "value": "sw1"},
            {"op": "copy", "from": "/VLAN/Vlan10", "path": "/VLAN/Vlan30"},
            {"op": "replace", "path": "/VLAN/Vlan30/vlanid", "value": "30"},
            {"op": "move", "from": "/DEVICE_METADATA/localhost/hostname", "path": "/DEVICE_METADATA/localhost/alias"}
        ]"#,
    )
    .unwrap();
    updater.apply_patch(ops).unwrap();

    let store = handle.borrow();
    let verifier = ConfigDbVerifier::new(&*store);
    verifier.assert_field_value("VLAN", "Vlan30", "vlanid", "30").unwrap();
    verifier.assert_field_value("VLAN", "Vlan10", "vlanid", "10").unwrap();
    verifier
        .assert_field_value("DEVICE_METADATA", "localhost", "alias", "sw1")
        .unwrap();

    let failing = parse_patch(
        r#"[{"op": "test", "path": "/VLAN/Vlan10/vlanid", "value": "11"}]"#,
    )
    .unwrap();
    drop(store);
    assert!(matches!(
        updater.apply_patch(failing),
        Err(GcuError::InvalidPatch { .. })
    ));
}

#[test]
fn test_node_budget_exhaustion_is_structural() {
    let store = MemoryConfigStore::new(ConfigValue::empty_object());
    let mut updater = GenericUpdater::new(Box::new(store), platform_fixtures::mellanox_spc1())
        .with_node_budget(1);
    let target = config_from(&[vlan_fixtures::vlan(10), vlan_fixtures::vlan(20)]);
    let target = ConfigValue::from(json!({
        "VLAN": target.get("VLAN").unwrap().to_json(),
        "LOOPBACK_INTERFACE": {"Loopback0": {}},
        "PORT": {"Ethernet0": {"mtu": "9100"}}
    }));
    match updater.replace(target) {
        Err(GcuError::Structural { explored, .. }) => assert_eq!(explored, 2),
        other => panic!("unexpected result: {:?}", other),
    }
}

/// The file-backed store persists every committed move
#[test]
fn test_replace_on_config_db_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config_db.json");
    let store = JsonFileConfigStore::create(&path, &loopback_fixtures::two_loopbacks()).unwrap();
    let mut updater = GenericUpdater::new(Box::new(store), platform_fixtures::mellanox_spc1());

    let target = config_from(&[
        ConfigChange::set("LOOPBACK_INTERFACE", "Loopback0"),
        ConfigChange::set("LOOPBACK_INTERFACE", "Loopback0|10.1.0.32/32"),
        vlan_fixtures::vlan(10),
    ]);
    updater.replace(target.clone()).unwrap();

    let reopened = JsonFileConfigStore::open(&path).unwrap();
    assert_eq!(reopened.get_config().unwrap(), target);
}

/// Scenario:
/// 1. The only VLAN of a store that drops empty tables is swapped for another
/// 2. Removing Vlan10 takes the VLAN table with it
/// 3. Adding Vlan20 recreates the table instead of reporting drift
#[test]
fn test_replace_only_entry_when_empty_tables_vanish() {
    let store = FaultyStore::new(config_from(&[vlan_fixtures::vlan(10)])).drop_empty_tables();
    let handle = store.handle();
    let mut updater = GenericUpdater::new(Box::new(store), platform_fixtures::mellanox_spc1());

    let target = config_from(&[vlan_fixtures::vlan(20)]);
    let report = updater.replace(target.clone()).unwrap();
    assert_eq!(report.total_committed(), report.total_moves());

    let store = handle.borrow();
    let verifier = ConfigDbVerifier::new(&*store);
    verifier.assert_entry_exists("VLAN", "Vlan20").unwrap();
    verifier.assert_entry_not_exists("VLAN", "Vlan10").unwrap();
    verifier.assert_config(&target).unwrap();
}

#[test]
fn test_dry_run_reports_plan_only() {
    let initial = loopback_fixtures::two_loopbacks();
    let store = FaultyStore::new(initial.clone());
    let handle = store.handle();
    let mut updater = GenericUpdater::new(Box::new(store), platform_fixtures::mellanox_spc1())
        .with_dry_run(true);

    let patch = r#"[{"op": "add", "path": "/VLAN", "value": {"Vlan10": {"vlanid": "10"}}}]"#;
    let report = updater.apply_patch(parse_patch(patch).unwrap()).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.total_moves(), 1);
    assert_eq!(report.total_committed(), 0);
    ConfigDbVerifier::new(&*handle.borrow())
        .assert_config(&initial)
        .unwrap();
}
