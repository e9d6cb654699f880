//! Patch applier.
//!
//! Writes an ordered plan to the live store one move at a time. Before each
//! write the part of the store the move touches is read back and the move's
//! precondition is checked against it, so a store that drifted since the
//! plan was made is detected instead of overwritten. A failure stops the
//! loop; moves already written stay written.

use crate::error::{GcuError, GcuResult};
use crate::patch::Move;
use crate::store::{ConfigStore, StoreResult};
use crate::value::{ConfigObject, ConfigValue};
use serde::Serialize;
use tracing::{debug, error, info};

/// Outcome of a fully applied plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CommitReport {
    pub committed: usize,
    pub total: usize,
}

/// The slice of the store a move addresses, shaped like the full tree.
struct LiveView {
    tree: ConfigValue,
    table: Option<String>,
    key: Option<String>,
}

impl LiveView {
    fn read(store: &dyn ConfigStore, m: &Move) -> StoreResult<Self> {
        let table = m.path.table();
        let key = m.path.entry_key();
        let tree = match (&table, &key) {
            (None, _) => store.get_config()?,
            (Some(table), None) => {
                let mut root = ConfigObject::new();
                if let Some(t) = store.get_table(table)? {
                    root.insert(table.clone(), t);
                }
                ConfigValue::Object(root)
            }
            // Stores such as Redis drop a table with its last entry and
            // create it with the first one, so below table level a missing
            // table reads as an empty one.
            (Some(table), Some(key)) => {
                let mut entries = ConfigObject::new();
                if let Some(entry) = store.get_entry(table, key)? {
                    entries.insert(key.clone(), entry);
                }
                let mut root = ConfigObject::new();
                root.insert(table.clone(), ConfigValue::Object(entries));
                ConfigValue::Object(root)
            }
        };
        Ok(Self { tree, table, key })
    }

    /// Writes `updated` back through the store primitives.
    fn write(&self, store: &mut dyn ConfigStore, updated: &ConfigValue) -> StoreResult<()> {
        match (&self.table, &self.key) {
            (None, _) => {
                let empty = ConfigObject::new();
                let before = self.tree.as_object().unwrap_or(&empty);
                let after = updated.as_object().unwrap_or(&empty);
                for table in before.keys().filter(|t| !after.contains_key(*t)) {
                    store.delete_table(table)?;
                }
                for (table, value) in after {
                    if before.get(table) != Some(value) {
                        store.set_table(table, value)?;
                    }
                }
                Ok(())
            }
            (Some(table), None) => match updated.get(table) {
                Some(value) => store.set_table(table, value),
                None => store.delete_table(table),
            },
            (Some(table), Some(key)) => match updated.get(table).and_then(|t| t.get(key)) {
                Some(entry) => store.set_entry(table, key, entry),
                None => store.delete_entry(table, key),
            },
        }
    }
}

/// Applies `moves` in order to `store`.
///
/// Returns `ConcurrentModification` when the live store no longer matches a
/// move's precondition and `Apply` when a store call fails. Both report how
/// many moves were committed. Nothing is rolled back.
pub fn apply(store: &mut dyn ConfigStore, moves: &[Move]) -> GcuResult<CommitReport> {
    let total = moves.len();
    info!(moves = total, "Applying plan");

    for (index, m) in moves.iter().enumerate() {
        let store_failure = |source| {
            error!(index, path = %m.path, committed = index, "Store write failed");
            GcuError::Apply {
                index,
                path: m.path.to_string(),
                committed: index,
                source,
            }
        };
        let drift = |reason: String| {
            error!(index, path = %m.path, reason = %reason, "Live store drifted from plan");
            GcuError::ConcurrentModification {
                index,
                path: m.path.to_string(),
                committed: index,
                reason,
            }
        };

        let view = LiveView::read(&*store, m).map_err(store_failure)?;
        m.check_precondition(&view.tree)
            .map_err(|e| drift(e.to_string()))?;

        let mut updated = view.tree.clone();
        m.apply_to(&mut updated).map_err(|e| drift(e.to_string()))?;
        view.write(store, &updated).map_err(store_failure)?;
        debug!(index, step = %m, "Committed move");
    }

    info!(committed = total, "Plan applied");
    Ok(CommitReport {
        committed: total,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::store::MemoryConfigStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn p(pointer: &str) -> Path {
        Path::parse(pointer).unwrap()
    }

    fn store(value: serde_json::Value) -> MemoryConfigStore {
        MemoryConfigStore::new(ConfigValue::from(value))
    }

    #[test]
    fn test_apply_field_entry_and_table_moves() {
        let mut s = store(json!({"PORT": {"Ethernet0": {"mtu": "1500", "speed": "25000"}}, "ACL_TABLE": {"a": {}}}));
        let moves = vec![
            Move::replace(p("/PORT/Ethernet0/mtu"), "1500".into(), "9100".into()),
            Move::remove(p("/PORT/Ethernet0/speed"), "25000".into()),
            Move::add(p("/VLAN"), ConfigValue::from(json!({"Vlan10": {"vlanid": "10"}}))),
            Move::add(p("/VLAN/Vlan20"), ConfigValue::from(json!({"vlanid": "20"}))),
            Move::remove(p("/ACL_TABLE"), ConfigValue::from(json!({"a": {}}))),
        ];
        let report = apply(&mut s, &moves).unwrap();
        assert_eq!(report, CommitReport { committed: 5, total: 5 });
        assert_eq!(
            s.snapshot().to_json(),
            json!({
                "PORT": {"Ethernet0": {"mtu": "9100"}},
                "VLAN": {"Vlan10": {"vlanid": "10"}, "Vlan20": {"vlanid": "20"}}
            })
        );
    }

    #[test]
    fn test_add_into_existing_empty_table() {
        let mut s = store(json!({"BUFFER_PG": {}}));
        let moves = vec![Move::add(p("/BUFFER_PG/Ethernet0|3-4"), ConfigValue::from(json!({"profile": "p"})))];
        apply(&mut s, &moves).unwrap();
        assert_eq!(
            s.snapshot().to_json(),
            json!({"BUFFER_PG": {"Ethernet0|3-4": {"profile": "p"}}})
        );
    }

    #[test]
    fn test_entry_add_into_dropped_table() {
        let mut s = store(json!({"VLAN": {"Vlan10": {"vlanid": "10"}}}));
        let moves = vec![
            Move::remove(p("/VLAN/Vlan10"), ConfigValue::from(json!({"vlanid": "10"}))),
            Move::add(p("/VLAN/Vlan20"), ConfigValue::from(json!({"vlanid": "20"}))),
        ];
        // Redis keeps no empty tables.
        apply(&mut s, &moves[..1]).unwrap();
        s.delete_table("VLAN").unwrap();

        apply(&mut s, &moves[1..]).unwrap();
        assert_eq!(s.snapshot().to_json(), json!({"VLAN": {"Vlan20": {"vlanid": "20"}}}));
    }

    #[test]
    fn test_entry_remove_from_missing_table_is_drift() {
        let mut s = MemoryConfigStore::default();
        let moves = vec![Move::remove(p("/VLAN/Vlan10"), ConfigValue::from(json!({"vlanid": "10"})))];
        assert!(matches!(
            apply(&mut s, &moves),
            Err(GcuError::ConcurrentModification { index: 0, committed: 0, .. })
        ));
        assert_eq!(s.snapshot(), ConfigValue::empty_object());
    }

    #[test]
    fn test_root_replace_writes_per_table() {
        let mut s = store(json!({"PORT": {"Ethernet0": {}}, "VLAN": {"Vlan10": {}}}));
        let prior = s.snapshot();
        let target = ConfigValue::from(json!({"PORT": {"Ethernet0": {}}, "LOOPBACK_INTERFACE": {"Loopback0": {}}}));
        apply(&mut s, &[Move::replace(Path::root(), prior, target.clone())]).unwrap();
        assert_eq!(s.snapshot(), target);
    }

    #[test]
    fn test_drift_detected_before_write() {
        let mut s = store(json!({"PORT": {"Ethernet0": {"mtu": "9000"}}}));
        let moves = vec![
            Move::add(p("/VLAN"), ConfigValue::empty_object()),
            Move::replace(p("/PORT/Ethernet0/mtu"), "1500".into(), "9100".into()),
        ];
        match apply(&mut s, &moves) {
            Err(GcuError::ConcurrentModification { index, committed, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(committed, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(
            s.snapshot().to_json(),
            json!({"PORT": {"Ethernet0": {"mtu": "9000"}}, "VLAN": {}})
        );
    }

    #[test]
    fn test_add_of_present_entry_is_drift() {
        let mut s = store(json!({"VLAN": {"Vlan10": {"vlanid": "10"}}}));
        let moves = vec![Move::add(p("/VLAN/Vlan10"), ConfigValue::from(json!({"vlanid": "10"})))];
        let err = apply(&mut s, &moves).unwrap_err();
        assert!(matches!(err, GcuError::ConcurrentModification { committed: 0, .. }));
        assert!(err.is_zero_effect());
    }

    #[test]
    fn test_empty_plan() {
        let mut s = MemoryConfigStore::default();
        assert_eq!(apply(&mut s, &[]).unwrap(), CommitReport::default());
    }
}
