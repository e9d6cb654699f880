//! Move sorter.
//!
//! Finds an order for a set of moves such that every intermediate tree is
//! accepted by a [`StructuralOracle`]. The search is a depth-first walk over
//! `(working tree, remaining moves)` states driven by an explicit stack, so
//! deep plans never grow the call stack. Candidates are tried in a
//! preference order (see [`preference_order`]), visited states are memoized
//! by content hash, and the walk gives up after a fixed number of states.

pub mod oracle;

use crate::error::{GcuError, GcuResult};
use crate::key::EntryKey;
use crate::patch::{Move, MoveOp, PreconditionError};
use crate::value::ConfigValue;
use ahash::RandomState;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info, warn};

pub use oracle::{
    AcceptAll, CompositeOracle, FieldReferenceRule, OracleRejection, ParentKeyRule,
    ReferentialOracle, StructuralOracle,
};

/// Default number of search states the sorter may visit.
pub const DEFAULT_NODE_BUDGET: usize = 10_000;

/// Fixed seeds so state hashes are reproducible across runs.
const STATE_HASH_SEEDS: (u64, u64, u64, u64) = (
    0x5eed_0001_9c0f_a11e,
    0x5eed_0002_b0ff_e125,
    0x5eed_0003_d1ff_0000,
    0x5eed_0004_0c0f_fee5,
);

/// One state on the search stack.
struct Frame {
    tree: ConfigValue,
    /// Indices into the input moves, in preference order.
    remaining: Vec<usize>,
    /// Move that produced this state, `None` for the initial state.
    chosen: Option<usize>,
    /// Position in `remaining` of the next candidate to try.
    cursor: usize,
}

/// Orders moves so each intermediate configuration stays valid.
pub struct MoveSorter<'a> {
    oracle: &'a dyn StructuralOracle,
    node_budget: usize,
}

impl<'a> MoveSorter<'a> {
    pub fn new(oracle: &'a dyn StructuralOracle) -> Self {
        Self {
            oracle,
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }

    pub fn with_node_budget(mut self, node_budget: usize) -> Self {
        self.node_budget = node_budget;
        self
    }

    pub fn node_budget(&self) -> usize {
        self.node_budget
    }

    /// Orders `moves` for application to `current`.
    ///
    /// Fails with `PathResolution` when some move's precondition held in no
    /// explored state, and with `Structural` when the search space or the
    /// node budget ran out.
    pub fn sort(&self, current: &ConfigValue, moves: Vec<Move>) -> GcuResult<Vec<Move>> {
        if moves.is_empty() {
            return Ok(Vec::new());
        }

        let hasher = RandomState::with_seeds(
            STATE_HASH_SEEDS.0,
            STATE_HASH_SEEDS.1,
            STATE_HASH_SEEDS.2,
            STATE_HASH_SEEDS.3,
        );
        let order = preference_order(&moves);
        let mut visited: HashSet<u64> = HashSet::new();
        let mut ever_held = vec![false; moves.len()];
        let mut last_precondition: Vec<Option<PreconditionError>> = vec![None; moves.len()];
        let mut last_rejection: Option<OracleRejection> = None;
        let mut explored = 0usize;

        visited.insert(hasher.hash_one((current, &order)));
        let mut stack = vec![Frame {
            tree: current.clone(),
            remaining: order,
            chosen: None,
            cursor: 0,
        }];

        debug!(moves = moves.len(), budget = self.node_budget, "Sorting moves");

        while let Some(top) = stack.last_mut() {
            if top.remaining.is_empty() {
                let sorted: Vec<Move> = stack
                    .iter()
                    .filter_map(|frame| frame.chosen)
                    .map(|index| moves[index].clone())
                    .collect();
                info!(moves = sorted.len(), explored, "Found valid move order");
                return Ok(sorted);
            }

            if top.cursor >= top.remaining.len() {
                stack.pop();
                continue;
            }
            let position = top.cursor;
            let index = top.remaining[position];
            top.cursor += 1;

            let candidate = &moves[index];
            if let Err(e) = candidate.check_precondition(&top.tree) {
                last_precondition[index] = Some(e);
                continue;
            }
            ever_held[index] = true;

            let mut scratch = top.tree.clone();
            if let Err(e) = candidate.apply_to(&mut scratch) {
                last_precondition[index] = Some(e.into());
                continue;
            }
            if let Err(rejection) = self.oracle.validate(&scratch) {
                debug!(candidate = %candidate, reason = %rejection, "Oracle rejected move");
                last_rejection = Some(rejection);
                continue;
            }

            let mut remaining = top.remaining.clone();
            remaining.remove(position);
            if !visited.insert(hasher.hash_one((&scratch, &remaining))) {
                continue;
            }

            explored += 1;
            if explored > self.node_budget {
                warn!(budget = self.node_budget, "Move sorter exhausted its node budget");
                return Err(GcuError::structural(
                    format!("node budget of {} exhausted", self.node_budget),
                    explored,
                ));
            }

            stack.push(Frame {
                tree: scratch,
                remaining,
                chosen: Some(index),
                cursor: 0,
            });
        }

        if let Some(index) = ever_held.iter().position(|held| !held) {
            let source = last_precondition[index].take().unwrap_or_else(|| {
                PreconditionError::AlreadyPresent {
                    path: moves[index].path.to_string(),
                }
            });
            return Err(GcuError::path_resolution(
                Some(index),
                moves[index].path.to_string(),
                source,
            ));
        }

        let reason = last_rejection
            .map(|r| r.reason)
            .unwrap_or_else(|| "no ordering applies every move".to_string());
        Err(GcuError::structural(reason, explored))
    }
}

/// Entity a move touches: table plus the base component of the entry key.
fn entity(m: &Move) -> Option<(String, String)> {
    let table = m.path.table()?;
    let key = m.path.entry_key()?;
    Some((table, EntryKey::parse(&key).base().to_string()))
}

/// True when removing `child` has to happen before removing `parent`.
fn removes_before(child: &Move, parent: &Move) -> bool {
    if child.path.is_descendant_of(&parent.path) {
        return true;
    }
    if parent.path.len() != 2 || child.path.len() < 2 || child.path.table() != parent.path.table() {
        return false;
    }
    match (child.path.entry_key(), parent.path.entry_key()) {
        (Some(c), Some(p)) => EntryKey::parse(&p).is_ancestor_of(&EntryKey::parse(&c)),
        _ => false,
    }
}

/// Preferred order in which the sorter tries moves.
///
/// An `Add` on an entity precedes a `Remove` on the same entity, and removals
/// of child entries precede the removal of their parent. Anything else keeps
/// its input position.
pub fn preference_order(moves: &[Move]) -> Vec<usize> {
    let n = moves.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    let entities: Vec<Option<(String, String)>> = moves.iter().map(entity).collect();

    for (a, first) in moves.iter().enumerate() {
        for (b, second) in moves.iter().enumerate() {
            if a == b || second.op != MoveOp::Remove {
                continue;
            }
            let before = match first.op {
                MoveOp::Add => entities[a].is_some() && entities[a] == entities[b],
                MoveOp::Remove => removes_before(first, second),
                MoveOp::Replace => false,
            };
            if before {
                successors[a].push(b);
                in_degree[b] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    if order.len() < n {
        let placed: HashSet<usize> = order.iter().copied().collect();
        order.extend((0..n).filter(|i| !placed.contains(i)));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::path::Path;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn p(pointer: &str) -> Path {
        Path::parse(pointer).unwrap()
    }

    fn tree(value: serde_json::Value) -> ConfigValue {
        ConfigValue::from(value)
    }

    fn apply_all(current: &ConfigValue, moves: &[Move]) -> ConfigValue {
        let mut working = current.clone();
        for m in moves {
            m.check_precondition(&working).unwrap();
            m.apply_to(&mut working).unwrap();
        }
        working
    }

    #[test]
    fn test_empty_moves() {
        let sorter = MoveSorter::new(&AcceptAll);
        assert!(sorter.sort(&ConfigValue::empty_object(), Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_child_removes_before_parent() {
        let current = tree(json!({
            "LOOPBACK_INTERFACE": {
                "Loopback1": {},
                "Loopback1|10.1.0.32/32": {},
                "Loopback1|1100:1::32/128": {}
            }
        }));
        let moves = vec![
            Move::remove(p("/LOOPBACK_INTERFACE/Loopback1"), ConfigValue::empty_object()),
            Move::remove(p("/LOOPBACK_INTERFACE/Loopback1|10.1.0.32~132"), ConfigValue::empty_object()),
            Move::remove(p("/LOOPBACK_INTERFACE/Loopback1|1100:1::32~1128"), ConfigValue::empty_object()),
        ];
        let order = preference_order(&moves);
        assert_eq!(order, vec![1, 2, 0]);

        let oracle = ReferentialOracle::sonic_default();
        let sorted = MoveSorter::new(&oracle).sort(&current, moves).unwrap();
        assert_eq!(sorted.last().unwrap().path, p("/LOOPBACK_INTERFACE/Loopback1"));
        assert_eq!(
            apply_all(&current, &sorted),
            tree(json!({"LOOPBACK_INTERFACE": {}}))
        );
    }

    #[test]
    fn test_add_before_remove_on_same_entity() {
        let moves = vec![
            Move::remove(p("/PORT/Ethernet0/fec"), "rs".into()),
            Move::add(p("/PORT/Ethernet0/speed"), "100000".into()),
            Move::replace(p("/PORT/Ethernet4/mtu"), "9100".into(), "1500".into()),
        ];
        assert_eq!(preference_order(&moves), vec![1, 0, 2]);
    }

    #[test]
    fn test_backtracks_to_satisfy_oracle() {
        // VLAN must exist before its member is added; the input order is wrong.
        let current = tree(json!({"VLAN": {}, "VLAN_MEMBER": {}}));
        let moves = vec![
            Move::add(
                p("/VLAN_MEMBER/Vlan10|Ethernet0"),
                tree(json!({"tagging_mode": "untagged"})),
            ),
            Move::add(p("/VLAN/Vlan10"), tree(json!({"vlanid": "10"}))),
        ];
        let oracle = ReferentialOracle::sonic_default();
        let sorted = MoveSorter::new(&oracle).sort(&current, moves).unwrap();
        assert_eq!(sorted[0].path, p("/VLAN/Vlan10"));
        assert_eq!(sorted[1].path, p("/VLAN_MEMBER/Vlan10|Ethernet0"));
    }

    #[test]
    fn test_reference_chain_removed_in_dependency_order() {
        let current = tree(json!({
            "BUFFER_POOL": {"pool0": {"size": "10"}},
            "BUFFER_PROFILE": {"prof0": {"pool": "pool0"}},
            "BUFFER_PG": {"Ethernet0|3-4": {"profile": "prof0"}}
        }));
        let target = tree(json!({"BUFFER_POOL": {}, "BUFFER_PROFILE": {}, "BUFFER_PG": {}}));
        let moves = diff(&current, &target);
        let oracle = ReferentialOracle::sonic_default();
        let sorted = MoveSorter::new(&oracle).sort(&current, moves).unwrap();
        let paths: Vec<String> = sorted.iter().map(|m| m.path.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "/BUFFER_PG/Ethernet0|3-4",
                "/BUFFER_PROFILE/prof0",
                "/BUFFER_POOL/pool0",
            ]
        );
        assert_eq!(apply_all(&current, &sorted), target);
    }

    #[test]
    fn test_never_applicable_move_is_path_resolution_error() {
        let current = tree(json!({"PORT": {"Ethernet0": {"mtu": "9100"}}}));
        let moves = vec![
            Move::replace(p("/PORT/Ethernet0/mtu"), "9100".into(), "1500".into()),
            Move::remove(p("/PORT/Ethernet8/mtu"), "9100".into()),
        ];
        match MoveSorter::new(&AcceptAll).sort(&current, moves) {
            Err(GcuError::PathResolution { index, path, .. }) => {
                assert_eq!(index, Some(1));
                assert_eq!(path, "/PORT/Ethernet8/mtu");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unsatisfiable_is_structural_error() {
        let current = tree(json!({"VLAN": {}}));
        let moves = vec![Move::add(
            p("/VLAN_MEMBER"),
            tree(json!({"Vlan10|Ethernet0": {"tagging_mode": "untagged"}})),
        )];
        let oracle = ReferentialOracle::sonic_default();
        match MoveSorter::new(&oracle).sort(&current, moves) {
            Err(GcuError::Structural { reason, .. }) => {
                assert!(reason.contains("requires VLAN|Vlan10"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_node_budget_exhaustion() {
        let current = tree(json!({"T": {}}));
        let moves: Vec<Move> = (0..4)
            .map(|i| Move::add(p(&format!("/T/k{}", i)), "v".into()))
            .collect();
        match MoveSorter::new(&AcceptAll).with_node_budget(2).sort(&current, moves) {
            Err(GcuError::Structural { explored, .. }) => assert_eq!(explored, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_sort_is_deterministic() {
        let current = tree(json!({"VLAN": {"Vlan10": {}}, "VLAN_MEMBER": {"Vlan10|Ethernet0": {}}}));
        let target = tree(json!({"VLAN": {"Vlan20": {}}, "VLAN_MEMBER": {"Vlan20|Ethernet0": {}}}));
        let oracle = ReferentialOracle::sonic_default();
        let first = MoveSorter::new(&oracle)
            .sort(&current, diff(&current, &target))
            .unwrap();
        let second = MoveSorter::new(&oracle)
            .sort(&current, diff(&current, &target))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(apply_all(&current, &first), target);
    }
}
