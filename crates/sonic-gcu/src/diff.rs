//! Structural diff between two configuration trees.

use crate::patch::Move;
use crate::path::Path;
use crate::value::ConfigValue;

/// Computes the moves that turn `current` into `target`.
///
/// Keys only present in `target` become `Add`, keys only present in
/// `current` become `Remove`, object pairs are compared recursively and any
/// other differing pair becomes a single `Replace`. Equal subtrees produce
/// nothing. Output follows key order within each object, removals first.
pub fn diff(current: &ConfigValue, target: &ConfigValue) -> Vec<Move> {
    let mut moves = Vec::new();
    diff_at(&Path::root(), current, target, &mut moves);
    moves
}

fn diff_at(at: &Path, current: &ConfigValue, target: &ConfigValue, out: &mut Vec<Move>) {
    if current == target {
        return;
    }
    let (ConfigValue::Object(cur), ConfigValue::Object(tgt)) = (current, target) else {
        out.push(Move::replace(at.clone(), current.clone(), target.clone()));
        return;
    };

    for (key, cur_child) in cur {
        let child = at.child(key.as_str());
        match tgt.get(key) {
            None => out.push(Move::remove(child, cur_child.clone())),
            Some(tgt_child) => diff_at(&child, cur_child, tgt_child, out),
        }
    }
    for (key, tgt_child) in tgt {
        if !cur.contains_key(key) {
            out.push(Move::add(at.child(key.as_str()), tgt_child.clone()));
        }
    }
}
