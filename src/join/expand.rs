//! Distribute-expand phase.
//!
//! Materializes each node's table into an expanded table of length
//! `N = Σ final_mult(t)`: every tuple appears `final_mult` times with
//! `copy_index` running from 0. Placement uses the oblivious distribute
//! network (descending power-of-two strides, right-to-left, swap into
//! padding) followed by the expansion network (same strides, masked copy
//! rightward inside each tuple's run). Every pass touches a fixed index
//! schedule; the move decisions are byte-masked, never branched.

use crate::entry::{Entry, FieldType};
use crate::error::ObliviousJoinError;
use crate::oblivious::compare::Comparator;
use crate::oblivious::sort::shuffle_sort;
use crate::oblivious::swap::{oblivious_overwrite, oblivious_swap_at, select_i64};
use crate::tree::JoinTree;
use tracing::debug;

/// Expand every node; all expanded tables must agree on `N`.
pub fn run(tree: &mut JoinTree) -> Result<usize, ObliviousJoinError> {
    let mut expected: Option<usize> = None;
    for idx in 0..tree.len() {
        let node = tree.node_mut(idx);
        let expanded = expand_rows(node.table.rows())?;
        debug!(node = %node.alias, rows = expanded.len(), "expanded");
        match expected {
            None => expected = Some(expanded.len()),
            Some(n) if n != expanded.len() => {
                return Err(ObliviousJoinError::InternalInvariantViolation(format!(
                    "expanded sizes disagree: {} vs {} at node '{}'",
                    n,
                    expanded.len(),
                    node.alias
                )));
            }
            Some(_) => {}
        }
        node.expanded = expanded;
    }
    Ok(expected.unwrap_or(0))
}

/// Largest power of two not exceeding `n` (n >= 1).
fn prev_power_of_two(n: usize) -> usize {
    let mut d = 1;
    while d * 2 <= n {
        d *= 2;
    }
    d
}

/// Destination key that sorts zero-multiplicity rows behind every live
/// destination. They must not be tagged as padding before sorting — the
/// shuffle strips padding, and the number of dead rows is not public.
const DEAD_SLOT: i64 = i64::MAX / 4;

/// Expand one table's rows into `Σ final_mult` copies.
pub fn expand_rows(rows: &[Entry]) -> Result<Vec<Entry>, ObliviousJoinError> {
    // Exclusive prefix sum of final_mult; zero-mult rows are keyed to the
    // far end instead of a real destination.
    let mut staged: Vec<Entry> = rows.to_vec();
    let mut total: i64 = 0;
    for row in staged.iter_mut() {
        let dead = row.final_mult <= 0;
        row.dst_idx = select_i64(dead, DEAD_SLOT, total);
        total += row.final_mult;
        row.copy_index = 0;
    }
    let n = total as usize;

    // Compact survivors to the front in destination order, then retag the
    // dead tail as padding and size to N; both counts involved (input
    // length and N) are public.
    shuffle_sort(&mut staged, Comparator::DstIndex);
    for row in staged.iter_mut() {
        let dead = row.dst_idx == DEAD_SLOT;
        let tag = select_i64(dead, FieldType::SortPadding as i64, row.field_type as i64);
        row.field_type = field_type_from_tag(tag);
    }
    if staged.len() < n {
        staged.resize(n, Entry::padding());
    } else {
        staged.truncate(n);
    }
    if n == 0 {
        return Ok(staged);
    }

    // Distribution: move each survivor right to its dst_idx. Gaps are
    // non-decreasing along the compacted prefix (every earlier row adds at
    // least one to the prefix sum), so at every stride the movers form a
    // suffix and their targets are free.
    let mut d = prev_power_of_two(n.max(2) - 1);
    while d >= 1 {
        for i in (0..n - d).rev() {
            let due = !staged[i].is_padding() && staged[i].dst_idx >= (i + d) as i64;
            let free = staged[i + d].is_padding();
            oblivious_swap_at(&mut staged, i, i + d, due & free);
        }
        d /= 2;
    }

    // Expansion: propagate copies rightward inside each run, adding the
    // stride to copy_index; offsets decompose over the descending strides.
    let mut d = prev_power_of_two(n.max(2) - 1);
    while d >= 1 {
        for i in 0..n - d {
            let src = staged[i];
            let fill = !src.is_padding()
                && staged[i + d].is_padding()
                && ((i + d) as i64) < src.dst_idx + src.final_mult;
            let mut copy = src;
            copy.copy_index = src.copy_index + d as i64;
            oblivious_overwrite(&mut staged[i + d], &copy, fill);
        }
        d /= 2;
    }

    // Post-conditions: no padding left, every slot inside its run.
    for (i, row) in staged.iter().enumerate() {
        if row.is_padding() {
            return Err(ObliviousJoinError::InternalInvariantViolation(format!(
                "distribute-expand left padding at slot {i} of {n}"
            )));
        }
        if row.copy_index != i as i64 - row.dst_idx {
            return Err(ObliviousJoinError::InternalInvariantViolation(format!(
                "slot {i} carries copy_index {} but belongs to run at {}",
                row.copy_index, row.dst_idx
            )));
        }
    }
    Ok(staged)
}

fn field_type_from_tag(tag: i64) -> FieldType {
    match tag {
        0 => FieldType::Source,
        1 => FieldType::Start,
        2 => FieldType::End,
        3 => FieldType::Target,
        _ => FieldType::SortPadding,
    }
}
