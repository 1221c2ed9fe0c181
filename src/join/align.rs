//! Align-concat phase.
//!
//! Reorders each expanded table so that row `i` of every table belongs to
//! output row `i`. The pairing works in *match-unit space*: the child's
//! tuples, in join order, lay out a `local_mult`-weighted unit space;
//! tuple `t` owns units `J(t) .. J(t) + local_mult(t)` and a parent `p`'s
//! band covers the contiguous run starting at its START-boundary prefix
//! with length `m(p)`.
//!
//! Every aligned row carries its *combination label* `s ∈ [0, local_mult)`
//! in `copy_index` — which of its subtree's match combinations this copy
//! stands for. A parent copy addresses the unit `band_start + (s / S) mod
//! m`, where `S` is the product of the match counts of the node's earlier
//! child edges; sibling edges thereby enumerate exact cross products.
//! Sorting parent copies by `(unit, output position)` and child copies by
//! `(unit, occurrence)` yields two equal multisets of unit ranks, so a
//! lockstep pass hands every child copy the output row of its parent copy.

use crate::error::ObliviousJoinError;
use crate::join::bottom_up::edge_constraint;
use crate::join::combined::{
    band_cumsum_pass, broadcast_scalars, combine, extract_prefix, init_band_temps,
    pairwise_interval_pass, parallel_pass,
};
use crate::oblivious::compare::Comparator;
use crate::oblivious::sort::shuffle_sort;
use crate::tree::JoinTree;
use tracing::debug;

/// Align every expanded table into output-row order.
///
/// The root's expanded table already is the output order (tuple blocks in
/// destination order, `copy_index` = combination label); each edge then
/// aligns its child against the parent, pre-order.
pub fn run(tree: &mut JoinTree) -> Result<(), ObliviousJoinError> {
    for node_idx in tree.pre_order() {
        let children = tree.node(node_idx).children.clone();
        if children.is_empty() {
            continue;
        }
        // Sibling stride accumulator, per parent tuple.
        for row in tree.node_mut(node_idx).table.rows_mut() {
            row.foreign_cumsum = 1;
        }
        for child_idx in children {
            align_edge(tree, node_idx, child_idx)?;
        }
    }
    Ok(())
}

fn align_edge(
    tree: &mut JoinTree,
    parent_idx: usize,
    child_idx: usize,
) -> Result<(), ObliviousJoinError> {
    let constraint = edge_constraint(tree, child_idx)?;
    let (parent, child) = tree.pair_mut(parent_idx, child_idx);
    debug!(parent = %parent.alias, child = %child.alias, "align edge");

    parent.table.set_join_attrs(&constraint.target_column)?;
    child.table.set_join_attrs(&constraint.source_column)?;

    // Band pass: J(t) for child tuples, band start and m(p) for parents.
    let mut comb = combine(&parent.table, &child.table, &constraint);
    init_band_temps(&mut comb);
    shuffle_sort(&mut comb, Comparator::JoinAttr);
    band_cumsum_pass(&mut comb);

    let sources = extract_prefix(comb.clone(), Comparator::SourceFirst, child.table.len());
    parallel_pass(child.table.rows_mut(), &sources, |t, s| {
        t.local_cumsum = s.local_cumsum; // J(t): first owned unit
    })?;

    shuffle_sort(&mut comb, Comparator::Pairwise);
    pairwise_interval_pass(&mut comb, parent.table.len())?;
    let ends = extract_prefix(comb, Comparator::EndFirst, parent.table.len());
    parallel_pass(parent.table.rows_mut(), &ends, |p, end| {
        p.foreign_interval = end.local_interval; // m(p)
        p.local_cumsum = end.local_cumsum; // band start unit
    })?;

    // Parent copies: every copy learns its tuple's m, band start, and the
    // sibling stride, then addresses its unit. The broadcast stamps each
    // copy's output position into `index`.
    broadcast_scalars(parent.table.rows(), &mut parent.expanded, |copy, from| {
        copy.foreign_interval = from.foreign_interval;
        copy.local_cumsum = from.local_cumsum;
        copy.foreign_cumsum = from.foreign_cumsum;
    })?;
    let mut targets = parent.expanded.clone();
    for t in targets.iter_mut() {
        let stride = t.foreign_cumsum.max(1);
        let m = t.foreign_interval.max(1);
        let digit = (t.copy_index / stride) % m;
        t.alignment_key = t.local_cumsum + digit;
    }
    shuffle_sort(&mut targets, Comparator::Alignment);

    // Child copies: learn J(t), split copy_index into (occurrence,
    // combination label), and address their unit.
    broadcast_scalars(child.table.rows(), &mut child.expanded, |copy, from| {
        copy.local_cumsum = from.local_cumsum;
    })?;
    for copy in child.expanded.iter_mut() {
        let lm = copy.local_mult.max(1);
        let label = copy.copy_index % lm;
        copy.index = copy.copy_index / lm; // occurrence among the unit's copies
        copy.copy_index = label; // combination label for deeper edges
        copy.alignment_key = copy.local_cumsum + label;
    }
    shuffle_sort(&mut child.expanded, Comparator::Alignment);

    // Positional pairing: both sequences enumerate the same unit ranks.
    if targets.len() != child.expanded.len() {
        return Err(ObliviousJoinError::InternalInvariantViolation(format!(
            "alignment size mismatch: {} parent copies vs {} child copies",
            targets.len(),
            child.expanded.len()
        )));
    }
    for (copy, target) in child.expanded.iter_mut().zip(&targets) {
        if copy.alignment_key != target.alignment_key {
            return Err(ObliviousJoinError::InternalInvariantViolation(format!(
                "unit multisets diverge: child unit {} vs parent unit {}",
                copy.alignment_key, target.alignment_key
            )));
        }
        copy.dst_idx = target.index; // the paired output row
    }
    shuffle_sort(&mut child.expanded, Comparator::DstIndex);

    // Fold this edge's match counts into the sibling stride.
    for row in parent.table.rows_mut() {
        row.foreign_cumsum *= row.foreign_interval.max(1);
    }
    Ok(())
}
