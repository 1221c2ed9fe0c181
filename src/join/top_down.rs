//! Top-down multiplicity phase.
//!
//! Pre-order over the tree, parents finalized before children. For each
//! edge the parent's output rows are apportioned to its matching child
//! tuples: a parent `p` with per-edge match count `m(p)` contributes the
//! share `final_mult(p) / m(p)` to every match unit in its band, and a
//! child tuple collects `final_mult(t) = local_mult(t) × Σ` of the shares
//! covering it. The coverage sum is one forward pass over a combined
//! table sorted so every boundary sits on the correct side of equal-valued
//! child rows (`JoinAttrCover`).

use crate::constraint::JoinConstraint;
use crate::entry::{Entry, FieldType};
use crate::error::ObliviousJoinError;
use crate::join::bottom_up::edge_constraint;
use crate::join::combined::{
    band_cumsum_pass, combine, extract_prefix, init_band_temps, pairwise_interval_pass,
    parallel_pass,
};
use crate::oblivious::compare::Comparator;
use crate::oblivious::sort::shuffle_sort;
use crate::table::Table;
use crate::tree::JoinTree;
use tracing::debug;

/// Compute `final_mult` for every node. Requires bottom-up to have run.
pub fn run(tree: &mut JoinTree) -> Result<(), ObliviousJoinError> {
    let root = tree.root();
    for row in tree.node_mut(root).table.rows_mut() {
        row.final_mult = row.local_mult;
    }

    for node_idx in tree.pre_order() {
        let children = tree.node(node_idx).children.clone();
        for child_idx in children {
            let constraint = edge_constraint(tree, child_idx)?;
            let (parent, child) = tree.pair_mut(node_idx, child_idx);
            debug!(
                parent = %parent.alias,
                child = %child.alias,
                "top-down edge"
            );
            propagate_edge(&mut parent.table, &mut child.table, &constraint)?;
        }
    }
    Ok(())
}

fn propagate_edge(
    parent: &mut Table,
    child: &mut Table,
    constraint: &JoinConstraint,
) -> Result<(), ObliviousJoinError> {
    parent.set_join_attrs(&constraint.target_column)?;
    child.set_join_attrs(&constraint.source_column)?;

    // Per-parent match count m(p), recomputed with the bottom-up passes.
    let mut comb = combine(parent, child, constraint);
    init_band_temps(&mut comb);
    shuffle_sort(&mut comb, Comparator::JoinAttr);
    band_cumsum_pass(&mut comb);
    shuffle_sort(&mut comb, Comparator::Pairwise);
    pairwise_interval_pass(&mut comb, parent.len())?;
    let ends = extract_prefix(comb, Comparator::EndFirst, parent.len());

    let mut division_error = None;
    parallel_pass(parent.rows_mut(), &ends, |p, end| {
        let m = end.local_interval;
        if m > 0 && p.final_mult % m != 0 {
            division_error = Some(format!(
                "final_mult {} of parent tuple {} is not divisible by its \
                 match count {m}",
                p.final_mult, p.original_index
            ));
        }
        p.foreign_interval = m;
        // m = 0 forces final_mult = 0 through the bottom-up product, so
        // the guarded divisor never distorts a live share.
        p.local_weight = p.final_mult / m.max(1);
    })?;
    if let Some(msg) = division_error {
        return Err(ObliviousJoinError::InternalInvariantViolation(msg));
    }

    // Coverage pass: boundaries carry the parent shares.
    let mut comb = combine(parent, child, constraint);
    shuffle_sort(&mut comb, Comparator::JoinAttrCover);
    coverage_pass(&mut comb);

    let sources = extract_prefix(comb, Comparator::SourceFirst, child.len());
    parallel_pass(child.rows_mut(), &sources, |t, s| {
        t.foreign_sum = s.foreign_sum;
        t.final_mult = s.final_mult;
    })
}

/// Forward pass over a `JoinAttrCover`-sorted combined table: the running
/// sum of active parent shares lands in every SOURCE row's `foreign_sum`,
/// and `final_mult = local_mult × foreign_sum`.
fn coverage_pass(rows: &mut [Entry]) {
    let mut running: i64 = 0;
    for row in rows.iter_mut() {
        match row.field_type {
            FieldType::Start => running += row.local_weight,
            FieldType::End => running -= row.local_weight,
            FieldType::Source => {
                row.foreign_sum = running;
                row.final_mult = row.local_mult * running;
            }
            _ => {}
        }
    }
}
