//! Bottom-up multiplicity phase.
//!
//! Post-order over the join tree; for each edge the parent's `local_mult`
//! is multiplied by the number of child-subtree matches inside its band,
//! computed by the fixed pass sequence over a combined table: JoinAttr
//! sort → cumulative sum → Pairwise sort → interval → EndFirst sort →
//! truncate → parallel multiply. All sorts are shuffle-then-merge-sort, so
//! the phase's access pattern depends only on table sizes.

use crate::constraint::JoinConstraint;
use crate::error::ObliviousJoinError;
use crate::join::combined::{
    band_cumsum_pass, combine, extract_prefix, init_band_temps, pairwise_interval_pass,
    parallel_pass,
};
use crate::oblivious::compare::Comparator;
use crate::oblivious::sort::shuffle_sort;
use crate::table::Table;
use crate::tree::JoinTree;
use tracing::debug;

/// Compute `local_mult` for every node of the tree.
///
/// Expects every table initialized with `local_mult = 1` and fresh
/// `original_index` values (and filters already applied on top).
pub fn run(tree: &mut JoinTree) -> Result<(), ObliviousJoinError> {
    for node_idx in tree.post_order() {
        let children = tree.node(node_idx).children.clone();
        for child_idx in children {
            let constraint = edge_constraint(tree, child_idx)?;
            let (parent, child) = tree.pair_mut(node_idx, child_idx);
            debug!(
                parent = %parent.alias,
                child = %child.alias,
                "bottom-up edge"
            );
            compute_edge(&mut parent.table, &mut child.table, &constraint)?;
        }
    }
    Ok(())
}

pub(crate) fn edge_constraint(
    tree: &JoinTree,
    child_idx: usize,
) -> Result<JoinConstraint, ObliviousJoinError> {
    tree.node(child_idx).constraint.clone().ok_or_else(|| {
        ObliviousJoinError::InternalInvariantViolation(format!(
            "non-root node '{}' has no edge constraint",
            tree.node(child_idx).alias
        ))
    })
}

/// One (parent, child, constraint) edge: fold the child's match counts
/// into the parent's `local_mult`.
fn compute_edge(
    parent: &mut Table,
    child: &mut Table,
    constraint: &JoinConstraint,
) -> Result<(), ObliviousJoinError> {
    parent.set_join_attrs(&constraint.target_column)?;
    child.set_join_attrs(&constraint.source_column)?;

    let mut comb = combine(parent, child, constraint);
    init_band_temps(&mut comb);

    shuffle_sort(&mut comb, Comparator::JoinAttr);
    band_cumsum_pass(&mut comb);

    shuffle_sort(&mut comb, Comparator::Pairwise);
    pairwise_interval_pass(&mut comb, parent.len())?;

    let ends = extract_prefix(comb, Comparator::EndFirst, parent.len());
    parallel_pass(parent.rows_mut(), &ends, |p, end| {
        p.local_mult *= end.local_interval;
    })
}
