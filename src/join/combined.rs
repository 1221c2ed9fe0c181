//! Combined tables and the band passes shared by the join phases.
//!
//! A combined table interleaves the child's tuples (SOURCE) with two
//! boundary events per parent tuple (START at `col + d₁`, END at
//! `col + d₂`), turning "count the child rows inside each parent's band"
//! into passes over sorted streams. Bottom-up, top-down, and align-concat
//! all run the same three steps — cumulative-sum pass, pairwise interval
//! pass, extraction — differing only in what they do with the results.

use crate::constraint::{Bound, JoinConstraint};
use crate::entry::{Entry, EqualityType, FieldType, JOIN_ATTR_NEG_INF, JOIN_ATTR_POS_INF};
use crate::error::ObliviousJoinError;
use crate::oblivious::compare::Comparator;
use crate::oblivious::sort::shuffle_sort;
use crate::oblivious::swap::select_i64;
use crate::table::Table;

/// Boundary join value: parent value plus deviation, saturating at the
/// one-sided sentinels.
fn boundary_value(join_attr: i64, bound: &Bound) -> i64 {
    if bound.is_neg_inf() {
        JOIN_ATTR_NEG_INF
    } else if bound.is_pos_inf() {
        JOIN_ATTR_POS_INF
    } else {
        join_attr + bound.deviation
    }
}

/// Encode `|child| + 2·|parent|` rows. Both tables must already carry the
/// edge's join attribute in `join_attr`.
pub fn combine(parent: &Table, child: &Table, constraint: &JoinConstraint) -> Vec<Entry> {
    let mut rows = Vec::with_capacity(child.len() + 2 * parent.len());

    for entry in child.rows() {
        let mut source = *entry;
        source.field_type = FieldType::Source;
        source.equality_type = EqualityType::None;
        rows.push(source);
    }

    for entry in parent.rows() {
        let mut start = *entry;
        start.field_type = FieldType::Start;
        start.equality_type = constraint.lower.equality;
        start.join_attr = boundary_value(entry.join_attr, &constraint.lower);
        rows.push(start);

        let mut end = *entry;
        end.field_type = FieldType::End;
        end.equality_type = constraint.upper.equality;
        end.join_attr = boundary_value(entry.join_attr, &constraint.upper);
        rows.push(end);
    }

    rows
}

/// Reset the per-pass scratch: SOURCE rows stage their `local_mult` as the
/// pass weight in `local_cumsum`; boundaries contribute nothing.
pub fn init_band_temps(rows: &mut [Entry]) {
    for row in rows.iter_mut() {
        let is_source = row.field_type == FieldType::Source;
        row.local_cumsum = select_i64(is_source, row.local_mult, 0);
        row.local_interval = 0;
        row.foreign_sum = 0;
    }
}

/// Cumulative-sum pass over a `JoinAttr`-sorted combined table.
///
/// Maintains the running weighted SOURCE total and the portion of it
/// contributed at the current join value. On exit:
/// - SOURCE rows hold their exclusive prefix (the rank of their first
///   match unit in the child's weighted unit space),
/// - START rows hold the prefix strictly below the bound when closed, and
///   the prefix through the bound value when open,
/// - END rows hold the prefix through the bound value when closed, and
///   the prefix strictly below it when open.
///
/// The pass touches every row exactly once in order; the branch selects
/// among constant-shape arithmetic updates.
pub fn band_cumsum_pass(rows: &mut [Entry]) {
    let mut running: i64 = 0;
    let mut at_value: i64 = 0;
    let mut current = JOIN_ATTR_NEG_INF;

    for row in rows.iter_mut() {
        let changed = row.join_attr != current;
        at_value = select_i64(changed, 0, at_value);
        current = row.join_attr;

        match row.field_type {
            FieldType::Source => {
                let weight = row.local_cumsum;
                running += weight;
                at_value += weight;
                row.local_cumsum = running - weight;
            }
            FieldType::Start => {
                let closed = row.equality_type != EqualityType::Neq;
                row.local_cumsum = running - select_i64(closed, at_value, 0);
            }
            FieldType::End => {
                let open = row.equality_type == EqualityType::Neq;
                row.local_cumsum = running - select_i64(open, at_value, 0);
            }
            _ => {}
        }
    }
}

/// Interval pass over a `Pairwise`-sorted combined table.
///
/// The first `2·parent_len` rows are (START, END) pairs per parent. Each
/// END receives the band width `local_interval = cumsum(END) −
/// cumsum(START)` and stashes the band's first unit rank in
/// `local_cumsum`.
pub fn pairwise_interval_pass(
    rows: &mut [Entry],
    parent_len: usize,
) -> Result<(), ObliviousJoinError> {
    if rows.len() < 2 * parent_len {
        return Err(ObliviousJoinError::InternalInvariantViolation(format!(
            "combined table of {} rows cannot hold {parent_len} boundary pairs",
            rows.len()
        )));
    }
    for i in 0..parent_len {
        let (head, tail) = rows.split_at_mut(2 * i + 1);
        let start = &head[2 * i];
        let end = &mut tail[0];
        if start.field_type != FieldType::Start
            || end.field_type != FieldType::End
            || start.original_index != end.original_index
        {
            return Err(ObliviousJoinError::InternalInvariantViolation(format!(
                "pairwise order broken at boundary pair {i}"
            )));
        }
        end.local_interval = end.local_cumsum - start.local_cumsum;
        end.local_cumsum = start.local_cumsum;
    }
    Ok(())
}

/// Shuffle-sort and keep the first `len` rows.
pub fn extract_prefix(mut rows: Vec<Entry>, cmp: Comparator, len: usize) -> Vec<Entry> {
    shuffle_sort(&mut rows, cmp);
    rows.truncate(len);
    rows
}

/// Lockstep pass over a node table and rows extracted from a combined
/// table, verifying positional agreement by `original_index`.
pub fn parallel_pass(
    table_rows: &mut [Entry],
    extracted: &[Entry],
    mut apply: impl FnMut(&mut Entry, &Entry),
) -> Result<(), ObliviousJoinError> {
    if table_rows.len() != extracted.len() {
        return Err(ObliviousJoinError::InternalInvariantViolation(format!(
            "parallel pass length mismatch: {} vs {}",
            table_rows.len(),
            extracted.len()
        )));
    }
    for (row, from) in table_rows.iter_mut().zip(extracted) {
        if row.original_index != from.original_index {
            return Err(ObliviousJoinError::InternalInvariantViolation(format!(
                "original_index drifted through sorting: {} vs {}",
                row.original_index, from.original_index
            )));
        }
        apply(row, from);
    }
    Ok(())
}

/// Hand per-tuple scalars from node rows to their expanded copies.
///
/// Node rows are tagged TARGET and interleaved with the copies; after an
/// `OriginalIndex` shuffle-sort every group of copies directly follows its
/// tuple's TARGET row, so one forward pass applies the scalars. The copies
/// are then restored to their stamped order.
pub fn broadcast_scalars(
    node_rows: &[Entry],
    copies: &mut Vec<Entry>,
    mut apply: impl FnMut(&mut Entry, &Entry),
) -> Result<(), ObliviousJoinError> {
    if copies.is_empty() {
        return Ok(());
    }
    for (i, copy) in copies.iter_mut().enumerate() {
        copy.index = i as i64;
    }

    let mut comb = Vec::with_capacity(node_rows.len() + copies.len());
    for row in node_rows {
        let mut target = *row;
        target.field_type = FieldType::Target;
        comb.push(target);
    }
    comb.append(copies);
    shuffle_sort(&mut comb, Comparator::OriginalIndex);

    let mut carry = Entry::default();
    let mut have_target = false;
    for row in comb.iter_mut() {
        if row.field_type == FieldType::Target {
            carry = *row;
            have_target = true;
        } else {
            if !have_target || carry.original_index != row.original_index {
                return Err(ObliviousJoinError::InternalInvariantViolation(format!(
                    "copy of tuple {} has no broadcast source",
                    row.original_index
                )));
            }
            apply(row, &carry);
        }
    }

    let copy_count = comb.len() - node_rows.len();
    shuffle_sort(&mut comb, Comparator::SourceFirst);
    comb.truncate(copy_count);
    shuffle_sort(&mut comb, Comparator::Index);
    *copies = comb;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oblivious::sort::merge_sort;
    use crate::table::Schema;

    fn table(name: &str, col: &str, values: &[i32]) -> Table {
        let schema = Schema::new(vec![col.to_string()]).unwrap();
        let mut t = Table::new(name, schema);
        for (i, &v) in values.iter().enumerate() {
            let mut e = Entry::from_attributes(&[v]);
            e.original_index = i as i64;
            e.local_mult = 1;
            e.join_attr = i64::from(v);
            t.push(e);
        }
        t
    }

    fn band(d1: i64, e1: EqualityType, d2: i64, e2: EqualityType) -> JoinConstraint {
        JoinConstraint::new(
            "c",
            "x",
            "p",
            "y",
            Bound { deviation: d1, equality: e1 },
            Bound { deviation: d2, equality: e2 },
        )
    }

    /// Run the full interval computation for one edge and return each
    /// parent's band width in original order.
    fn intervals(parent: &Table, child: &Table, c: &JoinConstraint) -> Vec<i64> {
        let mut comb = combine(parent, child, c);
        init_band_temps(&mut comb);
        shuffle_sort(&mut comb, Comparator::JoinAttr);
        band_cumsum_pass(&mut comb);
        shuffle_sort(&mut comb, Comparator::Pairwise);
        pairwise_interval_pass(&mut comb, parent.len()).unwrap();
        let ends = extract_prefix(comb, Comparator::EndFirst, parent.len());
        ends.iter().map(|e| e.local_interval).collect()
    }

    #[test]
    fn test_combine_shape() {
        let parent = table("p", "y", &[3, 7]);
        let child = table("c", "x", &[1, 5, 10]);
        let c = band(0, EqualityType::Eq, 0, EqualityType::Eq);
        let comb = combine(&parent, &child, &c);
        assert_eq!(comb.len(), child.len() + 2 * parent.len());
        let starts = comb.iter().filter(|e| e.field_type == FieldType::Start).count();
        let ends = comb.iter().filter(|e| e.field_type == FieldType::End).count();
        assert_eq!(starts, 2);
        assert_eq!(ends, 2);
    }

    #[test]
    fn test_equality_intervals() {
        // Child {1,5,5,10}; parent {5, 2}. Matches per parent: 2 and 0.
        let parent = table("p", "y", &[5, 2]);
        let child = table("c", "x", &[1, 5, 5, 10]);
        let c = band(0, EqualityType::Eq, 0, EqualityType::Eq);
        assert_eq!(intervals(&parent, &child, &c), vec![2, 0]);
    }

    #[test]
    fn test_one_sided_band_intervals() {
        // child.x >= parent.y: child {1,5,10}, parent {3,7} -> 2 and 1.
        let parent = table("p", "y", &[3, 7]);
        let child = table("c", "x", &[1, 5, 10]);
        let c = JoinConstraint::new(
            "c",
            "x",
            "p",
            "y",
            Bound::closed(0),
            Bound::pos_inf(),
        );
        assert_eq!(intervals(&parent, &child, &c), vec![2, 1]);
    }

    #[test]
    fn test_open_bounds_exclude_boundary_values() {
        let parent = table("p", "y", &[5]);
        let child = table("c", "x", &[4, 5, 5, 6]);
        // x in (y, y+2]: excludes the two 5s, includes 6.
        let open = band(0, EqualityType::Neq, 2, EqualityType::Eq);
        assert_eq!(intervals(&parent, &child, &open), vec![1]);
        // x in [y, y+1): includes the 5s, excludes 6.
        let half_open = band(0, EqualityType::Eq, 1, EqualityType::Neq);
        assert_eq!(intervals(&parent, &child, &half_open), vec![2]);
    }

    #[test]
    fn test_band_with_deviations() {
        // p.v in [q.w - 3, q.w + 7] reversed: child {100,105,110}, parent {100}.
        let parent = table("q", "w", &[100]);
        let child = table("p", "v", &[100, 105, 110]);
        let c = band(-3, EqualityType::Eq, 7, EqualityType::Eq);
        assert_eq!(intervals(&parent, &child, &c), vec![2]);
    }

    #[test]
    fn test_weighted_sources() {
        // Sources carry local_mult 3 and 2 at the same value.
        let parent = table("p", "y", &[5]);
        let mut child = table("c", "x", &[5, 5]);
        child.rows_mut()[0].local_mult = 3;
        child.rows_mut()[1].local_mult = 2;
        let c = band(0, EqualityType::Eq, 0, EqualityType::Eq);
        assert_eq!(intervals(&parent, &child, &c), vec![5]);
    }

    #[test]
    fn test_source_rows_keep_exclusive_prefix() {
        let parent = table("p", "y", &[0]);
        let child = table("c", "x", &[2, 4, 4, 9]);
        let c = band(0, EqualityType::Eq, 100, EqualityType::Eq);
        let mut comb = combine(&parent, &child, &c);
        init_band_temps(&mut comb);
        merge_sort(&mut comb, Comparator::JoinAttr);
        band_cumsum_pass(&mut comb);
        let mut prefixes: Vec<(i64, i64)> = comb
            .iter()
            .filter(|e| e.field_type == FieldType::Source)
            .map(|e| (e.original_index, e.local_cumsum))
            .collect();
        prefixes.sort_unstable();
        assert_eq!(prefixes, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_empty_child_or_parent() {
        let parent = table("p", "y", &[1, 2]);
        let child = table("c", "x", &[]);
        let c = band(0, EqualityType::Eq, 0, EqualityType::Eq);
        assert_eq!(intervals(&parent, &child, &c), vec![0, 0]);

        let no_parent = table("p", "y", &[]);
        let some_child = table("c", "x", &[1]);
        assert_eq!(intervals(&no_parent, &some_child, &c), Vec::<i64>::new());
    }

    #[test]
    fn test_broadcast_scalars_reaches_every_copy() {
        let node = table("p", "y", &[10, 20, 30]);
        let mut node_rows: Vec<Entry> = node.rows().to_vec();
        for (i, r) in node_rows.iter_mut().enumerate() {
            r.foreign_interval = (i as i64 + 1) * 11;
        }
        // Copies: tuple 0 twice, tuple 2 once, scrambled order.
        let mut copies = vec![node_rows[2], node_rows[0], node_rows[0]];
        for c in copies.iter_mut() {
            c.foreign_interval = 0;
        }
        broadcast_scalars(&node_rows, &mut copies, |copy, from| {
            copy.foreign_interval = from.foreign_interval;
        })
        .unwrap();
        assert_eq!(copies[0].foreign_interval, 33);
        assert_eq!(copies[1].foreign_interval, 11);
        assert_eq!(copies[2].foreign_interval, 11);
        // Stamped order restored.
        assert_eq!(copies[0].original_index, 2);
    }

    #[test]
    fn test_parallel_pass_detects_index_drift() {
        let mut a = vec![Entry::default()];
        a[0].original_index = 0;
        let mut b = vec![Entry::default()];
        b[0].original_index = 5;
        let err = parallel_pass(&mut a, &b, |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            ObliviousJoinError::InternalInvariantViolation(_)
        ));
    }
}
