//! Comparator registry.
//!
//! A closed set of tuple orderings selected by an enum tag, so sorts and
//! linear passes can be parameterized without per-element dynamic dispatch.
//! Two registry-wide rules:
//!
//! - `SortPadding` rows compare greater than any data row under every
//!   comparator, so padding always sinks to the end.
//! - Every comparator is a total order (final tie-break on
//!   `original_index`), so the non-oblivious merge sort cannot reorder
//!   equal keys and downstream extraction by position stays exact.

use crate::entry::{Entry, EqualityType, FieldType};
use std::cmp::Ordering;

/// Registry tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// (join_attr, SOURCE < START < END, original_index).
    JoinAttr,
    /// join_attr, then each boundary ordered on the side of equal-valued
    /// SOURCE rows that matches its open/closed flag: closed STARTs and
    /// open ENDs before the sources, open STARTs and closed ENDs after.
    /// A single forward pass over this order accumulates exact coverage.
    JoinAttrCover,
    /// Boundary rows first grouped (original_index, START < END); SOURCE
    /// rows after, by original_index.
    Pairwise,
    /// END rows first by original_index, then the rest.
    EndFirst,
    /// SOURCE rows first by original_index, then the rest.
    SourceFirst,
    /// (index, original_index) — restores an order stamped into `index`.
    Index,
    /// (alignment_key, index).
    Alignment,
    /// (dst_idx, copy_index).
    DstIndex,
    /// (original_index, TARGET < SOURCE, index) — broadcast ordering.
    OriginalIndex,
    /// (join_attr, first attribute) — for passes that tolerate a
    /// non-obliviously produced order.
    JoinThenOther,
}

impl Comparator {
    pub fn compare(self, a: &Entry, b: &Entry) -> Ordering {
        match (a.is_padding(), b.is_padding()) {
            (true, true) => return a.original_index.cmp(&b.original_index),
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        match self {
            Comparator::JoinAttr => a
                .join_attr
                .cmp(&b.join_attr)
                .then_with(|| field_rank(a).cmp(&field_rank(b)))
                .then_with(|| a.original_index.cmp(&b.original_index)),

            Comparator::JoinAttrCover => a
                .join_attr
                .cmp(&b.join_attr)
                .then_with(|| cover_rank(a).cmp(&cover_rank(b)))
                .then_with(|| field_rank(a).cmp(&field_rank(b)))
                .then_with(|| a.original_index.cmp(&b.original_index)),

            Comparator::Pairwise => boundary_last_rank(a)
                .cmp(&boundary_last_rank(b))
                .then_with(|| a.original_index.cmp(&b.original_index))
                .then_with(|| field_rank(a).cmp(&field_rank(b))),

            Comparator::EndFirst => (a.field_type != FieldType::End)
                .cmp(&(b.field_type != FieldType::End))
                .then_with(|| a.original_index.cmp(&b.original_index))
                .then_with(|| field_rank(a).cmp(&field_rank(b)))
                .then_with(|| a.index.cmp(&b.index)),

            Comparator::SourceFirst => (a.field_type != FieldType::Source)
                .cmp(&(b.field_type != FieldType::Source))
                .then_with(|| a.original_index.cmp(&b.original_index))
                .then_with(|| field_rank(a).cmp(&field_rank(b)))
                .then_with(|| a.index.cmp(&b.index)),

            Comparator::Index => a
                .index
                .cmp(&b.index)
                .then_with(|| a.original_index.cmp(&b.original_index)),

            Comparator::Alignment => a
                .alignment_key
                .cmp(&b.alignment_key)
                .then_with(|| a.index.cmp(&b.index))
                .then_with(|| a.original_index.cmp(&b.original_index)),

            Comparator::DstIndex => a
                .dst_idx
                .cmp(&b.dst_idx)
                .then_with(|| a.copy_index.cmp(&b.copy_index))
                .then_with(|| a.original_index.cmp(&b.original_index)),

            Comparator::OriginalIndex => a
                .original_index
                .cmp(&b.original_index)
                .then_with(|| {
                    (a.field_type != FieldType::Target).cmp(&(b.field_type != FieldType::Target))
                })
                .then_with(|| a.index.cmp(&b.index)),

            Comparator::JoinThenOther => a
                .join_attr
                .cmp(&b.join_attr)
                .then_with(|| a.attributes[0].cmp(&b.attributes[0]))
                .then_with(|| a.original_index.cmp(&b.original_index)),
        }
    }
}

fn field_rank(e: &Entry) -> i32 {
    e.field_type as i32
}

fn boundary_last_rank(e: &Entry) -> i32 {
    match e.field_type {
        FieldType::Start | FieldType::End => 0,
        _ => 1,
    }
}

fn cover_rank(e: &Entry) -> i32 {
    match (e.field_type, e.equality_type) {
        (FieldType::Start, EqualityType::Neq) => 2,
        (FieldType::Start, _) => 0,
        (FieldType::End, EqualityType::Neq) => 0,
        (FieldType::End, _) => 2,
        _ => 1,
    }
}
