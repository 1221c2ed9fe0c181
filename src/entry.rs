//! Fixed-width tuple record.
//!
//! Every row in the engine — base-table tuples, combined-table boundary
//! events, expansion padding — is the same fixed-size [`Entry`] record, so
//! the oblivious primitives can operate on raw bytes without data-dependent
//! sizing. The record is `#[repr(C)]` with all 8-byte fields leading,
//! followed by the attribute payload and two 4-byte tags, which makes it
//! padding-free: the byte-masked swap in `oblivious::swap` may XOR every
//! byte of the struct.

/// Maximum number of data columns a table may have.
pub const MAX_ATTRIBUTES: usize = 64;

/// Join-value sentinel for an unbounded lower deviation.
pub const JOIN_ATTR_NEG_INF: i64 = i64::MIN / 2;

/// Join-value sentinel for an unbounded upper deviation.
pub const JOIN_ATTR_POS_INF: i64 = i64::MAX / 2;

/// Role of a row within a table or combined table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FieldType {
    /// Ordinary tuple; the child side of a combined table.
    Source = 0,
    /// Lower-bound boundary event derived from a parent tuple.
    Start = 1,
    /// Upper-bound boundary event derived from a parent tuple.
    End = 2,
    /// Parent-side tuple in a broadcast pass.
    Target = 3,
    /// Filler row; sorts after every data row under every comparator.
    SortPadding = 4,
}

/// Open/closed flag carried on boundary events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EqualityType {
    /// Closed bound (`>=` / `<=`).
    Eq = 0,
    /// Open bound (`>` / `<`).
    Neq = 1,
    /// No bound semantics attached.
    None = 2,
}

/// One fixed-size tuple.
///
/// Only the first `schema.len()` slots of `attributes` are meaningful; the
/// rest stay zero. The i64 metadata fields are algorithm scratch whose
/// lifetimes are documented on the phases that use them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Entry {
    /// Value of the column currently being joined on.
    pub join_attr: i64,
    /// Position in the source table at the start of the current phase.
    pub original_index: i64,
    /// Matches of this tuple against its child subtrees (bottom-up).
    pub local_mult: i64,
    /// Output rows this tuple contributes to (top-down).
    pub final_mult: i64,
    /// Coverage sum of parent shares (top-down scratch).
    pub foreign_sum: i64,
    /// Prefix sum over the sorted combined stream (bottom-up scratch).
    pub local_cumsum: i64,
    /// Band width in match units (bottom-up scratch).
    pub local_interval: i64,
    /// Sibling-stride accumulator (align-concat scratch).
    pub foreign_cumsum: i64,
    /// Per-edge match count m(p) (top-down / align scratch).
    pub foreign_interval: i64,
    /// Per-parent output share final_mult / m(p) (top-down scratch).
    pub local_weight: i64,
    /// Index of this copy among its original tuple's copies.
    pub copy_index: i64,
    /// Match-unit rank used to pair copies across an edge.
    pub alignment_key: i64,
    /// Destination slot in the expanded table.
    pub dst_idx: i64,
    /// Physical position scratch (set by linear passes).
    pub index: i64,
    /// Data columns; slots past the schema length are zero.
    pub attributes: [i32; MAX_ATTRIBUTES],
    pub field_type: FieldType,
    pub equality_type: EqualityType,
}

impl Default for Entry {
    fn default() -> Self {
        Entry {
            join_attr: 0,
            original_index: 0,
            local_mult: 0,
            final_mult: 0,
            foreign_sum: 0,
            local_cumsum: 0,
            local_interval: 0,
            foreign_cumsum: 0,
            foreign_interval: 0,
            local_weight: 0,
            copy_index: 0,
            alignment_key: 0,
            dst_idx: 0,
            index: 0,
            attributes: [0; MAX_ATTRIBUTES],
            field_type: FieldType::Source,
            equality_type: EqualityType::None,
        }
    }
}

impl Entry {
    /// A tuple holding the given attribute values.
    pub fn from_attributes(values: &[i32]) -> Self {
        debug_assert!(values.len() <= MAX_ATTRIBUTES);
        let mut e = Entry::default();
        e.attributes[..values.len()].copy_from_slice(values);
        e
    }

    /// A padding row. Sorts after every data row under every comparator.
    pub fn padding() -> Self {
        Entry {
            field_type: FieldType::SortPadding,
            ..Entry::default()
        }
    }

    pub fn is_padding(&self) -> bool {
        self.field_type == FieldType::SortPadding
    }

    /// Reset every scratch field that a phase boundary invalidates.
    /// `local_mult` and `final_mult` are persistent and survive.
    pub fn clear_scratch(&mut self) {
        self.foreign_sum = 0;
        self.local_cumsum = 0;
        self.local_interval = 0;
        self.foreign_cumsum = 0;
        self.foreign_interval = 0;
        self.local_weight = 0;
        self.copy_index = 0;
        self.alignment_key = 0;
        self.dst_idx = 0;
        self.index = 0;
    }
}
