//! Band constraints between table columns.
//!
//! A [`JoinConstraint`] encodes `source.col ∈ [target.col + d₁, target.col
//! + d₂]` with per-side open/closed flags. Equality joins are the special
//! case `[+0, +0]` with both sides closed. One-sided bands use the
//! `JOIN_ATTR_{NEG,POS}_INF` sentinels as deviations.

use crate::entry::{EqualityType, JOIN_ATTR_NEG_INF, JOIN_ATTR_POS_INF};
use crate::error::ObliviousJoinError;
use std::fmt;

/// One side of a band: deviation plus open/closed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub deviation: i64,
    pub equality: EqualityType,
}

impl Bound {
    pub fn closed(deviation: i64) -> Self {
        Bound {
            deviation,
            equality: EqualityType::Eq,
        }
    }

    pub fn open(deviation: i64) -> Self {
        Bound {
            deviation,
            equality: EqualityType::Neq,
        }
    }

    pub fn neg_inf() -> Self {
        Bound::closed(JOIN_ATTR_NEG_INF)
    }

    pub fn pos_inf() -> Self {
        Bound::closed(JOIN_ATTR_POS_INF)
    }

    pub fn is_neg_inf(&self) -> bool {
        self.deviation == JOIN_ATTR_NEG_INF
    }

    pub fn is_pos_inf(&self) -> bool {
        self.deviation == JOIN_ATTR_POS_INF
    }
}

/// Band constraint between (source table, column) and (target table, column).
///
/// In the join tree the source is always the child and the target its
/// parent; [`JoinConstraint::reverse`] flips an edge into that orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConstraint {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub lower: Bound,
    pub upper: Bound,
}

impl JoinConstraint {
    pub fn new(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
        lower: Bound,
        upper: Bound,
    ) -> Self {
        JoinConstraint {
            source_table: source_table.into(),
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
            lower,
            upper,
        }
    }

    /// Equality join: `source.col = target.col`.
    pub fn equality(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        JoinConstraint::new(
            source_table,
            source_column,
            target_table,
            target_column,
            Bound::closed(0),
            Bound::closed(0),
        )
    }

    pub fn is_equality(&self) -> bool {
        self.lower == Bound::closed(0) && self.upper == Bound::closed(0)
    }

    /// Swap source and target.
    ///
    /// `s ∈ [t + d₁, t + d₂]` is equivalent to `t ∈ [s − d₂, s − d₁]`;
    /// the bounds swap sides and negate, keeping their open/closed flags.
    /// Infinity sentinels stay sentinels.
    pub fn reverse(&self) -> Self {
        let negate = |b: Bound| -> Bound {
            let deviation = if b.is_pos_inf() {
                JOIN_ATTR_NEG_INF
            } else if b.is_neg_inf() {
                JOIN_ATTR_POS_INF
            } else {
                -b.deviation
            };
            Bound {
                deviation,
                equality: b.equality,
            }
        };
        JoinConstraint {
            source_table: self.target_table.clone(),
            source_column: self.target_column.clone(),
            target_table: self.source_table.clone(),
            target_column: self.source_column.clone(),
            lower: negate(self.upper),
            upper: negate(self.lower),
        }
    }

    /// Whether both constraints relate the same ordered column pairs.
    pub fn same_pair(&self, other: &JoinConstraint) -> bool {
        self.source_table == other.source_table
            && self.source_column == other.source_column
            && self.target_table == other.target_table
            && self.target_column == other.target_column
    }

    /// Intersect two constraints over the same column pair.
    ///
    /// The stricter bound wins on each side: the larger deviation below,
    /// the smaller above; at equal deviations an open bound beats a closed
    /// one. An empty range is an error, not a silently empty result.
    pub fn intersect(&self, other: &JoinConstraint) -> Result<JoinConstraint, ObliviousJoinError> {
        if !self.same_pair(other) {
            return Err(ObliviousJoinError::UnsupportedPredicate(format!(
                "cannot merge constraints over different column pairs: {self} vs {other}"
            )));
        }

        let lower = stricter_lower(self.lower, other.lower);
        let upper = stricter_upper(self.upper, other.upper);

        let empty = lower.deviation > upper.deviation
            || (lower.deviation == upper.deviation
                && (lower.equality == EqualityType::Neq || upper.equality == EqualityType::Neq));
        if empty {
            return Err(ObliviousJoinError::EmptyIntersection(format!(
                "{self} AND {other}"
            )));
        }

        Ok(JoinConstraint {
            source_table: self.source_table.clone(),
            source_column: self.source_column.clone(),
            target_table: self.target_table.clone(),
            target_column: self.target_column.clone(),
            lower,
            upper,
        })
    }

    /// Whether the scalar pair `(source_value, target_value)` satisfies
    /// this constraint. Used by tests and the reference evaluator.
    pub fn satisfied_by(&self, source_value: i64, target_value: i64) -> bool {
        let lower_ok = self.lower.is_neg_inf()
            || match self.lower.equality {
                EqualityType::Neq => source_value > target_value + self.lower.deviation,
                _ => source_value >= target_value + self.lower.deviation,
            };
        let upper_ok = self.upper.is_pos_inf()
            || match self.upper.equality {
                EqualityType::Neq => source_value < target_value + self.upper.deviation,
                _ => source_value <= target_value + self.upper.deviation,
            };
        lower_ok && upper_ok
    }
}

fn stricter_lower(a: Bound, b: Bound) -> Bound {
    // Higher deviation is stricter; at a tie, open beats closed.
    if a.deviation > b.deviation {
        a
    } else if b.deviation > a.deviation {
        b
    } else if a.equality == EqualityType::Neq {
        a
    } else {
        b
    }
}

fn stricter_upper(a: Bound, b: Bound) -> Bound {
    // Lower deviation is stricter; at a tie, open beats closed.
    if a.deviation < b.deviation {
        a
    } else if b.deviation < a.deviation {
        b
    } else if a.equality == EqualityType::Neq {
        a
    } else {
        b
    }
}

impl fmt::Display for JoinConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |b: &Bound, open: char, closed: char| -> char {
            if b.equality == EqualityType::Neq { open } else { closed }
        };
        let dev = |b: &Bound| -> String {
            if b.is_neg_inf() {
                "-inf".into()
            } else if b.is_pos_inf() {
                "+inf".into()
            } else {
                format!("{:+}", b.deviation)
            }
        };
        write!(
            f,
            "{}.{} in {}{}.{}{}, {}.{}{}{}",
            self.source_table,
            self.source_column,
            side(&self.lower, '(', '['),
            self.target_table,
            self.target_column,
            dev(&self.lower),
            self.target_table,
            self.target_column,
            dev(&self.upper),
            side(&self.upper, ')', ']'),
        )
    }
}
