//! Filter application.
//!
//! Single-table predicates fold into `local_mult` multiplicatively before
//! the bottom-up phase: failing rows get `local_mult = 0` and contribute
//! zero to every ancestor product. Every row is visited and written; no
//! row is skipped.

use crate::error::ObliviousJoinError;
use crate::query::FilterPredicate;
use crate::tree::JoinTree;
use tracing::debug;

pub fn apply(tree: &mut JoinTree, filters: &[FilterPredicate]) -> Result<(), ObliviousJoinError> {
    for predicate in filters {
        let idx = tree.index_of_alias(&predicate.alias).ok_or_else(|| {
            ObliviousJoinError::UnsupportedPredicate(format!(
                "filter references unknown alias '{}'",
                predicate.alias
            ))
        })?;
        let node = tree.node_mut(idx);
        let column = node.table.column_index(&predicate.column)?;
        debug!(filter = %predicate, "applying filter");
        for row in node.table.rows_mut() {
            row.local_mult *= predicate.evaluate(i64::from(row.attributes[column]));
        }
    }
    Ok(())
}
