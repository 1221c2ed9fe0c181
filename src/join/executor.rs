//! Query orchestrator.
//!
//! `execute` sequences the pipeline: parse → join tree → metadata init →
//! filters → bottom-up → top-down → distribute-expand → align-concat →
//! column concatenation. Any error fails the whole query; combined tables
//! and expansion scratch are dropped with the tree.

use crate::debug::dump_rows;
use crate::entry::{Entry, EqualityType, FieldType, MAX_ATTRIBUTES};
use crate::error::ObliviousJoinError;
use crate::join::{align, bottom_up, expand, filters, top_down};
use crate::query::{ParsedQuery, parse};
use crate::table::{Schema, Table};
use crate::tree::JoinTree;
use std::collections::HashMap;
use tracing::{debug, info};

/// Evaluate one SQL query against the loaded tables.
pub fn execute(
    sql: &str,
    tables: &HashMap<String, Table>,
) -> Result<Table, ObliviousJoinError> {
    let query = parse(sql)?;
    let mut tree = JoinTree::build(&query, tables)?;

    initialize(&mut tree);
    filters::apply(&mut tree, &query.filters)?;
    dump_tree(&tree, "after_filters");

    bottom_up::run(&mut tree)?;
    dump_tree(&tree, "after_bottom_up");

    top_down::run(&mut tree)?;
    dump_tree(&tree, "after_top_down");

    let output_rows = expand::run(&mut tree)?;
    align::run(&mut tree)?;
    info!(output_rows, "pipeline complete");

    concatenate(&tree, &query)
}

/// Reset metadata at query start: positions stamped, `local_mult = 1`
/// everywhere (internal nodes multiply edge contributions into it),
/// everything else cleared.
fn initialize(tree: &mut JoinTree) {
    for node in tree.nodes_mut() {
        node.table.set_original_indices();
        for row in node.table.rows_mut() {
            row.field_type = FieldType::Source;
            row.equality_type = EqualityType::None;
            row.local_mult = 1;
            row.final_mult = 0;
            row.clear_scratch();
        }
        node.expanded.clear();
    }
}

/// Column-concatenate the aligned tables in FROM order.
fn concatenate(tree: &JoinTree, query: &ParsedQuery) -> Result<Table, ObliviousJoinError> {
    let mut columns: Vec<String> = Vec::new();
    let mut parts: Vec<(usize, usize)> = Vec::new(); // (node index, width)
    for table_ref in &query.tables {
        let idx = tree.index_of_alias(&table_ref.alias).ok_or_else(|| {
            ObliviousJoinError::InternalInvariantViolation(format!(
                "alias '{}' missing from the tree",
                table_ref.alias
            ))
        })?;
        let schema = tree.node(idx).table.schema();
        columns.extend(schema.columns().iter().cloned());
        parts.push((idx, schema.len()));
    }
    if columns.len() > MAX_ATTRIBUTES {
        return Err(ObliviousJoinError::SchemaError(format!(
            "result would have {} columns, maximum is {MAX_ATTRIBUTES}",
            columns.len()
        )));
    }

    let output_rows = parts
        .first()
        .map(|&(idx, _)| tree.node(idx).expanded.len())
        .unwrap_or(0);
    let mut result = Table::new("result", Schema::new(columns)?);
    for i in 0..output_rows {
        let mut entry = Entry::default();
        let mut offset = 0;
        for &(idx, width) in &parts {
            let source = &tree.node(idx).expanded[i];
            entry.attributes[offset..offset + width]
                .copy_from_slice(&source.attributes[..width]);
            offset += width;
        }
        result.push(entry);
    }
    debug!(rows = result.len(), "result concatenated");
    Ok(result)
}

fn dump_tree(tree: &JoinTree, step: &str) {
    for node in tree.nodes() {
        dump_rows(step, node.table.name(), node.table.schema(), node.table.rows());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, cols: &[&str], rows: &[&[i32]]) -> Table {
        let schema = Schema::new(cols.iter().map(|c| c.to_string()).collect()).unwrap();
        let mut t = Table::new(name, schema);
        for row in rows {
            t.push(Entry::from_attributes(row));
        }
        t
    }

    fn map(tables: Vec<Table>) -> HashMap<String, Table> {
        tables.into_iter().map(|t| (t.name().to_string(), t)).collect()
    }

    fn sorted_rows(result: &Table) -> Vec<Vec<i32>> {
        let width = result.schema().len();
        let mut rows: Vec<Vec<i32>> = result
            .rows()
            .iter()
            .map(|e| e.attributes[..width].to_vec())
            .collect();
        rows.sort();
        rows
    }

    #[test]
    fn test_single_table_with_filter() {
        let tables = map(vec![table("t", &["a", "b"], &[&[1, 10], &[2, 20], &[3, 30]])]);
        let result = execute("SELECT * FROM t AS t WHERE t.a >= 2", &tables).unwrap();
        assert_eq!(result.schema().columns(), &["a", "b"]);
        assert_eq!(sorted_rows(&result), vec![vec![2, 20], vec![3, 30]]);
    }

    #[test]
    fn test_single_table_no_filter_is_identity() {
        let tables = map(vec![table("t", &["a"], &[&[5], &[1], &[5]])]);
        let result = execute("SELECT * FROM t AS t", &tables).unwrap();
        assert_eq!(sorted_rows(&result), vec![vec![1], vec![5], vec![5]]);
    }

    #[test]
    fn test_filter_before_join() {
        // Scenario S5: equality join with r.v > 10.
        let tables = map(vec![
            table("r", &["k", "v"], &[&[1, 10], &[2, 20], &[3, 30]]),
            table("s", &["k", "w"], &[&[2, 200], &[3, 300], &[4, 400]]),
        ]);
        let result = execute(
            "SELECT * FROM r AS r, s AS s WHERE r.k = s.k AND r.v > 20",
            &tables,
        )
        .unwrap();
        assert_eq!(sorted_rows(&result), vec![vec![3, 30, 3, 300]]);
    }

    #[test]
    fn test_result_header_in_from_order() {
        let tables = map(vec![
            table("r", &["k", "v"], &[&[1, 2]]),
            table("s", &["k", "w"], &[&[1, 3]]),
        ]);
        let result = execute("SELECT * FROM r AS r, s AS s WHERE r.k = s.k", &tables).unwrap();
        assert_eq!(result.schema().columns(), &["k", "v", "k", "w"]);
        assert_eq!(sorted_rows(&result), vec![vec![1, 2, 1, 3]]);
    }

    #[test]
    fn test_empty_result_keeps_schema() {
        let tables = map(vec![
            table("r", &["k"], &[&[1]]),
            table("s", &["k"], &[&[2]]),
        ]);
        let result = execute("SELECT * FROM r AS r, s AS s WHERE r.k = s.k", &tables).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.schema().len(), 2);
    }

    #[test]
    fn test_parse_error_propagates() {
        let tables = map(vec![table("t", &["a"], &[])]);
        assert!(execute("SELECT a FROM t AS t", &tables).is_err());
    }
}
