//! Table model: an ordered sequence of tuples plus an immutable schema.

use crate::entry::{Entry, MAX_ATTRIBUTES};
use crate::error::ObliviousJoinError;

/// Ordered column names. The j-th name addresses `attributes[j]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> Result<Self, ObliviousJoinError> {
        if columns.len() > MAX_ATTRIBUTES {
            return Err(ObliviousJoinError::SchemaError(format!(
                "schema has {} columns, maximum is {MAX_ATTRIBUTES}",
                columns.len()
            )));
        }
        Ok(Schema { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Slot index of a column name, or `None` if absent.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// A named table: schema + rows.
///
/// Base tables keep their rows in load order; the engine's phases mutate
/// per-row metadata in place and only reorder ephemeral copies.
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    schema: Schema,
    rows: Vec<Entry>,
}

impl Table {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Table {
            name: name.into(),
            schema,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, entry: Entry) {
        self.rows.push(entry);
    }

    pub fn rows(&self) -> &[Entry] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Entry] {
        &mut self.rows
    }

    /// Attribute of a row by column name.
    pub fn attribute(&self, row: usize, column: &str) -> Result<i32, ObliviousJoinError> {
        let idx = self.column_index(column)?;
        Ok(self.rows[row].attributes[idx])
    }

    /// Slot index of `column`, or a `SchemaError` naming this table.
    pub fn column_index(&self, column: &str) -> Result<usize, ObliviousJoinError> {
        self.schema.index_of(column).ok_or_else(|| {
            ObliviousJoinError::SchemaError(format!(
                "column '{column}' not found in table '{}'",
                self.name
            ))
        })
    }

    /// Load the named column into every row's `join_attr`.
    ///
    /// Re-run per edge: a node may join on different columns toward its
    /// parent and toward each child.
    pub fn set_join_attrs(&mut self, column: &str) -> Result<(), ObliviousJoinError> {
        let idx = self.column_index(column)?;
        for row in &mut self.rows {
            row.join_attr = i64::from(row.attributes[idx]);
        }
        Ok(())
    }

    /// Stamp `original_index` with each row's current position.
    pub fn set_original_indices(&mut self) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.original_index = i as i64;
        }
    }
}
