use std::sync::Arc;

use super::row::{Columns, Row};
use crate::types::Value;

/// An ordered collection of rows sharing one set of columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    rows: Vec<Row>,
    columns: Option<Arc<Columns>>,
}

impl RowSet {
    /// Create a row set with preallocated capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> RowSet {
        RowSet {
            rows: Vec::with_capacity(capacity),
            columns: None,
        }
    }

    /// Set the columns shared by all rows added through [`RowSet::add_row_values`].
    pub fn set_columns(&mut self, columns: Arc<Columns>) {
        self.columns = Some(columns);
    }

    #[must_use]
    pub fn columns(&self) -> Option<&Arc<Columns>> {
        self.columns.as_ref()
    }

    /// Add a row from positional values. Ignored until columns are set.
    pub fn add_row_values(&mut self, values: Vec<Value>) {
        if let Some(columns) = &self.columns {
            self.rows.push(Row::new(Arc::clone(columns), values));
        }
    }

    /// Add a fully formed row, adopting its columns if none were set yet.
    pub fn add_row(&mut self, row: Row) {
        if self.columns.is_none() {
            self.columns = Some(Arc::clone(row.columns()));
        }
        self.rows.push(row);
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row, consuming the set.
    #[must_use]
    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    /// Values of one column across all rows, in row order. Rows without the column yield `Null`.
    #[must_use]
    pub fn pluck(&self, column: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
