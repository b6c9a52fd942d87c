mod row;
mod row_set;

pub use row::{Columns, Row};
pub use row_set::RowSet;

use crate::driver::RawResponse;
use crate::types::Value;

/// The uniform result shape handed back by every runner, whatever the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult {
    /// `select`
    Rows(RowSet),
    /// `first`: `None` when the query produced no rows
    Row(Option<Row>),
    /// `pluck`: one value per row, in row order
    Scalars(Vec<Value>),
    /// DML without `returning`
    Affected(u64),
    /// DML with `returning`: one row per affected logical row, columns in declaration order
    Returning(Vec<Row>),
    /// `raw` and unrecognised methods: the backend response untouched
    Raw(RawResponse),
    /// Whatever a descriptor's custom output transform produced
    Custom(serde_json::Value),
}

impl NormalizedResult {
    #[must_use]
    pub fn as_rows(&self) -> Option<&RowSet> {
        if let NormalizedResult::Rows(rows) = self {
            Some(rows)
        } else {
            None
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Option<RowSet> {
        if let NormalizedResult::Rows(rows) = self {
            Some(rows)
        } else {
            None
        }
    }

    /// The single row of a `first` result. Outer `None` means a different shape.
    #[must_use]
    pub fn into_first(self) -> Option<Option<Row>> {
        if let NormalizedResult::Row(row) = self {
            Some(row)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_scalars(&self) -> Option<&[Value]> {
        if let NormalizedResult::Scalars(values) = self {
            Some(values)
        } else {
            None
        }
    }

    #[must_use]
    pub fn affected(&self) -> Option<u64> {
        if let NormalizedResult::Affected(count) = self {
            Some(*count)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_returning(&self) -> Option<&[Row]> {
        if let NormalizedResult::Returning(rows) = self {
            Some(rows)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_raw(&self) -> Option<&RawResponse> {
        if let NormalizedResult::Raw(raw) = self {
            Some(raw)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_custom(&self) -> Option<&serde_json::Value> {
        if let NormalizedResult::Custom(value) = self {
            Some(value)
        } else {
            None
        }
    }
}
