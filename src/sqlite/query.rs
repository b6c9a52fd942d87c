use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Statement};

use crate::driver::RawResponse;
use crate::error::DriverError;
use crate::results::Columns;
use crate::types::Value;

use super::params::as_refs;

/// Extract a [`Value`] from a `SQLite` row.
///
/// # Errors
/// Returns `DriverError::Sqlite` if the column cannot be read.
pub fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<Value, DriverError> {
    let value: SqlValue = row.get(idx)?;
    Ok(match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Int(i),
        SqlValue::Real(f) => Value::Float(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Blob(b),
    })
}

pub(super) fn row_values(row: &rusqlite::Row<'_>, width: usize) -> Result<Vec<Value>, DriverError> {
    (0..width).map(|idx| extract_value(row, idx)).collect()
}

pub(super) fn statement_columns(stmt: &Statement<'_>) -> Arc<Columns> {
    Columns::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Run one statement to completion.
///
/// Statements without result columns report their change count. Statements with result
/// columns (queries, `RETURNING` DML) report their rows, plus the change count when they wrote.
pub(super) fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> Result<RawResponse, DriverError> {
    let mut stmt = conn.prepare(sql)?;
    let refs = as_refs(params);

    if stmt.column_count() == 0 {
        let changed = stmt.execute(&refs[..])?;
        return Ok(RawResponse::with_update_count(count(changed)));
    }

    let columns = statement_columns(&stmt);
    let readonly = stmt.readonly();
    let mut collected = Vec::new();
    {
        let mut rows = stmt.query(&refs[..])?;
        while let Some(row) = rows.next()? {
            collected.push(row_values(row, columns.len())?);
        }
    }

    let response = RawResponse::from_columns(columns, collected);
    if readonly {
        Ok(response)
    } else {
        let changed = u64::try_from(conn.changes()).unwrap_or(u64::MAX);
        Ok(response.update_count(changed))
    }
}
