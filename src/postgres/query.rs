use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio_postgres::Statement;
use tokio_postgres::types::Type;

use crate::error::DriverError;
use crate::results::Columns;
use crate::types::Value;

/// Extracts a [`Value`] from a `tokio_postgres` row at the given index.
///
/// # Errors
/// Returns `DriverError` if the column cannot be read as the type the server reported.
pub fn extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<Value, DriverError> {
    let ty = row.columns()[idx].type_().clone();
    let value = match ty {
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(i64::from(v))),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| Value::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Value::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| Value::Timestamp(v.naive_utc())),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(Value::JSON),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Blob),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map_err(|e| {
                DriverError::Conversion(format!(
                    "unsupported postgres type `{}` in column {idx}: {e}",
                    ty.name()
                ))
            })?
            .map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

pub(super) fn row_values(row: &tokio_postgres::Row) -> Result<Vec<Value>, DriverError> {
    (0..row.len()).map(|idx| extract_value(row, idx)).collect()
}

pub(super) fn statement_columns(stmt: &Statement) -> Arc<Columns> {
    Columns::new(
        stmt.columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
    )
}
