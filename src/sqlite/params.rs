use rusqlite::ToSql;
use rusqlite::types::Value as SqlValue;

use crate::types::Value;

/// Convert a single binding to a rusqlite `Value`.
#[must_use]
pub fn value_to_sqlite(value: &Value) -> SqlValue {
    match value {
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Timestamp(dt) => SqlValue::Text(dt.format("%F %T%.f").to_string()),
        Value::Date(d) => SqlValue::Text(d.format("%F").to_string()),
        Value::Null => SqlValue::Null,
        Value::JSON(json) => SqlValue::Text(json.to_string()),
        Value::Blob(bytes) => SqlValue::Blob(bytes.clone()),
    }
}

/// Owned parameters, ready to cross to the worker thread.
#[must_use]
pub fn convert(bindings: &[Value]) -> Vec<SqlValue> {
    bindings.iter().map(value_to_sqlite).collect()
}

/// Borrowed params slice suitable for rusqlite execution.
#[must_use]
pub fn as_refs(params: &[SqlValue]) -> Vec<&dyn ToSql> {
    params.iter().map(|v| v as &dyn ToSql).collect()
}
