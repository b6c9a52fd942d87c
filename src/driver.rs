//! The downstream boundary: what a native backend connection has to offer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::DriverError;
use crate::results::{Columns, Row, RowSet};
use crate::types::Value;

/// Rows pulled lazily from a backend cursor.
pub type RowCursor<'a> = BoxStream<'a, Result<Row, DriverError>>;

/// Options passed to [`Driver::open_cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOptions {
    /// How many rows the driver may buffer ahead of the consumer.
    pub fetch_size: usize,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self { fetch_size: 100 }
    }
}

/// A backend's answer to one statement, before normalization.
///
/// Holds column metadata, raw rows, the update count the backend reported, and any named
/// out-binds (the slots Oracle-style backends use to return values from DML).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    columns: Option<Arc<Columns>>,
    rows: Vec<Vec<Value>>,
    update_count: Option<u64>,
    out_binds: HashMap<String, Value>,
}

impl RawResponse {
    /// Response carrying rows.
    #[must_use]
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: Some(Columns::new(columns)),
            rows,
            ..Self::default()
        }
    }

    /// Response over column metadata a driver already shares with its rows.
    #[must_use]
    pub fn from_columns(columns: Arc<Columns>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: Some(columns),
            rows,
            ..Self::default()
        }
    }

    /// Response carrying only an update count.
    #[must_use]
    pub fn with_update_count(count: u64) -> Self {
        Self {
            update_count: Some(count),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn update_count(mut self, count: u64) -> Self {
        self.update_count = Some(count);
        self
    }

    #[must_use]
    pub fn out_bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.out_binds.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn columns(&self) -> Option<&Arc<Columns>> {
        self.columns.as_ref()
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn affected(&self) -> Option<u64> {
        self.update_count
    }

    #[must_use]
    pub fn out_binds(&self) -> &HashMap<String, Value> {
        &self.out_binds
    }

    #[must_use]
    pub fn get_out_bind(&self, name: &str) -> Option<&Value> {
        self.out_binds.get(name)
    }

    /// Rows as a [`RowSet`] sharing this response's column metadata.
    #[must_use]
    pub fn to_row_set(&self) -> RowSet {
        let mut set = RowSet::with_capacity(self.rows.len());
        if let Some(columns) = &self.columns {
            set.set_columns(Arc::clone(columns));
            for values in &self.rows {
                set.add_row_values(values.clone());
            }
        }
        set
    }

    /// JSON view handy inside custom output transforms.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> =
            self.to_row_set().rows().iter().map(Row::to_json).collect();
        let out_binds = self
            .out_binds
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::json!({
            "rows": rows,
            "updateCount": self.update_count,
            "outBinds": out_binds,
        })
    }
}

/// A live backend connection.
///
/// Every method takes `&mut self`: one connection never has two statements in flight, and
/// responses come back in the order statements were issued.
#[async_trait]
pub trait Driver: Send {
    /// Run one statement with already-translated bindings.
    async fn execute(&mut self, sql: &str, bindings: &[Value]) -> Result<RawResponse, DriverError>;

    /// Open a row cursor. Rows are produced lazily; the cursor borrows the connection.
    async fn open_cursor<'a>(
        &'a mut self,
        sql: &str,
        bindings: &[Value],
        options: CursorOptions,
    ) -> Result<RowCursor<'a>, DriverError>;

    /// Turn implicit per-statement commits on or off.
    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError>;

    /// Current autocommit mode.
    fn autocommit(&self) -> bool;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Box<D> {
    async fn execute(&mut self, sql: &str, bindings: &[Value]) -> Result<RawResponse, DriverError> {
        (**self).execute(sql, bindings).await
    }

    async fn open_cursor<'a>(
        &'a mut self,
        sql: &str,
        bindings: &[Value],
        options: CursorOptions,
    ) -> Result<RowCursor<'a>, DriverError> {
        (**self).open_cursor(sql, bindings, options).await
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        (**self).set_autocommit(enabled).await
    }

    fn autocommit(&self) -> bool {
        (**self).autocommit()
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        (**self).commit().await
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        (**self).rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_set_shares_columns() {
        let raw = RawResponse::with_rows(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Int(1), Value::from("a")],
                vec![Value::Int(2), Value::from("b")],
            ],
        );
        let set = raw.to_row_set();
        assert_eq!(set.len(), 2);
        assert!(Arc::ptr_eq(
            set.rows()[0].columns(),
            set.rows()[1].columns()
        ));
        assert_eq!(set.rows()[1].get("name"), Some(&Value::from("b")));
    }

    #[test]
    fn response_without_columns_has_no_rows() {
        let raw = RawResponse::with_update_count(3);
        assert!(raw.to_row_set().is_empty());
        assert_eq!(raw.affected(), Some(3));
    }
}
