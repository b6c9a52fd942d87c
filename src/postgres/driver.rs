use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, pin_mut};
use tokio_postgres::Client;
use tracing::debug;

use crate::driver::{CursorOptions, Driver, RawResponse, RowCursor};
use crate::error::DriverError;
use crate::results::Row;
use crate::types::Value;

use super::query::{row_values, statement_columns};

/// A `tokio_postgres` client speaking the [`Driver`] protocol.
///
/// Postgres has no autocommit switch, so turning autocommit off makes the driver issue `BEGIN`
/// before the next statement; `commit`/`rollback` close that transaction.
pub struct PgDriver {
    client: Client,
    autocommit: bool,
    in_transaction: bool,
}

impl PgDriver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            autocommit: true,
            in_transaction: false,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    async fn ensure_transaction(&mut self) -> Result<(), DriverError> {
        if !self.autocommit && !self.in_transaction {
            self.client.batch_execute("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn finish(&mut self, statement: &str) -> Result<(), DriverError> {
        if self.in_transaction {
            self.client.batch_execute(statement).await?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn execute(&mut self, sql: &str, bindings: &[Value]) -> Result<RawResponse, DriverError> {
        self.ensure_transaction().await?;
        let stmt = self.client.prepare(sql).await?;

        if stmt.columns().is_empty() {
            let changed = self.client.execute_raw(&stmt, bindings.iter()).await?;
            return Ok(RawResponse::with_update_count(changed));
        }

        let columns = statement_columns(&stmt);
        let stream = self.client.query_raw(&stmt, bindings.iter()).await?;
        pin_mut!(stream);
        let mut rows = Vec::new();
        while let Some(row) = stream.try_next().await? {
            rows.push(row_values(&row)?);
        }
        let response = RawResponse::from_columns(columns, rows);
        Ok(match stream.rows_affected() {
            Some(count) => response.update_count(count),
            None => response,
        })
    }

    async fn open_cursor<'a>(
        &'a mut self,
        sql: &str,
        bindings: &[Value],
        options: CursorOptions,
    ) -> Result<RowCursor<'a>, DriverError> {
        self.ensure_transaction().await?;
        let stmt = self.client.prepare(sql).await?;
        let columns = statement_columns(&stmt);
        // The connection task already applies protocol-level backpressure.
        debug!(fetch_size = options.fetch_size, "opening postgres row stream");
        let stream = self.client.query_raw(&stmt, bindings.iter()).await?;

        Ok(stream
            .map(move |next| -> Result<Row, DriverError> {
                let row = next?;
                let values = row_values(&row)?;
                Ok(Row::new(Arc::clone(&columns), values))
            })
            .boxed())
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        if enabled && self.in_transaction {
            self.finish("ROLLBACK").await?;
        }
        self.autocommit = enabled;
        Ok(())
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.finish("ROLLBACK").await
    }
}
