use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::mpsc;

use crate::driver::{CursorOptions, Driver, RawResponse, RowCursor};
use crate::error::DriverError;
use crate::types::Value;

use super::config::SqliteOptions;
use super::params;
use super::worker::{Command, SqliteWorker};

/// `SQLite` connection owned by a dedicated worker thread.
///
/// Every call is queued to the worker and answered in order. Cursors are pumped by the worker
/// into a channel holding at most `fetch_size` rows.
pub struct SqliteDriver {
    worker: SqliteWorker,
    autocommit: bool,
}

impl SqliteDriver {
    /// Open the database on a new worker thread.
    ///
    /// # Errors
    /// Returns `DriverError` if the thread cannot be spawned or the database cannot be opened.
    pub async fn open(options: &SqliteOptions) -> Result<Self, DriverError> {
        let worker = SqliteWorker::spawn(options.clone()).await?;
        Ok(Self {
            worker,
            autocommit: true,
        })
    }

    /// Run `sql` without translation or normalization, e.g. for schema setup.
    ///
    /// # Errors
    /// Returns the `SQLite` error for the statement.
    pub async fn execute_native(&mut self, sql: &str) -> Result<RawResponse, DriverError> {
        self.execute(sql, &[]).await
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn execute(&mut self, sql: &str, bindings: &[Value]) -> Result<RawResponse, DriverError> {
        let sql = sql.to_owned();
        let params = params::convert(bindings);
        self.worker
            .request(
                |respond_to| Command::Execute {
                    sql,
                    params,
                    respond_to,
                },
                "SQLite worker dropped while executing statement",
            )
            .await
    }

    async fn open_cursor<'a>(
        &'a mut self,
        sql: &str,
        bindings: &[Value],
        options: CursorOptions,
    ) -> Result<RowCursor<'a>, DriverError> {
        let (rows_tx, rows_rx) = mpsc::channel(options.fetch_size.max(1));
        let sql = sql.to_owned();
        let params = params::convert(bindings);
        self.worker
            .request(
                |respond_to| Command::OpenCursor {
                    sql,
                    params,
                    rows: rows_tx,
                    respond_to,
                },
                "SQLite worker dropped while opening cursor",
            )
            .await?;

        Ok(stream::unfold(rows_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.worker
            .request(
                |respond_to| Command::SetAutocommit {
                    enabled,
                    respond_to,
                },
                "SQLite worker dropped while setting autocommit",
            )
            .await?;
        self.autocommit = enabled;
        Ok(())
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.worker
            .request(
                |respond_to| Command::Commit { respond_to },
                "SQLite worker dropped while committing",
            )
            .await
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.worker
            .request(
                |respond_to| Command::Rollback { respond_to },
                "SQLite worker dropped while rolling back",
            )
            .await
    }
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("worker", &self.worker.id())
            .field("autocommit", &self.autocommit)
            .finish()
    }
}
