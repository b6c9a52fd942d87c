use std::future::Future;

use bb8::{ManageConnection, Pool};
use serde::{Deserialize, Serialize};

use crate::driver::Driver;
use crate::error::{DriverError, SqlRunnerError};

use super::driver::SqliteDriver;

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_size() -> u32 {
    4
}

/// Options for opening `SQLite` connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteOptions {
    pub db_path: String,
    /// How long a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Maximum connections in a pool built from these options.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_size: default_pool_size(),
        }
    }

    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Build a bb8 pool of worker-backed connections.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConnectionError` if the initial connections cannot be opened.
    pub async fn build_pool(self) -> Result<Pool<SqliteManager>, SqlRunnerError> {
        let size = self.pool_size.max(1);
        SqliteManager::new(self).build_pool(size).await
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.opts.busy_timeout_ms = busy_timeout_ms;
        self
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.opts.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// # Errors
    /// Returns `SqlRunnerError::ConnectionError` if pool creation fails.
    pub async fn build_pool(self) -> Result<Pool<SqliteManager>, SqlRunnerError> {
        self.finish().build_pool().await
    }
}

/// bb8 manager for worker-backed `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    options: SqliteOptions,
}

impl SqliteManager {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConnectionError` if pool creation fails.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<SqliteManager>, SqlRunnerError> {
        Pool::builder()
            .max_size(max_size)
            .build(self)
            .await
            .map_err(|e| SqlRunnerError::ConnectionError(format!("sqlite pool error: {e}")))
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SqliteDriver;
    type Error = DriverError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let options = self.options.clone();
        async move { SqliteDriver::open(&options).await }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.execute("SELECT 1", &[]).await.map(|_| ()) }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: SqliteOptions = serde_json::from_str(r#"{"db_path": "app.db"}"#).unwrap();
        assert_eq!(opts, SqliteOptions::new("app.db"));
        let built = SqliteOptions::builder("x.db").busy_timeout_ms(10).finish();
        assert_eq!(built.busy_timeout_ms, 10);
    }
}
