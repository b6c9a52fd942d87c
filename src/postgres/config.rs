use std::future::Future;

use bb8::{ManageConnection, Pool};
use tokio_postgres::NoTls;
use tracing::{debug, warn};

use crate::error::SqlRunnerError;

use super::driver::PgDriver;

/// bb8 manager for Postgres clients.
pub struct PgManager {
    config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Manager for a `postgres://` URL or key-value connection string.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` if the string cannot be parsed.
    pub fn from_url(url: &str) -> Result<Self, SqlRunnerError> {
        url.parse::<tokio_postgres::Config>()
            .map(Self::new)
            .map_err(|e| SqlRunnerError::ConfigError(format!("invalid postgres config: {e}")))
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConnectionError` if pool creation fails.
    pub async fn build_pool(self) -> Result<Pool<PgManager>, SqlRunnerError> {
        Pool::builder()
            .build(self)
            .await
            .map_err(|e| SqlRunnerError::ConnectionError(format!("postgres pool error: {e}")))
    }
}

impl ManageConnection for PgManager {
    type Connection = PgDriver;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            debug!(
                hosts = ?cfg.get_hosts(),
                db = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                "postgres connect start"
            );
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!("postgres connection closed with error: {e}");
                }
            });
            Ok(PgDriver::new(client))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.client().simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}
