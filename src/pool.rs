//! Where connections come from, and how they go back.

mod pooled;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::driver::Driver;
use crate::error::SqlRunnerError;

/// Source of live connections for a runner.
///
/// The runner never opens or closes connections itself: it acquires, uses and releases.
/// Any [`bb8::Pool`] whose connection type is a [`Driver`] is a provider.
#[async_trait]
pub trait ConnectionProvider: Send + Sync + 'static {
    type Conn: Driver + 'static;

    /// # Errors
    /// Returns `ConnectionError` when no connection can be handed out.
    async fn acquire(&self) -> Result<Self::Conn, SqlRunnerError>;

    /// Give a connection back. Dropping it is enough for providers whose connections return
    /// themselves.
    fn release(&self, conn: Self::Conn) {
        drop(conn);
    }
}

/// A connection held on behalf of one caller, released to its provider on drop.
pub struct Lease<P: ConnectionProvider> {
    provider: Arc<P>,
    conn: Option<P::Conn>,
}

impl<P: ConnectionProvider> Lease<P> {
    /// # Errors
    /// Propagates the provider's acquire failure.
    pub async fn acquire(provider: &Arc<P>) -> Result<Self, SqlRunnerError> {
        let conn = provider.acquire().await?;
        Ok(Self {
            provider: Arc::clone(provider),
            conn: Some(conn),
        })
    }

    /// # Errors
    /// Returns `ConnectionError` if the lease was already released.
    pub fn connection(&mut self) -> Result<&mut P::Conn, SqlRunnerError> {
        self.conn
            .as_mut()
            .ok_or_else(|| SqlRunnerError::ConnectionError("lease already released".into()))
    }

    /// False once the connection has gone back to the provider.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.conn.is_some()
    }

    /// Hand the connection back now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.provider.release(conn);
        }
    }
}

impl<P: ConnectionProvider> Drop for Lease<P> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl<P: ConnectionProvider> fmt::Debug for Lease<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("held", &self.is_held())
            .finish()
    }
}
