use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RunnerOptions;
use crate::descriptor::QueryDescriptor;
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::SqlRunnerError;
use crate::executor;
use crate::pool::{ConnectionProvider, Lease};
use crate::results::NormalizedResult;
use crate::stream::{self, RowSink, StreamSummary};
use crate::transaction::TransactionHandle;

/// The one execution contract callers see, whatever the backend.
#[async_trait]
pub trait Runner: Send + Sync {
    type Transaction: Send;

    fn dialect(&self) -> &Dialect;

    /// Run one statement on a freshly acquired connection.
    ///
    /// # Errors
    /// `EmptyQuery` and `MalformedQuery` are raised before the backend is contacted;
    /// `QueryExecution` carries the backend's error.
    async fn execute(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<NormalizedResult, SqlRunnerError>;

    /// Stream the rows of one query into `sink`.
    ///
    /// # Errors
    /// `QueryExecution` if the cursor cannot be opened, `Stream` once rows are flowing.
    async fn stream(
        &self,
        descriptor: &QueryDescriptor,
        sink: &mut dyn RowSink,
    ) -> Result<StreamSummary, SqlRunnerError>;

    /// # Errors
    /// `TransactionStart` if no connection is available or autocommit cannot be disabled.
    async fn start_transaction(&self) -> Result<Self::Transaction, SqlRunnerError>;
}

/// [`Runner`] over any [`ConnectionProvider`], shaped by a [`Dialect`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sql_runner::prelude::*;
///
/// # async fn demo() -> Result<(), SqlRunnerError> {
/// let pool = SqliteOptions::new("app.db").build_pool().await?;
/// let runner = DialectRunner::new(Arc::new(pool), Dialect::sqlite(), RunnerOptions::default());
///
/// let result = runner
///     .execute(&QueryDescriptor::update("update t set done = ? where id = ?").bind(true).bind(5))
///     .await?;
/// assert_eq!(result.affected(), Some(1));
/// # Ok(()) }
/// ```
pub struct DialectRunner<P: ConnectionProvider> {
    provider: Arc<P>,
    dialect: Dialect,
    options: RunnerOptions,
}

impl<P: ConnectionProvider> DialectRunner<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, dialect: Dialect, options: RunnerOptions) -> Self {
        Self {
            provider,
            dialect,
            options,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    #[must_use]
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run `descriptor` on a connection the caller already holds.
    ///
    /// # Errors
    /// Same as [`Runner::execute`].
    pub async fn execute_on<C>(
        &self,
        conn: &mut C,
        descriptor: &QueryDescriptor,
    ) -> Result<NormalizedResult, SqlRunnerError>
    where
        C: Driver + ?Sized,
    {
        executor::execute(conn, &self.dialect, descriptor, &self.options).await
    }

    /// Stream `descriptor` on a connection the caller already holds.
    ///
    /// # Errors
    /// Same as [`Runner::stream`].
    pub async fn stream_on<C>(
        &self,
        conn: &mut C,
        descriptor: &QueryDescriptor,
        sink: &mut dyn RowSink,
    ) -> Result<StreamSummary, SqlRunnerError>
    where
        C: Driver,
    {
        stream::stream(conn, &self.dialect, descriptor, sink, &self.options).await
    }
}

#[async_trait]
impl<P: ConnectionProvider> Runner for DialectRunner<P> {
    type Transaction = TransactionHandle<P>;

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    async fn execute(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<NormalizedResult, SqlRunnerError> {
        let mut lease = Lease::acquire(&self.provider).await?;
        self.execute_on(lease.connection()?, descriptor).await
    }

    async fn stream(
        &self,
        descriptor: &QueryDescriptor,
        sink: &mut dyn RowSink,
    ) -> Result<StreamSummary, SqlRunnerError> {
        let mut lease = Lease::acquire(&self.provider).await?;
        self.stream_on(lease.connection()?, descriptor, sink).await
    }

    async fn start_transaction(&self) -> Result<Self::Transaction, SqlRunnerError> {
        TransactionHandle::begin(&self.provider, self.dialect.clone(), self.options.clone()).await
    }
}

impl<P: ConnectionProvider> fmt::Debug for DialectRunner<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectRunner")
            .field("dialect", &self.dialect)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
