use std::fmt;

use thiserror::Error;

use crate::transaction::TransactionState;

/// Error reported by a backend driver.
///
/// Each variant keeps the backend's own diagnostic so callers can inspect it through
/// [`std::error::Error::source`] or by matching.
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    /// Diagnostic text from a backend without a dedicated variant.
    #[error("backend error: {0}")]
    Backend(String),

    /// The connection (or its worker) is gone.
    #[error("connection closed: {0}")]
    Closed(String),

    #[error("value conversion error: {0}")]
    Conversion(String),
}

/// Which end of a transaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Commit,
    Rollback,
}

impl fmt::Display for TxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxAction::Commit => f.write_str("commit"),
            TxAction::Rollback => f.write_str("rollback"),
        }
    }
}

/// Error raised by a [`RowSink`](crate::stream::RowSink) that refused a row.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SinkError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Failure in the middle of a streaming operation.
///
/// `rows_delivered` counts the rows the sink accepted before the failure; those rows are not
/// retracted.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("cursor failed after {rows_delivered} rows: {source}")]
    Cursor {
        rows_delivered: u64,
        #[source]
        source: DriverError,
    },

    #[error("sink rejected row {}: {source}", .rows_delivered + 1)]
    Sink {
        rows_delivered: u64,
        #[source]
        source: SinkError,
    },

    #[error("sink failed to close after {rows_delivered} rows: {source}")]
    SinkClose {
        rows_delivered: u64,
        #[source]
        source: SinkError,
    },
}

#[derive(Debug, Error)]
pub enum SqlRunnerError {
    /// Placeholder/binding mismatch or an otherwise unusable descriptor.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("the query is empty")]
    EmptyQuery,

    #[error("query execution failed: {source} (sql: {sql})")]
    QueryExecution {
        sql: String,
        #[source]
        source: DriverError,
    },

    #[error("failed to start transaction: {0}")]
    TransactionStart(#[source] Box<SqlRunnerError>),

    #[error("transaction {action} failed: {source}")]
    TransactionEnd {
        action: TxAction,
        #[source]
        source: DriverError,
    },

    #[error("failed to set autocommit to {enabled}: {source}")]
    Autocommit {
        enabled: bool,
        #[source]
        source: DriverError,
    },

    #[error("cannot {operation} a transaction that is {state}")]
    InvalidTransactionState {
        state: TransactionState,
        operation: &'static str,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("returning columns do not match the response: {0}")]
    ReturningMismatch(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("output transform failed: {0}")]
    Output(String),
}

impl SqlRunnerError {
    pub(crate) fn execution(sql: &str, source: DriverError) -> Self {
        SqlRunnerError::QueryExecution {
            sql: sql.to_string(),
            source,
        }
    }

    /// The backend diagnostic behind this error, if one exists.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            SqlRunnerError::QueryExecution { source, .. }
            | SqlRunnerError::TransactionEnd { source, .. }
            | SqlRunnerError::Autocommit { source, .. }
            | SqlRunnerError::Stream(StreamError::Cursor { source, .. }) => Some(source),
            SqlRunnerError::TransactionStart(inner) => inner.driver_error(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SqlRunnerError {
    fn from(err: serde_json::Error) -> Self {
        SqlRunnerError::ConfigError(err.to_string())
    }
}
