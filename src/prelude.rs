//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::RunnerOptions;
pub use crate::descriptor::{ColumnSpec, Method, QueryDescriptor};
pub use crate::dialect::Dialect;
pub use crate::driver::{Driver, RawResponse};
pub use crate::error::{DriverError, SinkError, SqlRunnerError, StreamError};
pub use crate::pool::ConnectionProvider;
pub use crate::results::{NormalizedResult, Row, RowSet};
pub use crate::runner::{DialectRunner, Runner};
pub use crate::stream::{RowSink, StreamSummary, sink_fn};
pub use crate::transaction::{Savepoint, TransactionHandle};
pub use crate::tx_outcome::TxOutcome;
pub use crate::types::{DialectKind, Value};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PgDriver, PgManager};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDriver, SqliteManager, SqliteOptions};
