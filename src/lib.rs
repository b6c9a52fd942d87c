//! Dialect-abstracted query execution.
//!
//! A [`QueryDescriptor`] carries SQL with neutral `?` markers, its bindings and an execution
//! [`Method`]. A [`DialectRunner`] translates it for one backend, sends it over a leased
//! connection and normalizes the answer into a [`NormalizedResult`]. Rows can also be streamed
//! into a [`RowSink`], and [`TransactionHandle`] runs several statements on one connection with
//! autocommit off.
//!
//! Backends plug in through the [`Driver`] trait; `SQLite` (`sqlite` feature) and Postgres
//! (`postgres` feature) drivers ship with the crate, and the Oracle dialect works with any driver
//! that reports DML values through `returnParam*` out-binds.

pub mod config;
pub mod descriptor;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod executor;
pub mod normalizer;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod runner;
pub mod stream;
pub mod transaction;
pub mod translation;
pub mod tx_outcome;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{RunnerOptions, RunnerOptionsBuilder};
pub use descriptor::{ColumnSpec, Method, OutputFn, QueryDescriptor};
pub use dialect::{
    BindingTranslator, Dialect, PlaceholderTranslator, ResponseNormalizer, SavepointSyntax,
    StreamAdapter,
};
pub use driver::{CursorOptions, Driver, RawResponse, RowCursor};
pub use error::{DriverError, SinkError, SqlRunnerError, StreamError, TxAction};
pub use pool::{ConnectionProvider, Lease};
pub use results::{Columns, NormalizedResult, Row, RowSet};
pub use runner::{DialectRunner, Runner};
pub use stream::{CursorStreamAdapter, FnSink, RowSink, StreamSummary, sink_fn};
pub use transaction::{Savepoint, TransactionHandle, TransactionState};
pub use translation::{BooleanEncoding, PlaceholderStyle, TranslatedQuery, translate};
pub use tx_outcome::TxOutcome;
pub use types::{DialectKind, Value};
