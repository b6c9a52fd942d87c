//! `SQLite` backend: a [`Driver`](crate::driver::Driver) running `rusqlite` on a worker thread.

mod config;
mod driver;
mod params;
mod query;
mod worker;

pub use config::{SqliteManager, SqliteOptions, SqliteOptionsBuilder};
pub use driver::SqliteDriver;
pub use params::value_to_sqlite;
pub use query::extract_value;
