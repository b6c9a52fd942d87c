//! Postgres backend over `tokio_postgres`.

mod config;
mod driver;
mod params;
mod query;

pub use config::PgManager;
pub use driver::PgDriver;
pub use query::extract_value;
