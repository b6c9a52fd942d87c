//! One statement, one round-trip.

use tracing::debug;

use crate::config::RunnerOptions;
use crate::descriptor::QueryDescriptor;
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::SqlRunnerError;
use crate::results::NormalizedResult;
use crate::translation::TranslatedQuery;

/// Translate `descriptor` for `dialect`, reject empty SQL and log the statement.
pub(crate) fn prepare(
    dialect: &Dialect,
    descriptor: &QueryDescriptor,
    options: &RunnerOptions,
) -> Result<TranslatedQuery, SqlRunnerError> {
    let query = dialect
        .translator()
        .translate(descriptor.sql(), descriptor.bindings())?;
    if query.sql.trim().is_empty() {
        return Err(SqlRunnerError::EmptyQuery);
    }

    if options.log_bindings {
        debug!(
            dialect = %dialect.kind(),
            method = %descriptor.method(),
            sql = %query.sql,
            bindings = ?query.bindings,
            "dispatching statement"
        );
    } else {
        debug!(
            dialect = %dialect.kind(),
            method = %descriptor.method(),
            sql = %query.sql,
            "dispatching statement"
        );
    }
    Ok(query)
}

/// Run `descriptor` on `conn` and normalize the response.
///
/// Exactly one statement is sent; nothing is retried.
///
/// # Errors
/// Returns `EmptyQuery` or `MalformedQuery` without contacting the backend, `QueryExecution`
/// (with the driver error as its source) when the backend rejects the statement, and any
/// normalization error.
pub async fn execute<C>(
    conn: &mut C,
    dialect: &Dialect,
    descriptor: &QueryDescriptor,
    options: &RunnerOptions,
) -> Result<NormalizedResult, SqlRunnerError>
where
    C: Driver + ?Sized,
{
    let query = prepare(dialect, descriptor, options)?;
    let raw = conn
        .execute(&query.sql, &query.bindings)
        .await
        .map_err(|source| SqlRunnerError::execution(&query.sql, source))?;
    dialect.normalizer().normalize(raw, descriptor, options)
}

/// Run a statement that is already in the backend's native syntax.
///
/// Used for transaction control statements such as savepoints.
pub(crate) async fn execute_native<C>(conn: &mut C, sql: &str) -> Result<(), SqlRunnerError>
where
    C: Driver + ?Sized,
{
    debug!(sql, "dispatching control statement");
    conn.execute(sql, &[])
        .await
        .map(|_| ())
        .map_err(|source| SqlRunnerError::execution(sql, source))
}
