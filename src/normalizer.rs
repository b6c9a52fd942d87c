//! Turning backend responses into [`NormalizedResult`]s.
//!
//! [`normalize`] holds the method dispatch every dialect shares; the dialect-specific parts
//! (row flattening and how `returning` values come back) live behind
//! [`ResponseNormalizer`]. Two implementations ship here: [`OutBindReturning`] for backends that
//! report DML values through numbered out-binds, and [`RowReturning`] for backends that answer a
//! `RETURNING` clause with ordinary rows.

use std::sync::Arc;

use tracing::warn;

use crate::config::RunnerOptions;
use crate::descriptor::{ColumnSpec, Method, QueryDescriptor};
use crate::dialect::ResponseNormalizer;
use crate::driver::RawResponse;
use crate::error::SqlRunnerError;
use crate::results::{Columns, NormalizedResult, Row};
use crate::types::Value;

const RETURN_PARAM: &str = "returnParam";

/// Name of the out-bind holding returning slot `index`: `returnParam`, `returnParam1`, ...
#[must_use]
pub fn return_param_name(index: usize) -> String {
    if index == 0 {
        RETURN_PARAM.to_string()
    } else {
        format!("{RETURN_PARAM}{index}")
    }
}

/// Index cursor over the `returnParam*` out-binds of one response.
///
/// Slots are read strictly in order; the cursor never skips or revisits one.
#[derive(Debug)]
pub struct ReturnSlots<'a> {
    raw: &'a RawResponse,
    next: usize,
    len: usize,
}

impl<'a> ReturnSlots<'a> {
    #[must_use]
    pub fn new(raw: &'a RawResponse) -> Self {
        let mut len = 0;
        while raw.get_out_bind(&return_param_name(len)).is_some() {
            len += 1;
        }
        Self { raw, next: 0, len }
    }

    /// Contiguous slots present, counted from `returnParam`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len - self.next
    }

    /// Take the next slot value.
    pub fn next_slot(&mut self) -> Option<&'a Value> {
        if self.next >= self.len {
            return None;
        }
        let value = self.raw.get_out_bind(&return_param_name(self.next));
        self.next += 1;
        value
    }
}

fn returning_columns(columns: &[ColumnSpec]) -> Arc<Columns> {
    Columns::new(columns.iter().map(|c| c.column_name.clone()).collect())
}

/// Returning through numbered out-binds.
///
/// Each logical row consumes one slot per requested column, in declaration order, before the
/// next row starts.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutBindReturning;

impl ResponseNormalizer for OutBindReturning {
    fn returning(
        &self,
        raw: &RawResponse,
        columns: &[ColumnSpec],
    ) -> Result<Vec<Row>, SqlRunnerError> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let mut slots = ReturnSlots::new(raw);
        if slots.len() % columns.len() != 0 {
            return Err(SqlRunnerError::ReturningMismatch(format!(
                "{} return slots cannot be split into rows of {} columns",
                slots.len(),
                columns.len()
            )));
        }
        if slots.is_empty() && raw.affected().unwrap_or(0) > 0 {
            warn!(
                affected = raw.affected(),
                "returning requested but the backend reported no return slots"
            );
        }

        let shared = returning_columns(columns);
        let mut rows = Vec::with_capacity(slots.len() / columns.len());
        while slots.remaining() > 0 {
            let mut values = Vec::with_capacity(columns.len());
            for _ in columns {
                values.push(slots.next_slot().cloned().unwrap_or(Value::Null));
            }
            rows.push(Row::new(Arc::clone(&shared), values));
        }
        Ok(rows)
    }
}

/// Returning through the rows a `RETURNING` clause produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowReturning;

impl ResponseNormalizer for RowReturning {
    fn returning(
        &self,
        raw: &RawResponse,
        columns: &[ColumnSpec],
    ) -> Result<Vec<Row>, SqlRunnerError> {
        let rows = self.flatten_rows(raw);
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let available = rows.columns().cloned().unwrap_or_else(|| Columns::new(Vec::new()));
        let positions = columns
            .iter()
            .map(|c| {
                available.position(&c.column_name).ok_or_else(|| {
                    SqlRunnerError::ReturningMismatch(format!(
                        "column `{}` is not in the returned rows",
                        c.column_name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let shared = returning_columns(columns);
        Ok(rows
            .into_iter()
            .map(|row| {
                let values = positions
                    .iter()
                    .map(|&idx| row.get_by_index(idx).cloned().unwrap_or(Value::Null))
                    .collect();
                Row::new(Arc::clone(&shared), values)
            })
            .collect())
    }
}

/// Shared method dispatch.
///
/// A custom output transform wins over everything else and receives the response untouched.
///
/// # Errors
/// Returns `MalformedQuery` for a pluck without a column, `ReturningMismatch` when returning
/// values cannot be matched to the requested columns, `UnsupportedMethod` for unknown methods in
/// strict mode, and whatever the output transform returns.
pub fn normalize<N>(
    normalizer: &N,
    raw: RawResponse,
    descriptor: &QueryDescriptor,
    options: &RunnerOptions,
) -> Result<NormalizedResult, SqlRunnerError>
where
    N: ResponseNormalizer + ?Sized,
{
    if let Some(output) = descriptor.output_fn() {
        return output(raw).map(NormalizedResult::Custom);
    }

    match descriptor.method() {
        Method::Select => Ok(NormalizedResult::Rows(normalizer.flatten_rows(&raw))),
        Method::First => Ok(NormalizedResult::Row(
            normalizer.flatten_rows(&raw).into_first(),
        )),
        Method::Pluck => {
            let column = descriptor.pluck_name().ok_or_else(|| {
                SqlRunnerError::MalformedQuery("pluck requires a column name".to_string())
            })?;
            Ok(NormalizedResult::Scalars(
                normalizer.flatten_rows(&raw).pluck(column),
            ))
        }
        Method::Insert | Method::Update | Method::Del | Method::Counter => {
            match descriptor.returning_columns() {
                Some(columns) => normalizer
                    .returning(&raw, columns)
                    .map(NormalizedResult::Returning),
                None => Ok(NormalizedResult::Affected(raw.affected().unwrap_or(0))),
            }
        }
        Method::Raw => Ok(NormalizedResult::Raw(raw)),
        Method::Other(name) => {
            if options.strict_methods {
                return Err(SqlRunnerError::UnsupportedMethod(name.clone()));
            }
            warn!(method = %name, "unrecognised method, passing the raw response through");
            Ok(NormalizedResult::Raw(raw))
        }
    }
}
