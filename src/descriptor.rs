use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::driver::RawResponse;
use crate::error::SqlRunnerError;
use crate::types::Value;

/// Execution intent attached to a descriptor; drives response normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Select,
    First,
    Pluck,
    Insert,
    Update,
    Del,
    Counter,
    Raw,
    /// A method name this crate does not know, kept for backend-specific extensions.
    Other(String),
}

impl Method {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Method::Select => "select",
            Method::First => "first",
            Method::Pluck => "pluck",
            Method::Insert => "insert",
            Method::Update => "update",
            Method::Del => "del",
            Method::Counter => "counter",
            Method::Raw => "raw",
            Method::Other(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "select" => Method::Select,
            "first" => Method::First,
            "pluck" => Method::Pluck,
            "insert" => Method::Insert,
            "update" => Method::Update,
            "del" | "delete" => Method::Del,
            "counter" => Method::Counter,
            "raw" => Method::Raw,
            other => Method::Other(other.to_string()),
        })
    }
}

/// One column requested back from an insert/update/delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub column_name: String,
}

impl ColumnSpec {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(value: &str) -> Self {
        ColumnSpec::new(value)
    }
}

impl From<String> for ColumnSpec {
    fn from(value: String) -> Self {
        ColumnSpec::new(value)
    }
}

/// Custom result transform. Receives the backend response directly and bypasses the normalizer.
pub type OutputFn =
    Arc<dyn Fn(RawResponse) -> Result<serde_json::Value, SqlRunnerError> + Send + Sync>;

/// A finished query: SQL with neutral `?` markers, ordered bindings and execution intent.
///
/// Runners only ever read a descriptor; translation produces a separate
/// [`TranslatedQuery`](crate::translation::TranslatedQuery).
/// ```rust
/// use sql_runner::prelude::*;
///
/// let descriptor = QueryDescriptor::new("update t set x = ? where id = ?", Method::Update)
///     .with_bindings(vec![Value::Bool(true), Value::Int(5)]);
/// assert_eq!(descriptor.bindings().len(), 2);
/// ```
#[derive(Clone)]
pub struct QueryDescriptor {
    sql: String,
    bindings: Vec<Value>,
    method: Method,
    returning: Option<Vec<ColumnSpec>>,
    pluck: Option<String>,
    output: Option<OutputFn>,
}

impl QueryDescriptor {
    pub fn new(sql: impl Into<String>, method: Method) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
            method,
            returning: None,
            pluck: None,
            output: None,
        }
    }

    pub fn select(sql: impl Into<String>) -> Self {
        Self::new(sql, Method::Select)
    }

    pub fn first(sql: impl Into<String>) -> Self {
        Self::new(sql, Method::First)
    }

    pub fn pluck(sql: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(sql, Method::Pluck).pluck_column(column)
    }

    pub fn insert(sql: impl Into<String>) -> Self {
        Self::new(sql, Method::Insert)
    }

    pub fn update(sql: impl Into<String>) -> Self {
        Self::new(sql, Method::Update)
    }

    pub fn del(sql: impl Into<String>) -> Self {
        Self::new(sql, Method::Del)
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Method::Raw)
    }

    #[must_use]
    pub fn with_bindings(mut self, bindings: Vec<Value>) -> Self {
        self.bindings = bindings;
        self
    }

    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.bindings.push(value.into());
        self
    }

    #[must_use]
    pub fn returning<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnSpec>,
    {
        self.returning = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn pluck_column(mut self, column: impl Into<String>) -> Self {
        self.pluck = Some(column.into());
        self
    }

    #[must_use]
    pub fn output<F>(mut self, transform: F) -> Self
    where
        F: Fn(RawResponse) -> Result<serde_json::Value, SqlRunnerError> + Send + Sync + 'static,
    {
        self.output = Some(Arc::new(transform));
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn returning_columns(&self) -> Option<&[ColumnSpec]> {
        self.returning.as_deref()
    }

    #[must_use]
    pub fn pluck_name(&self) -> Option<&str> {
        self.pluck.as_deref()
    }

    #[must_use]
    pub fn output_fn(&self) -> Option<&OutputFn> {
        self.output.as_ref()
    }
}

impl fmt::Debug for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .field("method", &self.method)
            .field("returning", &self.returning)
            .field("pluck", &self.pluck)
            .field("output", &self.output.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_names_are_kept() {
        let method: Method = "upsert".parse().unwrap();
        assert_eq!(method, Method::Other("upsert".into()));
        assert_eq!(method.to_string(), "upsert");
        assert_eq!("delete".parse::<Method>().unwrap(), Method::Del);
    }

    #[test]
    fn builder_collects_bindings_and_returning() {
        let d = QueryDescriptor::insert("insert into t (a, b) values (?, ?)")
            .bind(1)
            .bind("x")
            .returning(["id", "created_at"]);
        assert_eq!(d.bindings(), &[Value::Int(1), Value::Text("x".into())]);
        let cols: Vec<_> = d
            .returning_columns()
            .unwrap()
            .iter()
            .map(|c| c.column_name.as_str())
            .collect();
        assert_eq!(cols, ["id", "created_at"]);
        assert_eq!(d.method(), &Method::Insert);
    }
}
