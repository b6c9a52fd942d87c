//! Neutral placeholder and boolean translation.
//!
//! Descriptors arrive with `?` markers and backend-neutral [`Value`]s. Each dialect picks a
//! [`PlaceholderStyle`] and a [`BooleanEncoding`]; [`translate`] applies both and checks that
//! the placeholder count lines up with the bindings.

mod parsers;
mod scanner;

use std::fmt::Write;

pub use scanner::{PositionedSql, position_bindings};

use crate::error::SqlRunnerError;
use crate::types::Value;

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Oracle-style positional binds like `:1`.
    Colon,
    /// PostgreSQL-style placeholders like `$1`.
    Dollar,
    /// SQLite-style numbered placeholders like `?1`.
    Question,
}

impl PlaceholderStyle {
    pub(crate) fn write_marker(self, out: &mut String, position: usize) {
        let prefix = match self {
            PlaceholderStyle::Colon => ':',
            PlaceholderStyle::Dollar => '$',
            PlaceholderStyle::Question => '?',
        };
        out.push(prefix);
        // Writing into a String cannot fail.
        let _ = write!(out, "{position}");
    }
}

/// How a dialect represents boolean bindings on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanEncoding {
    /// The driver accepts booleans as-is.
    Native,
    /// Booleans travel as `1`/`0` integers.
    Integer,
}

/// SQL and bindings after dialect translation, ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// Re-encode a single binding. Applying it to its own output returns the same value.
#[must_use]
pub fn encode_value(value: &Value, encoding: BooleanEncoding) -> Value {
    match (value, encoding) {
        (Value::Bool(b), BooleanEncoding::Integer) => Value::Int(i64::from(*b)),
        _ => value.clone(),
    }
}

/// Re-encode every binding for the dialect's boolean representation.
#[must_use]
pub fn encode_bindings(bindings: &[Value], encoding: BooleanEncoding) -> Vec<Value> {
    bindings
        .iter()
        .map(|value| encode_value(value, encoding))
        .collect()
}

/// Translate neutral SQL and bindings for one dialect.
///
/// SQL already written in the dialect's own placeholder style is passed through untouched and
/// its highest placeholder index is checked against the bindings instead.
///
/// # Errors
/// Returns [`SqlRunnerError::MalformedQuery`] when the placeholders and the bindings disagree,
/// or when neutral markers and native placeholders are mixed in one statement.
pub fn translate(
    sql: &str,
    bindings: &[Value],
    style: PlaceholderStyle,
    encoding: BooleanEncoding,
) -> Result<TranslatedQuery, SqlRunnerError> {
    let positioned = position_bindings(sql, style);
    if positioned.markers > 0 && positioned.native > 0 {
        return Err(SqlRunnerError::MalformedQuery(
            "neutral `?` markers mixed with native placeholders".to_string(),
        ));
    }
    let expected = positioned.markers.max(positioned.native);
    if expected != bindings.len() {
        return Err(SqlRunnerError::MalformedQuery(format!(
            "expected {expected} bindings, got {}",
            bindings.len()
        )));
    }

    Ok(TranslatedQuery {
        sql: positioned.sql.into_owned(),
        bindings: encode_bindings(bindings, encoding),
    })
}
