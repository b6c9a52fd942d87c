//! Per-backend behaviour, composed by injection.
//!
//! A [`Dialect`] bundles the three seams a backend can customise: how bindings are translated,
//! how responses are normalized and how cursors are streamed into a sink. The stock dialects are
//! built from the same small parts; callers with an unusual backend can swap any one of them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RunnerOptions;
use crate::descriptor::{ColumnSpec, QueryDescriptor};
use crate::driver::{CursorOptions, Driver, RawResponse};
use crate::error::SqlRunnerError;
use crate::normalizer::{self, OutBindReturning, RowReturning};
use crate::results::{NormalizedResult, Row, RowSet};
use crate::stream::{self, CursorStreamAdapter, RowSink, StreamSummary};
use crate::translation::{self, BooleanEncoding, PlaceholderStyle, TranslatedQuery};
use crate::types::{DialectKind, Value};

/// Rewrites neutral `?` markers and re-encodes bindings for one backend.
pub trait BindingTranslator: Send + Sync {
    fn placeholder_style(&self) -> PlaceholderStyle;

    fn boolean_encoding(&self) -> BooleanEncoding;

    /// # Errors
    /// Returns `MalformedQuery` when markers and bindings disagree.
    fn translate(&self, sql: &str, bindings: &[Value]) -> Result<TranslatedQuery, SqlRunnerError> {
        translation::translate(
            sql,
            bindings,
            self.placeholder_style(),
            self.boolean_encoding(),
        )
    }
}

/// Maps a backend response onto a [`NormalizedResult`].
///
/// Only [`returning`](Self::returning) differs between the stock backends; the method dispatch
/// in [`normalize`](Self::normalize) is shared.
pub trait ResponseNormalizer: Send + Sync {
    /// Hook applied to row-producing responses before `select`/`first`/`pluck` shaping.
    fn flatten_rows(&self, raw: &RawResponse) -> RowSet {
        raw.to_row_set()
    }

    /// Rows for a DML statement that asked for `returning` columns.
    ///
    /// # Errors
    /// Returns `ReturningMismatch` when the response cannot be matched to `columns`.
    fn returning(
        &self,
        raw: &RawResponse,
        columns: &[ColumnSpec],
    ) -> Result<Vec<Row>, SqlRunnerError>;

    /// # Errors
    /// See [`normalizer::normalize`].
    fn normalize(
        &self,
        raw: RawResponse,
        descriptor: &QueryDescriptor,
        options: &RunnerOptions,
    ) -> Result<NormalizedResult, SqlRunnerError> {
        normalizer::normalize(self, raw, descriptor, options)
    }
}

/// Bridges a backend cursor into a [`RowSink`].
#[async_trait]
pub trait StreamAdapter: Send + Sync {
    fn cursor_options(&self, options: &RunnerOptions) -> CursorOptions {
        options.cursor_options()
    }

    /// Stream an already-translated query into `sink`.
    ///
    /// # Errors
    /// Returns `QueryExecution` if the cursor cannot be opened and `Stream` for failures after
    /// that.
    async fn stream(
        &self,
        conn: &mut dyn Driver,
        query: &TranslatedQuery,
        sink: &mut dyn RowSink,
        options: CursorOptions,
    ) -> Result<StreamSummary, SqlRunnerError>;
}

/// A placeholder style paired with a boolean encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderTranslator {
    pub style: PlaceholderStyle,
    pub encoding: BooleanEncoding,
}

impl PlaceholderTranslator {
    #[must_use]
    pub const fn new(style: PlaceholderStyle, encoding: BooleanEncoding) -> Self {
        Self { style, encoding }
    }
}

impl BindingTranslator for PlaceholderTranslator {
    fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    fn boolean_encoding(&self) -> BooleanEncoding {
        self.encoding
    }
}

/// Statements used for nested transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavepointSyntax {
    /// Whether the backend has `RELEASE SAVEPOINT`.
    pub supports_release: bool,
}

impl SavepointSyntax {
    pub const STANDARD: Self = Self {
        supports_release: true,
    };
    pub const WITHOUT_RELEASE: Self = Self {
        supports_release: false,
    };

    #[must_use]
    pub fn create(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    #[must_use]
    pub fn rollback_to(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    /// `None` when the backend releases savepoints implicitly.
    #[must_use]
    pub fn release(&self, name: &str) -> Option<String> {
        self.supports_release
            .then(|| format!("RELEASE SAVEPOINT {name}"))
    }
}

/// Everything backend-specific a runner needs.
#[derive(Clone)]
pub struct Dialect {
    kind: DialectKind,
    translator: Arc<dyn BindingTranslator>,
    normalizer: Arc<dyn ResponseNormalizer>,
    stream_adapter: Arc<dyn StreamAdapter>,
    savepoints: SavepointSyntax,
}

impl Dialect {
    #[must_use]
    pub fn new(
        kind: DialectKind,
        translator: Arc<dyn BindingTranslator>,
        normalizer: Arc<dyn ResponseNormalizer>,
        stream_adapter: Arc<dyn StreamAdapter>,
        savepoints: SavepointSyntax,
    ) -> Self {
        Self {
            kind,
            translator,
            normalizer,
            stream_adapter,
            savepoints,
        }
    }

    /// `:N` binds, booleans as `1`/`0`, DML values through `returnParam*` out-binds.
    #[must_use]
    pub fn oracle() -> Self {
        Self::new(
            DialectKind::Oracle,
            Arc::new(PlaceholderTranslator::new(
                PlaceholderStyle::Colon,
                BooleanEncoding::Integer,
            )),
            Arc::new(OutBindReturning),
            Arc::new(CursorStreamAdapter),
            SavepointSyntax::WITHOUT_RELEASE,
        )
    }

    /// `$N` binds, native booleans, `RETURNING` rows.
    #[must_use]
    pub fn postgres() -> Self {
        Self::new(
            DialectKind::Postgres,
            Arc::new(PlaceholderTranslator::new(
                PlaceholderStyle::Dollar,
                BooleanEncoding::Native,
            )),
            Arc::new(RowReturning),
            Arc::new(CursorStreamAdapter),
            SavepointSyntax::STANDARD,
        )
    }

    /// `?N` binds, booleans as `1`/`0`, `RETURNING` rows.
    #[must_use]
    pub fn sqlite() -> Self {
        Self::new(
            DialectKind::Sqlite,
            Arc::new(PlaceholderTranslator::new(
                PlaceholderStyle::Question,
                BooleanEncoding::Integer,
            )),
            Arc::new(RowReturning),
            Arc::new(CursorStreamAdapter),
            SavepointSyntax::STANDARD,
        )
    }

    #[must_use]
    pub fn from_kind(kind: DialectKind) -> Self {
        match kind {
            DialectKind::Oracle => Self::oracle(),
            DialectKind::Postgres => Self::postgres(),
            DialectKind::Sqlite => Self::sqlite(),
        }
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn BindingTranslator>) -> Self {
        self.translator = translator;
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<dyn ResponseNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn with_stream_adapter(mut self, stream_adapter: Arc<dyn StreamAdapter>) -> Self {
        self.stream_adapter = stream_adapter;
        self
    }

    #[must_use]
    pub fn with_savepoints(mut self, savepoints: SavepointSyntax) -> Self {
        self.savepoints = savepoints;
        self
    }

    #[must_use]
    pub fn kind(&self) -> DialectKind {
        self.kind
    }

    #[must_use]
    pub fn translator(&self) -> &dyn BindingTranslator {
        self.translator.as_ref()
    }

    #[must_use]
    pub fn normalizer(&self) -> &dyn ResponseNormalizer {
        self.normalizer.as_ref()
    }

    #[must_use]
    pub fn stream_adapter(&self) -> &dyn StreamAdapter {
        self.stream_adapter.as_ref()
    }

    #[must_use]
    pub fn savepoints(&self) -> SavepointSyntax {
        self.savepoints
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("kind", &self.kind)
            .field("placeholders", &self.translator.placeholder_style())
            .field("booleans", &self.translator.boolean_encoding())
            .field("savepoints", &self.savepoints)
            .finish_non_exhaustive()
    }
}

impl From<DialectKind> for Dialect {
    fn from(kind: DialectKind) -> Self {
        Self::from_kind(kind)
    }
}

#[async_trait]
impl StreamAdapter for CursorStreamAdapter {
    async fn stream(
        &self,
        conn: &mut dyn Driver,
        query: &TranslatedQuery,
        sink: &mut dyn RowSink,
        options: CursorOptions,
    ) -> Result<StreamSummary, SqlRunnerError> {
        let cursor = conn
            .open_cursor(&query.sql, &query.bindings, options)
            .await
            .map_err(|source| SqlRunnerError::execution(&query.sql, source))?;
        Ok(stream::pump(cursor, sink).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_dialects_translate_in_their_own_style() {
        let bindings = [Value::Bool(true), Value::Int(5)];
        let sql = "update t set x = ? where id = ?";

        let oracle = Dialect::oracle().translator().translate(sql, &bindings).unwrap();
        assert_eq!(oracle.sql, "update t set x = :1 where id = :2");
        assert_eq!(oracle.bindings, [Value::Int(1), Value::Int(5)]);

        let pg = Dialect::postgres().translator().translate(sql, &bindings).unwrap();
        assert_eq!(pg.sql, "update t set x = $1 where id = $2");
        assert_eq!(pg.bindings, bindings);

        let sqlite = Dialect::from_kind(DialectKind::Sqlite)
            .translator()
            .translate(sql, &bindings)
            .unwrap();
        assert_eq!(sqlite.sql, "update t set x = ?1 where id = ?2");
        assert_eq!(sqlite.bindings[0], Value::Int(1));
    }

    #[test]
    fn savepoint_statements() {
        let oracle = Dialect::oracle().savepoints();
        assert_eq!(oracle.create("sp_1"), "SAVEPOINT sp_1");
        assert_eq!(oracle.rollback_to("sp_1"), "ROLLBACK TO SAVEPOINT sp_1");
        assert_eq!(oracle.release("sp_1"), None);
        assert_eq!(
            Dialect::postgres().savepoints().release("sp_2").as_deref(),
            Some("RELEASE SAVEPOINT sp_2")
        );
    }

    #[test]
    fn normalizer_can_be_swapped() {
        let dialect = Dialect::postgres().with_normalizer(Arc::new(OutBindReturning));
        let raw = RawResponse::with_update_count(1).out_bind("returnParam", Value::Int(9));
        let rows = dialect
            .normalizer()
            .returning(&raw, &["id".into()])
            .unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Int(9)));
        assert_eq!(dialect.kind(), DialectKind::Postgres);
    }
}
