//! Streaming rows from a backend cursor into a caller-supplied sink.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::config::RunnerOptions;
use crate::descriptor::QueryDescriptor;
use crate::dialect::Dialect;
use crate::driver::{Driver, RowCursor};
use crate::error::{SinkError, SqlRunnerError, StreamError};
use crate::executor;
use crate::results::Row;

/// Destination for streamed rows.
///
/// `write_row` is awaited before the next row is pulled from the cursor, so a slow sink slows
/// the cursor down.
#[async_trait]
pub trait RowSink: Send {
    /// # Errors
    /// Returning an error stops the stream; no further rows are written.
    async fn write_row(&mut self, row: Row) -> Result<(), SinkError>;

    /// Called once after the cursor is exhausted.
    ///
    /// # Errors
    /// A failure here fails the whole stream.
    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[async_trait]
impl RowSink for Vec<Row> {
    async fn write_row(&mut self, row: Row) -> Result<(), SinkError> {
        self.push(row);
        Ok(())
    }
}

#[async_trait]
impl RowSink for mpsc::Sender<Row> {
    async fn write_row(&mut self, row: Row) -> Result<(), SinkError> {
        self.send(row)
            .await
            .map_err(|_| SinkError::new("row receiver was dropped"))
    }
}

/// Sink over a closure, for quick adapters.
pub struct FnSink<F> {
    write: F,
}

/// Wrap a closure as a [`RowSink`].
pub fn sink_fn<F>(write: F) -> FnSink<F>
where
    F: FnMut(Row) -> Result<(), SinkError> + Send,
{
    FnSink { write }
}

#[async_trait]
impl<F> RowSink for FnSink<F>
where
    F: FnMut(Row) -> Result<(), SinkError> + Send,
{
    async fn write_row(&mut self, row: Row) -> Result<(), SinkError> {
        (self.write)(row)
    }
}

/// What a completed stream delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    pub rows: u64,
}

/// The stock [`StreamAdapter`](crate::dialect::StreamAdapter): open a cursor and [`pump`] it.
#[derive(Debug, Default, Clone, Copy)]
pub struct CursorStreamAdapter;

/// Move every row from `cursor` into `sink`, then close the sink.
///
/// # Errors
/// Returns the first cursor or sink failure together with the number of rows already
/// delivered.
pub async fn pump(
    mut cursor: RowCursor<'_>,
    sink: &mut dyn RowSink,
) -> Result<StreamSummary, StreamError> {
    let mut rows = 0u64;
    while let Some(next) = cursor.next().await {
        let row = next.map_err(|source| StreamError::Cursor {
            rows_delivered: rows,
            source,
        })?;
        sink.write_row(row)
            .await
            .map_err(|source| StreamError::Sink {
                rows_delivered: rows,
                source,
            })?;
        rows += 1;
    }
    drop(cursor);

    sink.close().await.map_err(|source| StreamError::SinkClose {
        rows_delivered: rows,
        source,
    })?;
    Ok(StreamSummary { rows })
}

/// Translate `descriptor` and stream its rows into `sink` through the dialect's adapter.
///
/// # Errors
/// Returns `EmptyQuery`/`MalformedQuery` before the backend is contacted, `QueryExecution` if the
/// cursor cannot be opened, and `Stream` for failures once rows are flowing.
pub async fn stream<C>(
    conn: &mut C,
    dialect: &Dialect,
    descriptor: &QueryDescriptor,
    sink: &mut dyn RowSink,
    options: &RunnerOptions,
) -> Result<StreamSummary, SqlRunnerError>
where
    C: Driver,
{
    let query = executor::prepare(dialect, descriptor, options)?;
    let adapter = dialect.stream_adapter();
    let cursor_options = adapter.cursor_options(options);
    adapter.stream(conn, &query, sink, cursor_options).await
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::error::DriverError;
    use crate::types::Value;

    fn row(id: i64) -> Row {
        Row::from_pairs([("id", Value::Int(id))])
    }

    #[tokio::test]
    async fn pump_delivers_in_order_and_counts() {
        let cursor: RowCursor<'static> = stream::iter(vec![Ok(row(1)), Ok(row(2))]).boxed();
        let mut sink = Vec::new();
        let summary = pump(cursor, &mut sink).await.unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(sink, vec![row(1), row(2)]);
    }

    #[tokio::test]
    async fn sink_failure_stops_the_stream() {
        let cursor: RowCursor<'static> =
            stream::iter(vec![Ok(row(1)), Ok(row(2)), Ok(row(3))]).boxed();
        let mut seen = Vec::new();
        let mut sink = sink_fn(|r: Row| {
            let id = *r.get("id").and_then(Value::as_int).unwrap_or(&0);
            if id == 2 {
                return Err(SinkError::new("full"));
            }
            seen.push(id);
            Ok(())
        });
        let err = pump(cursor, &mut sink).await.unwrap_err();
        drop(sink);
        assert!(matches!(err, StreamError::Sink { rows_delivered: 1, .. }));
        assert_eq!(seen, vec![1]);
    }

    #[tokio::test]
    async fn cursor_failure_reports_progress() {
        let cursor: RowCursor<'static> = stream::iter(vec![
            Ok(row(1)),
            Err(DriverError::Backend("ORA-01555".into())),
        ])
        .boxed();
        let mut sink = Vec::new();
        let err = pump(cursor, &mut sink).await.unwrap_err();
        assert!(matches!(err, StreamError::Cursor { rows_delivered: 1, .. }));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn channel_sink_reports_dropped_receiver() {
        let (mut tx, rx) = mpsc::channel::<Row>(1);
        drop(rx);
        let err = tx.write_row(row(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "row receiver was dropped");
    }
}
