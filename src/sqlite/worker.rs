use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self as std_mpsc, Receiver, Sender};
use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use tokio::sync::{mpsc, oneshot};

use crate::driver::RawResponse;
use crate::error::DriverError;
use crate::results::Row;

use super::config::SqliteOptions;
use super::params::as_refs;
use super::query::{row_values, run_statement, statement_columns};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

pub(super) type RowSender = mpsc::Sender<Result<Row, DriverError>>;
type Reply<T> = oneshot::Sender<Result<T, DriverError>>;

pub(super) enum Command {
    Execute {
        sql: String,
        params: Vec<SqlValue>,
        respond_to: Reply<RawResponse>,
    },
    OpenCursor {
        sql: String,
        params: Vec<SqlValue>,
        rows: RowSender,
        respond_to: Reply<()>,
    },
    SetAutocommit {
        enabled: bool,
        respond_to: Reply<()>,
    },
    Commit {
        respond_to: Reply<()>,
    },
    Rollback {
        respond_to: Reply<()>,
    },
    Shutdown,
}

/// Handle to the thread that owns one `SQLite` connection.
pub(super) struct SqliteWorker {
    sender: Sender<Command>,
    id: u64,
}

impl SqliteWorker {
    /// Start the worker and wait until its connection is open.
    pub(super) async fn spawn(options: SqliteOptions) -> Result<Self, DriverError> {
        let (sender, receiver) = std_mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), DriverError>>();
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);

        thread::Builder::new()
            .name(format!("sqlite-worker-{id}"))
            .spawn(move || match open_connection(&options) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        run_sqlite_worker(conn, &receiver);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|err| {
                DriverError::Closed(format!("failed to spawn SQLite worker thread: {err}"))
            })?;

        ready_rx
            .await
            .map_err(|_| closed("SQLite worker exited during startup"))??;
        Ok(Self { sender, id })
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }

    pub(super) async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
        drop_message: &'static str,
    ) -> Result<T, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .map_err(|_| closed("SQLite worker closed"))?;
        rx.await.map_err(|_| closed(drop_message))?
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

fn closed(message: &str) -> DriverError {
    DriverError::Closed(message.into())
}

fn open_connection(options: &SqliteOptions) -> Result<Connection, DriverError> {
    let conn = Connection::open(&options.db_path)?;
    conn.busy_timeout(Duration::from_millis(options.busy_timeout_ms))?;
    Ok(conn)
}

/// Connection state owned by the worker thread.
///
/// With autocommit off, a transaction is opened lazily before the next statement and stays open
/// until commit or rollback.
struct Session {
    conn: Connection,
    autocommit: bool,
}

impl Session {
    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn ensure_transaction(&self) -> Result<(), DriverError> {
        if !self.autocommit && !self.in_transaction() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RawResponse, DriverError> {
        self.ensure_transaction()?;
        run_statement(&self.conn, sql, params)
    }

    fn finish(&self, statement: &str) -> Result<(), DriverError> {
        if self.in_transaction() {
            self.conn.execute_batch(statement)?;
        }
        Ok(())
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        // Going back to autocommit must not leave a half-done transaction on a pooled connection.
        if enabled && self.in_transaction() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        self.autocommit = enabled;
        Ok(())
    }

    fn stream_rows(
        &self,
        sql: &str,
        params: &[SqlValue],
        rows_tx: &RowSender,
        respond_to: Reply<()>,
    ) {
        let mut respond_to = Some(respond_to);
        if let Err(err) = self.pump(sql, params, rows_tx, &mut respond_to)
            && let Some(tx) = respond_to.take()
        {
            let _ = tx.send(Err(err));
        }
    }

    /// Errors before the cursor is confirmed go back through `respond_to`; errors after that
    /// travel down the row channel.
    fn pump(
        &self,
        sql: &str,
        params: &[SqlValue],
        rows_tx: &RowSender,
        respond_to: &mut Option<Reply<()>>,
    ) -> Result<(), DriverError> {
        self.ensure_transaction()?;
        let mut stmt = self.conn.prepare(sql)?;
        let columns = statement_columns(&stmt);
        let refs = as_refs(params);
        let mut rows = stmt.query(&refs[..])?;

        if let Some(tx) = respond_to.take()
            && tx.send(Ok(())).is_err()
        {
            return Ok(());
        }

        loop {
            let item = match rows.next() {
                Ok(Some(row)) => row_values(row, columns.len())
                    .map(|values| Row::new(Arc::clone(&columns), values)),
                Ok(None) => return Ok(()),
                Err(err) => Err(DriverError::from(err)),
            };
            let failed = item.is_err();
            // A closed channel means the consumer stopped reading.
            if rows_tx.blocking_send(item).is_err() || failed {
                return Ok(());
            }
        }
    }
}

fn run_sqlite_worker(conn: Connection, receiver: &Receiver<Command>) {
    let mut session = Session {
        conn,
        autocommit: true,
    };
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Execute {
                sql,
                params,
                respond_to,
            } => {
                let _ = respond_to.send(session.execute(&sql, &params));
            }
            Command::OpenCursor {
                sql,
                params,
                rows,
                respond_to,
            } => session.stream_rows(&sql, &params, &rows, respond_to),
            Command::SetAutocommit {
                enabled,
                respond_to,
            } => {
                let _ = respond_to.send(session.set_autocommit(enabled));
            }
            Command::Commit { respond_to } => {
                let _ = respond_to.send(session.finish("COMMIT"));
            }
            Command::Rollback { respond_to } => {
                let _ = respond_to.send(session.finish("ROLLBACK"));
            }
            Command::Shutdown => break,
        }
    }
}
