//! Scripted backends for exercising runners without a database.
//!
//! [`ScriptedDriver`] answers statements from a queue of canned responses and records every
//! call it receives. Clones share the same script, so a test can keep one clone for
//! inspection while the runner owns another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use crate::driver::{CursorOptions, Driver, RawResponse, RowCursor};
use crate::error::{DriverError, SqlRunnerError};
use crate::pool::ConnectionProvider;
use crate::results::Row;
use crate::types::Value;

/// One interaction a [`ScriptedDriver`] observed.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute { sql: String, bindings: Vec<Value> },
    OpenCursor {
        sql: String,
        bindings: Vec<Value>,
        fetch_size: usize,
    },
    SetAutocommit(bool),
    Commit,
    Rollback,
}

#[derive(Debug)]
struct Script {
    responses: VecDeque<Result<RawResponse, String>>,
    cursor_rows: Vec<Row>,
    cursor_error_at: Option<(usize, String)>,
    cursor_open_error: Option<String>,
    commit_error: Option<String>,
    stall_commit: bool,
    rollback_error: Option<String>,
    autocommit_errors: Vec<(bool, String)>,
    autocommit: bool,
    calls: Vec<Call>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            responses: VecDeque::new(),
            cursor_rows: Vec::new(),
            cursor_error_at: None,
            cursor_open_error: None,
            commit_error: None,
            stall_commit: false,
            rollback_error: None,
            autocommit_errors: Vec::new(),
            autocommit: true,
            calls: Vec::new(),
        }
    }
}

/// In-memory [`Driver`] replaying a script.
///
/// Statements without a queued response get an empty [`RawResponse`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the response for the next `execute`.
    pub fn push_response(&self, raw: RawResponse) {
        self.script().responses.push_back(Ok(raw));
    }

    /// Make the next `execute` fail with a backend error.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script().responses.push_back(Err(message.into()));
    }

    /// Rows produced by every cursor opened from now on.
    pub fn set_cursor_rows(&self, rows: Vec<Row>) {
        self.script().cursor_rows = rows;
    }

    /// Cursors yield an error in place of the row at `index`, then end.
    pub fn fail_cursor_at(&self, index: usize, message: impl Into<String>) {
        self.script().cursor_error_at = Some((index, message.into()));
    }

    pub fn fail_cursor_open(&self, message: impl Into<String>) {
        self.script().cursor_open_error = Some(message.into());
    }

    pub fn fail_commit(&self, message: impl Into<String>) {
        self.script().commit_error = Some(message.into());
    }

    /// `commit` records the call and then never completes.
    pub fn stall_commit(&self) {
        self.script().stall_commit = true;
    }

    pub fn fail_rollback(&self, message: impl Into<String>) {
        self.script().rollback_error = Some(message.into());
    }

    /// Fail every `set_autocommit(enabled)` call with the given target value.
    pub fn fail_set_autocommit(&self, enabled: bool, message: impl Into<String>) {
        self.script()
            .autocommit_errors
            .push((enabled, message.into()));
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    /// SQL of every `execute` and `open_cursor`, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute { sql, .. } | Call::OpenCursor { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn current_autocommit(&self) -> bool {
        self.script().autocommit
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn execute(&mut self, sql: &str, bindings: &[Value]) -> Result<RawResponse, DriverError> {
        let mut script = self.script();
        script.calls.push(Call::Execute {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
        match script.responses.pop_front() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(message)) => Err(DriverError::Backend(message)),
            None => Ok(RawResponse::default()),
        }
    }

    async fn open_cursor<'a>(
        &'a mut self,
        sql: &str,
        bindings: &[Value],
        options: CursorOptions,
    ) -> Result<RowCursor<'a>, DriverError> {
        let mut script = self.script();
        script.calls.push(Call::OpenCursor {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
            fetch_size: options.fetch_size,
        });
        if let Some(message) = script.cursor_open_error.clone() {
            return Err(DriverError::Backend(message));
        }

        let mut items: Vec<Result<Row, DriverError>> = Vec::new();
        for (index, row) in script.cursor_rows.iter().enumerate() {
            if let Some((at, message)) = &script.cursor_error_at
                && *at == index
            {
                items.push(Err(DriverError::Backend(message.clone())));
                break;
            }
            items.push(Ok(row.clone()));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        let mut script = self.script();
        script.calls.push(Call::SetAutocommit(enabled));
        if let Some((_, message)) = script
            .autocommit_errors
            .iter()
            .find(|(target, _)| *target == enabled)
        {
            return Err(DriverError::Backend(message.clone()));
        }
        script.autocommit = enabled;
        Ok(())
    }

    fn autocommit(&self) -> bool {
        self.script().autocommit
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        let answer = {
            let mut script = self.script();
            script.calls.push(Call::Commit);
            match (script.stall_commit, script.commit_error.clone()) {
                (true, _) => None,
                (false, Some(message)) => Some(Err(DriverError::Backend(message))),
                (false, None) => Some(Ok(())),
            }
        };
        match answer {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        let mut script = self.script();
        script.calls.push(Call::Rollback);
        match script.rollback_error.clone() {
            Some(message) => Err(DriverError::Backend(message)),
            None => Ok(()),
        }
    }
}

/// [`ConnectionProvider`] handing out clones of one [`ScriptedDriver`].
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    driver: ScriptedDriver,
    fail_acquire: AtomicBool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new(driver: ScriptedDriver) -> Self {
        Self {
            driver,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn driver(&self) -> &ScriptedDriver {
        &self.driver
    }

    pub fn set_fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProvider for ScriptedProvider {
    type Conn = ScriptedDriver;

    async fn acquire(&self) -> Result<Self::Conn, SqlRunnerError> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(SqlRunnerError::ConnectionError(
                "scripted pool exhausted".into(),
            ));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(self.driver.clone())
    }

    fn release(&self, conn: Self::Conn) {
        self.released.fetch_add(1, Ordering::SeqCst);
        drop(conn);
    }
}
