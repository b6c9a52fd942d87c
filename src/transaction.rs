//! Explicit transactions over a leased connection.
//!
//! [`TransactionHandle::begin`] turns autocommit off; [`commit`](TransactionHandle::commit) and
//! [`rollback`](TransactionHandle::rollback) consume the handle, put autocommit back the way it
//! was and release the connection. A handle dropped while still active is rolled back on a
//! spawned task; one dropped in the middle of its commit or rollback gets its autocommit
//! restored the same way before the connection goes back.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::RunnerOptions;
use crate::descriptor::QueryDescriptor;
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{SqlRunnerError, TxAction};
use crate::executor;
use crate::pool::{ConnectionProvider, Lease};
use crate::results::NormalizedResult;
use crate::stream::{self, RowSink, StreamSummary};
use crate::tx_outcome::TxOutcome;

/// Lifecycle of a [`TransactionHandle`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Inactive,
    Active,
    Committing,
    RollingBack,
    Closed,
}

impl TransactionState {
    #[must_use]
    pub fn can_transition_to(self, next: TransactionState) -> bool {
        use TransactionState::{Active, Closed, Committing, Inactive, RollingBack};
        matches!(
            (self, next),
            (Inactive, Active)
                | (Active, Committing | RollingBack)
                | (Committing | RollingBack, Closed)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Inactive => "inactive",
            TransactionState::Active => "active",
            TransactionState::Committing => "committing",
            TransactionState::RollingBack => "rolling back",
            TransactionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A named point inside a transaction that can be rolled back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An open transaction holding its connection exclusively.
pub struct TransactionHandle<P: ConnectionProvider> {
    lease: Option<Lease<P>>,
    dialect: Dialect,
    options: RunnerOptions,
    state: TransactionState,
    prior_autocommit: bool,
    savepoints: u32,
}

impl<P: ConnectionProvider> TransactionHandle<P> {
    /// Acquire a connection and switch autocommit off.
    ///
    /// # Errors
    /// Returns `TransactionStart` wrapping the acquire or autocommit failure. The lease is
    /// released before returning.
    pub async fn begin(
        provider: &Arc<P>,
        dialect: Dialect,
        options: RunnerOptions,
    ) -> Result<Self, SqlRunnerError> {
        let start_err = |e: SqlRunnerError| SqlRunnerError::TransactionStart(Box::new(e));

        let mut lease = Lease::acquire(provider).await.map_err(start_err)?;
        let conn = lease.connection().map_err(start_err)?;
        let prior_autocommit = conn.autocommit();
        conn.set_autocommit(false).await.map_err(|source| {
            start_err(SqlRunnerError::Autocommit {
                enabled: false,
                source,
            })
        })?;

        debug!(dialect = %dialect.kind(), "transaction started");
        let mut handle = Self {
            lease: Some(lease),
            dialect,
            options,
            state: TransactionState::Inactive,
            prior_autocommit,
            savepoints: 0,
        };
        handle.transition(TransactionState::Active, "begin")?;
        Ok(handle)
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// # Errors
    /// Same as [`Runner::execute`](crate::runner::Runner::execute), plus
    /// `InvalidTransactionState` once the transaction is finishing.
    pub async fn execute(
        &mut self,
        descriptor: &QueryDescriptor,
    ) -> Result<NormalizedResult, SqlRunnerError> {
        self.ensure_active("execute in")?;
        let conn = held(&mut self.lease)?;
        executor::execute(conn, &self.dialect, descriptor, &self.options).await
    }

    /// # Errors
    /// Same as [`Runner::stream`](crate::runner::Runner::stream).
    pub async fn stream(
        &mut self,
        descriptor: &QueryDescriptor,
        sink: &mut dyn RowSink,
    ) -> Result<StreamSummary, SqlRunnerError> {
        self.ensure_active("stream in")?;
        let conn = held(&mut self.lease)?;
        stream::stream(conn, &self.dialect, descriptor, sink, &self.options).await
    }

    /// Create the next `sp_<n>` savepoint.
    ///
    /// # Errors
    /// Returns `QueryExecution` if the backend rejects the statement.
    pub async fn savepoint(&mut self) -> Result<Savepoint, SqlRunnerError> {
        self.ensure_active("create a savepoint in")?;
        let name = format!("sp_{}", self.savepoints + 1);
        let sql = self.dialect.savepoints().create(&name);
        executor::execute_native(held(&mut self.lease)?, &sql).await?;
        self.savepoints += 1;
        Ok(Savepoint { name })
    }

    /// Undo everything since `savepoint`. The transaction stays open.
    ///
    /// # Errors
    /// Returns `QueryExecution` if the backend rejects the statement.
    pub async fn rollback_to_savepoint(
        &mut self,
        savepoint: &Savepoint,
    ) -> Result<(), SqlRunnerError> {
        self.ensure_active("roll back a savepoint in")?;
        let sql = self.dialect.savepoints().rollback_to(savepoint.name());
        executor::execute_native(held(&mut self.lease)?, &sql).await
    }

    /// Forget `savepoint`, keeping its work. A no-op on dialects without `RELEASE SAVEPOINT`.
    ///
    /// # Errors
    /// Returns `QueryExecution` if the backend rejects the statement.
    pub async fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<(), SqlRunnerError> {
        self.ensure_active("release a savepoint in")?;
        match self.dialect.savepoints().release(savepoint.name()) {
            Some(sql) => executor::execute_native(held(&mut self.lease)?, &sql).await,
            None => Ok(()),
        }
    }

    /// # Errors
    /// Returns `TransactionEnd` with the backend error if the commit failed, otherwise
    /// `Autocommit` if restoring autocommit failed. The connection is released either way.
    pub async fn commit(mut self) -> Result<TxOutcome, SqlRunnerError> {
        self.finish(TxAction::Commit).await
    }

    /// # Errors
    /// Returns `TransactionEnd` with the backend error if the rollback failed, otherwise
    /// `Autocommit` if restoring autocommit failed. The connection is released either way.
    pub async fn rollback(mut self) -> Result<TxOutcome, SqlRunnerError> {
        self.finish(TxAction::Rollback).await
    }

    async fn finish(&mut self, action: TxAction) -> Result<TxOutcome, SqlRunnerError> {
        let next = match action {
            TxAction::Commit => TransactionState::Committing,
            TxAction::Rollback => TransactionState::RollingBack,
        };
        self.transition(
            next,
            match action {
                TxAction::Commit => "commit",
                TxAction::Rollback => "roll back",
            },
        )?;

        // The lease stays in `self` until autocommit is back, so a cancelled finish is still
        // cleaned up by `Drop`.
        let conn = held(&mut self.lease)?;
        let outcome = match action {
            TxAction::Commit => conn.commit().await,
            TxAction::Rollback => conn.rollback().await,
        };
        let restored = conn.set_autocommit(self.prior_autocommit).await;
        self.state = TransactionState::Closed;
        if let Some(lease) = self.lease.take() {
            lease.release();
        }

        match (outcome, restored) {
            (Err(source), restored) => {
                if let Err(e) = restored {
                    warn!(%action, "failed to restore autocommit: {e}");
                }
                Err(SqlRunnerError::TransactionEnd { action, source })
            }
            (Ok(()), Err(source)) => {
                warn!(%action, "failed to restore autocommit: {source}");
                Err(SqlRunnerError::Autocommit {
                    enabled: self.prior_autocommit,
                    source,
                })
            }
            (Ok(()), Ok(())) => {
                debug!(%action, savepoints = self.savepoints, "transaction finished");
                Ok(TxOutcome::new(action, self.savepoints))
            }
        }
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), SqlRunnerError> {
        if self.state == TransactionState::Active {
            Ok(())
        } else {
            Err(SqlRunnerError::InvalidTransactionState {
                state: self.state,
                operation,
            })
        }
    }

    fn transition(
        &mut self,
        next: TransactionState,
        operation: &'static str,
    ) -> Result<(), SqlRunnerError> {
        if !self.state.can_transition_to(next) {
            return Err(SqlRunnerError::InvalidTransactionState {
                state: self.state,
                operation,
            });
        }
        self.state = next;
        Ok(())
    }
}

fn held<P: ConnectionProvider>(
    lease: &mut Option<Lease<P>>,
) -> Result<&mut P::Conn, SqlRunnerError> {
    lease
        .as_mut()
        .ok_or_else(|| SqlRunnerError::ConnectionError("lease already released".into()))?
        .connection()
}

impl<P: ConnectionProvider> Drop for TransactionHandle<P> {
    fn drop(&mut self) {
        let rollback = match self.state {
            TransactionState::Active | TransactionState::RollingBack => true,
            // Whether the commit reached the backend is unknown; only autocommit is restored.
            TransactionState::Committing => false,
            TransactionState::Inactive | TransactionState::Closed => return,
        };
        let interrupted = self.state;
        self.state = TransactionState::Closed;
        let Some(mut lease) = self.lease.take() else {
            return;
        };
        let prior_autocommit = self.prior_autocommit;

        if let Ok(handle) = Handle::try_current() {
            warn!(state = %interrupted, "transaction dropped before it finished, cleaning up");
            handle.spawn(async move {
                if let Ok(conn) = lease.connection() {
                    if rollback && let Err(e) = conn.rollback().await {
                        warn!("rollback of dropped transaction failed: {e}");
                    }
                    if let Err(e) = conn.set_autocommit(prior_autocommit).await {
                        warn!("failed to restore autocommit: {e}");
                    }
                }
            });
        } else {
            warn!(
                state = %interrupted,
                "transaction dropped outside a tokio runtime; releasing without cleanup"
            );
        }
    }
}

impl<P: ConnectionProvider> fmt::Debug for TransactionHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("dialect", &self.dialect.kind())
            .field("state", &self.state)
            .field("savepoints", &self.savepoints)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::TransactionState::*;
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        assert!(Inactive.can_transition_to(Active));
        assert!(Active.can_transition_to(Committing));
        assert!(Active.can_transition_to(RollingBack));
        assert!(Committing.can_transition_to(Closed));
        assert!(RollingBack.can_transition_to(Closed));

        assert!(!Active.can_transition_to(Inactive));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Committing.can_transition_to(RollingBack));
        assert!(!Inactive.can_transition_to(Committing));
    }

    #[test]
    fn state_names() {
        assert_eq!(RollingBack.to_string(), "rolling back");
        assert_eq!(Closed.to_string(), "closed");
    }
}
