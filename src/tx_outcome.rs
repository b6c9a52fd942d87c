use crate::error::TxAction;

/// Outcome returned by committing or rolling back a transaction.
///
/// By the time a caller sees one, the connection has been released with its autocommit mode
/// restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    action: TxAction,
    savepoints: u32,
}

impl TxOutcome {
    pub(crate) fn new(action: TxAction, savepoints: u32) -> Self {
        Self { action, savepoints }
    }

    /// Which end of the transaction ran.
    #[must_use]
    pub fn action(&self) -> TxAction {
        self.action
    }

    #[must_use]
    pub fn committed(&self) -> bool {
        self.action == TxAction::Commit
    }

    /// Savepoints created over the transaction's lifetime.
    #[must_use]
    pub fn savepoints(&self) -> u32 {
        self.savepoints
    }
}
