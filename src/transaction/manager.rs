// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Change, Transaction, TransactionId, TransactionState};
use crate::core::{DbError, Result};

/// Tracks the single pending transaction of the store.
///
/// At most one transaction is open at a time. While it is open only its
/// owning connection may read or write, so no other caller ever observes
/// uncommitted rows.
#[derive(Default)]
pub struct TransactionManager {
    active: Option<Transaction>,
    committed: u64,
    aborted: u64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, owner: u64) -> Result<TransactionId> {
        if let Some(txn) = &self.active {
            return Err(DbError::TransactionError(if txn.owner() == owner {
                format!("Transaction {} already active on this connection", txn.id())
            } else {
                format!("Store is locked by transaction {}", txn.id())
            }));
        }

        let id = TransactionId::new();
        self.active = Some(Transaction::new(id, owner));
        Ok(id)
    }

    /// `Ok(true)` when `owner` holds the open transaction, `Ok(false)` when no
    /// transaction is open, error when another connection holds it.
    pub fn check_access(&self, owner: u64) -> Result<bool> {
        match &self.active {
            None => Ok(false),
            Some(txn) if txn.owner() == owner => Ok(true),
            Some(txn) => Err(DbError::TransactionError(format!(
                "Store is locked by transaction {}",
                txn.id()
            ))),
        }
    }

    pub fn record(&mut self, owner: u64, changes: Vec<Change>) -> Result<()> {
        let txn = self.owned_mut(owner)?;
        txn.record_changes(changes)
    }

    pub fn commit(&mut self, owner: u64) -> Result<(TransactionId, Vec<Change>)> {
        let txn = self.owned_mut(owner)?;
        let changes = txn.commit()?;
        let id = txn.id();
        self.active = None;
        self.committed += 1;
        Ok((id, changes))
    }

    /// Close the transaction and return its changes; the caller undoes them
    pub fn rollback(&mut self, owner: u64) -> Result<(TransactionId, Vec<Change>)> {
        let txn = self.owned_mut(owner)?;
        let changes = txn.rollback()?;
        let id = txn.id();
        self.active = None;
        self.aborted += 1;
        Ok((id, changes))
    }

    pub fn active_info(&self) -> Option<TransactionInfo> {
        self.active.as_ref().map(|txn| TransactionInfo {
            id: txn.id(),
            owner: txn.owner(),
            state: txn.state(),
            change_count: txn.change_count(),
            duration: txn.duration(),
        })
    }

    pub fn committed_count(&self) -> u64 {
        self.committed
    }

    pub fn aborted_count(&self) -> u64 {
        self.aborted
    }

    fn owned_mut(&mut self, owner: u64) -> Result<&mut Transaction> {
        match self.active.as_mut() {
            Some(txn) if txn.owner() == owner => Ok(txn),
            Some(txn) => Err(DbError::TransactionError(format!(
                "Transaction {} belongs to another connection",
                txn.id()
            ))),
            None => Err(DbError::TransactionError("No active transaction".into())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub id: TransactionId,
    pub owner: u64,
    pub state: TransactionState,
    pub change_count: usize,
    pub duration: std::time::Duration,
}
