// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Undo-log transactions over the in-memory store:
// - State Pattern: Transaction lifecycle (Active, Committed, Aborted)
// - Command Pattern: every row change is recorded with its inverse
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::{TransactionInfo, TransactionManager};
pub use state::{Transaction, TransactionId, TransactionState};
