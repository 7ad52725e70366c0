// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every row mutation is recorded as a Change carrying enough of the old state
// to be reversed. Rollback applies inverses newest-first; commit hands the
// same list to the write-ahead log.
//
// ============================================================================

use crate::core::Row;
use crate::storage::RowId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Change {
    InsertRow {
        table: String,
        row_id: RowId,
        row: Row,
    },

    UpdateRow {
        table: String,
        row_id: RowId,
        old_row: Row,
        new_row: Row,
    },

    DeleteRow {
        table: String,
        row_id: RowId,
        old_row: Row,
    },
}

impl Change {
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }

    pub fn row_id(&self) -> RowId {
        match self {
            Change::InsertRow { row_id, .. }
            | Change::UpdateRow { row_id, .. }
            | Change::DeleteRow { row_id, .. } => *row_id,
        }
    }

    /// The change that undoes this one
    pub fn inverse(&self) -> Change {
        match self {
            Change::InsertRow { table, row_id, row } => Change::DeleteRow {
                table: table.clone(),
                row_id: *row_id,
                old_row: row.clone(),
            },
            Change::UpdateRow {
                table,
                row_id,
                old_row,
                new_row,
            } => Change::UpdateRow {
                table: table.clone(),
                row_id: *row_id,
                old_row: new_row.clone(),
                new_row: old_row.clone(),
            },
            Change::DeleteRow {
                table,
                row_id,
                old_row,
            } => Change::InsertRow {
                table: table.clone(),
                row_id: *row_id,
                row: old_row.clone(),
            },
        }
    }
}
