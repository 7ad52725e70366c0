use super::{Catalog, RowId, Table, TableSchema};
use crate::core::{DbError, OnDelete, Result, Row, Value};
use crate::transaction::Change;
use std::collections::HashMap;

/// Row storage for every table.
///
/// Mutations run against the live tables immediately and return the `Change`
/// records they produced, cascades included. A mutation that fails part way
/// undoes its own partial work before returning the error, so a statement is
/// all-or-nothing even though the enclosing transaction is not yet decided.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: HashMap<String, Table>,
    /// Creation order; parents always precede the tables that reference them
    order: Vec<String>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();

        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        self.tables.insert(name.clone(), Table::new(schema));
        self.order.push(name);
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.get_table(table)?.row_count())
    }

    pub fn scan(&self, table: &str) -> Result<Vec<(RowId, Row)>> {
        Ok(self
            .get_table(table)?
            .scan()
            .map(|(id, row)| (id, row.clone()))
            .collect())
    }

    // ------------------------------------------------------------------
    // Constraint-checked mutations
    // ------------------------------------------------------------------

    pub fn insert(&mut self, catalog: &Catalog, table: &str, row: Row) -> Result<Vec<Change>> {
        self.check_parents(catalog, table, &row)?;
        let row_id = self.table_mut(table)?.insert(row.clone())?;
        Ok(vec![Change::InsertRow {
            table: table.to_string(),
            row_id,
            row,
        }])
    }

    pub fn update(
        &mut self,
        catalog: &Catalog,
        table: &str,
        row_id: RowId,
        new_row: Row,
    ) -> Result<Vec<Change>> {
        self.check_parents(catalog, table, &new_row)?;
        let old_row = self.table_mut(table)?.update(row_id, new_row.clone())?;
        Ok(vec![Change::UpdateRow {
            table: table.to_string(),
            row_id,
            old_row,
            new_row,
        }])
    }

    /// Delete a row and apply the declared ON DELETE actions of every
    /// foreign key that references it.
    pub fn delete(&mut self, catalog: &Catalog, table: &str, row_id: RowId) -> Result<Vec<Change>> {
        let mut changes = Vec::new();
        match self.delete_recursive(catalog, table, row_id, &mut changes) {
            Ok(()) => Ok(changes),
            Err(err) => {
                self.undo(&changes)?;
                Err(err)
            }
        }
    }

    fn delete_recursive(
        &mut self,
        catalog: &Catalog,
        table: &str,
        row_id: RowId,
        changes: &mut Vec<Change>,
    ) -> Result<()> {
        let row = match self.get_table(table)?.get(row_id) {
            Some(row) => row.clone(),
            None => return Ok(()),
        };
        let schema = catalog.get_table(table)?;

        for (child_table, fk) in catalog.referencing(table) {
            let parent_idx = schema.column_index(&fk.parent_column)?;
            let key = &row[parent_idx];
            if key.is_null() {
                continue;
            }

            let child = self.get_table(&child_table)?;
            let child_idx = child.schema().column_index(&fk.column)?;
            let dependents = child.find_by_column(child_idx, key);
            if dependents.is_empty() {
                continue;
            }

            match fk.on_delete {
                OnDelete::Restrict => {
                    return Err(DbError::ConstraintViolation(format!(
                        "Delete from '{}' violates foreign key constraint on '{}.{}'",
                        table, child_table, fk.column
                    )));
                }
                OnDelete::Cascade => {
                    for dependent in dependents {
                        self.delete_recursive(catalog, &child_table, dependent, changes)?;
                    }
                }
                OnDelete::SetNull => {
                    let child = self.table_mut(&child_table)?;
                    for dependent in dependents {
                        let Some(current) = child.get(dependent).cloned() else {
                            continue;
                        };
                        let mut cleared = current.clone();
                        cleared[child_idx] = Value::Null;
                        child.update(dependent, cleared.clone())?;
                        changes.push(Change::UpdateRow {
                            table: child_table.clone(),
                            row_id: dependent,
                            old_row: current,
                            new_row: cleared,
                        });
                    }
                }
            }
        }

        if let Some(old_row) = self.table_mut(table)?.delete(row_id) {
            changes.push(Change::DeleteRow {
                table: table.to_string(),
                row_id,
                old_row,
            });
        }
        Ok(())
    }

    fn check_parents(&self, catalog: &Catalog, table: &str, row: &Row) -> Result<()> {
        let schema = catalog.get_table(table)?;
        for fk in schema.foreign_keys() {
            let idx = schema.column_index(&fk.column)?;
            let Some(value) = row.get(idx) else {
                return Err(DbError::ExecutionError(format!(
                    "Row for '{}' is missing column '{}'",
                    table, fk.column
                )));
            };
            if value.is_null() {
                continue;
            }

            let parent = self.get_table(&fk.parent_table)?;
            let parent_idx = parent.schema().column_index(&fk.parent_column)?;
            if parent.find_by_column(parent_idx, value).is_empty() {
                return Err(DbError::ConstraintViolation(format!(
                    "'{}.{}' references non-existent key {} in '{}'",
                    table, fk.column, value, fk.parent_table
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw change application (rollback, log replay)
    // ------------------------------------------------------------------

    /// Apply a change exactly as recorded, without constraint cascades
    pub fn apply(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::InsertRow { table, row_id, row } => {
                self.table_mut(table)?.insert_at(*row_id, row.clone())
            }
            Change::UpdateRow {
                table,
                row_id,
                new_row,
                ..
            } => self.table_mut(table)?.update(*row_id, new_row.clone()).map(|_| ()),
            Change::DeleteRow { table, row_id, .. } => {
                self.table_mut(table)?.delete(*row_id);
                Ok(())
            }
        }
    }

    /// Reverse a list of changes, newest first
    pub fn undo(&mut self, changes: &[Change]) -> Result<()> {
        for change in changes.iter().rev() {
            self.apply(&change.inverse())?;
        }
        Ok(())
    }

    /// Copy of every table in creation order (for snapshots)
    pub fn get_all_tables(&self) -> Vec<Table> {
        self.order
            .iter()
            .filter_map(|name| self.tables.get(name).cloned())
            .collect()
    }

    /// Replace all tables (recovery)
    pub fn restore_tables(&mut self, tables: Vec<Table>) {
        self.tables.clear();
        self.order.clear();
        for mut table in tables {
            table.rebuild_index();
            let name = table.schema().name().to_string();
            self.order.push(name.clone());
            self.tables.insert(name, table);
        }
    }
}
