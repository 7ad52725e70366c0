use crate::core::{Column, DbError, ForeignKey, Result, Row, Schema, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type RowId = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<RowId, Row>,
    next_row_id: RowId,
    /// Primary key -> row id. Rebuilt after deserialization.
    #[serde(skip)]
    key_index: BTreeMap<Vec<Value>, RowId>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            key_index: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        let id = self.next_row_id;
        self.insert_at(id, row)?;
        Ok(id)
    }

    /// Insert a row under a known id (rollback of a delete, log replay)
    pub fn insert_at(&mut self, id: RowId, row: Row) -> Result<()> {
        self.validate_row(&row)?;
        if self.rows.contains_key(&id) {
            return Err(DbError::ExecutionError(format!(
                "Row {} already present in table '{}'",
                id, self.schema.name
            )));
        }
        let key = self.key_of(&row);
        if let Some(key) = &key {
            self.check_key_free(key, None)?;
        }

        if let Some(key) = key {
            self.key_index.insert(key, id);
        }
        self.rows.insert(id, row);
        self.next_row_id = self.next_row_id.max(id + 1);
        Ok(())
    }

    /// Replace a row in place, returning the previous version
    pub fn update(&mut self, id: RowId, new_row: Row) -> Result<Row> {
        self.validate_row(&new_row)?;
        let new_key = self.key_of(&new_row);
        if let Some(key) = &new_key {
            self.check_key_free(key, Some(id))?;
        }

        let old_row = self.rows.get(&id).cloned().ok_or_else(|| {
            DbError::ExecutionError(format!(
                "Row {} not found in table '{}'",
                id, self.schema.name
            ))
        })?;

        if let Some(old_key) = self.key_of(&old_row) {
            self.key_index.remove(&old_key);
        }
        if let Some(key) = new_key {
            self.key_index.insert(key, id);
        }
        self.rows.insert(id, new_row);
        Ok(old_row)
    }

    pub fn delete(&mut self, id: RowId) -> Option<Row> {
        let row = self.rows.remove(&id)?;
        if let Some(key) = self.key_of(&row) {
            self.key_index.remove(&key);
        }
        Some(row)
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn scan(&self) -> impl Iterator<Item = (RowId, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    /// Find the row whose primary key equals `key`
    pub fn find_by_key(&self, key: &[Value]) -> Option<RowId> {
        self.key_index.get(key).copied()
    }

    /// Row ids whose `column` equals `value`. Linear scan; the tables are small.
    pub fn find_by_column(&self, column: usize, value: &Value) -> Vec<RowId> {
        self.rows
            .iter()
            .filter(|(_, row)| &row[column] == value)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rebuild_index(&mut self) {
        let mut index = BTreeMap::new();
        for (id, row) in &self.rows {
            if let Some(key) = self.key_of(row) {
                index.insert(key, *id);
            }
        }
        self.key_index = index;
    }

    fn key_of(&self, row: &Row) -> Option<Vec<Value>> {
        if self.schema.key_positions.is_empty() {
            return None;
        }
        Some(
            self.schema
                .key_positions
                .iter()
                .map(|&idx| row[idx].clone())
                .collect(),
        )
    }

    fn check_key_free(&self, key: &[Value], ignore: Option<RowId>) -> Result<()> {
        match self.key_index.get(key) {
            Some(existing) if Some(*existing) != ignore => {
                let rendered: Vec<String> = key.iter().map(|v| v.to_string()).collect();
                Err(DbError::ConstraintViolation(format!(
                    "Duplicate primary key ({}) in table '{}'",
                    rendered.join(", "),
                    self.schema.name
                )))
            }
            _ => Ok(()),
        }
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(DbError::ExecutionError(format!(
                "Expected {} columns, got {}",
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
    primary_key: Vec<String>,
    key_positions: Vec<usize>,
    foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
            primary_key: Vec::new(),
            key_positions: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Declare the primary key. Key columns become NOT NULL.
    pub fn primary_key(mut self, columns: &[&str]) -> Result<Self> {
        let mut positions = Vec::with_capacity(columns.len());
        for name in columns {
            let idx = self.column_index(name)?;
            positions.push(idx);
        }
        let mut cols = self.schema.columns().to_vec();
        for &idx in &positions {
            cols[idx].nullable = false;
        }
        self.schema = Schema::new(cols);
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self.key_positions = positions;
        Ok(self)
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Result<Self> {
        self.column_index(&fk.column)?;
        self.foreign_keys.push(fk);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema
            .find_column_index(column)
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string(), self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    fn people() -> Table {
        let schema = TableSchema::new(
            "people",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::Text),
            ],
        )
        .primary_key(&["id"])
        .unwrap();
        Table::new(schema)
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut table = people();
        table.insert(vec![Value::Integer(1), "Amy".into()]).unwrap();
        let err = table.insert(vec![Value::Integer(1), "Bob".into()]).unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_key_column_is_not_null() {
        let mut table = people();
        assert!(table.insert(vec![Value::Null, "Amy".into()]).is_err());
    }

    #[test]
    fn test_update_moves_key() {
        let mut table = people();
        let id = table.insert(vec![Value::Integer(1), "Amy".into()]).unwrap();
        let old = table.update(id, vec![Value::Integer(2), "Amy".into()]).unwrap();
        assert_eq!(old[0], Value::Integer(1));
        assert_eq!(table.find_by_key(&[Value::Integer(1)]), None);
        assert_eq!(table.find_by_key(&[Value::Integer(2)]), Some(id));
    }

    #[test]
    fn test_delete_and_reinsert_at_same_id() {
        let mut table = people();
        let id = table.insert(vec![Value::Integer(1), "Amy".into()]).unwrap();
        let row = table.delete(id).unwrap();
        assert_eq!(table.row_count(), 0);
        table.insert_at(id, row).unwrap();
        assert_eq!(table.find_by_key(&[Value::Integer(1)]), Some(id));
    }

    #[test]
    fn test_rebuild_index_after_roundtrip() {
        let mut table = people();
        table.insert(vec![Value::Integer(7), "Amy".into()]).unwrap();
        let bytes = rmp_serde::to_vec(&table).unwrap();
        let mut restored: Table = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(restored.find_by_key(&[Value::Integer(7)]), None);
        restored.rebuild_index();
        assert!(restored.find_by_key(&[Value::Integer(7)]).is_some());
    }
}
