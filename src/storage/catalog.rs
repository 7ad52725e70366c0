use super::TableSchema;
use crate::core::{DbError, ForeignKey, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Table metadata only. Cloning is cheap; changes produce a new Catalog
/// (copy-on-write) so readers never observe a half-registered table.
#[derive(Clone, Default)]
pub struct Catalog {
    tables: Arc<HashMap<String, TableSchema>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, schema: TableSchema) -> Result<Self> {
        let name = schema.name().to_string();

        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        for fk in schema.foreign_keys() {
            // Self-references are resolved against the schema being added
            let parent = if fk.parent_table == name {
                &schema
            } else {
                self.get_table(&fk.parent_table)?
            };
            parent.column_index(&fk.parent_column)?;
        }

        let mut new_tables = (*self.tables).clone();
        new_tables.insert(name, schema);

        Ok(Self {
            tables: Arc::new(new_tables),
        })
    }

    pub fn get_table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Every (child table, foreign key) pair that points at `parent`
    pub fn referencing(&self, parent: &str) -> Vec<(String, ForeignKey)> {
        let mut refs: Vec<(String, ForeignKey)> = self
            .tables
            .values()
            .flat_map(|schema| {
                schema
                    .foreign_keys()
                    .iter()
                    .filter(|fk| fk.parent_table == parent)
                    .map(|fk| (schema.name().to_string(), fk.clone()))
            })
            .collect();
        refs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.column.cmp(&b.1.column)));
        refs
    }
}
