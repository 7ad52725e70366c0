use crate::connection::StoreConfig;
use crate::core::{DbError, Result, Value};
use crate::statement::{QueryResult, Statement, executor};
use crate::storage::{Catalog, InMemoryStorage, TableSchema};
use crate::storage::{DurabilityMode, PersistenceManager, WalEntry};
use crate::transaction::{Change, TransactionId, TransactionInfo, TransactionManager};
use std::path::Path;
use tracing::{debug, info, warn};

/// The store: tables, their schemas, the pending transaction and the
/// optional on-disk log.
///
/// Every statement runs on behalf of a connection id. While a transaction is
/// open, only the owning connection may run statements; with no transaction
/// open, each mutation commits on its own.
pub struct Database {
    storage: InMemoryStorage,
    /// Copy-on-write; replaced wholesale on every schema change
    catalog: Catalog,
    transactions: TransactionManager,
    persistence: Option<PersistenceManager>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            storage: InMemoryStorage::new(),
            catalog: Catalog::new(),
            transactions: TransactionManager::new(),
            persistence: None,
        }
    }

    /// Build a store from configuration, recovering on-disk state if present
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate().map_err(DbError::ExecutionError)?;

        let mut db = Self::new();
        if let Some(dir) = &config.data_dir {
            if config.durability != DurabilityMode::None {
                db.enable_persistence(dir, config.durability)?;
                if let Some(persistence) = db.persistence.as_mut() {
                    persistence.set_checkpoint_threshold(config.checkpoint_threshold);
                }
            }
        }
        Ok(db)
    }

    /// Enable persistence with write-ahead logging and replay whatever the
    /// directory already holds.
    pub fn enable_persistence<P: AsRef<Path>>(
        &mut self,
        data_dir: P,
        durability_mode: DurabilityMode,
    ) -> Result<()> {
        if self.persistence.is_some() {
            return Err(DbError::ExecutionError(
                "Persistence already enabled".to_string(),
            ));
        }

        std::fs::create_dir_all(data_dir.as_ref())?;
        self.persistence = Some(PersistenceManager::new(data_dir, durability_mode)?);
        self.recover_if_needed()
    }

    pub fn is_persistence_enabled(&self) -> bool {
        self.persistence.is_some()
    }

    pub fn durability_mode(&self) -> Option<DurabilityMode> {
        self.persistence.as_ref().map(|p| p.durability_mode())
    }

    // ========================================================================
    // Schema
    // ========================================================================

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        if let Some(txn) = self.transactions.active_info() {
            return Err(DbError::TransactionError(format!(
                "Cannot change schema while {} is open",
                txn.id
            )));
        }

        // Validate against the catalog before anything is logged
        let catalog = self.catalog.clone().with_table(schema.clone())?;

        if let Some(persistence) = self.persistence.as_mut() {
            persistence.log(&WalEntry::CreateTable {
                schema: schema.clone(),
            })?;
        }

        self.storage.create_table(schema)?;
        self.catalog = catalog;
        self.maybe_checkpoint();
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.catalog.table_exists(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.catalog.list_tables().into_iter().map(|s| s.to_string()).collect()
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        self.storage.row_count(table)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Run a mutation; returns the number of rows affected
    pub fn execute(&mut self, conn: u64, stmt: &Statement, args: &[Value]) -> Result<u64> {
        let in_transaction = self.transactions.check_access(conn)?;
        let (affected, changes) = executor::execute(&mut self.storage, &self.catalog, stmt, args)?;

        if in_transaction {
            self.transactions.record(conn, changes)?;
        } else if !changes.is_empty() {
            self.log_commit(TransactionId::new(), changes)?;
        }
        Ok(affected)
    }

    pub fn query(&self, conn: u64, stmt: &Statement, args: &[Value]) -> Result<QueryResult> {
        self.transactions.check_access(conn)?;
        executor::query(&self.storage, stmt, args)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    pub fn begin(&mut self, conn: u64) -> Result<TransactionId> {
        let id = self.transactions.begin(conn)?;
        debug!(txn = %id, conn, "begin");
        Ok(id)
    }

    /// Make the connection's pending changes durable. If the log write fails
    /// the changes are undone and the error returned.
    pub fn commit(&mut self, conn: u64) -> Result<()> {
        let (id, changes) = self.transactions.commit(conn)?;
        debug!(txn = %id, conn, changes = changes.len(), "commit");
        if changes.is_empty() {
            return Ok(());
        }
        self.log_commit(id, changes)
    }

    pub fn rollback(&mut self, conn: u64) -> Result<()> {
        let (id, changes) = self.transactions.rollback(conn)?;
        debug!(txn = %id, conn, changes = changes.len(), "rollback");
        self.storage.undo(&changes)
    }

    /// Roll back the connection's transaction, if it holds one
    pub fn release(&mut self, conn: u64) -> Result<bool> {
        match self.transactions.active_info() {
            Some(txn) if txn.owner == conn => {
                self.rollback(conn)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn transaction_info(&self) -> Option<TransactionInfo> {
        self.transactions.active_info()
    }

    // ========================================================================
    // Persistence Management
    // ========================================================================

    /// Snapshot every table and truncate the log
    pub fn checkpoint(&mut self) -> Result<()> {
        if let Some(persistence) = self.persistence.as_mut() {
            persistence.checkpoint(self.storage.get_all_tables())?;
        }
        Ok(())
    }

    fn log_commit(&mut self, id: TransactionId, changes: Vec<Change>) -> Result<()> {
        let Some(persistence) = self.persistence.as_mut() else {
            return Ok(());
        };

        let entry = WalEntry::Commit {
            txn_id: id.as_u64(),
            changes: changes.clone(),
        };
        if let Err(err) = persistence.log(&entry) {
            warn!(txn = %id, error = %err, "commit not logged, undoing");
            self.storage.undo(&changes)?;
            return Err(err);
        }

        self.maybe_checkpoint();
        Ok(())
    }

    /// A failed automatic checkpoint leaves the log intact, so it only warns
    fn maybe_checkpoint(&mut self) {
        if let Some(persistence) = self.persistence.as_mut() {
            if persistence.needs_checkpoint() {
                if let Err(err) = persistence.checkpoint(self.storage.get_all_tables()) {
                    warn!(error = %err, "automatic checkpoint failed");
                }
            }
        }
    }

    /// Restore snapshot tables, then replay the log written after it
    fn recover_if_needed(&mut self) -> Result<()> {
        let recovered = match &self.persistence {
            Some(persistence) => persistence.recover()?,
            None => None,
        };
        let Some((tables, entries)) = recovered else {
            return Ok(());
        };

        self.storage.restore_tables(tables);
        self.rebuild_catalog()?;

        let mut replayed = 0usize;
        for entry in entries {
            match entry {
                WalEntry::CreateTable { schema } => {
                    if !self.catalog.table_exists(schema.name()) {
                        self.catalog = self.catalog.clone().with_table(schema.clone())?;
                        self.storage.create_table(schema)?;
                    }
                }
                WalEntry::Commit { changes, .. } => {
                    for change in &changes {
                        self.storage.apply(change)?;
                    }
                    replayed += 1;
                }
            }
        }

        info!(
            tables = self.catalog.list_tables().len(),
            replayed, "database recovered from persistence"
        );
        Ok(())
    }

    fn rebuild_catalog(&mut self) -> Result<()> {
        let mut catalog = Catalog::new();
        for name in self.storage.list_tables() {
            let schema = self.storage.get_table(&name)?.schema().clone();
            catalog = catalog.with_table(schema)?;
        }
        self.catalog = catalog;
        Ok(())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};
    use crate::statement::{Insert, Predicate, Select};

    fn courses() -> TableSchema {
        TableSchema::new(
            "Courses",
            vec![
                Column::new("course_id", DataType::Integer),
                Column::new("course_name", DataType::Text),
            ],
        )
        .primary_key(&["course_id"])
        .unwrap()
    }

    fn add_course() -> Statement {
        Insert::into("Courses", &["course_id", "course_name"]).into()
    }

    fn all_courses() -> Statement {
        Select::from("Courses").order_by("course_id").into()
    }

    #[test]
    fn test_autocommit_without_transaction() {
        let mut db = Database::new();
        db.create_table(courses()).unwrap();
        assert_eq!(db.execute(1, &add_course(), &[1.into(), "Math".into()]).unwrap(), 1);
        assert_eq!(db.row_count("Courses").unwrap(), 1);
    }

    #[test]
    fn test_rollback_undoes_pending_changes() {
        let mut db = Database::new();
        db.create_table(courses()).unwrap();
        db.execute(1, &add_course(), &[1.into(), "Math".into()]).unwrap();

        db.begin(1).unwrap();
        db.execute(1, &add_course(), &[2.into(), "Art".into()]).unwrap();
        assert_eq!(db.query(1, &all_courses(), &[]).unwrap().row_count(), 2);
        db.rollback(1).unwrap();

        assert_eq!(db.query(1, &all_courses(), &[]).unwrap().row_count(), 1);
    }

    #[test]
    fn test_other_connections_are_locked_out() {
        let mut db = Database::new();
        db.create_table(courses()).unwrap();
        db.begin(1).unwrap();
        db.execute(1, &add_course(), &[1.into(), "Math".into()]).unwrap();

        assert!(matches!(
            db.query(2, &all_courses(), &[]),
            Err(DbError::TransactionError(_))
        ));
        assert!(db.execute(2, &add_course(), &[2.into(), "Art".into()]).is_err());

        db.commit(1).unwrap();
        assert_eq!(db.query(2, &all_courses(), &[]).unwrap().row_count(), 1);
    }

    #[test]
    fn test_release_rolls_back_owner_only() {
        let mut db = Database::new();
        db.create_table(courses()).unwrap();
        db.begin(1).unwrap();
        db.execute(1, &add_course(), &[1.into(), "Math".into()]).unwrap();

        assert!(!db.release(2).unwrap());
        assert!(db.release(1).unwrap());
        assert_eq!(db.row_count("Courses").unwrap(), 0);
        assert!(db.transaction_info().is_none());
    }

    #[test]
    fn test_schema_change_inside_transaction_fails() {
        let mut db = Database::new();
        db.begin(1).unwrap();
        assert!(db.create_table(courses()).is_err());
    }

    #[test]
    fn test_recovery_replays_committed_work_only() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = Database::open(&StoreConfig::persistent(dir.path())).unwrap();
            db.create_table(courses()).unwrap();
            db.execute(1, &add_course(), &[1.into(), "Math".into()]).unwrap();

            db.begin(1).unwrap();
            db.execute(1, &add_course(), &[2.into(), "Art".into()]).unwrap();
            db.commit(1).unwrap();

            db.begin(1).unwrap();
            db.execute(1, &add_course(), &[3.into(), "Lost".into()]).unwrap();
            // dropped with the transaction still open
        }

        let db = Database::open(&StoreConfig::persistent(dir.path())).unwrap();
        assert!(db.table_exists("Courses"));
        let lookup: Statement = Select::from("Courses")
            .filter(Predicate::eq("course_id", 0))
            .into();
        assert_eq!(db.query(1, &lookup, &[2.into()]).unwrap().row_count(), 1);
        assert_eq!(db.query(1, &lookup, &[3.into()]).unwrap().row_count(), 0);
        assert_eq!(db.row_count("Courses").unwrap(), 2);
    }

    #[test]
    fn test_recovery_after_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = Database::open(&StoreConfig::persistent(dir.path())).unwrap();
            db.create_table(courses()).unwrap();
            db.execute(1, &add_course(), &[1.into(), "Math".into()]).unwrap();
            db.checkpoint().unwrap();
            db.execute(1, &add_course(), &[2.into(), "Art".into()]).unwrap();
        }

        let db = Database::open(&StoreConfig::persistent(dir.path())).unwrap();
        assert_eq!(db.row_count("Courses").unwrap(), 2);
    }
}
