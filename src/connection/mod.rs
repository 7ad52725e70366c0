pub mod config;

use crate::core::{DbError, Result, Value};
use crate::facade::Database;
use crate::interface::StoreGateway;
use crate::statement::{QueryResult, Statement};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub use config::StoreConfig;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Database connection handle
///
/// Several connections may share one `Database`; while one of them holds an
/// open transaction the others are refused until it commits or rolls back.
pub struct Connection {
    /// Unique connection ID
    id: u64,
    /// Shared database instance
    db: Arc<RwLock<Database>>,
    state: ConnectionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

impl Connection {
    /// Open a fresh store from configuration and connect to it
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let db = Database::open(config)?;
        Ok(Self::new(Arc::new(RwLock::new(db))))
    }

    /// Connect to an existing shared store
    pub fn new(db: Arc<RwLock<Database>>) -> Self {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst);
        debug!(conn = id, "connection opened");
        Self {
            id,
            db,
            state: ConnectionState::Active,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The shared store, for opening further connections to it
    pub fn database(&self) -> Arc<RwLock<Database>> {
        Arc::clone(&self.db)
    }

    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == ConnectionState::InTransaction
    }

    /// Close the connection, rolling back any open transaction.
    /// Every later statement fails with `DbError::ConnectionClosed`.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        if self.state == ConnectionState::InTransaction {
            self.db.write().await.rollback(self.id)?;
        }
        self.state = ConnectionState::Closed;
        debug!(conn = self.id, "connection closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(DbError::ConnectionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreGateway for Connection {
    async fn execute(&self, stmt: &Statement, args: &[Value]) -> Result<u64> {
        self.ensure_open()?;
        self.db.write().await.execute(self.id, stmt, args)
    }

    async fn query(&self, stmt: &Statement, args: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        self.db.read().await.query(self.id, stmt, args)
    }

    async fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state == ConnectionState::InTransaction {
            return Err(DbError::TransactionError(
                "Transaction already active".into(),
            ));
        }
        self.db.write().await.begin(self.id)?;
        self.state = ConnectionState::InTransaction;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state != ConnectionState::InTransaction {
            return Err(DbError::TransactionError("No active transaction".into()));
        }
        // The transaction is over whether or not the log write succeeded
        self.state = ConnectionState::Active;
        self.db.write().await.commit(self.id)
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state != ConnectionState::InTransaction {
            return Err(DbError::TransactionError("No active transaction".into()));
        }
        self.state = ConnectionState::Active;
        self.db.write().await.rollback(self.id)
    }

    fn in_transaction(&self) -> bool {
        self.is_in_transaction()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state != ConnectionState::InTransaction {
            return;
        }
        // Drop cannot await: roll back now if the store is free, otherwise
        // hand the release to the runtime or block for the lock.
        let id = self.id;
        match self.db.try_write() {
            Ok(mut db) => {
                if let Err(err) = db.rollback(id) {
                    warn!(conn = id, error = %err, "rollback on drop failed");
                }
            }
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let db = Arc::clone(&self.db);
                    handle.spawn(async move {
                        if let Err(err) = db.write().await.release(id) {
                            warn!(conn = id, error = %err, "deferred rollback failed");
                        }
                    });
                    debug!(conn = id, "store busy on drop, rollback scheduled");
                }
                Err(_) => {
                    if let Err(err) = self.db.blocking_write().release(id) {
                        warn!(conn = id, error = %err, "rollback on drop failed");
                    }
                }
            },
        }
    }
}
