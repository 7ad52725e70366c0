use crate::core::{Result, Value};
use crate::statement::{QueryResult, Statement};
use async_trait::async_trait;

/// A transactional handle to the record store.
///
/// The registry is written against this trait only, so it runs the same over
/// a local `Connection` or any other store that can execute parameterized
/// statements inside an explicit transaction.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Run a statement that modifies data; returns the number of affected rows
    async fn execute(&self, stmt: &Statement, args: &[Value]) -> Result<u64>;

    /// Run a statement that returns rows
    async fn query(&self, stmt: &Statement, args: &[Value]) -> Result<QueryResult>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;
}
