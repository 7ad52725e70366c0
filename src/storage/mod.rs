pub mod catalog;
pub mod memory;
pub mod persistence;
pub mod table;

pub use catalog::Catalog;
pub use memory::InMemoryStorage;
pub use persistence::{DurabilityMode, PersistenceManager, WalEntry};
pub use table::{RowId, Table, TableSchema};
