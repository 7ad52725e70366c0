//! Write-ahead log and snapshots for the registry store.
//!
//! Only committed work reaches disk: a transaction's change list is appended
//! as one `Commit` entry when the caller commits. Uncommitted changes live in
//! memory and are simply undone on rollback.

use crate::core::{DbError, Result};
use crate::storage::table::{Table, TableSchema};
use crate::transaction::Change;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const WAL_FILE: &str = "campusdb.wal";
const SNAPSHOT_FILE: &str = "campusdb.snapshot";

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    CreateTable { schema: TableSchema },
    Commit { txn_id: u64, changes: Vec<Change> },
}

// ============================================================================
// Database Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: u32,
    /// Creation order, parents first
    pub tables: Vec<Table>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub row_count: usize,
    pub table_count: usize,
}

impl DatabaseSnapshot {
    pub fn new(tables: Vec<Table>) -> Self {
        let row_count = tables.iter().map(|t| t.row_count()).sum();
        let table_count = tables.len();

        Self {
            version: 1,
            tables,
            metadata: SnapshotMetadata {
                created_at: chrono::Utc::now(),
                row_count,
                table_count,
            },
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every commit
    Sync,
    /// flush to the OS after every commit
    #[default]
    Async,
    /// keep nothing on disk
    None,
}

impl std::fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Async => write!(f, "async"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for DurabilityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" => Ok(Self::None),
            other => Err(format!("Unknown durability mode '{}'", other)),
        }
    }
}

// ============================================================================
// WAL Manager
// ============================================================================

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<BufWriter<File>>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DbError::IoError(format!("Failed to create WAL directory: {}", e))
            })?;
        }

        let wal_file = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&wal_path)
                .map_err(|e| DbError::IoError(format!("Failed to open WAL file: {}", e)))?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: 1000,
        })
    }

    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| DbError::IoError("WAL file not initialized".to_string()))?;
        let serialized = rmp_serde::to_vec(entry)
            .map_err(|e| DbError::IoError(format!("Failed to serialize WAL entry: {}", e)))?;
        let len = serialized.len() as u32;
        file.write_all(&len.to_le_bytes())
            .map_err(|e| DbError::IoError(format!("Failed to write WAL: {}", e)))?;
        file.write_all(&serialized)
            .map_err(|e| DbError::IoError(format!("Failed to write WAL: {}", e)))?;
        file.flush()
            .map_err(|e| DbError::IoError(format!("Failed to flush WAL: {}", e)))?;
        if self.durability_mode == DurabilityMode::Sync {
            file.get_mut()
                .sync_all()
                .map_err(|e| DbError::IoError(format!("Failed to sync WAL: {}", e)))?;
        }
        self.entries_since_checkpoint += 1;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        if !self.wal_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.wal_path)
            .map_err(|e| DbError::IoError(format!("Failed to open WAL for reading: {}", e)))?;
        let mut remaining = file
            .metadata()
            .map_err(|e| DbError::IoError(format!("Failed to stat WAL: {}", e)))?
            .len();
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(DbError::IoError(format!(
                        "Failed to read WAL entry length: {}",
                        e
                    )));
                }
            }
            remaining = remaining.saturating_sub(4);
            let len = u32::from_le_bytes(len_bytes) as u64;
            // The prefix can never claim more than the file still holds
            if len > remaining {
                tracing::warn!(
                    path = %self.wal_path.display(),
                    len,
                    remaining,
                    "WAL entry length exceeds file, ignoring tail"
                );
                break;
            }
            remaining -= len;
            let mut data = vec![0u8; len as usize];
            if let Err(e) = reader.read_exact(&mut data) {
                // A torn tail means the last commit never finished writing
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    tracing::warn!(path = %self.wal_path.display(), "ignoring truncated WAL tail");
                    break;
                }
                return Err(DbError::IoError(format!(
                    "Failed to read WAL entry data: {}",
                    e
                )));
            }
            let entry: WalEntry = rmp_serde::from_slice(&data).map_err(|e| {
                DbError::IoError(format!("Failed to deserialize WAL entry: {}", e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.wal_file = None;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.wal_path)
            .map_err(|e| DbError::IoError(format!("Failed to truncate WAL: {}", e)))?;
        drop(file);
        let file = OpenOptions::new()
            .append(true)
            .open(&self.wal_path)
            .map_err(|e| DbError::IoError(format!("Failed to reopen WAL: {}", e)))?;
        self.wal_file = Some(BufWriter::new(file));
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold;
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Write the snapshot to a temp file in the same directory, then rename
    /// it over the previous one.
    pub fn save(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let dir = self
            .snapshot_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir).map_err(|e| {
            DbError::IoError(format!("Failed to create snapshot directory: {}", e))
        })?;

        let serialized = rmp_serde::to_vec(snapshot)
            .map_err(|e| DbError::IoError(format!("Failed to serialize snapshot: {}", e)))?;
        let mut temp = NamedTempFile::new_in(&dir)
            .map_err(|e| DbError::IoError(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&serialized)
            .map_err(|e| DbError::IoError(format!("Failed to write snapshot: {}", e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| DbError::IoError(format!("Failed to sync snapshot: {}", e)))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| DbError::IoError(format!("Failed to rename snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<DatabaseSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)
            .map_err(|e| DbError::IoError(format!("Failed to open snapshot: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| DbError::IoError(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: DatabaseSnapshot = rmp_serde::from_slice(&data)
            .map_err(|e| DbError::IoError(format!("Failed to deserialize snapshot: {}", e)))?;
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE));
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
        })
    }

    pub fn log(&mut self, entry: &WalEntry) -> Result<()> {
        self.wal.append(entry)
    }

    pub fn checkpoint(&mut self, tables: Vec<Table>) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let snapshot = DatabaseSnapshot::new(tables);
        self.snapshot.save(&snapshot)?;
        self.wal.clear()?;
        tracing::debug!(
            tables = snapshot.metadata.table_count,
            rows = snapshot.metadata.row_count,
            "checkpoint written"
        );
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.wal.set_checkpoint_threshold(threshold);
    }

    /// Snapshot tables plus the log entries written after it, or `None` for
    /// a fresh data directory.
    pub fn recover(&self) -> Result<Option<(Vec<Table>, Vec<WalEntry>)>> {
        let tables = match self.snapshot.load()? {
            Some(snapshot) => snapshot.tables,
            None => Vec::new(),
        };
        let wal_entries = self.wal.read_all()?;
        if tables.is_empty() && wal_entries.is_empty() {
            return Ok(None);
        }
        Ok(Some((tables, wal_entries)))
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.snapshot
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}
