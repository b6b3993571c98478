//! Engine Module
//!
//! The embedded ordered key-value engine that every store is built on.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access
//! - Apply multi-key batches atomically
//! - Ordered key scans in both directions
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::scan::{Direction, KeySource, MergedKeys};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// A set of writes applied as one unit
///
/// The whole batch is one WAL frame and is applied to the MemTable under a
/// single write guard: after a crash either every operation is replayed or
/// none is, and readers never observe half of it.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.ops.push(Operation::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue a delete
    pub fn delete(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.ops.push(Operation::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn into_operation(self) -> Operation {
        Operation::Batch { ops: self.ops }
    }
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/write/flush): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Must acquire: write_lock → WAL → memtable → storage (write)
///
/// - **Reads** (get/scan_keys): Concurrent at MemTable level
///   - No write_lock needed
///   - MemTable uses internal RwLock (many concurrent readers)
///   - Point lookups in SSTables take the storage write lock
///     (SSTableReader::get needs &mut self for file seeking);
///     key scans only need the shared lock (served from in-memory indexes)
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations (put/delete/write/flush)
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush recovered entries, reset WAL
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        // Paths are derived from data_dir, not configurable
        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        fs::create_dir_all(&storage_dir)?;

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let mut recovered = false;
        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_corrupted > 0 {
                warn!(
                    wal = %wal_path.display(),
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery dropped corrupted tail"
                );
            } else if recovery.entries_recovered > 0 {
                info!(
                    wal = %wal_path.display(),
                    recovered = recovery.entries_recovered,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }

            for entry in entries {
                memtable.apply(entry.operation);
            }

            // Make recovered data durable in an SSTable before the WAL is reset
            if !memtable.is_empty() {
                debug!(entries = memtable.entry_count(), "flushing recovered entries");
                storage.flush(&memtable)?;
                memtable.clear();
                recovered = true;
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if recovered {
            wal.truncate()?;
        }

        debug!(
            data_dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            "engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::default().with_data_dir(path))
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }

        self.storage.get(key)
    }

    /// True when the key holds a live value
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        match self.memtable.get(key) {
            Some(MemTableEntry::Value(_)) => Ok(true),
            Some(MemTableEntry::Tombstone) => Ok(false),
            None => Ok(matches!(
                self.storage.lookup(key)?,
                Some(MemTableEntry::Value(_))
            )),
        }
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.apply(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key (writes a tombstone)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.apply(Operation::Delete { key: key.to_vec() })
    }

    /// Apply a batch atomically
    pub fn write(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.apply(batch.into_operation())
    }

    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to WAL (durability)
    /// 3. Write to MemTable
    /// 4. Check if flush needed
    fn apply(&self, operation: Operation) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(operation.clone())?;

        let new_size = self.memtable.apply(operation);

        if new_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Collect up to `limit` live keys strictly after (`Forward`) or before
    /// (`Backward`) `from`, in scan order
    ///
    /// `from = None` starts at the first (or last) key. Keys for which `skip`
    /// returns true are passed over and do not count toward `limit`.
    pub fn scan_keys<F>(
        &self,
        from: Option<&[u8]>,
        direction: Direction,
        limit: usize,
        skip: F,
    ) -> Result<Vec<Vec<u8>>>
    where
        F: Fn(&[u8]) -> bool,
    {
        let mut keys = Vec::new();
        if limit == 0 {
            return Ok(keys);
        }

        let memtable = self.memtable.read();
        let sstables = self.storage.read();

        // Newest first: memtable, then SSTables newest → oldest
        let mut sources: Vec<KeySource<'_>> = Vec::with_capacity(sstables.len() + 1);
        sources.push(memtable.keys(from, direction));
        for reader in sstables.iter() {
            sources.push(reader.keys(from, direction));
        }

        let mut merged = MergedKeys::new(sources, direction);
        while let Some(key) = merged.next_live() {
            if skip(key) {
                continue;
            }
            keys.push(key.to_vec());
            if keys.len() == limit {
                break;
            }
        }

        Ok(keys)
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in an SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        debug!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
