//! Storage Manager
//!
//! Owns the SSTables of one engine directory. Tables are numbered
//! `sstable_<id>.sst`; a higher id is a newer table, and readers are kept
//! newest first so the first hit for a key is its latest version.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::error::{FolioError, Result};
use crate::memtable::{MemTable, MemTableEntry};

use super::sstable::TEMP_SUFFIX;
use super::{SSTable, SSTableBuilder, SSTableReader};

const SSTABLE_PREFIX: &str = "sstable_";
const SSTABLE_EXTENSION: &str = "sst";

/// SSTables of one directory
///
/// Readers sit behind a `RwLock`: scans share it, point lookups and flushes
/// take it exclusively (a lookup seeks the reader's file handle). Table ids
/// come from an atomic counter.
pub struct StorageManager {
    data_dir: PathBuf,
    /// Newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open the directory, creating it when missing
    ///
    /// Leftover `.tmp` files from an interrupted flush are removed. Every
    /// table is checked against its data CRC before use.
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if is_temp_file(&file_path) {
                warn!(file = %file_path.display(), "removing unfinished sstable");
                fs::remove_file(&file_path)?;
            } else if let Some(id) = parse_sstable_id(&file_path) {
                ids.push(id);
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(ids.len());
        for &id in &ids {
            let mut reader = SSTableReader::open(&sstable_path(path, id))?;
            reader.verify()?;
            sstables.push(reader);
        }

        let next_id = ids.first().map_or(1, |&id| id + 1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Newest version of `key` across all tables
    ///
    /// `Some(Tombstone)` when the newest version is a delete, `None` when no
    /// table has the key.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut().filter(|r| r.might_contain(key)) {
            if let Some(entry) = reader.get(key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Live value of `key`; `None` when absent or deleted
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.lookup(key)?.and_then(MemTableEntry::into_value))
    }

    /// Shared access to the readers (newest first) for key scans
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<SSTableReader>> {
        self.sstables.read()
    }

    /// Write `memtable` out as the newest table
    ///
    /// Fails on an empty MemTable. The caller clears the MemTable afterwards.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(FolioError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = sstable_path(&self.data_dir, id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        let metadata = builder.finish()?;
        debug!(
            sstable = %path.display(),
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "flushed memtable"
        );

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, reader);

        Ok(metadata)
    }

    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Id the next flushed table will get
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }
}

fn sstable_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{:06}.{}", SSTABLE_PREFIX, id, SSTABLE_EXTENSION))
}

/// "sstable_000042.sst" → Some(42)
fn parse_sstable_id(path: &Path) -> Option<u64> {
    if path.extension()? != SSTABLE_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(SSTABLE_PREFIX)?
        .parse()
        .ok()
}

/// "sstable_000042.sst.tmp"
fn is_temp_file(path: &Path) -> bool {
    let inner_extension = path
        .file_stem()
        .and_then(|stem| Path::new(stem).extension());
    path.extension().map_or(false, |ext| ext == TEMP_SUFFIX)
        && inner_extension.map_or(false, |ext| ext == SSTABLE_EXTENSION)
}
