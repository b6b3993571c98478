//! Ordered Store
//!
//! One engine instance plus two reserved bookkeeping keys:
//! - a count of visible keys, updated in the same batch as every insert/delete
//! - a sequence counter for id allocation, never decremented
//!
//! Reserved keys are hidden from every public operation and from iteration.
//!
//! ## Concurrency
//! An `RwLock<()>` guards the counter read-modify-write: exclusive for
//! Put/Delete/NextSequence, shared for reads.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::info;

use crate::config::Config;
use crate::engine::{Engine, WriteBatch};
use crate::error::{FolioError, Result};
use crate::scan::Direction;

/// The bookkeeping keys of an ordered store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedKeys {
    /// Holds the number of visible keys (decimal ASCII)
    pub count: Vec<u8>,
    /// Holds the last allocated sequence value (decimal ASCII)
    pub sequence: Vec<u8>,
}

impl ReservedKeys {
    pub fn new(count: impl Into<Vec<u8>>, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            count: count.into(),
            sequence: sequence.into(),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key == self.count.as_slice() || key == self.sequence.as_slice()
    }
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self::new("__key_for_count__", "__key_for_sequence__")
    }
}

/// Ordered key-value store with a maintained count and an id sequence
pub struct OrderedStore {
    engine: Engine,
    reserved: ReservedKeys,
    lock: RwLock<()>,
    path: PathBuf,
}

impl OrderedStore {
    /// Open or create a store in `path`
    ///
    /// `config.data_dir` is ignored in favour of `path`.
    pub fn open(path: &Path, config: &Config, reserved: ReservedKeys) -> Result<Self> {
        let engine = Engine::open(config.with_data_dir(path))?;
        let store = Self {
            engine,
            reserved,
            lock: RwLock::new(()),
            path: path.to_path_buf(),
        };
        let count = store.read_counter(&store.reserved.count)?;
        let sequence = store.read_counter(&store.reserved.sequence)?;
        info!(path = %path.display(), count, sequence, "store opened");
        Ok(store)
    }

    /// Open with the default engine settings and reserved keys
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(path, &Config::default(), ReservedKeys::default())
    }

    // =========================================================================
    // Key-value operations
    // =========================================================================

    /// Insert or overwrite a value
    ///
    /// A new key bumps the count in the same engine batch.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let _guard = self.lock.write();

        if self.engine.has(key)? {
            return self.engine.put(key, value);
        }

        let count = self.read_counter(&self.reserved.count)? + 1;
        self.engine.write(
            WriteBatch::new()
                .put(key, value)
                .put(self.reserved.count.clone(), count.to_string()),
        )
    }

    /// Get an owned copy of a value
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;
        let _guard = self.lock.read();

        self.engine
            .get(key)?
            .ok_or_else(|| not_found(key))
    }

    /// Remove a key, decrementing the count in the same engine batch
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let _guard = self.lock.write();

        if !self.engine.has(key)? {
            return Err(not_found(key));
        }

        let count = self.read_counter(&self.reserved.count)?.saturating_sub(1);
        self.engine.write(
            WriteBatch::new()
                .delete(key)
                .put(self.reserved.count.clone(), count.to_string()),
        )
    }

    /// True when a visible key holds a value (reserved keys report false)
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        if self.reserved.contains(key) {
            return Ok(false);
        }
        let _guard = self.lock.read();
        self.engine.has(key)
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Up to `n` keys strictly after `from`, ascending
    ///
    /// An empty `from` starts at the beginning of the keyspace.
    pub fn next(&self, from: &[u8], n: usize) -> Result<Vec<Vec<u8>>> {
        self.scan(from, Direction::Forward, n)
    }

    /// Up to `n` keys strictly before `from`, descending
    ///
    /// An empty `from` starts at the end of the keyspace.
    pub fn prev(&self, from: &[u8], n: usize) -> Result<Vec<Vec<u8>>> {
        self.scan(from, Direction::Backward, n)
    }

    fn scan(&self, from: &[u8], direction: Direction, n: usize) -> Result<Vec<Vec<u8>>> {
        let _guard = self.lock.read();
        let from = if from.is_empty() { None } else { Some(from) };
        self.engine
            .scan_keys(from, direction, n, |key| self.reserved.contains(key))
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Number of visible keys (reads the maintained counter)
    pub fn count(&self) -> Result<u64> {
        let _guard = self.lock.read();
        self.read_counter(&self.reserved.count)
    }

    /// Allocate the next sequence value
    ///
    /// Values are strictly increasing across restarts and never reused.
    pub fn next_sequence(&self) -> Result<u64> {
        let _guard = self.lock.write();
        let sequence = self.read_counter(&self.reserved.sequence)? + 1;
        self.engine
            .put(&self.reserved.sequence, sequence.to_string().as_bytes())?;
        Ok(sequence)
    }

    /// Last allocated sequence value, 0 if none
    pub fn current_sequence(&self) -> Result<u64> {
        let _guard = self.lock.read();
        self.read_counter(&self.reserved.sequence)
    }

    fn read_counter(&self, key: &[u8]) -> Result<u64> {
        let raw = match self.engine.get(key)? {
            Some(raw) => raw,
            None => return Ok(0),
        };
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                FolioError::Serialization(format!(
                    "Invalid counter {:?} in {}",
                    String::from_utf8_lossy(&raw),
                    self.path.display()
                ))
            })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Persist the MemTable to an SSTable
    pub fn flush(&self) -> Result<()> {
        let _guard = self.lock.write();
        self.engine.flush()
    }

    /// Close the store, flushing pending writes
    pub fn close(self) -> Result<()> {
        info!(path = %self.path.display(), "store closed");
        self.engine.close()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reserved_keys(&self) -> &ReservedKeys {
        &self.reserved
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if self.reserved.contains(key) {
            return Err(FolioError::InvalidInput(format!(
                "Reserved key {:?}",
                String::from_utf8_lossy(key)
            )));
        }
        Ok(())
    }
}

fn not_found(key: &[u8]) -> FolioError {
    FolioError::NotFound(format!("key {:?}", String::from_utf8_lossy(key)))
}
