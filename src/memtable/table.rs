//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};

use crate::scan::{Direction, KeySource};
use crate::wal::Operation;

use super::MemTableEntry;

/// In-memory table for recent writes
///
/// `size` approximates the bytes held: key + value for live entries, key
/// only for tombstones.
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, MemTableEntry>>,
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock), returning the new size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, MemTableEntry::Value(value))
    }

    /// Delete a key (write lock, inserts tombstone), returning the new size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, MemTableEntry::Tombstone)
    }

    /// Apply an operation under one write guard
    ///
    /// Readers see either none or all of a batch.
    pub fn apply(&self, operation: Operation) -> usize {
        let mut data = self.data.write();
        self.apply_locked(&mut data, operation);
        self.size.load(Ordering::SeqCst)
    }

    fn apply_locked(&self, data: &mut BTreeMap<Vec<u8>, MemTableEntry>, operation: Operation) {
        match operation {
            Operation::Put { key, value } => {
                self.insert_locked(data, key, MemTableEntry::Value(value));
            }
            Operation::Delete { key } => {
                self.insert_locked(data, key, MemTableEntry::Tombstone);
            }
            Operation::Batch { ops } => {
                for op in ops {
                    self.apply_locked(data, op);
                }
            }
        }
    }

    fn insert_locked(
        &self,
        data: &mut BTreeMap<Vec<u8>, MemTableEntry>,
        key: Vec<u8>,
        entry: MemTableEntry,
    ) -> usize {
        // Callers hold the write guard, so load/store cannot race
        let key_len = key.len();
        let value_len = entry.value_len();
        let size = self.size.load(Ordering::SeqCst);
        let size = match data.insert(key, entry) {
            // Key bytes already counted; swap the value bytes
            Some(old) => size - old.value_len() + value_len,
            None => size + key_len + value_len,
        };
        self.size.store(size, Ordering::SeqCst);
        size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// True when nothing has been written since the last clear
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Hold a read guard for an ordered key scan
    pub fn read(&self) -> MemTableView<'_> {
        MemTableView {
            data: self.data.read(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-locked view of a MemTable
pub struct MemTableView<'a> {
    data: RwLockReadGuard<'a, BTreeMap<Vec<u8>, MemTableEntry>>,
}

impl<'a> MemTableView<'a> {
    /// Keys strictly after/before `from` in scan order, with tombstone flags
    pub fn keys(&self, from: Option<&[u8]>, direction: Direction) -> KeySource<'_> {
        let range = self.data.range::<[u8], _>(direction.bounds(from));
        match direction {
            Direction::Forward => Box::new(range.map(with_flag)),
            Direction::Backward => Box::new(range.rev().map(with_flag)),
        }
    }
}

fn with_flag<'k>((key, entry): (&'k Vec<u8>, &'k MemTableEntry)) -> (&'k [u8], bool) {
    (key.as_slice(), entry.is_tombstone())
}
