//! WAL test suite
//!
//! One test binary for the write-ahead log: entry framing, writer, reader
//! and recovery.

mod entry_tests;
mod reader_tests;
mod recovery_tests;
mod writer_tests;

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use folio::config::WalSyncStrategy;
use folio::wal::{Operation, WalEntry, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Shared Helpers
// =============================================================================

pub(crate) fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

pub(crate) fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

/// Write `count` puts through WalWriter (a well-formed WAL)
pub(crate) fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(put(&format!("key{}", i), &format!("value{}", i)))
            .unwrap();
    }
}

/// Write raw frames directly to a file (for crafting corruption)
pub(crate) fn write_raw_entries(path: &PathBuf, entries: &[WalEntry]) {
    let mut file = File::create(path).unwrap();
    for entry in entries {
        file.write_all(&entry.serialize().unwrap()).unwrap();
    }
    file.sync_all().unwrap();
}
