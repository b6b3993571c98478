//! Storage Module
//!
//! Immutable on-disk tables written from flushed MemTables.
//!
//! - `sstable`: file format, builder (temp file + rename), reader with an
//!   in-memory key index, CRC-checked data block walk
//! - `manager`: the tables of one engine directory, newest first, shared by
//!   point lookups and ordered key scans
//!
//! Tables are never rewritten or merged; each flush adds one.

mod manager;
mod sstable;

pub use manager::StorageManager;
pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
