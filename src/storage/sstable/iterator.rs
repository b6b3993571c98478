//! SSTable data block walk
//!
//! Reads the data block front to back, checksumming it on the way. Used to
//! verify a table against its footer CRC.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::{FolioError, Result};
use crate::memtable::MemTableEntry;

use super::{HEADER_SIZE, TOMBSTONE_MARKER};

/// Entries of one SSTable in key order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    end_offset: u64,
    offset: u64,
    hasher: crc32fast::Hasher,
    failed: bool,
}

impl<'a> SSTableIterator<'a> {
    pub(super) fn new(file: &'a mut BufReader<File>, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset,
            offset: HEADER_SIZE,
            hasher: crc32fast::Hasher::new(),
            failed: false,
        })
    }

    /// CRC of every byte read so far
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, MemTableEntry)> {
        let mut lens = [0u8; 8];
        self.file.read_exact(&mut lens)?;
        self.hasher.update(&lens);

        let key_len = u32::from_le_bytes([lens[0], lens[1], lens[2], lens[3]]) as u64;
        let val_len = u32::from_le_bytes([lens[4], lens[5], lens[6], lens[7]]);
        let value_bytes = if val_len == TOMBSTONE_MARKER { 0 } else { val_len as u64 };

        if self.offset + 8 + key_len + value_bytes > self.end_offset {
            return Err(FolioError::Storage(format!(
                "SSTable entry at offset {} overruns the data block",
                self.offset
            )));
        }

        let mut key = vec![0u8; key_len as usize];
        self.file.read_exact(&mut key)?;
        self.hasher.update(&key);

        let entry = if val_len == TOMBSTONE_MARKER {
            MemTableEntry::Tombstone
        } else {
            let mut value = vec![0u8; val_len as usize];
            self.file.read_exact(&mut value)?;
            self.hasher.update(&value);
            MemTableEntry::Value(value)
        };

        self.offset += 8 + key_len + value_bytes;
        Ok((key, entry))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<(Vec<u8>, MemTableEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.end_offset {
            return None;
        }
        let entry = self.read_entry();
        self.failed = entry.is_err();
        Some(entry)
    }
}
