//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups and seeks via an
//! in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{FolioError, Result};
use crate::memtable::MemTableEntry;
use crate::scan::{Direction, KeySource};

use super::iterator::SSTableIterator;
use super::{FLAG_TOMBSTONE, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Position of one entry in the data block
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u64,
    tombstone: bool,
}

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    /// File handle for reading entries
    file: BufReader<File>,
    /// In-memory index: key → entry position
    index: BTreeMap<Vec<u8>, IndexEntry>,
    /// Metadata
    entry_count: u64,
    /// Index block starting offset (end of the data block)
    index_offset: u64,
    /// Data block CRC recorded in the footer
    data_crc: u32,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the entire index into memory for fast lookups.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(FolioError::Storage(format!(
                "SSTable too small: {} bytes",
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(FolioError::Storage(format!(
                "Invalid SSTable magic: expected FOLI, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(FolioError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header[6..14]);

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer[0..8]);
        let data_crc = read_u32(&footer[8..12]);
        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(FolioError::Storage(format!(
                "Invalid SSTable index offset: {}",
                index_offset
            )));
        }

        // Load index into memory
        let mut index = BTreeMap::new();
        file.seek(SeekFrom::Start(index_offset))?;

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][offset(8)][flags(1)][key]
        let mut pos = 0;
        while pos + 13 <= index_data.len() {
            let key_len = read_u32(&index_data[pos..pos + 4]) as usize;
            let offset = read_u64(&index_data[pos + 4..pos + 12]);
            let flags = index_data[pos + 12];
            pos += 13;

            if pos + key_len > index_data.len() {
                return Err(FolioError::Storage(
                    "Truncated SSTable index entry".to_string(),
                ));
            }
            let key = index_data[pos..pos + key_len].to_vec();
            pos += key_len;

            index.insert(
                key,
                IndexEntry {
                    offset,
                    tombstone: flags & FLAG_TOMBSTONE != 0,
                },
            );
        }

        // Reset file to start for reading
        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
            data_crc,
        })
    }

    /// Get a value by key — O(log n) lookup via in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(Value(v)))` — key found with value
    /// - `Ok(Some(Tombstone))` — key found but deleted
    /// - `Ok(None)` — key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        let entry = match self.index.get(key) {
            Some(&entry) => entry,
            None => return Ok(None),
        };

        if entry.tombstone {
            return Ok(Some(MemTableEntry::Tombstone));
        }

        // Seek directly to the entry
        self.file.seek(SeekFrom::Start(entry.offset))?;

        // Read entry header
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = read_u32(&header[0..4]) as usize;
        let val_len = read_u32(&header[4..8]);

        // Skip the key (we already know it matches)
        self.file.seek(SeekFrom::Current(key_len as i64))?;

        if val_len == TOMBSTONE_MARKER {
            return Ok(Some(MemTableEntry::Tombstone));
        }

        // Read value
        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;

        Ok(Some(MemTableEntry::Value(value)))
    }

    /// Keys strictly after/before `from` in scan order, with tombstone flags
    ///
    /// Served from the in-memory index; no file I/O.
    pub fn keys(&self, from: Option<&[u8]>, direction: Direction) -> KeySource<'_> {
        let range = self.index.range::<[u8], _>(direction.bounds(from));
        match direction {
            Direction::Forward => Box::new(range.map(with_flag)),
            Direction::Backward => Box::new(range.rev().map(with_flag)),
        }
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Walk every entry of the data block in key order
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }

    /// Check the data block against the footer CRC and the index
    pub fn verify(&mut self) -> Result<()> {
        let expected_crc = self.data_crc;
        let expected_count = self.index.len() as u64;

        let mut entries = self.iter()?;
        let mut count = 0u64;
        for entry in entries.by_ref() {
            entry?;
            count += 1;
        }
        let actual_crc = entries.checksum();

        if actual_crc != expected_crc {
            return Err(FolioError::Storage(format!(
                "SSTable data CRC mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual_crc
            )));
        }
        if count != expected_count {
            return Err(FolioError::Storage(format!(
                "SSTable holds {} entries, index lists {}",
                count, expected_count
            )));
        }
        Ok(())
    }
}

fn with_flag<'k>((key, entry): (&'k Vec<u8>, &'k IndexEntry)) -> (&'k [u8], bool) {
    (key.as_slice(), entry.tombstone)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
