//! SSTable Builder
//!
//! Streams sorted entries into `<name>.sst.tmp` and renames the file into
//! place once the index, footer and entry count are on disk. A crash
//! mid-build leaves only the temporary file behind.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{FolioError, Result};

use super::{SSTable, FLAG_TOMBSTONE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Suffix of tables still being written
pub(crate) const TEMP_SUFFIX: &str = "tmp";

/// Offset of the entry count in the header (after magic and version)
const COUNT_OFFSET: u64 = 6;

/// Writes one SSTable from entries supplied in strictly ascending key order
pub struct SSTableBuilder {
    path: PathBuf,
    temp_path: PathBuf,
    writer: BufWriter<File>,
    /// Offset of the next data entry
    offset: u64,
    /// (key, entry offset, flags) in key order
    index: Vec<(Vec<u8>, u64, u8)>,
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Start a table that will live at `path`
    ///
    /// The header is written immediately with a zero entry count.
    pub fn new(path: &Path) -> Result<Self> {
        let temp_path = temp_path(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
            writer,
            offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(FolioError::Storage(format!(
                    "SSTable keys out of order: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        let (val_len, flags) = match value {
            Some(v) => (v.len() as u32, 0),
            None => (TOMBSTONE_MARKER, FLAG_TOMBSTONE),
        };

        // [key_len(4)][val_len(4)][key][value]
        let mut entry = Vec::with_capacity(8 + key.len() + value.map_or(0, <[u8]>::len));
        entry.extend_from_slice(&(key.len() as u32).to_le_bytes());
        entry.extend_from_slice(&val_len.to_le_bytes());
        entry.extend_from_slice(key);
        if let Some(v) = value {
            entry.extend_from_slice(v);
        }

        self.writer.write_all(&entry)?;
        self.data_hasher.update(&entry);
        self.index.push((key.to_vec(), self.offset, flags));
        self.offset += entry.len() as u64;

        Ok(())
    }

    /// Write the index block and footer, then move the table into place
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.offset;
        let entry_count = self.index.len() as u64;

        // [key_len(4)][offset(8)][flags(1)][key]
        for (key, offset, flags) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(&[*flags])?;
            self.writer.write_all(key)?;
        }

        // [index_offset(8)][data_crc(4)][padding(4)]
        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        let mut file = self.writer.into_inner().map_err(|e| {
            FolioError::Storage(format!("Failed to flush SSTable: {}", e))
        })?;
        file.seek(SeekFrom::Start(COUNT_OFFSET))?;
        file.write_all(&entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;

        let mut keys = self.index.into_iter().map(|(key, _, _)| key);
        let min_key = keys.next().unwrap_or_default();
        let max_key = keys.last().unwrap_or_else(|| min_key.clone());

        Ok(SSTable {
            path: self.path,
            entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}

/// Temporary path a table is built under
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}
