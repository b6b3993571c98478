//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{FolioError, Result};

use super::entry::FrameHeader;
use super::{WalEntry, HEADER_SIZE};

/// Why reading stopped before the end of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStop {
    /// File ended in the middle of a frame (crash during append)
    PartialWrite,

    /// A complete frame failed its checksum or could not be decoded
    Corrupted,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset just past the last entry returned successfully
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn or corrupted frame
    /// yields `WalCorruption`; `WalRecovery` tells the two apart.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Stop(_, reason) => Err(FolioError::WalCorruption(reason)),
        }
    }

    /// Read the next frame, classifying any failure
    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_fully(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(Frame::End);
        }
        if read < HEADER_SIZE {
            return Ok(Frame::Stop(
                ReadStop::PartialWrite,
                format!("Partial header: {} of {} bytes", read, HEADER_SIZE),
            ));
        }

        let header = match FrameHeader::parse(&header) {
            Ok(h) => h,
            Err(e) => return Ok(Frame::Stop(ReadStop::Corrupted, e.to_string())),
        };

        let mut payload = vec![0u8; header.len as usize];
        let read = read_fully(&mut self.reader, &mut payload)?;
        if read < payload.len() {
            return Ok(Frame::Stop(
                ReadStop::PartialWrite,
                format!("Partial payload: {} of {} bytes", read, payload.len()),
            ));
        }

        match WalEntry::decode_payload(&header, &payload) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + payload.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(e) => Ok(Frame::Stop(ReadStop::Corrupted, e.to_string())),
        }
    }

    /// Offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    ///
    /// Yields one error and then stops if a bad frame is encountered.
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// One step of reading the log
#[derive(Debug)]
pub(crate) enum Frame {
    Entry(WalEntry),
    End,
    Stop(ReadStop, String),
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
