//! Tests for WAL Reader
//!
//! These tests verify:
//! - Sequential reads and the entries() iterator
//! - Partial frames surface as errors and end iteration
//! - Position tracks the end of the last valid frame

use std::fs::{File, OpenOptions};
use std::io::Write;

use folio::wal::{WalEntry, WalReader, HEADER_SIZE};

use super::{put, setup_temp_wal, write_raw_entries};

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries: Vec<WalEntry> = (1..=3)
        .map(|lsn| WalEntry::new(lsn, put(&format!("k{}", lsn), "v")))
        .collect();
    write_raw_entries(&wal_path, &entries);

    let read: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(read, entries);
}

#[test]
fn test_position_after_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let entry = WalEntry::new(1, put("key", "value"));
    write_raw_entries(&wal_path, &[entry.clone()]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    reader.next_entry().unwrap();

    assert_eq!(reader.position(), entry.serialize().unwrap().len() as u64);
}

#[test]
fn test_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_entries(&wal_path, &[WalEntry::new(1, put("a", "1"))]);

    // Append half a header
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0u8; HEADER_SIZE / 2]).unwrap();

    let mut iter = WalReader::open(&wal_path).unwrap().entries();
    assert!(iter.next().unwrap().is_ok());
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}

#[test]
fn test_partial_data() {
    let (_temp, wal_path) = setup_temp_wal();
    let bytes = WalEntry::new(1, put("key", "a longer value")).serialize().unwrap();

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&bytes[..bytes.len() - 3]).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().is_err());
    assert_eq!(reader.position(), 0);
}
