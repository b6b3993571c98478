//! Write-Ahead Log (WAL) Module
//!
//! Every engine write is appended here before it reaches the MemTable. A
//! `WriteBatch` is one frame, so replay applies it whole or not at all.
//!
//! ```text
//! ┌─────────┬─────────┬─────────┬──────────────────────┐
//! │ LSN (8) │ CRC (4) │ Len (4) │ bincode(WalEntry)    │  ... repeated
//! └─────────┴─────────┴─────────┴──────────────────────┘
//! ```
//!
//! The CRC covers the payload. Recovery keeps every frame up to the first
//! damaged one and truncates a partially written tail. After a flush the
//! log is truncated to zero.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Operation, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use writer::WalWriter;
pub use reader::{WalReader, WalIterator, ReadStop};
pub use recovery::{WalRecovery, RecoveryResult};
