//! # Folio
//!
//! Article and tag records with cursor pagination over an embedded ordered
//! key-value engine:
//! - Order-preserving id keys: paging is one seek plus a bounded walk
//! - Maintained key counts and id sequences, updated atomically with data
//! - A tag index with the same bidirectional cursor contract
//! - Opaque public ids mapped to internal ids
//! - Write-Ahead Logging (WAL) and crash recovery in every store
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Model                              │
//! │        (one RwLock, sagas across stores, repair pass)       │
//! └──────┬──────────────┬───────────────┬───────────────┬───────┘
//!        │              │               │               │
//!        ▼              ▼               ▼               ▼
//!  ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌───────────┐
//!  │ Article   │  │ TagStore  │  │  TagIndex   │  │  IdMgr    │
//!  │ Store     │  │ (id+name) │  │ (tag_art)   │  │ (int/str) │
//!  └─────┬─────┘  └─────┬─────┘  └──────┬──────┘  └─────┬─────┘
//!        └──────────────┴───────┬───────┴───────────────┘
//!                               ▼
//!                    ┌─────────────────────┐
//!                    │    OrderedStore     │
//!                    │ (count + sequence)  │
//!                    └──────────┬──────────┘
//!                               ▼
//!                    ┌─────────────────────┐
//!                    │       Engine        │
//!                    │ WAL │ MemTable │ SST │
//!                    └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod engine;
pub mod memtable;
pub mod scan;
pub mod storage;
pub mod wal;

pub mod keys;
pub mod saga;
pub mod store;

pub mod idmgr;
pub mod index;
pub mod model;
pub mod record;
pub mod token;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, ModelConfig, WalSyncStrategy};
pub use engine::{Engine, WriteBatch};
pub use error::{FolioError, Result};
pub use idmgr::IdMgr;
pub use index::TagIndex;
pub use model::{Model, RepairReport};
pub use record::{Article, ArticleStore, BincodeCodec, Record, RecordCodec, RecordStore, Tag, TagStore};
pub use scan::Direction;
pub use store::{OrderedStore, ReservedKeys};
pub use token::TokenGenerator;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Folio
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
