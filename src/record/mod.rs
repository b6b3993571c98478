//! Record Module
//!
//! Typed records on top of an `OrderedStore`: CRUD plus cursor pagination.
//!
//! ## Responsibilities
//! - Allocate record ids from the store sequence (1, 2, 3, ...)
//! - Map ids to order-preserving keys (optionally under a key prefix, so
//!   records can share a store with mirror keys)
//! - Encode payloads through a caller-supplied `RecordCodec`
//! - Next/Prev pagination: one seek plus a bounded walk, however many
//!   records have been deleted
//!
//! Instantiated for articles (`ArticleStore`) and tags (`TagStore`, which
//! adds a name mirror).

mod article;
mod tag;

use std::marker::PhantomData;
use std::path::Path;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::error::{FolioError, Result};
use crate::keys;
use crate::store::{OrderedStore, ReservedKeys};

pub use article::{Article, ArticleStore};
pub use tag::{Tag, TagStore};

/// A record with an immutable store-allocated id
pub trait Record {
    /// Human-readable record kind for error messages ("article", "tag")
    const KIND: &'static str;

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);
}

/// Encodes record payloads for storage
pub trait RecordCodec<R>: Send + Sync {
    fn encode(&self, record: &R) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<R>;
}

/// Default codec: bincode over the record's serde derive
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl<R> RecordCodec<R> for BincodeCodec
where
    R: Serialize + DeserializeOwned,
{
    fn encode(&self, record: &R) -> Result<Vec<u8>> {
        Ok(bincode::serialize(record)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<R> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Store of records of one kind
///
/// The record lock makes id allocation plus insert atomic with respect to
/// other callers of this store; the `OrderedStore` underneath has its own.
pub struct RecordStore<R, C = BincodeCodec> {
    store: OrderedStore,
    codec: C,
    prefix: &'static str,
    lock: RwLock<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R, C> RecordStore<R, C>
where
    R: Record,
    C: RecordCodec<R>,
{
    /// Open a store whose record keys carry `prefix`
    pub fn open(path: &Path, config: &Config, codec: C, prefix: &'static str) -> Result<Self> {
        let store = OrderedStore::open(path, config, ReservedKeys::default())?;
        Ok(Self::with_store(store, codec, prefix))
    }

    /// Wrap an already opened store
    pub fn with_store(store: OrderedStore, codec: C, prefix: &'static str) -> Self {
        Self {
            store,
            codec,
            prefix,
            lock: RwLock::new(()),
            _record: PhantomData,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Allocate an id and store the record under it, returning the id
    pub fn add(&self, mut record: R) -> Result<u64> {
        let _guard = self.lock.write();
        let id = self.store.next_sequence()?;
        record.set_id(id);
        self.write(&record)?;
        Ok(id)
    }

    /// Allocate an id without writing a record
    ///
    /// Used by multi-store writes that insert the record as a separate step.
    pub fn allocate_id(&self) -> Result<u64> {
        let _guard = self.lock.write();
        self.store.next_sequence()
    }

    /// Write a record at its id, whether or not one exists there
    pub fn insert(&self, record: &R) -> Result<()> {
        let _guard = self.lock.write();
        self.write(record)
    }

    /// Replace an existing record
    pub fn update(&self, record: &R) -> Result<()> {
        let _guard = self.lock.write();
        if !self.store.has(self.key(record.id()).as_bytes())? {
            return Err(self.not_found(record.id()));
        }
        self.write(record)
    }

    /// Remove a record
    pub fn delete(&self, id: u64) -> Result<()> {
        let _guard = self.lock.write();
        self.store.delete(self.key(id).as_bytes()).map_err(|err| match err {
            FolioError::NotFound(_) => self.not_found(id),
            other => other,
        })
    }

    fn write(&self, record: &R) -> Result<()> {
        let value = self.codec.encode(record)?;
        self.store.put(self.key(record.id()).as_bytes(), &value)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch a record; absent and undecodable records are both NotFound
    pub fn get_by_id(&self, id: u64) -> Result<R> {
        let _guard = self.lock.read();
        self.load(id)
    }

    pub fn has(&self, id: u64) -> Result<bool> {
        let _guard = self.lock.read();
        self.store.has(self.key(id).as_bytes())
    }

    /// Up to `n` records with ids greater than `id`, ascending
    ///
    /// `id = 0` starts at the oldest record.
    pub fn next(&self, id: u64, n: usize) -> Result<Vec<R>> {
        let _guard = self.lock.read();

        if n == 0 || id >= self.store.current_sequence()? {
            return Ok(Vec::new());
        }

        let keys = self.store.next(self.key(id).as_bytes(), n)?;
        self.load_keys(keys)
    }

    /// Up to `n` records with ids less than `id`, descending
    ///
    /// An `id` past the newest allocated id is clamped to it, and the record
    /// at the clamped id (if any) comes first.
    pub fn prev(&self, id: u64, n: usize) -> Result<Vec<R>> {
        let _guard = self.lock.read();

        let mut records = Vec::new();
        if n == 0 || id <= 1 {
            return Ok(records);
        }

        let mut id = id;
        let mut n = n;
        let max = self.store.current_sequence()?;
        if id > max {
            id = max;
            if let Some(record) = self.load_existing(id)? {
                records.push(record);
                n -= 1;
            }
        }

        let keys = self.store.prev(self.key(id).as_bytes(), n)?;
        records.extend(self.load_keys(keys)?);
        Ok(records)
    }

    /// Up to `n` stored ids after `after`, ascending, each with its record
    ///
    /// An undecodable record still takes its slot (as `None`), so a page
    /// shorter than `n` always means the walk reached the last record.
    pub fn walk(&self, after: u64, n: usize) -> Result<Vec<(u64, Option<R>)>> {
        let _guard = self.lock.read();

        if n == 0 {
            return Ok(Vec::new());
        }

        let keys = self.store.next(self.key(after).as_bytes(), n)?;
        let mut visited = Vec::with_capacity(keys.len());
        for key in keys {
            let id = match keys::strip_prefixed_id(self.prefix, &key) {
                Some(id) => id,
                None => break,
            };
            visited.push((id, self.load_existing(id)?));
        }
        Ok(visited)
    }

    /// Number of keys in the underlying store (maintained counter)
    pub fn count(&self) -> Result<u64> {
        self.store.count()
    }

    /// Newest allocated id, 0 if none
    pub fn max_id(&self) -> Result<u64> {
        self.store.current_sequence()
    }

    /// The underlying store (for mirror keys sharing it)
    pub fn store(&self) -> &OrderedStore {
        &self.store
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Storage key of a record id
    pub fn key(&self, id: u64) -> String {
        keys::prefixed_id(self.prefix, id)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn load(&self, id: u64) -> Result<R> {
        let value = self.store.get(self.key(id).as_bytes()).map_err(|err| match err {
            FolioError::NotFound(_) => self.not_found(id),
            other => other,
        })?;
        self.codec.decode(&value).map_err(|err| {
            warn!(kind = R::KIND, id, error = %err, "undecodable record");
            self.not_found(id)
        })
    }

    fn load_existing(&self, id: u64) -> Result<Option<R>> {
        match self.load(id) {
            Ok(record) => Ok(Some(record)),
            Err(FolioError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Load the records of a walk, stopping at the first key outside the
    /// record prefix and skipping undecodable values
    fn load_keys(&self, keys: Vec<Vec<u8>>) -> Result<Vec<R>> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let id = match keys::strip_prefixed_id(self.prefix, &key) {
                Some(id) => id,
                None => break,
            };
            if let Some(record) = self.load_existing(id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn not_found(&self, id: u64) -> FolioError {
        FolioError::NotFound(format!("{} {}", R::KIND, id))
    }
}
