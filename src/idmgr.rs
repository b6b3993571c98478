//! Public id mapping
//!
//! Maps internal numeric ids to opaque random string ids and back. Both
//! directions live in one store:
//! - `int_<int id>` → string id
//! - `str_<string id>` → int id (decimal)
//!
//! A mapping is written once (both keys through a `Saga`) and never changed
//! or deleted.

use std::path::Path;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{FolioError, Result};
use crate::saga::Saga;
use crate::store::{OrderedStore, ReservedKeys};
use crate::token::TokenGenerator;

const INT_PREFIX: &str = "int_";
const STR_PREFIX: &str = "str_";

/// Generated candidates tried before giving up on a crowded token space
const MAX_TOKEN_ATTEMPTS: usize = 256;

pub struct IdMgr {
    store: OrderedStore,
    tokens: TokenGenerator,
    lock: RwLock<()>,
}

impl IdMgr {
    pub fn open(path: &Path, config: &Config, tokens: TokenGenerator) -> Result<Self> {
        Ok(Self {
            store: OrderedStore::open(path, config, ReservedKeys::default())?,
            tokens,
            lock: RwLock::new(()),
        })
    }

    /// String id of `int_id`, generating and storing one if needed
    ///
    /// Generated ids are retried until an unused one comes up, at most
    /// `MAX_TOKEN_ATTEMPTS` times; then `AlreadyExists`.
    pub fn add_int_id(&self, int_id: u64) -> Result<String> {
        let _guard = self.lock.write();

        if let Some(string_id) = self.find_string_id(int_id)? {
            return Ok(string_id);
        }

        let mut string_id = None;
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let candidate = self.tokens.generate();
            if !self.store.has(&str_key(&candidate))? {
                string_id = Some(candidate);
                break;
            }
        }
        let string_id = string_id.ok_or_else(|| {
            FolioError::AlreadyExists(format!(
                "no unused string id for {} after {} attempts",
                int_id, MAX_TOKEN_ATTEMPTS
            ))
        })?;

        self.write_map(int_id, &string_id)?;
        Ok(string_id)
    }

    /// Store a caller-chosen mapping
    ///
    /// Whether `string_id` is already used by another int id is not checked.
    /// Mapping an int id again to the same string is a no-op; to a different
    /// string it fails with `AlreadyExists`.
    pub fn set_id_map(&self, int_id: u64, string_id: &str) -> Result<()> {
        if string_id.is_empty() {
            return Err(FolioError::InvalidInput("empty string id".to_string()));
        }

        let _guard = self.lock.write();

        match self.find_string_id(int_id)? {
            Some(existing) if existing == string_id => Ok(()),
            Some(existing) => Err(FolioError::AlreadyExists(format!(
                "int id {} is mapped to {:?}",
                int_id, existing
            ))),
            None => self.write_map(int_id, string_id),
        }
    }

    pub fn get_string_id(&self, int_id: u64) -> Result<Option<String>> {
        let _guard = self.lock.read();
        self.find_string_id(int_id)
    }

    pub fn get_int_id(&self, string_id: &str) -> Result<Option<u64>> {
        let _guard = self.lock.read();
        let raw = match self.store.get(&str_key(string_id)) {
            Ok(raw) => raw,
            Err(FolioError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Some)
            .ok_or_else(|| {
                FolioError::Serialization(format!("Invalid int id for {:?}", string_id))
            })
    }

    /// Number of mappings
    pub fn count(&self) -> Result<u64> {
        Ok(self.store.count()? / 2)
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    fn find_string_id(&self, int_id: u64) -> Result<Option<String>> {
        match self.store.get(&int_key(int_id)) {
            Ok(raw) => String::from_utf8(raw).map(Some).map_err(|_| {
                FolioError::Serialization(format!("Invalid string id for {}", int_id))
            }),
            Err(FolioError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write_map(&self, int_id: u64, string_id: &str) -> Result<()> {
        let int_key = int_key(int_id);
        let str_key = str_key(string_id);
        let int_value = int_id.to_string();

        Saga::new("map id")
            .step(
                "put string key",
                || self.store.put(&str_key, int_value.as_bytes()),
                || self.store.delete(&str_key),
            )
            .step(
                "put int key",
                || self.store.put(&int_key, string_id.as_bytes()),
                || self.store.delete(&int_key),
            )
            .run()
    }
}

fn int_key(int_id: u64) -> Vec<u8> {
    format!("{}{}", INT_PREFIX, int_id).into_bytes()
}

fn str_key(string_id: &str) -> Vec<u8> {
    format!("{}{}", STR_PREFIX, string_id).into_bytes()
}
