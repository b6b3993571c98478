//! Tags
//!
//! Each tag is stored twice in one store: under `id_<padded id>` (the record
//! key, used for pagination) and under `name_<name>` (the lookup mirror).
//! Both keys hold the same encoded value and are always written and deleted
//! together through a `Saga`.

use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{FolioError, Result};
use crate::saga::Saga;

use super::{BincodeCodec, Record, RecordCodec, RecordStore};

const ID_PREFIX: &str = "id_";
const NAME_PREFIX: &str = "name_";

/// A tag: a unique name plus the number of articles filed under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    pub article_count: u64,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            article_count: 0,
        }
    }
}

impl Record for Tag {
    const KIND: &'static str = "tag";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Tag store with id and name lookups
pub struct TagStore<C = BincodeCodec> {
    records: RecordStore<Tag, C>,
    lock: RwLock<()>,
}

impl<C: RecordCodec<Tag>> TagStore<C> {
    pub fn open(path: &Path, config: &Config, codec: C) -> Result<Self> {
        Ok(Self {
            records: RecordStore::open(path, config, codec, ID_PREFIX)?,
            lock: RwLock::new(()),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Add a tag by name, returning its id
    ///
    /// Adding an existing name returns the existing id and writes nothing.
    pub fn add(&self, name: &str) -> Result<u64> {
        let _guard = self.lock.write();

        if let Some(tag) = self.find_by_name(name)? {
            return Ok(tag.id);
        }

        let mut tag = Tag::new(name);
        tag.id = self.records.allocate_id()?;
        self.write_pair("add tag", &tag, None)?;
        Ok(tag.id)
    }

    pub fn delete_by_id(&self, id: u64) -> Result<()> {
        let _guard = self.lock.write();
        let tag = self.records.get_by_id(id)?;
        self.delete_pair(&tag)
    }

    pub fn delete_by_name(&self, name: &str) -> Result<()> {
        let _guard = self.lock.write();
        let tag = self.load_by_name(name)?;
        self.delete_pair(&tag)
    }

    /// Rename a tag; its id and article count are unchanged
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let _guard = self.lock.write();

        let old = self.load_by_name(old_name)?;
        if old_name == new_name {
            return Ok(());
        }
        if self.find_by_name(new_name)?.is_some() {
            return Err(FolioError::AlreadyExists(format!("tag name {:?}", new_name)));
        }

        let renamed = Tag {
            name: new_name.to_string(),
            ..old.clone()
        };
        self.write_pair("rename tag", &renamed, Some(&old))
    }

    /// Adjust the article count by `delta`, saturating at 0; returns the new count
    pub fn add_article_count_for_id(&self, id: u64, delta: i64) -> Result<u64> {
        let _guard = self.lock.write();
        let tag = self.records.get_by_id(id)?;
        self.add_article_count(tag, delta)
    }

    /// Adjust the article count by `delta`, saturating at 0; returns the new count
    pub fn add_article_count_for_name(&self, name: &str, delta: i64) -> Result<u64> {
        let _guard = self.lock.write();
        let tag = self.load_by_name(name)?;
        self.add_article_count(tag, delta)
    }

    /// Overwrite the article count (used by index repair)
    pub fn set_article_count(&self, id: u64, count: u64) -> Result<()> {
        let _guard = self.lock.write();
        let old = self.records.get_by_id(id)?;
        if old.article_count == count {
            return Ok(());
        }
        let tag = Tag {
            article_count: count,
            ..old.clone()
        };
        self.write_pair("set tag article count", &tag, Some(&old))
    }

    fn add_article_count(&self, old: Tag, delta: i64) -> Result<u64> {
        let count = if delta >= 0 {
            old.article_count.saturating_add(delta as u64)
        } else {
            old.article_count.saturating_sub(delta.unsigned_abs())
        };
        let tag = Tag {
            article_count: count,
            ..old.clone()
        };
        self.write_pair("update tag article count", &tag, Some(&old))?;
        Ok(count)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_by_id(&self, id: u64) -> Result<Tag> {
        let _guard = self.lock.read();
        self.records.get_by_id(id)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Tag> {
        let _guard = self.lock.read();
        self.load_by_name(name)
    }

    /// Article count of a tag, 0 when the tag does not exist
    pub fn get_article_count_by_id(&self, id: u64) -> Result<u64> {
        match self.get_by_id(id) {
            Ok(tag) => Ok(tag.article_count),
            Err(FolioError::NotFound(_)) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Article count of a tag, 0 when the tag does not exist
    pub fn get_article_count_by_name(&self, name: &str) -> Result<u64> {
        let _guard = self.lock.read();
        Ok(self.find_by_name(name)?.map_or(0, |tag| tag.article_count))
    }

    /// Up to `n` tags with ids greater than `id`, ascending
    pub fn next(&self, id: u64, n: usize) -> Result<Vec<Tag>> {
        let _guard = self.lock.read();
        self.records.next(id, n)
    }

    /// Up to `n` tags with ids less than `id`, descending
    pub fn prev(&self, id: u64, n: usize) -> Result<Vec<Tag>> {
        let _guard = self.lock.read();
        self.records.prev(id, n)
    }

    /// Up to `n` tag ids after `id` with their tags (`None` if undecodable)
    pub fn walk(&self, id: u64, n: usize) -> Result<Vec<(u64, Option<Tag>)>> {
        let _guard = self.lock.read();
        self.records.walk(id, n)
    }

    /// Tags after the named tag; an unknown name starts at the oldest tag
    pub fn next_by_name(&self, name: &str, n: usize) -> Result<Vec<Tag>> {
        let _guard = self.lock.read();
        let id = self.find_by_name(name)?.map_or(0, |tag| tag.id);
        self.records.next(id, n)
    }

    /// Tags before the named tag; an unknown name starts at the newest tag
    pub fn prev_by_name(&self, name: &str, n: usize) -> Result<Vec<Tag>> {
        let _guard = self.lock.read();
        let id = match self.find_by_name(name)? {
            Some(tag) => tag.id,
            None => self.records.max_id()?.saturating_add(1),
        };
        self.records.prev(id, n)
    }

    /// Number of tags
    pub fn count(&self) -> Result<u64> {
        Ok(self.records.count()? / 2)
    }

    /// Newest allocated tag id, 0 if none
    pub fn max_id(&self) -> Result<u64> {
        self.records.max_id()
    }

    pub fn flush(&self) -> Result<()> {
        self.records.flush()
    }

    pub fn close(self) -> Result<()> {
        self.records.close()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn name_key(name: &str) -> Vec<u8> {
        format!("{}{}", NAME_PREFIX, name).into_bytes()
    }

    fn load_by_name(&self, name: &str) -> Result<Tag> {
        self.find_by_name(name)?
            .ok_or_else(|| FolioError::NotFound(format!("tag name {:?}", name)))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.records.store().get(&Self::name_key(name)) {
            Ok(value) => Ok(Some(self.records.codec().decode(&value)?)),
            Err(FolioError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn put_name(&self, tag: &Tag) -> Result<()> {
        let value = self.records.codec().encode(tag)?;
        self.records.store().put(&Self::name_key(&tag.name), &value)
    }

    fn delete_name(&self, name: &str) -> Result<()> {
        self.records.store().delete(&Self::name_key(name))
    }

    /// Write both keys of `tag`; `previous` is the stored version (if any)
    /// and is restored when a later step fails
    fn write_pair(&self, operation: &str, tag: &Tag, previous: Option<&Tag>) -> Result<()> {
        let renamed_from = previous.filter(|old| old.name != tag.name);

        let mut saga = Saga::new(operation);

        if let Some(old) = renamed_from {
            saga = saga.step(
                "delete old name key",
                move || self.delete_name(&old.name),
                move || self.put_name(old),
            );
        }

        saga.step(
            "put id key",
            move || self.records.insert(tag),
            move || match previous {
                Some(old) => self.records.insert(old),
                None => self.records.delete(tag.id),
            },
        )
        .step(
            "put name key",
            move || self.put_name(tag),
            move || match previous {
                Some(old) if old.name == tag.name => self.put_name(old),
                _ => self.delete_name(&tag.name),
            },
        )
        .run()
    }

    fn delete_pair(&self, tag: &Tag) -> Result<()> {
        Saga::new("delete tag")
            .step(
                "delete id key",
                move || self.records.delete(tag.id),
                move || self.records.insert(tag),
            )
            .step(
                "delete name key",
                move || self.delete_name(&tag.name),
                move || self.put_name(tag),
            )
            .run()
    }
}
