//! Tag Index
//!
//! Secondary index `(tag id, article id) -> article id` in its own store,
//! keyed `"<tag id>_<padded article id>"`. One tag's entries form a
//! contiguous, id-ordered bucket, so tag-filtered pagination is a seek plus
//! a bounded walk, just like primary pagination.
//!
//! ```text
//!   10_000000000000004 → 4
//!   1_000000000000001  → 1     ← bucket "1_"
//!   1_000000000000003  → 3
//!   2_000000000000001  → 1     ← bucket "2_"
//! ```
//!
//! Entries change only alongside article writes.

use std::path::Path;

use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::keys;
use crate::record::Article;
use crate::saga::Saga;
use crate::store::{OrderedStore, ReservedKeys};

/// Page size of full-index walks
const WALK_PAGE: usize = 1024;

pub struct TagIndex {
    store: OrderedStore,
}

impl TagIndex {
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        Ok(Self {
            store: OrderedStore::open(path, config, ReservedKeys::default())?,
        })
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Write one entry per tag of `article`
    pub fn add_index(&self, article: &Article) -> Result<()> {
        let mut saga = Saga::new("add index");
        for &tag_id in &article.tag_ids {
            saga = saga.step(
                format!("put entry {}", tag_id),
                move || self.put_entry(tag_id, article.id),
                move || self.delete_entry(tag_id, article.id),
            );
        }
        saga.run()
    }

    /// Remove the entry of every tag of `article`
    pub fn delete_index(&self, article: &Article) -> Result<()> {
        let mut saga = Saga::new("delete index");
        for &tag_id in &article.tag_ids {
            saga = saga.step(
                format!("delete entry {}", tag_id),
                move || self.delete_entry(tag_id, article.id),
                move || self.put_entry(tag_id, article.id),
            );
        }
        saga.run()
    }

    pub fn put_entry(&self, tag_id: u64, article_id: u64) -> Result<()> {
        self.store.put(
            keys::index_key(tag_id, article_id).as_bytes(),
            article_id.to_string().as_bytes(),
        )
    }

    /// Remove one entry; NotFound when it does not exist
    pub fn delete_entry(&self, tag_id: u64, article_id: u64) -> Result<()> {
        self.store
            .delete(keys::index_key(tag_id, article_id).as_bytes())
    }

    pub fn has_entry(&self, tag_id: u64, article_id: u64) -> Result<bool> {
        self.store
            .has(keys::index_key(tag_id, article_id).as_bytes())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Up to `n` article ids of `tag_id` greater than `cursor`, ascending
    pub fn next(&self, tag_id: u64, cursor: u64, n: usize) -> Result<Vec<u64>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let prefix = keys::index_prefix(tag_id);
        let seek = keys::index_key(tag_id, cursor);
        let keys = self.store.next(seek.as_bytes(), n)?;

        // The bucket is contiguous: the first foreign key ends it
        Ok(keys
            .iter()
            .take_while(|key| key.starts_with(prefix.as_bytes()))
            .filter_map(|key| article_id(key))
            .collect())
    }

    /// Up to `n` article ids of `tag_id` less than `cursor`, descending
    ///
    /// Asks the store for `n + 1` keys and drops the ones outside the bucket,
    /// so a cursor that lands on the neighbouring bucket's boundary still
    /// yields `n` hits.
    pub fn prev(&self, tag_id: u64, cursor: u64, n: usize) -> Result<Vec<u64>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let prefix = keys::index_prefix(tag_id);
        let seek = keys::index_key(tag_id, cursor);
        let keys = self.store.prev(seek.as_bytes(), n.saturating_add(1))?;

        let mut ids: Vec<u64> = keys
            .iter()
            .filter(|key| key.starts_with(prefix.as_bytes()))
            .filter_map(|key| article_id(key))
            .collect();
        ids.truncate(n);
        Ok(ids)
    }

    /// Number of index entries
    pub fn count(&self) -> Result<u64> {
        self.store.count()
    }

    /// Every `(tag id, article id)` entry in key order
    pub fn entries(&self) -> Result<Vec<(u64, u64)>> {
        let mut entries = Vec::new();
        let mut from: Vec<u8> = Vec::new();
        loop {
            let page = self.store.next(&from, WALK_PAGE)?;
            for key in &page {
                match keys::split_index_key(key) {
                    Some(entry) => entries.push(entry),
                    None => warn!(key = %String::from_utf8_lossy(key), "malformed index key"),
                }
            }
            match page.last() {
                Some(last) if page.len() == WALK_PAGE => from = last.clone(),
                _ => return Ok(entries),
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

fn article_id(key: &[u8]) -> Option<u64> {
    keys::split_index_key(key).map(|(_, article_id)| article_id)
}
