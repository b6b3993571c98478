//! Model
//!
//! The composing layer: articles, tags, the tag index and (optionally) the
//! public id mapping, each in its own store under one root directory.
//!
//! ## Responsibilities
//! - Article CRUD that keeps index entries and tag article counts in step
//! - Primary and tag-filtered cursor pagination
//! - Public id assignment and lookup
//! - Offline repair of the tag index
//!
//! ## Consistency
//! One logical operation touches up to three stores. Every such write is a
//! `Saga`: if a step fails, the steps that already succeeded are undone and
//! the operation fails as a whole. A crash in the middle of a saga can
//! leave the index or the tag counts out of step with the articles;
//! `repair_tag_index` rebuilds both from the article store.
//!
//! ## Concurrency
//! One `RwLock<()>`: exclusive for mutations, shared for reads, so every
//! public operation is atomic with respect to the others.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::{FolioError, Result};
use crate::idmgr::IdMgr;
use crate::index::TagIndex;
use crate::record::{
    Article, ArticleStore, BincodeCodec, RecordCodec, RecordStore, Tag, TagStore,
};
use crate::saga::Saga;
use crate::scan::Direction;
use crate::token::TokenGenerator;

/// Page size of full-store walks during repair
const REPAIR_PAGE: usize = 256;

/// What `repair_tag_index` changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Articles read
    pub articles_scanned: u64,
    /// Articles that could not be decoded; their index entries are left alone
    pub articles_unreadable: u64,
    /// Index entries written because an article lists the tag
    pub entries_added: u64,
    /// Index entries removed because no article backs them
    pub entries_removed: u64,
    /// Tags whose article count was corrected
    pub counts_fixed: u64,
}

impl RepairReport {
    /// True when the index and counts were already consistent
    pub fn is_clean(&self) -> bool {
        self.entries_added == 0 && self.entries_removed == 0 && self.counts_fixed == 0
    }
}

pub struct Model<C = BincodeCodec> {
    articles: ArticleStore<C>,
    tags: TagStore,
    index: TagIndex,
    ids: Option<IdMgr>,
    lock: RwLock<()>,
    root: PathBuf,
}

impl Model<BincodeCodec> {
    /// Open every store under `config.root` with the default article codec
    pub fn open(config: ModelConfig) -> Result<Self> {
        Self::open_with_codec(config, BincodeCodec)
    }
}

impl<C: RecordCodec<Article>> Model<C> {
    /// Open every store under `config.root`, encoding articles with `codec`
    pub fn open_with_codec(config: ModelConfig, codec: C) -> Result<Self> {
        // Token settings are checked before any store directory is created
        let tokens = if config.id_store {
            Some(match config.token_seed {
                Some(seed) => {
                    TokenGenerator::with_seed(seed, config.token_min_len, config.token_max_len)?
                }
                None => TokenGenerator::new(config.token_min_len, config.token_max_len)?,
            })
        } else {
            None
        };

        let articles = RecordStore::<Article, C>::open_articles(
            &config.article_dir(),
            &config.engine,
            codec,
        )?;
        let tags = TagStore::open(&config.tag_dir(), &config.engine, BincodeCodec)?;
        let index = TagIndex::open(&config.index_dir(), &config.engine)?;
        let ids = match tokens {
            Some(tokens) => Some(IdMgr::open(&config.idmap_dir(), &config.engine, tokens)?),
            None => None,
        };

        let article_count = articles.count()?;
        let tag_count = tags.count()?;
        info!(
            root = %config.root.display(),
            articles = article_count,
            tags = tag_count,
            id_store = config.id_store,
            "model opened"
        );

        Ok(Self {
            articles,
            tags,
            index,
            ids,
            lock: RwLock::new(()),
            root: config.root,
        })
    }

    // =========================================================================
    // Article writes
    // =========================================================================

    /// Add an article, returning its id
    ///
    /// No tags files the article under the empty-name tag. Tags are created
    /// on first use and are not removed if the article write fails.
    pub fn add_article(&self, tags: &[&str], data: &str) -> Result<u64> {
        let _guard = self.lock.write();
        check_data(data)?;

        let tag_ids = self.resolve_tags(tags)?;
        let id = self.articles.allocate_id()?;
        let article = Article {
            id,
            tag_ids,
            data: data.to_string(),
        };

        let mut saga = Saga::new("add article").step(
            "insert article",
            || self.articles.insert(&article),
            || self.articles.delete(id),
        );
        for &tag_id in &article.tag_ids {
            saga = saga.step(
                format!("put index entry {}", tag_id),
                move || self.index.put_entry(tag_id, id),
                move || self.index.delete_entry(tag_id, id),
            );
        }
        for &tag_id in &article.tag_ids {
            saga = saga.step(
                format!("count tag {}", tag_id),
                move || self.count_tag(tag_id, 1),
                move || self.count_tag(tag_id, -1),
            );
        }
        saga.run()?;

        Ok(id)
    }

    /// Replace an article's tags and body
    pub fn update_article(&self, id: u64, tags: &[&str], data: &str) -> Result<()> {
        let _guard = self.lock.write();
        check_data(data)?;

        let old = self.articles.get_by_id(id)?;
        let tag_ids = self.resolve_tags(tags)?;

        let dropped: Vec<u64> = old
            .tag_ids
            .iter()
            .copied()
            .filter(|tag_id| !tag_ids.contains(tag_id))
            .collect();
        let added: Vec<u64> = tag_ids
            .iter()
            .copied()
            .filter(|tag_id| !old.tag_ids.contains(tag_id))
            .collect();

        let new = Article {
            id,
            tag_ids,
            data: data.to_string(),
        };

        let mut saga = Saga::new("update article");
        for &tag_id in &dropped {
            saga = saga.step(
                format!("delete index entry {}", tag_id),
                move || self.remove_entry(tag_id, id),
                move || self.index.put_entry(tag_id, id),
            );
        }
        for &tag_id in &added {
            saga = saga.step(
                format!("put index entry {}", tag_id),
                move || self.index.put_entry(tag_id, id),
                move || self.index.delete_entry(tag_id, id),
            );
        }
        saga = saga.step(
            "update article",
            || self.articles.update(&new),
            || self.articles.update(&old),
        );
        for &tag_id in &dropped {
            saga = saga.step(
                format!("uncount tag {}", tag_id),
                move || self.count_tag(tag_id, -1),
                move || self.count_tag(tag_id, 1),
            );
        }
        for &tag_id in &added {
            saga = saga.step(
                format!("count tag {}", tag_id),
                move || self.count_tag(tag_id, 1),
                move || self.count_tag(tag_id, -1),
            );
        }
        saga.run()
    }

    /// Delete an article and its index entries; its tags are kept
    pub fn delete_article(&self, id: u64) -> Result<()> {
        let _guard = self.lock.write();

        let article = self.articles.get_by_id(id)?;

        let mut saga = Saga::new("delete article").step(
            "delete article",
            || self.articles.delete(id),
            || self.articles.insert(&article),
        );
        for &tag_id in &article.tag_ids {
            saga = saga.step(
                format!("delete index entry {}", tag_id),
                move || self.remove_entry(tag_id, id),
                move || self.index.put_entry(tag_id, id),
            );
        }
        for &tag_id in &article.tag_ids {
            saga = saga.step(
                format!("uncount tag {}", tag_id),
                move || self.count_tag(tag_id, -1),
                move || self.count_tag(tag_id, 1),
            );
        }
        saga.run()
    }

    // =========================================================================
    // Article reads
    // =========================================================================

    pub fn get_article(&self, id: u64) -> Result<Article> {
        let _guard = self.lock.read();
        self.articles.get_by_id(id)
    }

    /// Up to `n` articles after `id`; `id = 0` starts at the oldest
    pub fn get_next_articles(&self, id: u64, n: usize) -> Result<Vec<Article>> {
        let _guard = self.lock.read();
        self.articles.next(id, n)
    }

    /// Up to `n` articles before `id`; an `id` past the newest starts at the newest
    pub fn get_prev_articles(&self, id: u64, n: usize) -> Result<Vec<Article>> {
        let _guard = self.lock.read();
        self.articles.prev(id, n)
    }

    /// Up to `n` articles of tag `name` after `id`, ascending
    ///
    /// An unknown tag yields no articles.
    pub fn get_next_articles_by_tag(&self, name: &str, id: u64, n: usize) -> Result<Vec<Article>> {
        let _guard = self.lock.read();
        let tag = match self.find_tag(name)? {
            Some(tag) => tag,
            None => return Ok(Vec::new()),
        };
        self.collect_by_tag(tag.id, id, n, Direction::Forward)
    }

    /// Up to `n` articles of tag `name` before `id`, descending
    ///
    /// An unknown tag yields no articles.
    pub fn get_prev_articles_by_tag(&self, name: &str, id: u64, n: usize) -> Result<Vec<Article>> {
        let _guard = self.lock.read();
        let tag = match self.find_tag(name)? {
            Some(tag) => tag,
            None => return Ok(Vec::new()),
        };
        self.collect_by_tag(tag.id, id, n, Direction::Backward)
    }

    pub fn get_article_count(&self) -> Result<u64> {
        let _guard = self.lock.read();
        self.articles.count()
    }

    pub fn get_max_article_id(&self) -> Result<u64> {
        let _guard = self.lock.read();
        self.articles.max_id()
    }

    // =========================================================================
    // Tags
    // =========================================================================

    pub fn get_tag_by_id(&self, id: u64) -> Result<Tag> {
        let _guard = self.lock.read();
        self.tags.get_by_id(id)
    }

    pub fn get_tag_by_name(&self, name: &str) -> Result<Tag> {
        let _guard = self.lock.read();
        self.tags.get_by_name(name)
    }

    /// Rename a tag; articles filed under it follow (index keys use the id)
    pub fn rename_tag(&self, old_name: &str, new_name: &str) -> Result<()> {
        let _guard = self.lock.write();
        self.tags.rename(old_name, new_name)
    }

    pub fn get_tag_count(&self) -> Result<u64> {
        let _guard = self.lock.read();
        self.tags.count()
    }

    /// Up to `n` tags after the named tag (unknown name: from the oldest)
    pub fn get_next_tags(&self, name: &str, n: usize) -> Result<Vec<Tag>> {
        let _guard = self.lock.read();
        self.tags.next_by_name(name, n)
    }

    /// Up to `n` tags before the named tag (unknown name: from the newest)
    pub fn get_prev_tags(&self, name: &str, n: usize) -> Result<Vec<Tag>> {
        let _guard = self.lock.read();
        self.tags.prev_by_name(name, n)
    }

    // =========================================================================
    // Public ids
    // =========================================================================

    /// Public id of an article, generating one on first call
    pub fn assign_public_id(&self, article_id: u64) -> Result<String> {
        let _guard = self.lock.write();
        let ids = self.id_store()?;
        if !self.articles.has(article_id)? {
            return Err(FolioError::NotFound(format!("article {}", article_id)));
        }
        ids.add_int_id(article_id)
    }

    /// Give an article a caller-chosen public id
    pub fn set_public_id(&self, article_id: u64, public_id: &str) -> Result<()> {
        let _guard = self.lock.write();
        let ids = self.id_store()?;
        if !self.articles.has(article_id)? {
            return Err(FolioError::NotFound(format!("article {}", article_id)));
        }
        match ids.get_int_id(public_id)? {
            Some(owner) if owner != article_id => Err(FolioError::AlreadyExists(format!(
                "public id {:?} belongs to article {}",
                public_id, owner
            ))),
            _ => ids.set_id_map(article_id, public_id),
        }
    }

    pub fn public_id(&self, article_id: u64) -> Result<Option<String>> {
        let _guard = self.lock.read();
        self.id_store()?.get_string_id(article_id)
    }

    /// Article id behind a public id
    pub fn resolve_public_id(&self, public_id: &str) -> Result<Option<u64>> {
        let _guard = self.lock.read();
        self.id_store()?.get_int_id(public_id)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Rebuild index entries and tag article counts from the article store
    pub fn repair_tag_index(&self) -> Result<RepairReport> {
        let _guard = self.lock.write();
        let mut report = RepairReport::default();

        let mut expected: BTreeSet<(u64, u64)> = BTreeSet::new();
        let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
        let mut unreadable: BTreeSet<u64> = BTreeSet::new();
        let mut cursor = 0;
        loop {
            let page = self.articles.walk(cursor, REPAIR_PAGE)?;
            for (id, article) in &page {
                report.articles_scanned += 1;
                match article {
                    Some(article) => {
                        for &tag_id in &article.tag_ids {
                            expected.insert((tag_id, *id));
                            *counts.entry(tag_id).or_default() += 1;
                        }
                    }
                    None => {
                        unreadable.insert(*id);
                    }
                }
            }
            match page.last() {
                Some(&(last, _)) if page.len() == REPAIR_PAGE => cursor = last,
                _ => break,
            }
        }
        report.articles_unreadable = unreadable.len() as u64;

        let actual: BTreeSet<(u64, u64)> = self.index.entries()?.into_iter().collect();

        // The tags of an unreadable article are unknown: keep its entries as they are
        for &(tag_id, article_id) in &actual {
            if unreadable.contains(&article_id) {
                expected.insert((tag_id, article_id));
                *counts.entry(tag_id).or_default() += 1;
            }
        }

        for &(tag_id, article_id) in expected.difference(&actual) {
            self.index.put_entry(tag_id, article_id)?;
            report.entries_added += 1;
        }
        for &(tag_id, article_id) in actual.difference(&expected) {
            self.index.delete_entry(tag_id, article_id)?;
            report.entries_removed += 1;
        }

        let mut cursor = 0;
        loop {
            let page = self.tags.walk(cursor, REPAIR_PAGE)?;
            for (tag_id, tag) in &page {
                let tag = match tag {
                    Some(tag) => tag,
                    None => {
                        warn!(tag_id, "skipping undecodable tag");
                        continue;
                    }
                };
                let count = counts.get(tag_id).copied().unwrap_or(0);
                if tag.article_count != count {
                    self.tags.set_article_count(*tag_id, count)?;
                    report.counts_fixed += 1;
                }
            }
            match page.last() {
                Some(&(last, _)) if page.len() == REPAIR_PAGE => cursor = last,
                _ => break,
            }
        }

        info!(
            articles = report.articles_scanned,
            unreadable = report.articles_unreadable,
            added = report.entries_added,
            removed = report.entries_removed,
            counts_fixed = report.counts_fixed,
            "tag index repaired"
        );
        Ok(report)
    }

    /// Flush every store's MemTable to disk
    pub fn flush(&self) -> Result<()> {
        let _guard = self.lock.write();
        self.articles.flush()?;
        self.tags.flush()?;
        self.index.flush()?;
        if let Some(ids) = &self.ids {
            ids.flush()?;
        }
        Ok(())
    }

    /// Close every store; the first failure is returned after all are closed
    pub fn close(self) -> Result<()> {
        info!(root = %self.root.display(), "model closed");
        let results = [
            self.articles.close(),
            self.tags.close(),
            self.index.close(),
            self.ids.map_or(Ok(()), IdMgr::close),
        ];
        results.into_iter().collect()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Tag ids for tag names, creating missing tags
    ///
    /// An empty list means the empty-name tag; repeated names collapse.
    fn resolve_tags(&self, names: &[&str]) -> Result<Vec<u64>> {
        let names: &[&str] = if names.is_empty() { &[""] } else { names };
        let mut tag_ids = Vec::with_capacity(names.len());
        for name in names {
            let tag_id = self.tags.add(name)?;
            if !tag_ids.contains(&tag_id) {
                tag_ids.push(tag_id);
            }
        }
        Ok(tag_ids)
    }

    fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        match self.tags.get_by_name(name) {
            Ok(tag) => Ok(Some(tag)),
            Err(FolioError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn count_tag(&self, tag_id: u64, delta: i64) -> Result<()> {
        self.tags.add_article_count_for_id(tag_id, delta).map(|_| ())
    }

    /// Remove an index entry; an entry that is already gone is not an error
    fn remove_entry(&self, tag_id: u64, article_id: u64) -> Result<()> {
        match self.index.delete_entry(tag_id, article_id) {
            Err(FolioError::NotFound(_)) => {
                warn!(tag_id, article_id, "index entry already missing");
                Ok(())
            }
            other => other,
        }
    }

    /// Walk the tag's bucket from `cursor` until `n` articles resolve
    ///
    /// Stale entries are skipped without using up a slot.
    fn collect_by_tag(
        &self,
        tag_id: u64,
        cursor: u64,
        n: usize,
        direction: Direction,
    ) -> Result<Vec<Article>> {
        let mut articles = Vec::new();
        let mut cursor = cursor;
        while articles.len() < n {
            let want = n - articles.len();
            let hits = match direction {
                Direction::Forward => self.index.next(tag_id, cursor, want)?,
                Direction::Backward => self.index.prev(tag_id, cursor, want)?,
            };
            let exhausted = hits.len() < want;
            if let Some(&last) = hits.last() {
                cursor = last;
            }
            articles.extend(self.load_articles(tag_id, hits)?);
            if exhausted {
                break;
            }
        }
        Ok(articles)
    }

    /// Resolve index hits to articles, skipping entries with no article
    fn load_articles(&self, tag_id: u64, ids: Vec<u64>) -> Result<Vec<Article>> {
        let mut articles = Vec::with_capacity(ids.len());
        for id in ids {
            match self.articles.get_by_id(id) {
                Ok(article) => articles.push(article),
                Err(FolioError::NotFound(_)) => {
                    warn!(tag_id, article_id = id, "stale index entry");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(articles)
    }

    fn id_store(&self) -> Result<&IdMgr> {
        self.ids
            .as_ref()
            .ok_or_else(|| FolioError::Config("id store is not enabled".to_string()))
    }
}

fn check_data(data: &str) -> Result<()> {
    if data.is_empty() {
        return Err(FolioError::InvalidInput("article data must not be empty".to_string()));
    }
    Ok(())
}
