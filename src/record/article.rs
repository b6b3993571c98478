//! Articles
//!
//! Article keys are the bare padded id; the article store holds nothing else.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;

use super::{BincodeCodec, Record, RecordCodec, RecordStore};

/// An article: an opaque body filed under zero or more tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Allocated by the store, starting at 1; never changes
    pub id: u64,
    /// Tag ids in the order the caller gave the tags
    pub tag_ids: Vec<u64>,
    /// Caller-defined body
    pub data: String,
}

impl Article {
    /// An article not yet stored (id 0)
    pub fn new(tag_ids: Vec<u64>, data: impl Into<String>) -> Self {
        Self {
            id: 0,
            tag_ids,
            data: data.into(),
        }
    }
}

impl Record for Article {
    const KIND: &'static str = "article";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

pub type ArticleStore<C = BincodeCodec> = RecordStore<Article, C>;

impl<C: RecordCodec<Article>> RecordStore<Article, C> {
    pub const ARTICLE_PREFIX: &'static str = "";

    /// Open the article store in `path` with a caller-supplied codec
    pub fn open_articles(path: &Path, config: &Config, codec: C) -> Result<Self> {
        Self::open(path, config, codec, Self::ARTICLE_PREFIX)
    }
}
