//! Tests for tag index repair
//!
//! Damage is done by opening the index or tag store directly while the
//! model is closed, then `repair_tag_index` must restore both from the
//! article store. Stale entries must not shorten tag-filtered pages.

use folio::config::ModelConfig;
use folio::record::{Article, BincodeCodec, RecordCodec, TagStore};
use folio::{FolioError, Model, Result, TagIndex};
use tempfile::TempDir;

use super::{ids, model_config};

fn with_index(config: &ModelConfig, damage: impl FnOnce(&TagIndex)) {
    let index = TagIndex::open(&config.index_dir(), &config.engine).unwrap();
    damage(&index);
    index.close().unwrap();
}

#[test]
fn test_clean_model_repairs_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let model = Model::open(model_config(&temp_dir)).unwrap();
    model.add_article(&["a", "b"], "one").unwrap();
    model.add_article(&["b"], "two").unwrap();

    let report = model.repair_tag_index().unwrap();

    assert!(report.is_clean());
    assert_eq!(report.articles_scanned, 2);
}

#[test]
fn test_repair_restores_missing_entry() {
    let temp_dir = TempDir::new().unwrap();
    let config = model_config(&temp_dir);

    let tag_id = {
        let model = Model::open(config.clone()).unwrap();
        model.add_article(&["t"], "one").unwrap();
        model.add_article(&["t"], "two").unwrap();
        let tag_id = model.get_tag_by_name("t").unwrap().id;
        model.close().unwrap();
        tag_id
    };

    with_index(&config, |index| index.delete_entry(tag_id, 1).unwrap());

    let model = Model::open(config).unwrap();
    assert_eq!(ids(model.get_next_articles_by_tag("t", 0, 10).unwrap()), vec![2]);

    let report = model.repair_tag_index().unwrap();

    assert_eq!(report.entries_added, 1);
    assert_eq!(report.entries_removed, 0);
    assert_eq!(ids(model.get_next_articles_by_tag("t", 0, 10).unwrap()), vec![1, 2]);
    assert!(model.repair_tag_index().unwrap().is_clean());
}

#[test]
fn test_repair_removes_orphan_entries() {
    let temp_dir = TempDir::new().unwrap();
    let config = model_config(&temp_dir);

    let tag_id = {
        let model = Model::open(config.clone()).unwrap();
        model.add_article(&["t"], "one").unwrap();
        let tag_id = model.get_tag_by_name("t").unwrap().id;
        model.close().unwrap();
        tag_id
    };

    // An entry for an article that was never written
    with_index(&config, |index| index.put_entry(tag_id, 77).unwrap());

    let model = Model::open(config).unwrap();
    // Stale hits are skipped by queries even before repair
    assert_eq!(ids(model.get_next_articles_by_tag("t", 0, 100).unwrap()), vec![1]);

    let report = model.repair_tag_index().unwrap();

    assert_eq!(report.entries_removed, 1);
    assert!(report.entries_added == 0 && report.counts_fixed == 0);
}

#[test]
fn test_repair_fixes_tag_counts() {
    let temp_dir = TempDir::new().unwrap();
    let config = model_config(&temp_dir);

    {
        let model = Model::open(config.clone()).unwrap();
        model.add_article(&["t", "u"], "one").unwrap();
        model.add_article(&["t"], "two").unwrap();
        model.close().unwrap();
    }

    {
        let tags = TagStore::open(&config.tag_dir(), &config.engine, BincodeCodec).unwrap();
        tags.set_article_count(1, 9).unwrap();
        tags.add("unused").unwrap();
        tags.add_article_count_for_name("unused", 4).unwrap();
        tags.close().unwrap();
    }

    let model = Model::open(config).unwrap();
    let report = model.repair_tag_index().unwrap();

    assert_eq!(report.counts_fixed, 2);
    assert_eq!(model.get_tag_by_name("t").unwrap().article_count, 2);
    assert_eq!(model.get_tag_by_name("u").unwrap().article_count, 1);
    assert_eq!(model.get_tag_by_name("unused").unwrap().article_count, 0);
}

/// Bincode, except that the body "broken" cannot be read back
struct UnreadableCodec;

impl RecordCodec<Article> for UnreadableCodec {
    fn encode(&self, article: &Article) -> Result<Vec<u8>> {
        BincodeCodec.encode(article)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Article> {
        let article: Article = BincodeCodec.decode(bytes)?;
        if article.data == "broken" {
            return Err(FolioError::Serialization("unreadable body".to_string()));
        }
        Ok(article)
    }
}

#[test]
fn test_repair_walks_past_unreadable_articles() {
    let temp_dir = TempDir::new().unwrap();
    let model = Model::open_with_codec(model_config(&temp_dir), UnreadableCodec).unwrap();

    // One unreadable article, then more than a repair page of readable ones
    model.add_article(&["t"], "broken").unwrap();
    for i in 0..300 {
        model.add_article(&["t"], &format!("article {}", i)).unwrap();
    }

    let report = model.repair_tag_index().unwrap();

    assert_eq!(report.articles_scanned, 301);
    assert_eq!(report.articles_unreadable, 1);
    assert_eq!(report.entries_removed, 0);
    assert_eq!(report.counts_fixed, 0);
    assert_eq!(model.get_tag_by_name("t").unwrap().article_count, 301);
    assert_eq!(model.get_next_articles_by_tag("t", 0, 1000).unwrap().len(), 300);
}

#[test]
fn test_stale_entries_do_not_shorten_tag_pages() {
    let temp_dir = TempDir::new().unwrap();
    let config = model_config(&temp_dir);

    let tag_id = {
        let model = Model::open(config.clone()).unwrap();
        for body in ["one", "two", "three"] {
            model.add_article(&["t"], body).unwrap();
        }
        let tag_id = model.get_tag_by_name("t").unwrap().id;
        model.close().unwrap();
        tag_id
    };

    // Entries for articles that do not exist, on both sides of the real ones
    with_index(&config, |index| {
        index.put_entry(tag_id, 9).unwrap();
        index.put_entry(tag_id, 0).unwrap();
    });

    let model = Model::open(config).unwrap();

    assert_eq!(ids(model.get_prev_articles_by_tag("t", 20, 2).unwrap()), vec![3, 2]);
    assert_eq!(ids(model.get_next_articles_by_tag("t", 2, 5).unwrap()), vec![3]);
    assert_eq!(ids(model.get_prev_articles_by_tag("t", 20, 5).unwrap()), vec![3, 2, 1]);
}
