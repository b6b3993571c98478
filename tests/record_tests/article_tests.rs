//! Tests for the article RecordStore
//!
//! These tests verify:
//! - Ids are allocated 1..N and never reused
//! - Get/update/delete with NotFound semantics
//! - Next/Prev cursor pagination, including gaps and clamping
//! - Caller-supplied codecs

use folio::record::{Article, ArticleStore, BincodeCodec, RecordCodec, RecordStore};
use folio::{FolioError, Result};

use super::{setup_temp_dir, test_config};

fn open_store(path: &std::path::Path) -> ArticleStore {
    ArticleStore::open_articles(path, &test_config(), BincodeCodec).unwrap()
}

fn ids(articles: Vec<Article>) -> Vec<u64> {
    articles.into_iter().map(|a| a.id).collect()
}

fn add_articles(store: &ArticleStore, count: u64) {
    for i in 1..=count {
        let id = store.add(Article::new(vec![], format!("body {}", i))).unwrap();
        assert_eq!(id, i);
    }
}

// =============================================================================
// Write Tests
// =============================================================================

#[test]
fn test_ids_are_sequential() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);

    add_articles(&store, 10);

    assert_eq!(store.max_id().unwrap(), 10);
    assert_eq!(store.count().unwrap(), 10);
    let article = store.get_by_id(7).unwrap();
    assert_eq!(article.id, 7);
    assert_eq!(article.data, "body 7");
}

#[test]
fn test_ids_continue_after_reopen_and_delete() {
    let (_temp, path) = setup_temp_dir();

    {
        let store = open_store(&path);
        add_articles(&store, 3);
        store.delete(3).unwrap();
        store.close().unwrap();
    }

    let store = open_store(&path);
    assert_eq!(store.add(Article::new(vec![], "four")).unwrap(), 4);
    assert!(!store.has(3).unwrap());
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn test_update_existing_and_missing() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);
    add_articles(&store, 1);

    let mut article = store.get_by_id(1).unwrap();
    article.data = "edited".to_string();
    article.tag_ids = vec![4, 2];
    store.update(&article).unwrap();

    assert_eq!(store.get_by_id(1).unwrap(), article);
    assert_eq!(store.count().unwrap(), 1);

    let ghost = Article {
        id: 9,
        ..article
    };
    assert!(matches!(store.update(&ghost), Err(FolioError::NotFound(_))));
    assert!(!store.has(9).unwrap());
}

#[test]
fn test_delete_twice() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);
    add_articles(&store, 2);

    store.delete(1).unwrap();

    assert!(matches!(store.delete(1), Err(FolioError::NotFound(_))));
    assert!(matches!(store.get_by_id(1), Err(FolioError::NotFound(_))));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_count_after_adds_and_deletes() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);
    add_articles(&store, 20);

    for id in (2..=20).step_by(3) {
        store.delete(id).unwrap();
    }

    // 7 deletes: 2, 5, 8, 11, 14, 17, 20
    assert_eq!(store.count().unwrap(), 13);
}

// =============================================================================
// Pagination Tests
// =============================================================================

#[test]
fn test_next_prev_over_101_articles() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);
    add_articles(&store, 101);

    assert_eq!(ids(store.next(0, 5).unwrap()), vec![1, 2, 3, 4, 5]);
    assert_eq!(ids(store.next(100, 2).unwrap()), vec![101]);
    assert!(store.next(101, 1).unwrap().is_empty());
    assert_eq!(ids(store.prev(101, 2).unwrap()), vec![100, 99]);
    assert!(store.prev(1, 1).unwrap().is_empty());
    assert!(store.prev(0, 5).unwrap().is_empty());
}

#[test]
fn test_pagination_skips_deleted_ids() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);
    add_articles(&store, 10);
    for id in [3, 4, 5, 8] {
        store.delete(id).unwrap();
    }

    assert_eq!(ids(store.next(2, 3).unwrap()), vec![6, 7, 9]);
    assert_eq!(ids(store.prev(9, 3).unwrap()), vec![7, 6, 2]);
}

#[test]
fn test_prev_clamps_past_newest() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);
    add_articles(&store, 5);

    // The clamped id itself is included
    assert_eq!(ids(store.prev(1000, 3).unwrap()), vec![5, 4, 3]);
    assert_eq!(ids(store.prev(u64::MAX, 1).unwrap()), vec![5]);

    store.delete(5).unwrap();
    assert_eq!(ids(store.prev(1000, 2).unwrap()), vec![4, 3]);
}

#[test]
fn test_pagination_across_flushes() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);
    add_articles(&store, 4);
    store.flush().unwrap();
    add_articles_from(&store, 5, 8);
    store.delete(2).unwrap();

    assert_eq!(ids(store.next(0, 10).unwrap()), vec![1, 3, 4, 5, 6, 7, 8]);
    assert_eq!(ids(store.prev(6, 10).unwrap()), vec![5, 4, 3, 1]);
}

fn add_articles_from(store: &ArticleStore, first: u64, last: u64) {
    for i in first..=last {
        assert_eq!(store.add(Article::new(vec![], "x")).unwrap(), i);
    }
}

#[test]
fn test_empty_store_pagination() {
    let (_temp, path) = setup_temp_dir();
    let store = open_store(&path);

    assert!(store.next(0, 10).unwrap().is_empty());
    assert!(store.prev(10, 10).unwrap().is_empty());
    assert!(store.next(0, 0).unwrap().is_empty());
}

// =============================================================================
// Codec Tests
// =============================================================================

/// Stores only the body as raw UTF-8; tags are not kept
struct BodyOnlyCodec;

impl RecordCodec<Article> for BodyOnlyCodec {
    fn encode(&self, article: &Article) -> Result<Vec<u8>> {
        Ok(format!("{}|{}", article.id, article.data).into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Article> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| FolioError::Serialization(e.to_string()))?;
        let (id, data) = text
            .split_once('|')
            .ok_or_else(|| FolioError::Serialization("missing separator".to_string()))?;
        let id = id
            .parse()
            .map_err(|_| FolioError::Serialization("bad id".to_string()))?;
        Ok(Article {
            id,
            tag_ids: Vec::new(),
            data: data.to_string(),
        })
    }
}

#[test]
fn test_custom_codec() {
    let (_temp, path) = setup_temp_dir();
    let store = RecordStore::<Article, _>::open_articles(&path, &test_config(), BodyOnlyCodec)
        .unwrap();

    let id = store.add(Article::new(vec![1, 2], "hello|world")).unwrap();

    let article = store.get_by_id(id).unwrap();
    assert_eq!(article.data, "hello|world");
    assert!(article.tag_ids.is_empty());
    assert_eq!(store.store().get(store.key(id).as_bytes()).unwrap(), b"1|hello|world");
}

#[test]
fn test_undecodable_record_is_not_found() {
    let (_temp, path) = setup_temp_dir();

    {
        let store = RecordStore::<Article, _>::open_articles(&path, &test_config(), BodyOnlyCodec)
            .unwrap();
        store.add(Article::new(vec![], "plain")).unwrap();
        store.add(Article::new(vec![], "plain")).unwrap();
        store.close().unwrap();
    }

    // Reading text records with the binary codec fails to decode
    let store = open_store(&path);
    store
        .store()
        .put(store.key(2).as_bytes(), &bincode::serialize(&Article {
            id: 2,
            tag_ids: vec![],
            data: "binary".to_string(),
        })
        .unwrap())
        .unwrap();

    assert!(matches!(store.get_by_id(1), Err(FolioError::NotFound(_))));
    // Pagination skips the bad record instead of failing
    assert_eq!(ids(store.next(0, 10).unwrap()), vec![2]);
}
