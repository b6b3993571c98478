//! Tests for TagStore
//!
//! These tests verify:
//! - Idempotent add by name
//! - Id and name lookups stay in step (including rename and delete)
//! - Article counts
//! - Pagination by id and by name

use folio::record::{BincodeCodec, Tag, TagStore};
use folio::FolioError;

use super::{setup_temp_dir, test_config};

fn open_tags(path: &std::path::Path) -> TagStore {
    TagStore::open(path, &test_config(), BincodeCodec).unwrap()
}

fn names(tags: Vec<Tag>) -> Vec<String> {
    tags.into_iter().map(|t| t.name).collect()
}

// =============================================================================
// Add / Delete Tests
// =============================================================================

#[test]
fn test_add_is_idempotent() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);

    let first = tags.add("x").unwrap();
    let again = tags.add("x").unwrap();

    assert_eq!(first, again);
    assert_eq!(tags.count().unwrap(), 1);
    assert_eq!(tags.max_id().unwrap(), 1);
}

#[test]
fn test_lookup_by_id_and_name() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);

    let rust = tags.add("rust").unwrap();
    let go = tags.add("go").unwrap();

    assert_eq!(tags.get_by_id(go).unwrap().name, "go");
    assert_eq!(tags.get_by_name("rust").unwrap().id, rust);
    assert!(matches!(tags.get_by_name("zig"), Err(FolioError::NotFound(_))));
    assert!(matches!(tags.get_by_id(99), Err(FolioError::NotFound(_))));
}

#[test]
fn test_empty_name_is_a_tag() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);

    let id = tags.add("").unwrap();

    assert_eq!(tags.get_by_name("").unwrap().id, id);
}

#[test]
fn test_delete_removes_both_keys() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);
    let a = tags.add("a").unwrap();
    tags.add("b").unwrap();

    tags.delete_by_id(a).unwrap();
    tags.delete_by_name("b").unwrap();

    assert_eq!(tags.count().unwrap(), 0);
    assert!(matches!(tags.get_by_name("a"), Err(FolioError::NotFound(_))));
    assert!(matches!(tags.delete_by_name("b"), Err(FolioError::NotFound(_))));
    // A deleted name can be added again under a new id
    assert_eq!(tags.add("a").unwrap(), 3);
}

// =============================================================================
// Rename Tests
// =============================================================================

#[test]
fn test_rename_keeps_id_and_count() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);
    let id = tags.add("old").unwrap();
    tags.add_article_count_for_id(id, 3).unwrap();

    tags.rename("old", "new").unwrap();

    assert!(matches!(tags.get_by_name("old"), Err(FolioError::NotFound(_))));
    let tag = tags.get_by_name("new").unwrap();
    assert_eq!(tag.id, id);
    assert_eq!(tag.article_count, 3);
    assert_eq!(tags.get_by_id(id).unwrap().name, "new");
    assert_eq!(tags.count().unwrap(), 1);
}

#[test]
fn test_rename_conflicts_and_missing() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);
    tags.add("a").unwrap();
    tags.add("b").unwrap();

    assert!(matches!(tags.rename("a", "b"), Err(FolioError::AlreadyExists(_))));
    assert!(matches!(tags.rename("zz", "c"), Err(FolioError::NotFound(_))));
    // Same name is a no-op
    tags.rename("a", "a").unwrap();
    assert_eq!(tags.get_by_name("a").unwrap().id, 1);
}

// =============================================================================
// Article Count Tests
// =============================================================================

#[test]
fn test_article_counts() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);
    let id = tags.add("t").unwrap();

    assert_eq!(tags.add_article_count_for_id(id, 2).unwrap(), 2);
    assert_eq!(tags.add_article_count_for_name("t", -1).unwrap(), 1);
    // Saturates at zero
    assert_eq!(tags.add_article_count_for_name("t", -5).unwrap(), 0);

    tags.set_article_count(id, 7).unwrap();
    assert_eq!(tags.get_article_count_by_id(id).unwrap(), 7);
    assert_eq!(tags.get_article_count_by_name("t").unwrap(), 7);

    // Unknown tags count zero
    assert_eq!(tags.get_article_count_by_id(42).unwrap(), 0);
    assert_eq!(tags.get_article_count_by_name("nope").unwrap(), 0);
    assert!(matches!(
        tags.add_article_count_for_name("nope", 1),
        Err(FolioError::NotFound(_))
    ));
}

// =============================================================================
// Pagination Tests
// =============================================================================

#[test]
fn test_next_prev_by_id() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);
    for name in ["a", "b", "c", "d"] {
        tags.add(name).unwrap();
    }

    // Name mirror keys never leak into id pagination
    assert_eq!(names(tags.next(0, 10).unwrap()), vec!["a", "b", "c", "d"]);
    assert_eq!(names(tags.next(2, 1).unwrap()), vec!["c"]);
    assert_eq!(names(tags.prev(3, 10).unwrap()), vec!["b", "a"]);
    assert_eq!(names(tags.prev(100, 2).unwrap()), vec!["d", "c"]);
}

#[test]
fn test_next_prev_by_name() {
    let (_temp, path) = setup_temp_dir();
    let tags = open_tags(&path);
    for name in ["zeta", "alpha", "mid"] {
        tags.add(name).unwrap();
    }

    // Ordered by id (creation order), not by name
    assert_eq!(names(tags.next_by_name("zeta", 5).unwrap()), vec!["alpha", "mid"]);
    assert_eq!(names(tags.prev_by_name("mid", 5).unwrap()), vec!["alpha", "zeta"]);
    assert_eq!(names(tags.next_by_name("unknown", 1).unwrap()), vec!["zeta"]);
    assert_eq!(names(tags.prev_by_name("unknown", 1).unwrap()), vec!["mid"]);
}

#[test]
fn test_tags_survive_reopen() {
    let (_temp, path) = setup_temp_dir();

    {
        let tags = open_tags(&path);
        tags.add("kept").unwrap();
        tags.rename("kept", "renamed").unwrap();
        tags.close().unwrap();
    }

    let tags = open_tags(&path);
    assert_eq!(tags.get_by_name("renamed").unwrap().id, 1);
    assert_eq!(tags.add("second").unwrap(), 2);
    assert_eq!(tags.count().unwrap(), 2);
}
