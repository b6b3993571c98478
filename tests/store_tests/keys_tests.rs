//! Tests for key encoding
//!
//! Padded ids must sort like the numbers they encode, and index keys must
//! keep each tag's entries in one contiguous, id-ordered bucket.

use folio::keys::{
    decode_id, encode_id, index_key, index_prefix, prefixed_id, split_index_key,
    strip_prefixed_id, ID_WIDTH, MAX_PADDED_ID,
};
use folio::FolioError;
use proptest::prelude::*;

#[test]
fn test_encode_id_width() {
    assert_eq!(encode_id(1), "000000000000001");
    assert_eq!(encode_id(MAX_PADDED_ID).len(), ID_WIDTH);
    assert_eq!(decode_id("000000000000042").unwrap(), 42);
    assert!(matches!(decode_id("4x"), Err(FolioError::Serialization(_))));
}

#[test]
fn test_prefixed_ids() {
    assert_eq!(prefixed_id("id_", 7), "id_000000000000007");
    assert_eq!(strip_prefixed_id("id_", b"id_000000000000007"), Some(7));
    assert_eq!(strip_prefixed_id("id_", b"name_rust"), None);
    assert_eq!(strip_prefixed_id("id_", b"id_abc"), None);
}

#[test]
fn test_index_keys() {
    assert_eq!(index_prefix(12), "12_");
    assert_eq!(index_key(12, 3), "12_000000000000003");
    assert_eq!(split_index_key(b"12_000000000000003"), Some((12, 3)));
    assert_eq!(split_index_key(b"12-3"), None);
    assert_eq!(split_index_key(&[0xff, b'_', b'1']), None);
}

#[test]
fn test_bucket_is_not_shared_with_longer_tag_ids() {
    // "1_" must not be a prefix of tag 10's keys
    assert!(!index_key(10, 1).starts_with(&index_prefix(1)));
    // No key of tag 10 falls inside tag 1's bucket
    let low = index_key(1, 1);
    let high = index_key(1, MAX_PADDED_ID);
    let other = index_key(10, 5);
    assert!(!(low < other && other < high));
}

#[test]
fn test_order_holds_only_up_to_padded_width() {
    assert!(encode_id(MAX_PADDED_ID - 1) < encode_id(MAX_PADDED_ID));
    // One past the padded range widens the key and sorts before it
    assert!(encode_id(MAX_PADDED_ID + 1) < encode_id(MAX_PADDED_ID));
}

proptest! {
    /// Byte order equals numeric order across the padded range only
    #[test]
    fn prop_encode_id_preserves_order(a in 0..=MAX_PADDED_ID, b in 0..=MAX_PADDED_ID) {
        prop_assert_eq!(a.cmp(&b), encode_id(a).cmp(&encode_id(b)));
    }

    #[test]
    fn prop_index_keys_order_within_bucket(tag in 0u64..10_000, a in 0..=MAX_PADDED_ID, b in 0..=MAX_PADDED_ID) {
        let (ka, kb) = (index_key(tag, a), index_key(tag, b));
        prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        prop_assert!(ka.starts_with(&index_prefix(tag)));
        prop_assert_eq!(split_index_key(ka.as_bytes()), Some((tag, a)));
    }
}
