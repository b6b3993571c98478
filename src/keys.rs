//! Key encoding
//!
//! Record ids are stored as zero-padded decimal strings so that the engine's
//! byte order equals numeric order. Ids up to `MAX_PADDED_ID` use exactly
//! `ID_WIDTH` digits; larger ids fall back to their natural width, and from
//! there on byte order no longer follows numeric order
//! (`encode_id(MAX_PADDED_ID + 1)` sorts before `encode_id(MAX_PADDED_ID)`).
//! Pagination is only exact for ids in `0..=MAX_PADDED_ID`.
//!
//! Index keys are `"<tag id>_<padded article id>"`; the prefix `"<tag id>_"`
//! bounds one tag's bucket. No tag id is a prefix of another tag's bucket
//! because `_` follows every digit.

use crate::error::{FolioError, Result};

/// Digits in a padded id
pub const ID_WIDTH: usize = 15;

/// Largest id that encodes at fixed width
pub const MAX_PADDED_ID: u64 = 999_999_999_999_999;

/// Separator between tag id and article id in index keys
pub const INDEX_SEPARATOR: char = '_';

/// Encode an id as a key; order-preserving for ids up to `MAX_PADDED_ID`
pub fn encode_id(id: u64) -> String {
    format!("{:0width$}", id, width = ID_WIDTH)
}

/// Decode an id produced by `encode_id`
pub fn decode_id(key: &str) -> Result<u64> {
    key.parse()
        .map_err(|_| FolioError::Serialization(format!("Invalid id key: {:?}", key)))
}

/// Encode an id under a store-internal prefix (`id_`, `int_`, ...)
pub fn prefixed_id(prefix: &str, id: u64) -> String {
    format!("{}{}", prefix, encode_id(id))
}

/// Decode an id from a prefixed key; `None` when the prefix does not match
pub fn strip_prefixed_id(prefix: &str, key: &[u8]) -> Option<u64> {
    let rest = key.strip_prefix(prefix.as_bytes())?;
    std::str::from_utf8(rest).ok()?.parse().ok()
}

/// Prefix bounding one tag's bucket in the index
pub fn index_prefix(tag_id: u64) -> String {
    format!("{}{}", tag_id, INDEX_SEPARATOR)
}

/// Composite index key for (tag, article)
pub fn index_key(tag_id: u64, article_id: u64) -> String {
    format!("{}{}{}", tag_id, INDEX_SEPARATOR, encode_id(article_id))
}

/// Split a composite index key into (tag id, article id)
pub fn split_index_key(key: &[u8]) -> Option<(u64, u64)> {
    let key = std::str::from_utf8(key).ok()?;
    let (tag, article) = key.split_once(INDEX_SEPARATOR)?;
    Some((tag.parse().ok()?, article.parse().ok()?))
}
