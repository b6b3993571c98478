//! Ordered key scans
//!
//! Merges the key streams of the MemTable and every SSTable into one ordered
//! stream of live keys. Each source yields `(key, is_tombstone)` in scan
//! direction; sources are ranked newest first, and when several sources hold
//! the same key the newest one decides whether it is live.

use std::iter::Peekable;
use std::ops::Bound;

/// Scan direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending keys, strictly after the start key
    Forward,

    /// Descending keys, strictly before the start key
    Backward,
}

impl Direction {
    /// Range bounds for a scan starting (exclusively) at `from`
    ///
    /// `None` starts at the beginning (forward) or end (backward) of the keyspace.
    pub fn bounds(self, from: Option<&[u8]>) -> (Bound<&[u8]>, Bound<&[u8]>) {
        match (self, from) {
            (_, None) => (Bound::Unbounded, Bound::Unbounded),
            (Direction::Forward, Some(key)) => (Bound::Excluded(key), Bound::Unbounded),
            (Direction::Backward, Some(key)) => (Bound::Unbounded, Bound::Excluded(key)),
        }
    }
}

/// One ordered key source: `(key, is_tombstone)`
pub type KeySource<'a> = Box<dyn Iterator<Item = (&'a [u8], bool)> + 'a>;

/// Newest-wins merge over several ordered key sources
pub struct MergedKeys<'a> {
    sources: Vec<Peekable<KeySource<'a>>>,
    direction: Direction,
}

impl<'a> MergedKeys<'a> {
    /// `sources` must be ordered newest first and all walk in `direction`
    pub fn new(sources: Vec<KeySource<'a>>, direction: Direction) -> Self {
        Self {
            sources: sources.into_iter().map(Iterator::peekable).collect(),
            direction,
        }
    }

    /// Next live key, skipping keys whose newest version is a tombstone
    pub fn next_live(&mut self) -> Option<&'a [u8]> {
        loop {
            let (key, tombstone) = self.next()?;
            if !tombstone {
                return Some(key);
            }
        }
    }
}

/// True when `a` comes before `b` in scan order
fn leads(direction: Direction, a: &[u8], b: &[u8]) -> bool {
    match direction {
        Direction::Forward => a < b,
        Direction::Backward => a > b,
    }
}

impl<'a> Iterator for MergedKeys<'a> {
    /// Every distinct key once, with the tombstone flag of its newest version
    type Item = (&'a [u8], bool);

    fn next(&mut self) -> Option<Self::Item> {
        // Find the leading key across all sources; the first source holding it wins
        let mut best: Option<(&'a [u8], bool)> = None;
        for source in self.sources.iter_mut() {
            if let Some(&(key, tombstone)) = source.peek() {
                let replace = match best {
                    None => true,
                    Some((best_key, _)) => leads(self.direction, key, best_key),
                };
                if replace {
                    best = Some((key, tombstone));
                }
            }
        }

        let (key, tombstone) = best?;

        // Consume the key from every source that holds it (older versions are shadowed)
        for source in self.sources.iter_mut() {
            while let Some(&(candidate, _)) = source.peek() {
                if candidate == key {
                    source.next();
                } else {
                    break;
                }
            }
        }

        Some((key, tombstone))
    }
}
