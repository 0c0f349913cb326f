use crate::backend::protocol::DbResponse;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Recently read pages of one cursor, keyed by start index.
///
/// Lets a cursor moving back and forth across a page boundary avoid
/// refetching the page it just left.
pub struct PageCache {
    pages: LruCache<i64, DbResponse>,
}

impl PageCache {
    /// `None` when `capacity` is zero
    pub fn new(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|cap| Self {
            pages: LruCache::new(cap),
        })
    }

    pub fn insert(&mut self, page: DbResponse) {
        if page.rows.is_empty() {
            return;
        }
        self.pages.put(page.start_index, page);
    }

    /// Remove and return the cached page holding `position`
    pub fn take_containing(&mut self, position: i64) -> Option<DbResponse> {
        let key = self
            .pages
            .iter()
            .find(|(_, page)| page.contains(position))
            .map(|(start, _)| *start)?;
        self.pages.pop(&key)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
