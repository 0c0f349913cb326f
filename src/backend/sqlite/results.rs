use crate::backend::protocol::{DbResponse, Row};

/// Holds the single outstanding paged result of an engine instance.
///
/// Storing a new result replaces the previous one and hands out the next
/// sequence number, so any reader of the old result sees a mismatch.
#[derive(Debug)]
pub(crate) struct ResultCache {
    current: Option<CachedResult>,
    next_sequence: i32,
}

#[derive(Debug)]
struct CachedResult {
    sequence_number: i32,
    rows: Vec<Row>,
    page_size: u64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            current: None,
            next_sequence: 1,
        }
    }

    /// Replace the cached result and return its first page. Every page of
    /// this result is cut to `page_size`, whatever the budget is later.
    pub fn store(&mut self, rows: Vec<Row>, page_size: u64) -> DbResponse {
        let sequence_number = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1).max(1);

        let result = CachedResult {
            sequence_number,
            rows,
            page_size,
        };
        let page = result.page(0);
        self.current = Some(result);
        page
    }

    /// Page of the current result starting at `start_index`. The page carries
    /// the current sequence number, whichever query the caller asked about.
    pub fn page(&self, start_index: i64) -> Option<DbResponse> {
        self.current.as_ref().map(|result| result.page(start_index))
    }

    /// Drop the current result if it belongs to `sequence_number`
    pub fn flush(&mut self, sequence_number: i32) -> bool {
        match &self.current {
            Some(result) if result.sequence_number == sequence_number => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current_sequence(&self) -> Option<i32> {
        self.current.as_ref().map(|r| r.sequence_number)
    }
}

impl CachedResult {
    fn page(&self, start_index: i64) -> DbResponse {
        let start = start_index.clamp(0, self.rows.len() as i64) as usize;
        DbResponse {
            sequence_number: self.sequence_number,
            start_index,
            row_count: self.rows.len() as i64,
            rows: slice_by_budget(&self.rows[start..], self.page_size),
        }
    }
}

/// Take rows until the byte budget is used up. At least one row is taken
/// whenever one is available.
fn slice_by_budget(rows: &[Row], budget: u64) -> Vec<Row> {
    let mut used = 0u64;
    let mut taken = 0usize;
    for row in rows {
        let size: u64 = row.iter().map(|v| v.approximate_size()).sum();
        if taken > 0 && used + size > budget {
            break;
        }
        used += size;
        taken += 1;
    }
    rows[..taken].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::protocol::SqlValue;

    fn int_rows(n: i64) -> Vec<Row> {
        (0..n).map(|i| vec![SqlValue::Long(i)]).collect()
    }

    #[test]
    fn test_pages_respect_budget() {
        let mut cache = ResultCache::new();
        let first = cache.store(int_rows(1001), 888);
        assert_eq!(first.sequence_number, 1);
        assert_eq!(first.row_count, 1001);
        assert_eq!(first.rows.len(), 111);

        let last = cache.page(999).unwrap();
        assert_eq!(last.start_index, 999);
        assert_eq!(last.rows.len(), 2);
        assert_eq!(last.rows[0], vec![SqlValue::Long(999)]);
    }

    #[test]
    fn test_budget_fixed_when_stored() {
        let mut cache = ResultCache::new();
        cache.store(int_rows(100), 80);
        assert_eq!(cache.page(10).unwrap().rows.len(), 10);

        cache.store(int_rows(100), 16);
        assert_eq!(cache.page(10).unwrap().rows.len(), 2);
    }

    #[test]
    fn test_oversized_row_still_returned() {
        let rows = vec![vec![SqlValue::Blob(vec![0; 100])]];
        assert_eq!(slice_by_budget(&rows, 10).len(), 1);
    }

    #[test]
    fn test_new_result_supersedes_old() {
        let mut cache = ResultCache::new();
        let a = cache.store(int_rows(5), 8);
        let b = cache.store(int_rows(3), 8);
        assert_eq!(b.sequence_number, a.sequence_number + 1);
        assert_eq!(cache.page(1).unwrap().sequence_number, b.sequence_number);

        assert!(!cache.flush(a.sequence_number));
        assert_eq!(cache.current_sequence(), Some(b.sequence_number));
        assert!(cache.flush(b.sequence_number));
        assert!(cache.page(0).is_none());
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let mut cache = ResultCache::new();
        cache.store(int_rows(3), 1024);
        let page = cache.page(10).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.row_count, 3);
    }
}
