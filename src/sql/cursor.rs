//! Page-at-a-time iteration over a query's result rows.

use super::query::Field;
use crate::Result;
use tracing::{debug, error};

/// Rows fetched per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One page of serialized rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Rows that serialized cleanly, in result order.
    pub rows: Vec<Vec<u8>>,
    /// Result rows consumed to build the page, including skipped ones.
    pub scanned: usize,
}

/// Runs a statement and serializes a window of its result rows.
pub trait PageProvider {
    /// Execute `sql` from scratch, skip `offset` result rows and serialize up
    /// to `limit` more using `columns`.
    ///
    /// Rows that fail to serialize are left out of [`Page::rows`] but still
    /// counted in [`Page::scanned`]. Fewer than `limit` scanned rows means
    /// the result set is exhausted.
    fn fetch_page(&self, sql: &str, columns: &[Field], offset: u64, limit: usize) -> Result<Page>;
}

impl<P: PageProvider + ?Sized> PageProvider for &P {
    fn fetch_page(&self, sql: &str, columns: &[Field], offset: u64, limit: usize) -> Result<Page> {
        (**self).fetch_page(sql, columns, offset, limit)
    }
}

/// Iterates a statement's rows, holding at most one page in memory.
///
/// Each refill re-runs the statement and skips everything already scanned,
/// so the underlying database connection never outlives a page.
#[derive(Debug)]
pub struct PagedCursor<P> {
    provider: P,
    sql: String,
    columns: Vec<Field>,
    page_size: usize,
    page: Vec<Vec<u8>>,
    page_position: usize,
    scan_offset: u64,
    delivered: u64,
    exhausted: bool,
    refills: usize,
}

impl<P: PageProvider> PagedCursor<P> {
    /// Run `sql` and load its first page.
    pub fn execute(
        provider: P,
        sql: impl Into<String>,
        columns: &[Field],
        page_size: usize,
    ) -> Result<Self> {
        let mut cursor = Self {
            provider,
            sql: sql.into(),
            columns: columns.to_vec(),
            page_size: page_size.max(1),
            page: Vec::new(),
            page_position: 0,
            scan_offset: 0,
            delivered: 0,
            exhausted: false,
            refills: 0,
        };
        cursor.refill()?;
        Ok(cursor)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> &[Field] {
        &self.columns
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Position of the last delivered row within the current page.
    pub fn page_index(&self) -> Option<usize> {
        self.page_position.checked_sub(1)
    }

    /// Position of the last delivered row across all pages.
    pub fn global_index(&self) -> Option<u64> {
        self.delivered.checked_sub(1)
    }

    /// Pages loaded so far, including the first.
    pub fn refills(&self) -> usize {
        self.refills
    }

    /// Whether another row is available, loading pages as needed.
    ///
    /// A failed refill leaves the cursor as it was, so a later call retries.
    pub fn try_has_next(&mut self) -> Result<bool> {
        while self.page_position >= self.page.len() && !self.exhausted {
            self.refill()?;
        }
        Ok(self.page_position < self.page.len())
    }

    /// Like [`try_has_next`](Self::try_has_next), logging failures as `false`.
    pub fn has_next(&mut self) -> bool {
        match self.try_has_next() {
            Ok(more) => more,
            Err(e) => {
                error!("Failed to load page at row {} of {}: {}", self.scan_offset, self.sql, e);
                false
            }
        }
    }

    /// The next row's bytes, or `None` once the results are drained.
    pub fn next_row(&mut self) -> Option<Vec<u8>> {
        if !self.has_next() {
            return None;
        }
        let row = std::mem::take(&mut self.page[self.page_position]);
        self.page_position += 1;
        self.delivered += 1;
        Some(row)
    }

    fn refill(&mut self) -> Result<()> {
        let page =
            self.provider.fetch_page(&self.sql, &self.columns, self.scan_offset, self.page_size)?;
        debug!(
            "Loaded page {} at row {}: {} rows ({} scanned)",
            self.refills,
            self.scan_offset,
            page.rows.len(),
            page.scanned
        );
        self.scan_offset += page.scanned as u64;
        self.exhausted = page.scanned < self.page_size;
        self.page = page.rows;
        self.page_position = 0;
        self.refills += 1;
        Ok(())
    }
}

impl<P: PageProvider> Iterator for PagedCursor<P> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PacketError;
    use std::cell::{Cell, RefCell};

    /// Serves rows from memory, dropping any row listed in `bad` the way a
    /// real provider drops rows that fail to serialize.
    #[derive(Debug, Default)]
    struct VecProvider {
        rows: Vec<Vec<u8>>,
        bad: Vec<usize>,
        calls: RefCell<Vec<(u64, usize)>>,
        fail_next: Cell<bool>,
    }

    impl VecProvider {
        fn with_rows(count: usize) -> Self {
            let rows = (0..count as u32).map(|i| i.to_be_bytes().to_vec()).collect();
            Self { rows, ..Self::default() }
        }
    }

    impl PageProvider for VecProvider {
        fn fetch_page(
            &self,
            sql: &str,
            _columns: &[Field],
            offset: u64,
            limit: usize,
        ) -> Result<Page> {
            if self.fail_next.replace(false) {
                return Err(PacketError::query_failed(sql, rusqlite::Error::QueryReturnedNoRows));
            }
            let start = (offset as usize).min(self.rows.len());
            let end = (start + limit).min(self.rows.len());
            let rows = (start..end)
                .filter(|index| !self.bad.contains(index))
                .map(|index| self.rows[index].clone())
                .collect();
            self.calls.borrow_mut().push((offset, end - start));
            Ok(Page { rows, scanned: end - start })
        }
    }

    fn row_number(row: &[u8]) -> u32 {
        u32::from_be_bytes(row.try_into().unwrap())
    }

    #[test]
    fn pages_through_all_rows() {
        let provider = VecProvider::with_rows(120);
        let mut cursor = PagedCursor::execute(&provider, "SELECT", &Field::ALL, 50).unwrap();

        let mut seen = Vec::new();
        while cursor.has_next() {
            seen.push(row_number(&cursor.next_row().unwrap()));
            assert_eq!(cursor.global_index(), Some(seen.len() as u64 - 1));
        }

        assert_eq!(seen, (0..120).collect::<Vec<_>>());
        assert_eq!(*provider.calls.borrow(), vec![(0, 50), (50, 50), (100, 20)]);
        assert_eq!(cursor.refills(), 3);
        assert_eq!(cursor.page_index(), Some(19));
        assert!(!cursor.has_next());
        assert_eq!(cursor.refills(), 3);
    }

    #[test]
    fn exact_multiple_needs_one_empty_page() {
        let provider = VecProvider::with_rows(100);
        let cursor = PagedCursor::execute(&provider, "SELECT", &Field::ALL, 50).unwrap();
        assert_eq!(cursor.count(), 100);
        assert_eq!(*provider.calls.borrow(), vec![(0, 50), (50, 50), (100, 0)]);
    }

    #[test]
    fn empty_result_has_nothing() {
        let provider = VecProvider::default();
        let mut cursor = PagedCursor::execute(&provider, "SELECT", &Field::ALL, 50).unwrap();
        assert!(!cursor.has_next());
        assert_eq!(cursor.page_index(), None);
        assert_eq!(cursor.global_index(), None);
    }

    #[test]
    fn skipped_rows_are_not_redelivered() {
        let provider = VecProvider { bad: vec![3, 4, 5, 6], ..VecProvider::with_rows(10) };
        let cursor = PagedCursor::execute(&provider, "SELECT", &Field::ALL, 4).unwrap();

        let seen: Vec<_> = cursor.map(|row| row_number(&row)).collect();
        assert_eq!(seen, vec![0, 1, 2, 7, 8, 9]);
        assert_eq!(*provider.calls.borrow(), vec![(0, 4), (4, 4), (8, 2)]);
    }

    #[test]
    fn failed_refill_is_retried() {
        let provider = VecProvider::with_rows(3);
        let mut cursor = PagedCursor::execute(&provider, "SELECT", &Field::ALL, 2).unwrap();
        cursor.next_row().unwrap();
        cursor.next_row().unwrap();

        provider.fail_next.set(true);
        assert!(cursor.try_has_next().is_err());
        assert_eq!(cursor.global_index(), Some(1));

        assert!(cursor.has_next());
        assert_eq!(row_number(&cursor.next_row().unwrap()), 2);
    }

    #[test]
    fn failed_first_page_is_an_error() {
        let provider = VecProvider::with_rows(3);
        provider.fail_next.set(true);
        let err = PagedCursor::execute(&provider, "SELECT", &Field::ALL, 2).unwrap_err();
        assert!(matches!(err, PacketError::Query { .. }));
    }
}
