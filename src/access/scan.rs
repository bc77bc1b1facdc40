//! Sequential scans over table heaps.

use crate::access::tuple::TupleId;
use crate::access::value::{Value, deserialize_values};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::{PageId, utils};
use anyhow::Result;

/// Lazy iterator over every live tuple of a table heap.
///
/// Yields `(TupleId, Vec<Value>)` in page-chain order, skipping deleted
/// slots. The scan is restartable by constructing a new scanner; it makes
/// no promises if the heap is mutated while a scan is in progress.
pub struct TableScanner {
    buffer_pool: BufferPoolManager,
    current_page_id: Option<PageId>,
    current_slot: u16,
}

impl TableScanner {
    pub fn new(buffer_pool: BufferPoolManager, first_page_id: Option<PageId>) -> Self {
        Self {
            buffer_pool,
            current_page_id: first_page_id,
            current_slot: 0,
        }
    }

    /// Advance to the next live tuple, hopping pages as needed.
    fn next_tuple(&mut self) -> Result<Option<(TupleId, Vec<Value>)>> {
        while let Some(page_id) = self.current_page_id {
            let guard = self.buffer_pool.fetch_page(page_id)?;
            let page = utils::heap_page_from_guard(&guard);
            let tuple_count = page.tuple_count();

            while self.current_slot < tuple_count {
                let slot_id = self.current_slot;
                self.current_slot += 1;

                // Deleted slots error out; skip them.
                if let Ok(data) = page.get_tuple(slot_id) {
                    let values = deserialize_values(data)?;
                    return Ok(Some((TupleId::new(page_id, slot_id), values)));
                }
            }

            self.current_page_id = page.next_page_id();
            self.current_slot = 0;
        }

        Ok(None)
    }
}

impl Iterator for TableScanner {
    type Item = Result<(TupleId, Vec<Value>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tuple().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::heap::TableHeap;
    use crate::storage::buffer::clock::ClockReplacer;
    use crate::storage::disk::PageManager;
    use tempfile::tempdir;

    fn create_test_pool() -> Result<BufferPoolManager> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.db");
        let page_manager = PageManager::create(&file_path)?;
        let replacer = Box::new(ClockReplacer::new(10));
        Ok(BufferPoolManager::new(page_manager, replacer, 10))
    }

    #[test]
    fn test_scan_yields_inserted_rows() -> Result<()> {
        let buffer_pool = create_test_pool()?;
        let mut heap = TableHeap::new(buffer_pool.clone());

        heap.insert_values(&[Value::Int32(1), Value::String("Alice".into())])?;
        heap.insert_values(&[Value::Int32(2), Value::String("Bob".into())])?;

        let mut scanner = TableScanner::new(buffer_pool, heap.first_page_id());

        let (_, row1) = scanner.next().expect("first row")?;
        assert_eq!(row1, vec![Value::Int32(1), Value::String("Alice".into())]);

        let (_, row2) = scanner.next().expect("second row")?;
        assert_eq!(row2, vec![Value::Int32(2), Value::String("Bob".into())]);

        assert!(scanner.next().is_none());

        Ok(())
    }

    #[test]
    fn test_scan_empty_table() -> Result<()> {
        let buffer_pool = create_test_pool()?;

        let mut scanner = TableScanner::new(buffer_pool, None);
        assert!(scanner.next().is_none());

        Ok(())
    }

    #[test]
    fn test_scan_skips_deleted_rows() -> Result<()> {
        let buffer_pool = create_test_pool()?;
        let mut heap = TableHeap::new(buffer_pool.clone());

        let tid1 = heap.insert_values(&[Value::Int32(1)])?;
        heap.insert_values(&[Value::Int32(2)])?;
        heap.delete(tid1)?;

        let mut scanner = TableScanner::new(buffer_pool, heap.first_page_id());

        let (_, row) = scanner.next().expect("surviving row")?;
        assert_eq!(row, vec![Value::Int32(2)]);
        assert!(scanner.next().is_none());

        Ok(())
    }

    #[test]
    fn test_scan_crosses_pages() -> Result<()> {
        let buffer_pool = create_test_pool()?;
        let mut heap = TableHeap::new(buffer_pool.clone());

        let padding = "x".repeat(1000);
        let mut inserted = 0;
        for i in 0..20 {
            heap.insert_values(&[Value::Int32(i), Value::String(padding.clone())])?;
            inserted += 1;
        }

        let scanner = TableScanner::new(buffer_pool, heap.first_page_id());
        let mut scanned = 0;
        for (i, item) in scanner.enumerate() {
            let (_, row) = item?;
            assert_eq!(row[0], Value::Int32(i as i32));
            scanned += 1;
        }
        assert_eq!(scanned, inserted);

        Ok(())
    }

    #[test]
    fn test_scan_is_restartable() -> Result<()> {
        let buffer_pool = create_test_pool()?;
        let mut heap = TableHeap::new(buffer_pool.clone());

        heap.insert_values(&[Value::Int32(10)])?;

        for _ in 0..2 {
            let scanner = TableScanner::new(buffer_pool.clone(), heap.first_page_id());
            assert_eq!(scanner.count(), 1);
        }

        Ok(())
    }
}
