//! View helpers for reading typed pages through buffer pool guards.

use crate::storage::PAGE_SIZE;
use crate::storage::buffer::PageReadGuard;
use crate::storage::page::hash_block_page::{FixedCodec, HashBlockPage};
use crate::storage::page::{HashHeaderPage, HeapPage};

/// Create a temporary [`HeapPage`] view from a read guard.
///
/// # Safety
/// The view borrows the guard's bytes without copying. The page type wants
/// `&mut` for its constructor, so the pointer is cast, but only read
/// methods may be called through a view built this way. The guard keeps
/// the page pinned and read-latched for the view's whole lifetime.
pub fn heap_page_from_guard(guard: &PageReadGuard) -> HeapPage<'_> {
    HeapPage::from_data(page_array_from_guard(guard))
}

/// Create a temporary [`HashHeaderPage`] view from a read guard.
///
/// Same contract as [`heap_page_from_guard`]: read methods only.
pub fn hash_header_from_guard(guard: &PageReadGuard) -> HashHeaderPage<'_> {
    HashHeaderPage::from_data(page_array_from_guard(guard))
}

/// Create a temporary [`HashBlockPage`] view from a read guard.
///
/// Same contract as [`heap_page_from_guard`]: read methods only.
pub fn hash_block_from_guard<K: FixedCodec, V: FixedCodec>(
    guard: &PageReadGuard,
) -> HashBlockPage<'_, K, V> {
    HashBlockPage::from_data(page_array_from_guard(guard))
}

fn page_array_from_guard(guard: &PageReadGuard) -> &mut [u8; PAGE_SIZE] {
    // SAFETY: the guard pins the page and holds its latch in shared mode,
    // so the bytes cannot move or be rewritten underneath the view. The
    // cast to *mut exists only to satisfy the page constructors; callers
    // of the helpers above never mutate through the result.
    unsafe { &mut *(guard.as_ptr() as *mut [u8; PAGE_SIZE]) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::buffer::BufferPoolManager;
    use crate::storage::buffer::clock::ClockReplacer;
    use crate::storage::disk::PageManager;
    use crate::storage::page::{Page, PageId};
    use anyhow::Result;
    use tempfile::tempdir;

    fn create_test_buffer_pool() -> Result<BufferPoolManager> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.db");
        let page_manager = PageManager::create(&file_path)?;
        let replacer = Box::new(ClockReplacer::new(10));
        Ok(BufferPoolManager::new(page_manager, replacer, 10))
    }

    #[test]
    fn test_heap_page_view() -> Result<()> {
        let buffer_pool = create_test_buffer_pool()?;

        let (page_id, mut guard) = buffer_pool.new_page()?;
        {
            let mut page = HeapPage::new(&mut guard, page_id);
            page.insert_tuple(b"hello")?;
        }
        drop(guard);

        let guard = buffer_pool.fetch_page(page_id)?;
        let view = heap_page_from_guard(&guard);
        assert_eq!(view.tuple_count(), 1);
        assert_eq!(view.get_tuple(0)?, b"hello");

        Ok(())
    }

    #[test]
    fn test_header_page_view() -> Result<()> {
        let buffer_pool = create_test_buffer_pool()?;

        let (page_id, mut guard) = buffer_pool.new_page()?;
        {
            let mut header = HashHeaderPage::new(&mut guard, page_id);
            header.set_size(1);
            header.add_block_page_id(PageId(55));
        }
        drop(guard);

        let guard = buffer_pool.fetch_page(page_id)?;
        let view = hash_header_from_guard(&guard);
        assert_eq!(view.page_id(), page_id);
        assert_eq!(view.num_blocks(), 1);
        assert_eq!(view.block_page_id(0), PageId(55));

        Ok(())
    }

    #[test]
    fn test_block_page_view() -> Result<()> {
        let buffer_pool = create_test_buffer_pool()?;

        let (page_id, mut guard) = buffer_pool.new_page()?;
        {
            let mut block: HashBlockPage<'_, i32, i32> = HashBlockPage::from_data(&mut guard);
            assert!(block.insert(2, &7, &70));
        }
        drop(guard);

        let guard = buffer_pool.fetch_page(page_id)?;
        let view: HashBlockPage<'_, i32, i32> = hash_block_from_guard(&guard);
        assert!(view.is_readable(2));
        assert_eq!(view.key_at(2), 7);
        assert_eq!(view.value_at(2), 70);

        Ok(())
    }
}
