use crate::access::tuple::{Tuple, TupleId};
use crate::access::value::{Value, serialize_values};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::error::StorageError;
use crate::storage::page::{HeapPage, PageId, utils};
use anyhow::Result;

/// A table stored as a chain of slotted heap pages.
///
/// Insertion walks the chain looking for room and links a fresh page to
/// the tail when none is found. Deletion leaves dead slots behind; the
/// chain never shrinks.
pub struct TableHeap {
    buffer_pool: BufferPoolManager,
    first_page_id: Option<PageId>,
}

impl TableHeap {
    pub fn new(buffer_pool: BufferPoolManager) -> Self {
        Self {
            buffer_pool,
            first_page_id: None,
        }
    }

    pub fn with_first_page(buffer_pool: BufferPoolManager, first_page_id: PageId) -> Self {
        Self {
            buffer_pool,
            first_page_id: Some(first_page_id),
        }
    }

    pub fn first_page_id(&self) -> Option<PageId> {
        self.first_page_id
    }

    /// Insert raw tuple bytes, returning the id of the new tuple.
    pub fn insert(&mut self, data: &[u8]) -> Result<TupleId> {
        let required = HeapPage::required_space_for(data.len());

        let Some(first) = self.first_page_id else {
            // Empty table: start the chain.
            let (page_id, mut guard) = self.buffer_pool.new_page()?;
            let mut page = HeapPage::new(&mut guard, page_id);
            let slot_id = page.insert_tuple(data)?;
            self.first_page_id = Some(page_id);
            return Ok(TupleId::new(page_id, slot_id));
        };

        let mut current = first;
        loop {
            let mut guard = self.buffer_pool.fetch_page_write(current)?;
            let mut page = HeapPage::from_data(&mut guard);

            if page.free_space() >= required {
                let slot_id = page.insert_tuple(data)?;
                return Ok(TupleId::new(current, slot_id));
            }

            match page.next_page_id() {
                Some(next) => current = next,
                None => {
                    // Tail is full: grow the chain by one page.
                    let (new_page_id, mut new_guard) = self.buffer_pool.new_page()?;
                    let mut new_page = HeapPage::new(&mut new_guard, new_page_id);
                    let slot_id = new_page.insert_tuple(data)?;

                    let mut tail = HeapPage::from_data(&mut guard);
                    tail.set_next_page_id(Some(new_page_id));

                    return Ok(TupleId::new(new_page_id, slot_id));
                }
            }
        }
    }

    /// Insert a typed row.
    pub fn insert_values(&mut self, values: &[Value]) -> Result<TupleId> {
        self.insert(&serialize_values(values))
    }

    /// Look up a tuple by id without copying the page.
    pub fn get(&self, tuple_id: TupleId) -> Result<Option<Tuple>> {
        let guard = self.buffer_pool.fetch_page(tuple_id.page_id)?;
        let page = utils::heap_page_from_guard(&guard);

        match page.get_tuple(tuple_id.slot_id) {
            Ok(data) => Ok(Some(Tuple::new(tuple_id, data.to_vec()))),
            Err(StorageError::TupleNotFound { .. }) => Ok(None),
            Err(StorageError::InvalidSlotId { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a tuple by id.
    pub fn delete(&mut self, tuple_id: TupleId) -> Result<()> {
        let mut guard = self.buffer_pool.fetch_page_write(tuple_id.page_id)?;
        let mut page = HeapPage::from_data(&mut guard);
        page.delete_tuple(tuple_id.slot_id)?;
        Ok(())
    }

    /// Replace a tuple. Done as delete plus insert, so the tuple id
    /// changes.
    pub fn update(&mut self, tuple_id: TupleId, data: &[u8]) -> Result<TupleId> {
        self.delete(tuple_id)?;
        self.insert(data)
    }
}
