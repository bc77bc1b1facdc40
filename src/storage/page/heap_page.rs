//! Slotted page for variable-length tuples.
//!
//! Header (16 bytes), then the slot array growing down the page while
//! tuple bytes grow up from the end:
//!
//! ```text
//! offset 0   page_id: u32
//! offset 4   next_page: u32      0xFFFF_FFFF = none
//! offset 8   tuple_count: u16
//! offset 10  free_start: u16     end of the slot array
//! offset 12  free_end: u16       start of the tuple data region
//! offset 14  (reserved)
//! ```
//!
//! Each slot is 4 bytes: tuple offset (u16) and length (u16). A deleted
//! tuple keeps its slot with offset and length zeroed.

use crate::storage::PAGE_SIZE;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId};

const PAGE_ID_OFFSET: usize = 0;
const NEXT_PAGE_OFFSET: usize = 4;
const TUPLE_COUNT_OFFSET: usize = 8;
const FREE_START_OFFSET: usize = 10;
const FREE_END_OFFSET: usize = 12;
const HEADER_SIZE: usize = 16;

const SLOT_SIZE: usize = 4;

pub struct HeapPage<'a> {
    data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> HeapPage<'a> {
    pub fn new(data: &'a mut [u8; PAGE_SIZE], page_id: PageId) -> Self {
        data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].copy_from_slice(&page_id.0.to_le_bytes());
        data[NEXT_PAGE_OFFSET..NEXT_PAGE_OFFSET + 4]
            .copy_from_slice(&super::INVALID_PAGE_ID.to_le_bytes());
        data[TUPLE_COUNT_OFFSET..TUPLE_COUNT_OFFSET + 2].copy_from_slice(&0u16.to_le_bytes());
        data[FREE_START_OFFSET..FREE_START_OFFSET + 2]
            .copy_from_slice(&(HEADER_SIZE as u16).to_le_bytes());
        data[FREE_END_OFFSET..FREE_END_OFFSET + 2]
            .copy_from_slice(&(PAGE_SIZE as u16).to_le_bytes());

        Self { data }
    }

    pub fn from_data(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    /// Append a tuple, returning its slot id.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> StorageResult<u16> {
        if tuple.len() > u16::MAX as usize {
            return Err(StorageError::Other(format!(
                "Tuple size {} exceeds maximum {}",
                tuple.len(),
                u16::MAX
            )));
        }

        let required = Self::required_space_for(tuple.len());
        let available = self.free_space();
        if available < required {
            return Err(StorageError::PageFull {
                required,
                available,
            });
        }

        let free_start = self.read_u16(FREE_START_OFFSET);
        let free_end = self.read_u16(FREE_END_OFFSET);
        let slot_id = self.tuple_count();

        // Tuple bytes at the top of the free region
        let tuple_offset = free_end - tuple.len() as u16;
        self.data[tuple_offset as usize..free_end as usize].copy_from_slice(tuple);

        // Slot entry at the bottom
        let slot = free_start as usize;
        self.data[slot..slot + 2].copy_from_slice(&tuple_offset.to_le_bytes());
        self.data[slot + 2..slot + 4].copy_from_slice(&(tuple.len() as u16).to_le_bytes());

        self.write_u16(FREE_START_OFFSET, free_start + SLOT_SIZE as u16);
        self.write_u16(FREE_END_OFFSET, tuple_offset);
        self.write_u16(TUPLE_COUNT_OFFSET, slot_id + 1);

        Ok(slot_id)
    }

    pub fn get_tuple(&self, slot_id: u16) -> StorageResult<&[u8]> {
        let (offset, length) = self.slot(slot_id)?;
        if offset == 0 && length == 0 {
            return Err(StorageError::TupleNotFound { slot_id });
        }
        Ok(&self.data[offset as usize..(offset + length) as usize])
    }

    /// Zero a tuple's slot. The tuple bytes stay where they are until the
    /// page is compacted (which this page type never does).
    pub fn delete_tuple(&mut self, slot_id: u16) -> StorageResult<()> {
        self.slot(slot_id)?;
        let slot = HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        self.data[slot..slot + SLOT_SIZE].fill(0);
        Ok(())
    }

    pub fn tuple_count(&self) -> u16 {
        self.read_u16(TUPLE_COUNT_OFFSET)
    }

    pub fn free_space(&self) -> usize {
        let free_start = self.read_u16(FREE_START_OFFSET);
        let free_end = self.read_u16(FREE_END_OFFSET);
        free_end.saturating_sub(free_start) as usize
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        PageId::from_raw(self.read_u32(NEXT_PAGE_OFFSET))
    }

    pub fn set_next_page_id(&mut self, next: Option<PageId>) {
        self.data[NEXT_PAGE_OFFSET..NEXT_PAGE_OFFSET + 4]
            .copy_from_slice(&PageId::to_raw(next).to_le_bytes());
    }

    /// Bytes an insertion of `data_len` consumes, slot included.
    pub fn required_space_for(data_len: usize) -> usize {
        data_len + SLOT_SIZE
    }

    fn slot(&self, slot_id: u16) -> StorageResult<(u16, u16)> {
        let count = self.tuple_count();
        if slot_id >= count {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: count.saturating_sub(1),
            });
        }
        let slot = HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        let offset = u16::from_le_bytes([self.data[slot], self.data[slot + 1]]);
        let length = u16::from_le_bytes([self.data[slot + 2], self.data[slot + 3]]);
        Ok((offset, length))
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }
}

impl<'a> Page for HeapPage<'a> {
    fn page_id(&self) -> PageId {
        PageId(self.read_u32(PAGE_ID_OFFSET))
    }

    fn data(&self) -> &[u8; PAGE_SIZE] {
        self.data
    }

    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_initialization() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let page = HeapPage::new(&mut data, PageId(42));

        assert_eq!(page.page_id(), PageId(42));
        assert_eq!(page.tuple_count(), 0);
        assert_eq!(page.next_page_id(), None);
        assert_eq!(page.free_space(), PAGE_SIZE - HEADER_SIZE);
    }

    #[test]
    fn test_insert_and_get() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId(1));

        let slot0 = page.insert_tuple(b"first")?;
        let slot1 = page.insert_tuple(b"second")?;
        assert_eq!((slot0, slot1), (0, 1));
        assert_eq!(page.tuple_count(), 2);

        assert_eq!(page.get_tuple(slot0)?, b"first");
        assert_eq!(page.get_tuple(slot1)?, b"second");

        Ok(())
    }

    #[test]
    fn test_delete_tuple() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId(1));

        let slot = page.insert_tuple(b"doomed")?;
        page.delete_tuple(slot)?;

        assert!(matches!(
            page.get_tuple(slot),
            Err(StorageError::TupleNotFound { .. })
        ));
        // Count does not shrink; the slot is just dead.
        assert_eq!(page.tuple_count(), 1);

        Ok(())
    }

    #[test]
    fn test_page_full() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId(1));

        let big = vec![0xAB; 1000];
        let mut inserted = 0;
        while page.free_space() >= HeapPage::required_space_for(big.len()) {
            page.insert_tuple(&big)?;
            inserted += 1;
        }

        assert!(inserted > 0);
        assert!(matches!(
            page.insert_tuple(&big),
            Err(StorageError::PageFull { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_invalid_slot() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let page = HeapPage::new(&mut data, PageId(1));

        assert!(matches!(
            page.get_tuple(0),
            Err(StorageError::InvalidSlotId { .. })
        ));
    }

    #[test]
    fn test_next_page_link() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId(1));

        page.set_next_page_id(Some(PageId(9)));
        assert_eq!(page.next_page_id(), Some(PageId(9)));

        page.set_next_page_id(None);
        assert_eq!(page.next_page_id(), None);
    }

    #[test]
    fn test_reload_from_bytes() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);

        {
            let mut page = HeapPage::new(&mut data, PageId(123));
            page.insert_tuple(b"durable")?;
        }

        let page = HeapPage::from_data(&mut data);
        assert_eq!(page.page_id(), PageId(123));
        assert_eq!(page.tuple_count(), 1);
        assert_eq!(page.get_tuple(0)?, b"durable");

        Ok(())
    }

    #[test]
    fn test_empty_tuple() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId(1));

        let slot = page.insert_tuple(&[])?;
        // Zero-length at a nonzero offset, so it is distinguishable from a
        // deleted slot.
        assert_eq!(page.get_tuple(slot)?, b"");

        Ok(())
    }
}
