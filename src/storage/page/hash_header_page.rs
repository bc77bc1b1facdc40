//! Header page for the linear-probe hash table.
//!
//! The header is the table's entry point: it records the requested block
//! count and the ordered list of block page ids that hold the slots.
//!
//! On-page layout, all fields little-endian:
//!
//! ```text
//! offset 0   size: u32          requested block count
//! offset 4   page_id: u32       id of this header page
//! offset 8   num_blocks: u32    entries in the list below
//! offset 12  block_page_ids: u32[]   0xFFFF_FFFF = invalid
//! ```

use crate::storage::PAGE_SIZE;
use crate::storage::page::{Page, PageId};

const SIZE_OFFSET: usize = 0;
const PAGE_ID_OFFSET: usize = 4;
const NUM_BLOCKS_OFFSET: usize = 8;
const BLOCK_IDS_OFFSET: usize = 12;
const BLOCK_ID_WIDTH: usize = 4;

pub struct HashHeaderPage<'a> {
    data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> HashHeaderPage<'a> {
    /// Initialize a zeroed page as an empty header.
    pub fn new(data: &'a mut [u8; PAGE_SIZE], page_id: PageId) -> Self {
        data[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&0u32.to_le_bytes());
        data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].copy_from_slice(&page_id.0.to_le_bytes());
        data[NUM_BLOCKS_OFFSET..NUM_BLOCKS_OFFSET + 4].copy_from_slice(&0u32.to_le_bytes());

        Self { data }
    }

    pub fn from_data(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    /// Requested block count, as set at construction or by the last resize.
    pub fn size(&self) -> u32 {
        self.read_u32(SIZE_OFFSET)
    }

    pub fn set_size(&mut self, size: u32) {
        self.data[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&size.to_le_bytes());
    }

    /// Number of block page ids recorded so far.
    pub fn num_blocks(&self) -> usize {
        self.read_u32(NUM_BLOCKS_OFFSET) as usize
    }

    /// Most blocks this header can list in one page.
    pub fn max_blocks() -> usize {
        (PAGE_SIZE - BLOCK_IDS_OFFSET) / BLOCK_ID_WIDTH
    }

    /// Page id of the block at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the stored id is the invalid
    /// sentinel.
    pub fn block_page_id(&self, index: usize) -> PageId {
        assert!(index < self.num_blocks(), "block index {} out of range", index);
        let raw = self.read_u32(BLOCK_IDS_OFFSET + index * BLOCK_ID_WIDTH);
        PageId::from_raw(raw).expect("invalid block page id in header")
    }

    /// Append a block page id to the list.
    ///
    /// # Panics
    ///
    /// Panics if the list is already at [`Self::max_blocks`].
    pub fn add_block_page_id(&mut self, block_page_id: PageId) {
        let index = self.num_blocks();
        assert!(index < Self::max_blocks(), "header page is full");

        let offset = BLOCK_IDS_OFFSET + index * BLOCK_ID_WIDTH;
        self.data[offset..offset + 4].copy_from_slice(&block_page_id.0.to_le_bytes());
        self.data[NUM_BLOCKS_OFFSET..NUM_BLOCKS_OFFSET + 4]
            .copy_from_slice(&((index + 1) as u32).to_le_bytes());
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

impl<'a> Page for HashHeaderPage<'a> {
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

    #[test]
    fn test_header_initialization() {
        let mut data = Box::new([0xAAu8; PAGE_SIZE]);
        let header = HashHeaderPage::new(&mut data, PageId(7));

        assert_eq!(header.page_id(), PageId(7));
        assert_eq!(header.size(), 0);
        assert_eq!(header.num_blocks(), 0);
    }

    #[test]
    fn test_add_and_get_block_ids() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut header = HashHeaderPage::new(&mut data, PageId(0));

        header.set_size(3);
        header.add_block_page_id(PageId(10));
        header.add_block_page_id(PageId(11));
        header.add_block_page_id(PageId(12));

        assert_eq!(header.size(), 3);
        assert_eq!(header.num_blocks(), 3);
        assert_eq!(header.block_page_id(0), PageId(10));
        assert_eq!(header.block_page_id(1), PageId(11));
        assert_eq!(header.block_page_id(2), PageId(12));
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let mut data = Box::new([0u8; PAGE_SIZE]);

        {
            let mut header = HashHeaderPage::new(&mut data, PageId(42));
            header.set_size(2);
            header.add_block_page_id(PageId(100));
            header.add_block_page_id(PageId(200));
        }

        let header = HashHeaderPage::from_data(&mut data);
        assert_eq!(header.page_id(), PageId(42));
        assert_eq!(header.size(), 2);
        assert_eq!(header.num_blocks(), 2);
        assert_eq!(header.block_page_id(0), PageId(100));
        assert_eq!(header.block_page_id(1), PageId(200));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_block_index_out_of_range() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let header = HashHeaderPage::new(&mut data, PageId(0));
        header.block_page_id(0);
    }

    #[test]
    fn test_max_blocks() {
        assert_eq!(HashHeaderPage::max_blocks(), (PAGE_SIZE - 12) / 4);
    }
}
