pub mod hash_block_page;
pub mod hash_header_page;
pub mod heap_page;
pub mod utils;

use crate::storage::PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// On-disk sentinel for "no page" in layouts that cannot store an `Option`.
pub const INVALID_PAGE_ID: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    /// Decode a page id from its on-disk representation.
    pub fn from_raw(raw: u32) -> Option<PageId> {
        if raw == INVALID_PAGE_ID {
            None
        } else {
            Some(PageId(raw))
        }
    }

    /// Encode a possibly-absent page id for an on-disk slot.
    pub fn to_raw(id: Option<PageId>) -> u32 {
        match id {
            Some(PageId(v)) => v,
            None => INVALID_PAGE_ID,
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

pub trait Page {
    fn page_id(&self) -> PageId;
    fn data(&self) -> &[u8; PAGE_SIZE];
    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE];
}

pub use hash_block_page::{FixedCodec, HashBlockPage, block_array_size};
pub use hash_header_page::HashHeaderPage;
pub use heap_page::HeapPage;
