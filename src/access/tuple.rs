use crate::storage::page::{FixedCodec, PageId};
use std::cmp::Ordering;

/// Unique identifier for a tuple within the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TupleId {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl TupleId {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

impl PartialOrd for TupleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TupleId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.page_id
            .0
            .cmp(&other.page_id.0)
            .then(self.slot_id.cmp(&other.slot_id))
    }
}

/// Lets a hash index use tuple ids as values: page id, slot id, two bytes
/// of padding.
impl FixedCodec for TupleId {
    const ENCODED_SIZE: usize = 8;

    fn encode_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_id.0.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot_id.to_le_bytes());
        buf[6..8].fill(0);
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            page_id: PageId(u32::from_le_bytes(buf[0..4].try_into().unwrap())),
            slot_id: u16::from_le_bytes(buf[4..6].try_into().unwrap()),
        }
    }
}

/// Represents a row in the database
#[derive(Debug, Clone)]
pub struct Tuple {
    pub tuple_id: TupleId,
    pub data: Vec<u8>,
}

impl Tuple {
    pub fn new(tuple_id: TupleId, data: Vec<u8>) -> Self {
        Self { tuple_id, data }
    }
}
