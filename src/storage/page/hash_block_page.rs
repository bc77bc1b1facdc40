//! Block page for the linear-probe hash table.
//!
//! One block holds a fixed array of (key, value) slots plus two bitmaps of
//! the same logical length. On-page layout:
//!
//! ```text
//! offset 0                  occupied bitmap, ceil(N/8) bytes
//! offset ceil(N/8)          readable bitmap, ceil(N/8) bytes
//! offset 2*ceil(N/8)        N entries of (key, value), fixed width
//! ```
//!
//! Bit `i` of a bitmap lives in byte `i / 8` at position `i % 8`. `N` is
//! [`block_array_size`], the largest slot count whose layout fits in one
//! page for the given key and value widths.
//!
//! Slot states: never occupied (terminates a probe), live (occupied and
//! readable), tombstone (occupied but not readable, skipped by probes).
//!
//! A slot is claimed by flipping its readable bit from 0 to 1 with a
//! compare-and-swap on the containing bitmap byte, so inserters aiming at
//! different slots of the same block cannot clobber each other's claims,
//! and readers that peek without the block latch never see a half-set bit.

use crate::storage::PAGE_SIZE;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

/// Fixed-width little-endian byte codec for hash table keys and values.
pub trait FixedCodec: Sized + Clone {
    const ENCODED_SIZE: usize;

    /// Write the value into `buf[..ENCODED_SIZE]`.
    fn encode_into(&self, buf: &mut [u8]);

    /// Read a value back from `buf[..ENCODED_SIZE]`.
    fn decode_from(buf: &[u8]) -> Self;
}

macro_rules! int_fixed_codec {
    ($($t:ty),*) => {
        $(
            impl FixedCodec for $t {
                const ENCODED_SIZE: usize = size_of::<$t>();

                fn encode_into(&self, buf: &mut [u8]) {
                    buf[..Self::ENCODED_SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn decode_from(buf: &[u8]) -> Self {
                    <$t>::from_le_bytes(buf[..Self::ENCODED_SIZE].try_into().unwrap())
                }
            }
        )*
    };
}

int_fixed_codec!(i32, i64, u32, u64);

/// Largest slot count for which two bitmaps plus the entry array fit in a
/// page.
pub fn block_array_size<K: FixedCodec, V: FixedCodec>() -> usize {
    let entry_size = K::ENCODED_SIZE + V::ENCODED_SIZE;
    let mut n = PAGE_SIZE / entry_size;
    while 2 * n.div_ceil(8) + n * entry_size > PAGE_SIZE {
        n -= 1;
    }
    n
}

pub struct HashBlockPage<'a, K, V> {
    data: &'a mut [u8; PAGE_SIZE],
    slot_count: usize,
    bitmap_bytes: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: FixedCodec, V: FixedCodec> HashBlockPage<'a, K, V> {
    pub fn from_data(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        let slot_count = block_array_size::<K, V>();
        Self {
            data,
            slot_count,
            bitmap_bytes: slot_count.div_ceil(8),
            _marker: PhantomData,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Whether the slot has ever held an entry.
    pub fn is_occupied(&self, bucket: usize) -> bool {
        debug_assert!(bucket < self.slot_count);
        self.data[bucket / 8] & bit_mask(bucket) != 0
    }

    /// Whether the slot currently holds a live entry.
    ///
    /// Plain read: the block latch orders it against claims, which go
    /// through the atomic path below.
    pub fn is_readable(&self, bucket: usize) -> bool {
        debug_assert!(bucket < self.slot_count);
        self.data[self.bitmap_bytes + bucket / 8] & bit_mask(bucket) != 0
    }

    /// Key stored at `bucket`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not readable.
    pub fn key_at(&self, bucket: usize) -> K {
        assert!(self.is_readable(bucket), "bucket {} is not readable", bucket);
        let offset = self.entry_offset(bucket);
        K::decode_from(&self.data[offset..offset + K::ENCODED_SIZE])
    }

    /// Value stored at `bucket`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not readable.
    pub fn value_at(&self, bucket: usize) -> V {
        assert!(self.is_readable(bucket), "bucket {} is not readable", bucket);
        let offset = self.entry_offset(bucket) + K::ENCODED_SIZE;
        V::decode_from(&self.data[offset..offset + V::ENCODED_SIZE])
    }

    /// Claim `bucket` and store `(key, value)` there.
    ///
    /// Returns false without writing when the slot is already claimed. The
    /// claim itself is a compare-and-swap of the readable bit, retried only
    /// when a neighboring bit in the same byte moved underneath us.
    pub fn insert(&mut self, bucket: usize, key: &K, value: &V) -> bool {
        debug_assert!(bucket < self.slot_count);
        let mask = bit_mask(bucket);

        let claimed = {
            let readable = self.readable_atomic(bucket);
            loop {
                let current = readable.load(Ordering::SeqCst);
                if current & mask != 0 {
                    break false;
                }
                if readable
                    .compare_exchange(current, current | mask, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    break true;
                }
            }
        };
        if !claimed {
            return false;
        }

        let offset = self.entry_offset(bucket);
        key.encode_into(&mut self.data[offset..offset + K::ENCODED_SIZE]);
        value.encode_into(
            &mut self.data[offset + K::ENCODED_SIZE..offset + K::ENCODED_SIZE + V::ENCODED_SIZE],
        );
        self.data[bucket / 8] |= mask;

        true
    }

    /// Clear the readable bit, leaving occupied set (a tombstone).
    pub fn remove(&mut self, bucket: usize) {
        debug_assert!(bucket < self.slot_count);
        self.readable_atomic(bucket)
            .fetch_and(!bit_mask(bucket), Ordering::SeqCst);
    }

    fn entry_offset(&self, bucket: usize) -> usize {
        2 * self.bitmap_bytes + bucket * (K::ENCODED_SIZE + V::ENCODED_SIZE)
    }

    /// Atomic view of the readable-bitmap byte covering `bucket`.
    fn readable_atomic(&mut self, bucket: usize) -> &AtomicU8 {
        let ptr: *mut u8 = &mut self.data[self.bitmap_bytes + bucket / 8];
        // SAFETY: the pointer comes from an exclusive borrow of the page,
        // is u8-aligned, and stays valid for the returned lifetime. Bit
        // mutations of the readable bitmap all go through this view.
        unsafe { AtomicU8::from_ptr(ptr) }
    }
}

fn bit_mask(bucket: usize) -> u8 {
    1u8 << (bucket % 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Block<'a> = HashBlockPage<'a, i32, i32>;

    #[test]
    fn test_block_array_size_fits_page() {
        let n = block_array_size::<i32, i32>();
        assert!(2 * n.div_ceil(8) + n * 8 <= PAGE_SIZE);
        // One more slot would overflow the page.
        assert!(2 * (n + 1).div_ceil(8) + (n + 1) * 8 > PAGE_SIZE);
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut block = Block::from_data(&mut data);

        assert!(!block.is_occupied(0));
        assert!(block.insert(0, &17, &-3));

        assert!(block.is_occupied(0));
        assert!(block.is_readable(0));
        assert_eq!(block.key_at(0), 17);
        assert_eq!(block.value_at(0), -3);

        // Neighbors untouched.
        assert!(!block.is_occupied(1));
    }

    #[test]
    fn test_insert_into_claimed_slot_fails() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut block = Block::from_data(&mut data);

        assert!(block.insert(5, &1, &100));
        assert!(!block.insert(5, &2, &200));

        // The original entry survives.
        assert_eq!(block.key_at(5), 1);
        assert_eq!(block.value_at(5), 100);
    }

    #[test]
    fn test_remove_leaves_tombstone() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut block = Block::from_data(&mut data);

        assert!(block.insert(3, &9, &90));
        block.remove(3);

        assert!(block.is_occupied(3));
        assert!(!block.is_readable(3));

        // The tombstone can be reclaimed.
        assert!(block.insert(3, &10, &110));
        assert_eq!(block.key_at(3), 10);
        assert_eq!(block.value_at(3), 110);
    }

    #[test]
    #[should_panic(expected = "not readable")]
    fn test_key_at_empty_slot_panics() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let block = Block::from_data(&mut data);
        block.key_at(0);
    }

    #[test]
    #[should_panic(expected = "not readable")]
    fn test_value_at_tombstone_panics() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut block = Block::from_data(&mut data);
        block.insert(0, &1, &1);
        block.remove(0);
        block.value_at(0);
    }

    #[test]
    fn test_slots_in_same_bitmap_byte() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut block = Block::from_data(&mut data);

        // All eight slots of byte 0.
        for bucket in 0..8 {
            assert!(block.insert(bucket, &(bucket as i32), &(bucket as i32 * 10)));
        }
        for bucket in 0..8 {
            assert_eq!(block.key_at(bucket), bucket as i32);
            assert_eq!(block.value_at(bucket), bucket as i32 * 10);
        }
    }

    #[test]
    fn test_last_slot_round_trip() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut block = Block::from_data(&mut data);

        let last = block.slot_count() - 1;
        assert!(block.insert(last, &i32::MAX, &i32::MIN));
        assert_eq!(block.key_at(last), i32::MAX);
        assert_eq!(block.value_at(last), i32::MIN);
    }

    #[test]
    fn test_wider_entry_type() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut block: HashBlockPage<'_, i64, u64> = HashBlockPage::from_data(&mut data);

        assert!(block.insert(1, &(-5i64), &u64::MAX));
        assert_eq!(block.key_at(1), -5);
        assert_eq!(block.value_at(1), u64::MAX);

        let n = block.slot_count();
        assert!(2 * n.div_ceil(8) + n * 16 <= PAGE_SIZE);
    }
}
