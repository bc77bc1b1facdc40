//! Disk-backed linear-probe hash table.
//!
//! The table is built entirely from buffer pool pages: one header page
//! listing the block pages, and block pages holding the slots (see
//! [`crate::storage::page::hash_header_page`] and
//! [`crate::storage::page::hash_block_page`] for the layouts).
//!
//! A key's home slot is `hash(k) % (num_blocks * BLOCK_ARRAY_SIZE)`;
//! probing walks forward one slot at a time, wrapping from the end of a
//! block to the start of the next and from the last block to the first.
//! Probes terminate at a slot that has never been occupied; tombstones are
//! stepped over. When an insert probes all the way around, the table
//! doubles its slot count and migrates every live entry.
//!
//! # Latching
//!
//! The table latch is a reader-writer lock whose protected value is the
//! current header page id: `insert`/`get_value`/`remove` hold it shared,
//! `resize` holds it exclusively and swaps the id. Under it, operations
//! share-latch the header page and latch one block page at a time, always
//! releasing a block before fetching the next. Resize migrates through an
//! internal insert path that never touches the table latch it already
//! holds.

use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::hash_block_page::{FixedCodec, HashBlockPage, block_array_size};
use crate::storage::page::{PageId, utils};
use anyhow::{Result, bail};
use log::{debug, warn};
use parking_lot::RwLock;

type KeyComparator<K> = Box<dyn Fn(&K, &K) -> bool + Send + Sync>;
type HashFunction<K> = Box<dyn Fn(&K) -> u64 + Send + Sync>;

enum InsertOutcome {
    Inserted,
    Duplicate,
    /// The probe came back to its starting slot; carries the slot count
    /// that was probed, so the resize can detect it already happened.
    TableFull { slot_count: usize },
}

pub struct LinearProbeHashTable<K, V> {
    name: String,
    buffer_pool: BufferPoolManager,
    /// Table-wide latch. The guarded value is the current header page id;
    /// swapping it is what makes a resize visible.
    header: RwLock<PageId>,
    comparator: KeyComparator<K>,
    hash_fn: HashFunction<K>,
    _marker: std::marker::PhantomData<V>,
}

impl<K: FixedCodec, V: FixedCodec + PartialEq> LinearProbeHashTable<K, V> {
    /// Create a table with `num_buckets` block pages.
    ///
    /// # Panics
    ///
    /// Panics if `num_buckets` is 0.
    pub fn new(
        name: impl Into<String>,
        buffer_pool: BufferPoolManager,
        comparator: KeyComparator<K>,
        num_buckets: usize,
        hash_fn: HashFunction<K>,
    ) -> Result<Self> {
        assert!(num_buckets > 0, "num_buckets must be > 0");
        let name = name.into();
        let header_page_id = Self::build_table(&name, &buffer_pool, num_buckets)?;

        Ok(Self {
            name,
            buffer_pool,
            header: RwLock::new(header_page_id),
            comparator,
            hash_fn,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_page_id(&self) -> PageId {
        *self.header.read()
    }

    /// Current capacity in slots.
    pub fn get_size(&self) -> Result<usize> {
        let header_latch = self.header.read();
        let guard = self.buffer_pool.fetch_page(*header_latch)?;
        let header = utils::hash_header_from_guard(&guard);
        Ok(header.num_blocks() * block_array_size::<K, V>())
    }

    /// Insert `(key, value)`. Returns false if the exact pair is already
    /// present. A full table resizes and retries.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool> {
        loop {
            let outcome = {
                let header_latch = self.header.read();
                self.try_insert(*header_latch, key, value)?
            };

            match outcome {
                InsertOutcome::Inserted => return Ok(true),
                InsertOutcome::Duplicate => return Ok(false),
                InsertOutcome::TableFull { slot_count } => {
                    // Latches are all released; double and go around again.
                    self.resize(slot_count)?;
                }
            }
        }
    }

    /// Collect every value stored under `key`.
    pub fn get_value(&self, key: &K) -> Result<Vec<V>> {
        let header_latch = self.header.read();
        let header_guard = self.buffer_pool.fetch_page(*header_latch)?;
        let header = utils::hash_header_from_guard(&header_guard);
        let num_blocks = header.num_blocks();
        let block_size = block_array_size::<K, V>();

        let (start_block, start_bucket) = self.home_slot(key, num_blocks);
        let (mut block_idx, mut bucket) = (start_block, start_bucket);
        let mut results = Vec::new();

        let mut block_guard = self.buffer_pool.fetch_page(header.block_page_id(block_idx))?;
        loop {
            let block: HashBlockPage<'_, K, V> = utils::hash_block_from_guard(&block_guard);

            if !block.is_occupied(bucket) {
                return Ok(results);
            }
            if block.is_readable(bucket) && (self.comparator)(&block.key_at(bucket), key) {
                results.push(block.value_at(bucket));
            }

            bucket += 1;
            let mut crossed_block = false;
            if bucket == block_size {
                bucket = 0;
                block_idx = (block_idx + 1) % num_blocks;
                crossed_block = true;
            }
            if (block_idx, bucket) == (start_block, start_bucket) {
                return Ok(results);
            }
            if crossed_block {
                drop(block_guard);
                block_guard = self.buffer_pool.fetch_page(header.block_page_id(block_idx))?;
            }
        }
    }

    /// Remove one `(key, value)` pair. Returns false when no exact match
    /// is live.
    pub fn remove(&self, key: &K, value: &V) -> Result<bool> {
        let header_latch = self.header.read();
        let header_guard = self.buffer_pool.fetch_page(*header_latch)?;
        let header = utils::hash_header_from_guard(&header_guard);
        let num_blocks = header.num_blocks();
        let block_size = block_array_size::<K, V>();

        let (start_block, start_bucket) = self.home_slot(key, num_blocks);
        let (mut block_idx, mut bucket) = (start_block, start_bucket);

        let mut block_guard = self
            .buffer_pool
            .fetch_page_write(header.block_page_id(block_idx))?;
        loop {
            let mut block: HashBlockPage<'_, K, V> = HashBlockPage::from_data(&mut block_guard);

            if !block.is_occupied(bucket) {
                return Ok(false);
            }
            if block.is_readable(bucket)
                && (self.comparator)(&block.key_at(bucket), key)
                && block.value_at(bucket) == *value
            {
                block.remove(bucket);
                return Ok(true);
            }

            bucket += 1;
            let mut crossed_block = false;
            if bucket == block_size {
                bucket = 0;
                block_idx = (block_idx + 1) % num_blocks;
                crossed_block = true;
            }
            if (block_idx, bucket) == (start_block, start_bucket) {
                return Ok(false);
            }
            if crossed_block {
                drop(block_guard);
                block_guard = self
                    .buffer_pool
                    .fetch_page_write(header.block_page_id(block_idx))?;
            }
        }
    }

    /// Double the table from `old_slot_count` slots and migrate every live
    /// entry to its new home.
    pub fn resize(&self, old_slot_count: usize) -> Result<()> {
        let mut header_latch = self.header.write();
        let old_header_id = *header_latch;
        let block_size = block_array_size::<K, V>();

        // Someone else may have grown the table while we waited for the
        // exclusive latch; their insert will retry against the new header.
        let old_block_ids: Vec<PageId> = {
            let guard = self.buffer_pool.fetch_page(old_header_id)?;
            let header = utils::hash_header_from_guard(&guard);
            (0..header.num_blocks())
                .map(|i| header.block_page_id(i))
                .collect()
        };
        if old_block_ids.len() * block_size != old_slot_count {
            return Ok(());
        }

        let new_block_count = ((2 * old_slot_count) / block_size).max(1);
        debug!(
            "hash table {}: resizing from {} to {} blocks",
            self.name,
            old_block_ids.len(),
            new_block_count
        );

        let new_header_id = Self::build_table(&self.name, &self.buffer_pool, new_block_count)?;
        *header_latch = new_header_id;

        // Migrate through the internal insert path: the public one would
        // try to take the table latch this thread already holds.
        for &block_id in &old_block_ids {
            let entries: Vec<(K, V)> = {
                let guard = self.buffer_pool.fetch_page(block_id)?;
                let block: HashBlockPage<'_, K, V> = utils::hash_block_from_guard(&guard);
                (0..block_size)
                    .filter(|&bucket| block.is_readable(bucket))
                    .map(|bucket| (block.key_at(bucket), block.value_at(bucket)))
                    .collect()
            };

            for (key, value) in &entries {
                match self.try_insert(new_header_id, key, value)? {
                    InsertOutcome::Inserted | InsertOutcome::Duplicate => {}
                    InsertOutcome::TableFull { .. } => {
                        bail!("hash table {}: resize ran out of slots", self.name)
                    }
                }
            }
        }

        // Reclaim the old pages.
        for &block_id in &old_block_ids {
            self.buffer_pool.delete_page(block_id)?;
        }
        self.buffer_pool.delete_page(old_header_id)?;

        Ok(())
    }

    /// One probe pass against the given header, without the table latch.
    fn try_insert(&self, header_page_id: PageId, key: &K, value: &V) -> Result<InsertOutcome> {
        let header_guard = self.buffer_pool.fetch_page(header_page_id)?;
        let header = utils::hash_header_from_guard(&header_guard);
        let num_blocks = header.num_blocks();
        let block_size = block_array_size::<K, V>();

        let (start_block, start_bucket) = self.home_slot(key, num_blocks);
        let (mut block_idx, mut bucket) = (start_block, start_bucket);

        let mut block_guard = self
            .buffer_pool
            .fetch_page_write(header.block_page_id(block_idx))?;
        loop {
            let mut block: HashBlockPage<'_, K, V> = HashBlockPage::from_data(&mut block_guard);

            if block.insert(bucket, key, value) {
                return Ok(InsertOutcome::Inserted);
            }

            // The claim failed, so the slot holds a live entry. The same
            // pair already sitting there is a duplicate.
            if block.is_readable(bucket)
                && (self.comparator)(&block.key_at(bucket), key)
                && block.value_at(bucket) == *value
            {
                return Ok(InsertOutcome::Duplicate);
            }

            bucket += 1;
            let mut crossed_block = false;
            if bucket == block_size {
                bucket = 0;
                block_idx = (block_idx + 1) % num_blocks;
                crossed_block = true;
            }
            if (block_idx, bucket) == (start_block, start_bucket) {
                return Ok(InsertOutcome::TableFull {
                    slot_count: num_blocks * block_size,
                });
            }
            if crossed_block {
                // Hand over: never hold two block latches at once.
                drop(block_guard);
                block_guard = self
                    .buffer_pool
                    .fetch_page_write(header.block_page_id(block_idx))?;
            }
        }
    }

    /// Home block and bucket for a key in a table of `num_blocks` blocks.
    fn home_slot(&self, key: &K, num_blocks: usize) -> (usize, usize) {
        let block_size = block_array_size::<K, V>();
        let slot = (self.hash_fn)(key) as usize % (num_blocks * block_size);
        (slot / block_size, slot % block_size)
    }

    /// Allocate a header page plus `num_blocks` zeroed block pages.
    fn build_table(
        name: &str,
        buffer_pool: &BufferPoolManager,
        num_blocks: usize,
    ) -> Result<PageId> {
        let (header_page_id, mut guard) = buffer_pool.new_page()?;
        let mut header = crate::storage::page::HashHeaderPage::new(&mut guard, header_page_id);
        header.set_size(num_blocks as u32);

        let mut allocated = 0;
        while allocated < num_blocks {
            match buffer_pool.new_page() {
                Ok((block_page_id, block_guard)) => {
                    drop(block_guard);
                    header.add_block_page_id(block_page_id);
                    allocated += 1;
                }
                // Allocation failures are retried until frames free up.
                Err(e) => {
                    warn!("hash table {}: block allocation failed, retrying: {}", name, e);
                    std::thread::yield_now();
                }
            }
        }

        Ok(header_page_id)
    }
}
