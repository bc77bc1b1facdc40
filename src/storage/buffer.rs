//! Buffer pool manager: a fixed set of in-memory frames caching disk pages.
//!
//! The pool owns `pool_size` frames. A page table maps resident page ids to
//! frames, a free list holds frames with no page, and a replacement policy
//! tracks frames whose pin count has dropped to zero. All of that metadata
//! changes under one mutex; the bytes of each frame sit behind the frame's
//! own reader-writer latch, which fetch guards hold for their lifetime.
//!
//! # Latch ordering
//!
//! 1. Pool metadata mutex
//! 2. Disk manager mutex
//! 3. Frame data latch: taken under the metadata mutex only for frames
//!    with a pin count of zero (free-list or victim frames), which no
//!    guard can be holding. Waiting on a pinned frame's latch happens with
//!    no pool lock held.
//!
//! Guards unpin their frame when dropped, so a page can never leak a pin.

pub mod clock;
pub mod replacer;

use crate::storage::disk::{PAGE_SIZE, PageManager};
use crate::storage::error::StorageError;
use crate::storage::page::PageId;
use anyhow::Result;
use log::{debug, trace};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};
use replacer::{FrameId, Replacer};
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

type PageBuf = Box<[u8; PAGE_SIZE]>;
type FrameDataReadGuard = ArcRwLockReadGuard<RawRwLock, PageBuf>;
type FrameDataWriteGuard = ArcRwLockWriteGuard<RawRwLock, PageBuf>;

/// One frame's page bytes behind its reader-writer latch.
struct Frame {
    data: Arc<RwLock<PageBuf>>,
}

impl Frame {
    fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }
}

/// Per-frame bookkeeping, protected by the pool metadata mutex.
#[derive(Debug)]
struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    is_dirty: bool,
}

impl FrameMeta {
    fn new() -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            is_dirty: false,
        }
    }

    fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.is_dirty = false;
    }
}

/// Mutable pool state behind the metadata mutex.
struct PoolState {
    /// Maps resident page ids to their frames.
    page_table: HashMap<PageId, FrameId>,
    /// Metadata for each frame, indexed by FrameId.
    meta: Vec<FrameMeta>,
    /// Frames holding no page.
    free_list: VecDeque<FrameId>,
    /// Eviction policy over frames with pin count zero.
    replacer: Box<dyn Replacer>,
}

#[derive(Clone)]
pub struct BufferPoolManager {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    frames: Vec<Frame>,
    state: Mutex<PoolState>,
    page_manager: Mutex<PageManager>,
    pool_size: usize,
}

impl BufferPoolManager {
    /// # Panics
    ///
    /// Panics if `pool_size` is 0.
    pub fn new(page_manager: PageManager, replacer: Box<dyn Replacer>, pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<_> = (0..pool_size).map(|_| Frame::new()).collect();
        let meta: Vec<_> = (0..pool_size).map(|_| FrameMeta::new()).collect();
        // Every frame starts on the free list
        let free_list: VecDeque<_> = (0..pool_size).collect();

        Self {
            inner: Arc::new(BufferPoolInner {
                frames,
                state: Mutex::new(PoolState {
                    page_table: HashMap::with_capacity(pool_size),
                    meta,
                    free_list,
                    replacer,
                }),
                page_manager: Mutex::new(page_manager),
                pool_size,
            }),
        }
    }

    /// Fetch a page for reading.
    ///
    /// The returned guard pins the page and holds its latch in shared mode
    /// until dropped. Fails with [`StorageError::BufferPoolFull`] when the
    /// page is not resident and every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageReadGuard> {
        let frame_id = self.inner.acquire_frame(page_id)?;
        let data = self.inner.frames[frame_id].data.read_arc();

        Ok(PageReadGuard {
            pool: self.inner.clone(),
            frame_id,
            page_id,
            data,
        })
    }

    /// Fetch a page for writing.
    ///
    /// The returned guard pins the page and holds its latch exclusively;
    /// dropping it marks the frame dirty.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard> {
        let frame_id = self.inner.acquire_frame(page_id)?;
        let data = self.inner.frames[frame_id].data.write_arc();

        Ok(PageWriteGuard {
            pool: self.inner.clone(),
            frame_id,
            page_id,
            data,
        })
    }

    /// Allocate a fresh page on disk and pin it into a zeroed frame.
    pub fn new_page(&self) -> Result<(PageId, PageWriteGuard)> {
        let (frame_id, page_id) = {
            let mut state = self.inner.state.lock();
            let frame_id = self.inner.take_victim_frame(&mut state)?;

            let page_id = match self.inner.page_manager.lock().allocate_page() {
                Ok(id) => id,
                Err(e) => {
                    // don't leak the frame
                    state.free_list.push_back(frame_id);
                    return Err(e);
                }
            };

            // Frame came off the free list or the replacer with pin count
            // zero, so no guard can hold its latch.
            self.inner.frames[frame_id].data.write().fill(0);

            state.page_table.insert(page_id, frame_id);
            let meta = &mut state.meta[frame_id];
            meta.page_id = Some(page_id);
            meta.pin_count = 1;
            meta.is_dirty = false;

            (frame_id, page_id)
        };

        trace!("new page {} in frame {}", page_id, frame_id);
        let data = self.inner.frames[frame_id].data.write_arc();

        Ok((
            page_id,
            PageWriteGuard {
                pool: self.inner.clone(),
                frame_id,
                page_id,
                data,
            },
        ))
    }

    /// Write a resident page back to disk if it is dirty.
    ///
    /// Returns false when the page is not resident. Flushing a pinned page
    /// is allowed; the page is pinned for the duration so it cannot be
    /// evicted mid-flush.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        // Pin the frame so it stays put while we wait for its latch.
        let frame_id = {
            let mut state = self.inner.state.lock();
            match state.page_table.get(&page_id) {
                Some(&frame_id) => {
                    state.meta[frame_id].pin_count += 1;
                    state.replacer.pin(frame_id);
                    frame_id
                }
                None => return Ok(false),
            }
        };

        // No pool lock held here: an in-flight writer can finish and drop.
        let data = self.inner.frames[frame_id].data.read();

        let result = {
            let mut state = self.inner.state.lock();
            if state.meta[frame_id].is_dirty {
                let write_result = self
                    .inner
                    .page_manager
                    .lock()
                    .write_page(page_id, data.as_slice());
                match write_result {
                    Ok(()) => {
                        state.meta[frame_id].is_dirty = false;
                        Ok(true)
                    }
                    Err(e) => Err(e),
                }
            } else {
                Ok(true)
            }
        };

        drop(data);
        self.inner.unpin_frame(frame_id, false);
        result
    }

    /// Flush every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = {
            let state = self.inner.state.lock();
            state.page_table.keys().copied().collect()
        };

        for page_id in resident {
            self.flush_page(page_id)?;
        }

        Ok(())
    }

    /// Drop a page from the pool and release its id back to the disk
    /// manager.
    ///
    /// Returns false when the page is not resident or still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.inner.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        if state.meta[frame_id].pin_count != 0 {
            return Ok(false);
        }

        state.page_table.remove(&page_id);
        // The frame leaves the evictable set: it has no page anymore.
        state.replacer.pin(frame_id);
        state.meta[frame_id].reset();
        // Pin count is zero, so the latch is free.
        self.inner.frames[frame_id].data.write().fill(0);

        self.inner.page_manager.lock().deallocate_page(page_id);
        state.free_list.push_back(frame_id);

        debug!("deleted page {}, frame {} returned to free list", page_id, frame_id);
        Ok(true)
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    /// Number of pages currently resident.
    pub fn resident_page_count(&self) -> usize {
        self.inner.state.lock().page_table.len()
    }

    /// Whether a page currently occupies a frame.
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.inner.state.lock().page_table.contains_key(&page_id)
    }

    /// Number of frames holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.inner.state.lock().free_list.len()
    }

    /// Number of resident frames eligible for eviction.
    pub fn evictable_frame_count(&self) -> usize {
        self.inner.state.lock().replacer.size()
    }
}

impl BufferPoolInner {
    /// Pin the frame holding `page_id`, loading the page from disk first if
    /// it is not resident.
    fn acquire_frame(&self, page_id: PageId) -> Result<FrameId> {
        let mut state = self.state.lock();

        // Resident: bump the pin count and shield it from the replacer.
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.meta[frame_id].pin_count += 1;
            state.replacer.pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.take_victim_frame(&mut state)?;

        let read_result = {
            // Victim frames have pin count zero, so the latch is free.
            let mut data = self.frames[frame_id].data.write();
            self.page_manager
                .lock()
                .read_page(page_id, data.as_mut_slice())
        };
        if let Err(e) = read_result {
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        state.page_table.insert(page_id, frame_id);
        let meta = &mut state.meta[frame_id];
        meta.page_id = Some(page_id);
        meta.pin_count = 1;
        meta.is_dirty = false;

        Ok(frame_id)
    }

    /// Find a frame to hold a new page: free list first, then the
    /// replacer. A dirty victim is written back before its page-table
    /// mapping disappears. Requires the state lock held.
    fn take_victim_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = state
            .replacer
            .evict()
            .ok_or(StorageError::BufferPoolFull)?;

        if let Some(victim_page_id) = state.meta[frame_id].page_id {
            if state.meta[frame_id].is_dirty {
                debug!("writing back dirty page {} before eviction", victim_page_id);
                let data = self.frames[frame_id].data.read();
                self.page_manager
                    .lock()
                    .write_page(victim_page_id, data.as_slice())?;
            }
            state.page_table.remove(&victim_page_id);
        }
        state.meta[frame_id].reset();

        Ok(frame_id)
    }

    /// Drop one pin from a frame, recording dirtiness. Dirty is sticky:
    /// once set it survives until a flush clears it.
    fn unpin_frame(&self, frame_id: FrameId, dirty: bool) {
        let mut state = self.state.lock();
        let meta = &mut state.meta[frame_id];

        debug_assert!(meta.pin_count > 0, "unpin of frame with zero pin count");
        if meta.pin_count == 0 {
            return;
        }

        meta.pin_count -= 1;
        meta.is_dirty |= dirty;
        if meta.pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
    }
}

/// Shared handle to a fetched page.
///
/// Keeps the page pinned and its frame latch held in read mode; dropping
/// the guard unpins.
pub struct PageReadGuard {
    pool: Arc<BufferPoolInner>,
    frame_id: FrameId,
    page_id: PageId,
    data: FrameDataReadGuard,
}

impl std::fmt::Debug for PageReadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id)
            .finish()
    }
}

impl PageReadGuard {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl Drop for PageReadGuard {
    fn drop(&mut self) {
        self.pool.unpin_frame(self.frame_id, false);
    }
}

/// Exclusive handle to a fetched page.
///
/// Keeps the page pinned and its frame latch held in write mode; dropping
/// the guard unpins and marks the frame dirty.
pub struct PageWriteGuard {
    pool: Arc<BufferPoolInner>,
    frame_id: FrameId,
    page_id: PageId,
    data: FrameDataWriteGuard,
}

impl std::fmt::Debug for PageWriteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id)
            .finish()
    }
}

impl PageWriteGuard {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageWriteGuard {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PageWriteGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl Drop for PageWriteGuard {
    fn drop(&mut self) {
        self.pool.unpin_frame(self.frame_id, true);
    }
}
