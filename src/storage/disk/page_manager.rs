use crate::storage::page::PageId;
use anyhow::{Context, Result, bail};
use log::trace;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const PAGE_SIZE: usize = 8192;

/// Disk manager for fixed-size page I/O against a single backing file.
///
/// Page ids map directly to file offsets (`page_id * PAGE_SIZE`).
/// Deallocated ids go into a recycle pool and are handed out again by later
/// allocations; the pool is in-memory only, so a reopened file starts with
/// an empty pool.
pub struct PageManager {
    file: File,
    freed_pages: Vec<PageId>,
}

impl PageManager {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;

        Ok(Self {
            file,
            freed_pages: Vec::new(),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open file: {:?}", path))?;

        Ok(Self {
            file,
            freed_pages: Vec::new(),
        })
    }

    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        if buf.len() != PAGE_SIZE {
            bail!(
                "Buffer size must be PAGE_SIZE ({}), got {}",
                PAGE_SIZE,
                buf.len()
            );
        }

        let offset = Self::page_offset(page_id);
        let file_size = self.file.metadata()?.len();

        if offset >= file_size {
            bail!("Page {} does not exist", page_id.0);
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .context("Failed to seek")?;
        self.file.read_exact(buf).context("Failed to read page")?;

        Ok(())
    }

    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            bail!(
                "Data size must be PAGE_SIZE ({}), got {}",
                PAGE_SIZE,
                data.len()
            );
        }

        let offset = Self::page_offset(page_id);
        let file_size = self.file.metadata()?.len();

        // Extend file if necessary
        if offset >= file_size {
            let new_size = offset + PAGE_SIZE as u64;
            self.file
                .set_len(new_size)
                .context("Failed to extend file")?;
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .context("Failed to seek")?;
        self.file.write_all(data).context("Failed to write page")?;
        self.file.sync_all().context("Failed to sync")?;

        Ok(())
    }

    /// Hand out a page id, recycling a deallocated one when available.
    ///
    /// A freshly extended page reads back as zeroes; a recycled page still
    /// holds its previous contents on disk, so callers must overwrite it
    /// before trusting a read.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(page_id) = self.freed_pages.pop() {
            trace!("recycling page id {}", page_id.0);
            return Ok(page_id);
        }

        let current_pages = self.num_pages()?;
        let new_page_id = PageId(current_pages);

        // Extend file to include new page
        let new_size = (current_pages as u64 + 1) * PAGE_SIZE as u64;
        self.file
            .set_len(new_size)
            .context("Failed to extend file")?;

        Ok(new_page_id)
    }

    /// Return a page id to the recycle pool.
    ///
    /// The file is not shrunk; the page's bytes stay where they are until
    /// the id is recycled and rewritten.
    pub fn deallocate_page(&mut self, page_id: PageId) {
        if !self.freed_pages.contains(&page_id) {
            self.freed_pages.push(page_id);
        }
    }

    pub fn num_pages(&self) -> Result<u32> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / PAGE_SIZE as u64) as u32)
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id.0 as u64 * PAGE_SIZE as u64
    }
}
