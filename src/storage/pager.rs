//! # Pager
//!
//! This module implements the pager: the component that maps logical page
//! ids to byte regions of the backing file and turns a batch of in-memory
//! page images into one atomic, durable state transition.
//!
//! ## Transaction Model
//!
//! Between two commits the pager accumulates:
//!
//! - a **dirty map** from page id to the page's new bytes (pages that
//!   exist only in memory so far), and
//! - a **pending-free list** of page ids retired by the copy-on-write
//!   tree.
//!
//! `read_page` consults the dirty map first, so an in-progress operation
//! observes its own writes. Nothing reaches the file until `commit`.
//!
//! ## Commit Protocol
//!
//! ```text
//! 1. Push every pending-free id onto the freelist. Trunk mutations go
//!    through the dirty map, so they flush with everything else.
//! 2. Write every dirty page at id * PAGE_SIZE, extending the file
//!    lazily (sorted by id, so the file grows front to back).
//! 3. Bump txn_id and write the meta page at offset 0.
//! 4. fsync.
//! 5. Clear the dirty map and the pending-free list.
//! ```
//!
//! The meta page is the commit point: data pages written in steps 1-2 are
//! unreachable from the previous meta page, so a crash anywhere before
//! step 4 completes leaves the last committed tree intact. This is why
//! the tree never overwrites a live page and why the pager never hands
//! out id 0.
//!
//! ## Page Allocation
//!
//! `create_page` prefers ids popped from the freelist trunk chain and
//! falls back to the bump allocator (`next_page_id`). Fresh trunk pages
//! themselves always come from the bump allocator so a push never
//! recurses into the freelist.
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result` with file-path context.
//! A failed commit leaves the transaction state indeterminate; callers
//! recover by calling [`Pager::abort`], which discards buffered state and
//! reloads the meta page from disk (the same state a crash would recover
//! to).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;
use log::debug;

use super::freelist::{set_trunk_entry, trunk_entry, TrunkHeader};
use super::meta::MetaHeader;
use crate::config::{META_HEADER_SIZE, META_PAGE_ID, PAGE_SIZE, TRUNK_MAX_ENTRIES};
use zerocopy::IntoBytes;

#[derive(Debug)]
pub struct Pager {
    file: File,
    path: PathBuf,
    file_len: u64,
    meta: MetaHeader,
    dirty: HashMap<u32, Vec<u8>>,
    pending_free: Vec<u32>,
}

impl Pager {
    /// Opens a dbite file, creating and initializing it if missing.
    /// The file is kept at least two pages long: the meta page plus room
    /// for the initial root.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let file_len = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len();

        let mut pager = Self {
            file,
            path: path.to_path_buf(),
            file_len,
            meta: MetaHeader::new(),
            dirty: HashMap::new(),
            pending_free: Vec::new(),
        };

        if file_len == 0 {
            pager.grow_to(2 * PAGE_SIZE as u64)?;
            pager.write_meta()?;
            pager
                .file
                .sync_all()
                .wrap_err("failed to sync freshly initialized file")?;
        } else {
            ensure!(
                file_len >= PAGE_SIZE as u64,
                "'{}' is too small to hold a meta page",
                path.display()
            );
            pager.meta = pager.load_meta()?;
            if pager.file_len < 2 * PAGE_SIZE as u64 {
                pager.grow_to(2 * PAGE_SIZE as u64)?;
            }
        }

        debug!(
            "opened '{}' at txn {} (root={}, next={}, freelist={})",
            path.display(),
            pager.meta.txn_id(),
            pager.meta.root_page(),
            pager.meta.next_page_id(),
            pager.meta.freelist_head()
        );
        Ok(pager)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn txn_id(&self) -> u64 {
        self.meta.txn_id()
    }

    pub fn root_page(&self) -> u32 {
        self.meta.root_page()
    }

    /// Records a new tree root in the cached meta page. Durable only
    /// after the next commit.
    pub fn set_root_page(&mut self, page_id: u32) {
        self.meta.set_root_page(page_id);
    }

    pub fn next_page_id(&self) -> u32 {
        self.meta.next_page_id()
    }

    pub fn freelist_head(&self) -> u32 {
        self.meta.freelist_head()
    }

    /// True while the current transaction holds unwritten pages or
    /// unprocessed frees.
    pub fn has_uncommitted(&self) -> bool {
        !self.dirty.is_empty() || !self.pending_free.is_empty()
    }

    /// Number of pages buffered in the dirty map.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Returns the bytes of page `id`: the buffered image when the page
    /// is dirty, otherwise exactly one page read from the file. Reading
    /// past the end of the file is an error.
    pub fn read_page(&self, id: u32) -> Result<Vec<u8>> {
        if let Some(bytes) = self.dirty.get(&id) {
            return Ok(bytes.clone());
        }

        let offset = id as u64 * PAGE_SIZE as u64;
        ensure!(
            offset + PAGE_SIZE as u64 <= self.file_len,
            "page {} is beyond the end of '{}'",
            id,
            self.path.display()
        );

        let mut buf = vec![0u8; PAGE_SIZE];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("failed to seek to page {}", id))?;
        file.read_exact(&mut buf)
            .wrap_err_with(|| format!("failed to read page {}", id))?;
        Ok(buf)
    }

    /// Stores `bytes` under a freshly allocated page id and returns the
    /// id. The page lives in the dirty map until the next commit.
    pub fn create_page(&mut self, bytes: &[u8]) -> Result<u32> {
        ensure!(
            bytes.len() == PAGE_SIZE,
            "page must be exactly {} bytes, got {}",
            PAGE_SIZE,
            bytes.len()
        );

        let id = match self.allocate_from_freelist()? {
            Some(id) => id,
            None => self.bump_allocate()?,
        };
        debug_assert_ne!(id, META_PAGE_ID);

        self.dirty.insert(id, bytes.to_vec());
        Ok(id)
    }

    /// Retires page `id`: drops any buffered image and queues the id for
    /// the freelist at the next commit.
    pub fn delete_page(&mut self, id: u32) {
        self.dirty.remove(&id);
        self.pending_free.push(id);
    }

    /// Makes the current transaction durable. See the module docs for the
    /// exact write ordering; the meta page is the commit point.
    pub fn commit(&mut self) -> Result<()> {
        let freed = std::mem::take(&mut self.pending_free);
        let freed_count = freed.len();
        for id in freed {
            self.freelist_push(id)?;
        }

        let mut ids: Vec<u32> = self.dirty.keys().copied().collect();
        ids.sort_unstable();
        let written = ids.len();
        for id in ids {
            let offset = id as u64 * PAGE_SIZE as u64;
            let end = offset + PAGE_SIZE as u64;
            if self.file_len < end {
                self.file
                    .set_len(end)
                    .wrap_err_with(|| format!("failed to extend file to {} bytes", end))?;
                self.file_len = end;
            }

            let bytes = &self.dirty[&id];
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))
                .wrap_err_with(|| format!("failed to seek to page {}", id))?;
            file.write_all(bytes)
                .wrap_err_with(|| format!("failed to write page {}", id))?;
        }

        self.meta.set_txn_id(self.meta.txn_id() + 1);
        self.write_meta()?;
        self.file
            .sync_all()
            .wrap_err_with(|| format!("failed to sync '{}'", self.path.display()))?;

        self.dirty.clear();
        debug!(
            "commit txn {}: {} pages written, {} pages freed",
            self.meta.txn_id(),
            written,
            freed_count
        );
        Ok(())
    }

    /// Discards the current transaction: buffered pages, pending frees,
    /// and any meta changes (root moves, allocator advances) made since
    /// the last commit.
    pub fn abort(&mut self) -> Result<()> {
        self.dirty.clear();
        self.pending_free.clear();
        self.meta = self.load_meta()?;
        debug!("abort: rolled back to txn {}", self.meta.txn_id());
        Ok(())
    }

    /// Pops a reusable page id off the freelist trunk chain, if any.
    /// Trunks with no entries are walked past, never unlinked.
    fn allocate_from_freelist(&mut self) -> Result<Option<u32>> {
        let mut trunk_id = self.meta.freelist_head();
        while trunk_id != META_PAGE_ID {
            let mut page = self.read_page(trunk_id)?;
            let (next, count) = {
                let trunk = TrunkHeader::from_bytes(&page)?;
                (trunk.next_trunk(), trunk.count())
            };

            if count == 0 {
                trunk_id = next;
                continue;
            }

            let id = trunk_entry(&page, count as usize - 1)?;
            TrunkHeader::from_bytes_mut(&mut page)?.set_count(count - 1);
            self.dirty.insert(trunk_id, page);
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Pushes a retired page id onto the freelist: in place while the
    /// head trunk has room, otherwise onto a fresh trunk that becomes the
    /// new head.
    fn freelist_push(&mut self, freed: u32) -> Result<()> {
        let head = self.meta.freelist_head();
        if head != META_PAGE_ID {
            let mut page = self.read_page(head)?;
            let count = TrunkHeader::from_bytes(&page)?.count();
            if (count as usize) < TRUNK_MAX_ENTRIES {
                set_trunk_entry(&mut page, count as usize, freed)?;
                TrunkHeader::from_bytes_mut(&mut page)?.set_count(count + 1);
                self.dirty.insert(head, page);
                return Ok(());
            }
        }

        // Trunk pages come from the bump allocator only, so a push can
        // never re-enter the freelist.
        let trunk_id = self.bump_allocate()?;
        let mut page = vec![0u8; PAGE_SIZE];
        let mut trunk = TrunkHeader::with_next(head);
        trunk.set_count(1);
        trunk.write_to(&mut page)?;
        set_trunk_entry(&mut page, 0, freed)?;
        self.dirty.insert(trunk_id, page);
        self.meta.set_freelist_head(trunk_id);
        Ok(())
    }

    fn bump_allocate(&mut self) -> Result<u32> {
        let id = self.meta.next_page_id();
        ensure!(id != u32::MAX, "page id space exhausted");
        self.meta.set_next_page_id(id + 1);
        Ok(id)
    }

    fn grow_to(&mut self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .wrap_err_with(|| format!("failed to extend file to {} bytes", len))?;
        self.file_len = len;
        Ok(())
    }

    /// Writes the cached meta header into page 0. The rest of the page
    /// stays zero.
    fn write_meta(&mut self) -> Result<()> {
        let mut page = vec![0u8; PAGE_SIZE];
        page[..META_HEADER_SIZE].copy_from_slice(self.meta.as_bytes());

        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))
            .wrap_err("failed to seek to meta page")?;
        file.write_all(&page)
            .wrap_err("failed to write meta page")?;
        Ok(())
    }

    /// Reads the meta header back from disk, bypassing the dirty map.
    fn load_meta(&self) -> Result<MetaHeader> {
        let mut buf = [0u8; META_HEADER_SIZE];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))
            .wrap_err("failed to seek to meta page")?;
        file.read_exact(&mut buf)
            .wrap_err_with(|| format!("failed to read meta page of '{}'", self.path.display()))?;
        Ok(*MetaHeader::from_bytes(&buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TRUNK_MAX_ENTRIES;

    #[test]
    fn open_initializes_a_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");

        let pager = Pager::open(&path).unwrap();

        assert_eq!(pager.txn_id(), 0);
        assert_eq!(pager.root_page(), 0);
        assert_eq!(pager.next_page_id(), 1);
        assert_eq!(pager.freelist_head(), 0);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            2 * PAGE_SIZE as u64
        );
    }

    #[test]
    fn open_rejects_a_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.db");
        std::fs::write(&path, vec![0xAB; 2 * PAGE_SIZE]).unwrap();

        assert!(Pager::open(&path).is_err());
    }

    #[test]
    fn magic_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("magic.db");
        drop(Pager::open(&path).unwrap());

        let pager = Pager::open(&path).unwrap();

        assert_eq!(pager.txn_id(), 0);
        let raw = std::fs::read(&path).unwrap();
        let meta = MetaHeader::from_bytes(&raw[..META_HEADER_SIZE]).unwrap();
        assert_eq!(meta.txn_id(), 0);
    }

    #[test]
    fn create_page_is_read_your_writes() {
        let mut pager = open_temp();
        let page = page_filled(0x11);

        let id = pager.create_page(&page).unwrap();

        assert_ne!(id, META_PAGE_ID);
        assert_eq!(pager.read_page(id).unwrap(), page);
    }

    #[test]
    fn create_page_rejects_wrong_size() {
        let mut pager = open_temp();

        assert!(pager.create_page(&[0u8; 100]).is_err());
        assert!(pager.create_page(&vec![0u8; PAGE_SIZE + 1]).is_err());
    }

    #[test]
    fn read_page_beyond_eof_fails() {
        let pager = open_temp();

        assert!(pager.read_page(99).is_err());
    }

    #[test]
    fn uncommitted_pages_do_not_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffered.db");
        let mut pager = Pager::open(&path).unwrap();

        let id = pager.create_page(&page_filled(0x22)).unwrap();
        drop(pager);

        let pager = Pager::open(&path).unwrap();
        assert!(pager.read_page(id).is_err());
        assert_eq!(pager.next_page_id(), 1);
    }

    #[test]
    fn commit_persists_pages_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("durable.db");
        let page = page_filled(0x33);

        let id;
        {
            let mut pager = Pager::open(&path).unwrap();
            id = pager.create_page(&page).unwrap();
            pager.commit().unwrap();
        }

        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.read_page(id).unwrap(), page);
        assert_eq!(pager.txn_id(), 1);
    }

    #[test]
    fn commit_bumps_txn_id() {
        let mut pager = open_temp();

        pager.commit().unwrap();
        pager.commit().unwrap();

        assert_eq!(pager.txn_id(), 2);
    }

    #[test]
    fn abort_discards_dirty_pages_and_meta_changes() {
        let mut pager = open_temp();
        let id = pager.create_page(&page_filled(0x44)).unwrap();
        pager.set_root_page(id);

        pager.abort().unwrap();

        assert!(!pager.has_uncommitted());
        assert_eq!(pager.root_page(), 0);
        assert_eq!(pager.next_page_id(), 1);
        assert!(pager.read_page(id).is_err());
    }

    #[test]
    fn deleted_pages_are_reused_after_commit() {
        let mut pager = open_temp();
        let a = pager.create_page(&page_filled(0x01)).unwrap();
        let b = pager.create_page(&page_filled(0x02)).unwrap();
        pager.commit().unwrap();

        pager.delete_page(a);
        pager.commit().unwrap();
        assert_ne!(pager.freelist_head(), 0);

        let c = pager.create_page(&page_filled(0x03)).unwrap();
        assert_eq!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn delete_within_a_transaction_drops_the_dirty_page() {
        let mut pager = open_temp();

        let id = pager.create_page(&page_filled(0x55)).unwrap();
        pager.delete_page(id);

        assert!(pager.read_page(id).is_err());
        assert!(pager.has_uncommitted());
    }

    #[test]
    fn freelist_spills_into_a_second_trunk() {
        let mut pager = open_temp();
        let first = 10u32;
        let count = TRUNK_MAX_ENTRIES as u32 + 3;

        for id in first..first + count {
            pager.delete_page(id);
        }
        pager.commit().unwrap();

        // Two trunks: the second became the head and points at the first.
        let head = pager.freelist_head();
        let head_page = pager.read_page(head).unwrap();
        let head_trunk = TrunkHeader::from_bytes(&head_page).unwrap();
        assert_eq!(head_trunk.count(), 3);
        assert_ne!(head_trunk.next_trunk(), 0);

        let tail_page = pager.read_page(head_trunk.next_trunk()).unwrap();
        let tail_trunk = TrunkHeader::from_bytes(&tail_page).unwrap();
        assert_eq!(tail_trunk.count() as usize, TRUNK_MAX_ENTRIES);
        assert_eq!(tail_trunk.next_trunk(), 0);
    }

    #[test]
    fn allocation_walks_past_drained_trunks() {
        let mut pager = open_temp();
        let count = TRUNK_MAX_ENTRIES as u32 + 2;
        for id in 10..10 + count {
            pager.delete_page(id);
        }
        pager.commit().unwrap();

        // Drain every freed id; allocation must cross the trunk boundary.
        let mut popped = Vec::new();
        for _ in 0..count {
            popped.push(pager.create_page(&page_filled(0x66)).unwrap());
        }

        popped.sort_unstable();
        let expected: Vec<u32> = (10..10 + count).collect();
        assert_eq!(popped, expected);
    }

    fn open_temp() -> Pager {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.keep().join("test.db");
        Pager::open(path).unwrap()
    }

    fn page_filled(byte: u8) -> Vec<u8> {
        vec![byte; PAGE_SIZE]
    }
}
