//! # Freelist Trunk Pages
//!
//! This module defines the on-disk format of freelist trunk pages. Pages
//! retired by the copy-on-write tree are not returned to the file system;
//! their ids are chained onto the freelist so the pager can hand them out
//! again instead of growing the file.
//!
//! ## Trunk Page Layout
//!
//! ```text
//! Offset  Size      Description
//! ------  --------  ----------------------------------------
//! 0       4         next_trunk: page id of the next trunk (0 = none)
//! 4       4         count: number of page ids stored in this trunk
//! 8       4*N       page ids, appended left to right
//! ```
//!
//! With 4096-byte pages each trunk holds `(4096 - 8) / 4 = 1022` ids.
//!
//! ## Allocation Discipline
//!
//! - Pop: take the *last* id of the first trunk with `count > 0`,
//!   decrementing `count` in place. Trunks with `count == 0` are walked
//!   past via `next_trunk`, never unlinked.
//! - Push: append to the head trunk while it has room; once full, a fresh
//!   trunk (from the bump allocator, never from the freelist itself)
//!   becomes the new head and points at the old one.
//!
//! Trunk mutations travel through the pager's dirty map like any other
//! page write, so they only reach disk inside a commit and roll back with
//! everything else on a crash.
//!
//! ## Zerocopy Safety
//!
//! `TrunkHeader` is a zerocopy struct read in place from the first eight
//! bytes of a trunk page; a compile-time assertion pins its size.

use eyre::{ensure, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{PTR_SIZE, TRUNK_HEADER_SIZE, TRUNK_MAX_ENTRIES};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TrunkHeader {
    next_trunk: U32,
    count: U32,
}

const _: () = assert!(std::mem::size_of::<TrunkHeader>() == TRUNK_HEADER_SIZE);

impl TrunkHeader {
    pub fn new() -> Self {
        Self {
            next_trunk: U32::new(0),
            count: U32::new(0),
        }
    }

    pub fn with_next(next_trunk: u32) -> Self {
        Self {
            next_trunk: U32::new(next_trunk),
            count: U32::new(0),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= TRUNK_HEADER_SIZE,
            "buffer too small for TrunkHeader: {} < {}",
            bytes.len(),
            TRUNK_HEADER_SIZE
        );

        Self::ref_from_bytes(&bytes[..TRUNK_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read TrunkHeader: {:?}", e))
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= TRUNK_HEADER_SIZE,
            "buffer too small for TrunkHeader: {} < {}",
            bytes.len(),
            TRUNK_HEADER_SIZE
        );

        Self::mut_from_bytes(&mut bytes[..TRUNK_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read TrunkHeader: {:?}", e))
    }

    pub fn write_to(&self, bytes: &mut [u8]) -> Result<()> {
        ensure!(
            bytes.len() >= TRUNK_HEADER_SIZE,
            "buffer too small for TrunkHeader: {} < {}",
            bytes.len(),
            TRUNK_HEADER_SIZE
        );

        bytes[..TRUNK_HEADER_SIZE].copy_from_slice(self.as_bytes());
        Ok(())
    }

    zerocopy_accessors! {
        next_trunk: u32,
        count: u32,
    }

    pub fn is_full(&self) -> bool {
        self.count.get() as usize >= TRUNK_MAX_ENTRIES
    }

    pub fn is_empty(&self) -> bool {
        self.count.get() == 0
    }
}

impl Default for TrunkHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the free page id stored at `index` within a trunk page.
pub fn trunk_entry(page: &[u8], index: usize) -> Result<u32> {
    ensure!(
        index < TRUNK_MAX_ENTRIES,
        "trunk entry {} out of bounds (capacity={})",
        index,
        TRUNK_MAX_ENTRIES
    );
    let offset = TRUNK_HEADER_SIZE + index * PTR_SIZE;
    ensure!(
        offset + PTR_SIZE <= page.len(),
        "trunk entry {} extends beyond page",
        index
    );
    let entry = U32::ref_from_bytes(&page[offset..offset + PTR_SIZE])
        .map_err(|e| eyre::eyre!("failed to read trunk entry {}: {:?}", index, e))?;
    Ok(entry.get())
}

/// Writes the free page id stored at `index` within a trunk page.
pub fn set_trunk_entry(page: &mut [u8], index: usize, page_id: u32) -> Result<()> {
    ensure!(
        index < TRUNK_MAX_ENTRIES,
        "trunk entry {} out of bounds (capacity={})",
        index,
        TRUNK_MAX_ENTRIES
    );
    let offset = TRUNK_HEADER_SIZE + index * PTR_SIZE;
    ensure!(
        offset + PTR_SIZE <= page.len(),
        "trunk entry {} extends beyond page",
        index
    );
    let entry = U32::mut_from_bytes(&mut page[offset..offset + PTR_SIZE])
        .map_err(|e| eyre::eyre!("failed to write trunk entry {}: {:?}", index, e))?;
    entry.set(page_id);
    Ok(())
}
