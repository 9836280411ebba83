//! # Meta Page Header
//!
//! This module defines the header stored at the start of page 0, the single
//! durable anchor of a dbite file. Everything the store needs to find its
//! state after a restart hangs off this record:
//!
//! ```text
//! Offset  Size  Field           Description
//! ------  ----  --------------  ----------------------------------------
//! 0       8     magic           ASCII `DBITE001` packed big-end-first
//! 8       8     txn_id          Commit counter, bumped on every commit
//! 16      4     root_page       B+tree root page id (0 = no root yet)
//! 20      4     next_page_id    Bump allocator watermark
//! 24      4     freelist_head   First freelist trunk page (0 = empty)
//! ```
//!
//! The remaining bytes of page 0 are zero. All fields are little-endian;
//! the magic is a u64 *value* built big-end-first from the ASCII bytes, so
//! its on-disk byte order is reversed like any other integer field.
//!
//! ## Commit Point
//!
//! The meta page is written last during a commit, after every data and
//! freelist page and before the fsync. Until that write lands, the
//! previous tree remains the one a reader (or a crash recovery) observes,
//! which is what makes the copy-on-write protocol atomic.
//!
//! ## Zerocopy Safety
//!
//! The header struct uses zerocopy traits (`FromBytes`, `IntoBytes`,
//! `Immutable`, `KnownLayout`, `Unaligned`) so it can be read straight out
//! of a page buffer without copying, and a compile-time assertion pins the
//! struct to exactly [`META_HEADER_SIZE`] bytes.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{META_HEADER_SIZE, META_MAGIC};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MetaHeader {
    magic: U64,
    txn_id: U64,
    root_page: U32,
    next_page_id: U32,
    freelist_head: U32,
}

const _: () = assert!(std::mem::size_of::<MetaHeader>() == META_HEADER_SIZE);

impl MetaHeader {
    /// Header for a freshly created file: no root, no free pages, and the
    /// bump allocator starting right after the meta page.
    pub fn new() -> Self {
        Self {
            magic: U64::new(META_MAGIC),
            txn_id: U64::new(0),
            root_page: U32::new(0),
            next_page_id: U32::new(1),
            freelist_head: U32::new(0),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= META_HEADER_SIZE,
            "buffer too small for MetaHeader: {} < {}",
            bytes.len(),
            META_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..META_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse MetaHeader: {:?}", e))?;

        ensure!(
            header.magic.get() == META_MAGIC,
            "invalid magic bytes: not a dbite file"
        );

        Ok(header)
    }

    zerocopy_accessors! {
        txn_id: u64,
        root_page: u32,
        next_page_id: u32,
        freelist_head: u32,
    }
}

impl Default for MetaHeader {
    fn default() -> Self {
        Self::new()
    }
}
