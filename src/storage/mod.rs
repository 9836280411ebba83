//! # Storage Module
//!
//! This module provides the paged-file layer beneath the B+tree: the meta
//! page that anchors all durable state, the freelist that recycles
//! retired pages, and the pager that buffers a transaction's writes and
//! commits them atomically.
//!
//! ## File Layout
//!
//! ```text
//! Offset 0:        Page 0: meta page (header + zero padding)
//! Offset 4096:     Page 1: tree node, freelist trunk, or unused
//! Offset 8192:     Page 2: ...
//! ```
//!
//! Pages are addressed by u32 id; byte offset is `id * PAGE_SIZE`. Page 0
//! is permanently reserved for the meta page, so 0 doubles as the "no
//! page" sentinel in the root pointer and the freelist chain.
//!
//! ## Durability Model
//!
//! The pager buffers every page image in memory until `commit`, which
//! writes data pages first, the meta page last, and fences with a single
//! fsync. Because the tree is copy-on-write, pages reachable from the
//! *old* meta page are never touched, so an interrupted commit leaves the
//! previous committed state fully intact. There is no write-ahead log to
//! replay; recovery is simply reading the meta page.
//!
//! ## Positional I/O
//!
//! Pages are read and written with seek + exact-length transfers on a
//! plain `File`. The store is single-writer, so the shared cursor is not
//! a hazard, and skipping mmap keeps uncommitted page images private to
//! the pager's dirty map.
//!
//! ## Module Organization
//!
//! - `meta`: the page-0 header (magic, txn counter, root, allocator,
//!   freelist head)
//! - `freelist`: trunk page format and entry accessors
//! - `pager`: dirty-map transaction buffer, allocation, commit/abort

mod freelist;
mod meta;
mod pager;

pub use freelist::{set_trunk_entry, trunk_entry, TrunkHeader};
pub use meta::MetaHeader;
pub use pager::Pager;
