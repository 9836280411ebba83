//! # dbite Configuration Constants
//!
//! This module centralizes the on-disk layout constants. Most values here
//! are coupled: the node header sizes feed the entry limit, and the trunk
//! header size feeds the freelist capacity. Constants that depend on each
//! other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> NODE_HEADER_SIZE (3 bytes: type u8 + n_keys u16)
//!       │
//!       ├─> MAX_ENTRY_SIZE (derived: one slot, with its pointer and
//!       │     offset, must fit a single page with a safety margin)
//!       │
//!       ├─> MERGE_LOW_WATER (derived: PAGE_SIZE / 4)
//!       │     Nodes at or below this size are merge candidates on delete
//!       │
//!       └─> TRUNK_MAX_ENTRIES (derived: ids per freelist trunk page)
//!
//! NODE_HEADER_SIZE
//!       │
//!       └─> node size arithmetic in btree::node
//!             size = header + (PTR_SIZE + OFFSET_SIZE) * n_keys + slots
//! ```
//!
//! ## Critical Invariants
//!
//! Enforced by compile-time assertions below:
//!
//! 1. `MAX_ENTRY_SIZE` leaves room for one maximal slot per page, so
//!    `split_half` never needs more than two passes.
//! 2. `TRUNK_MAX_ENTRIES` is derived from `PAGE_SIZE` and the trunk
//!    header, never hand-written.
//!
//! ## Modifying Constants
//!
//! `PAGE_SIZE` is baked into every persisted page and into the meta page
//! arithmetic; changing it produces a new, incompatible file format.

/// Size of each database page in bytes (4KB).
/// This is the fundamental unit of I/O and of the copy-on-write protocol.
pub const PAGE_SIZE: usize = 4096;

/// Node type tag for internal nodes.
pub const NODE_INTERNAL: u8 = 1;

/// Node type tag for leaf nodes.
pub const NODE_LEAF: u8 = 2;

/// Size of the node type tag.
pub const NODE_TYPE_SIZE: usize = 1;

/// Size of the key-count field.
pub const KEY_COUNT_SIZE: usize = 2;

/// Size of the node header: type tag followed by key count.
pub const NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + KEY_COUNT_SIZE;

/// Size of a child page pointer within a node.
pub const PTR_SIZE: usize = 4;

/// Size of one slot end-offset within a node.
pub const OFFSET_SIZE: usize = 2;

/// Size of a slot header: key length followed by value length.
pub const SLOT_HEADER_SIZE: usize = 4;

/// Slack kept when deriving the entry limit.
const ENTRY_SAFETY_MARGIN: usize = 10;

/// Maximum combined key + value size for a single entry.
/// One slot, with its pointer and offset, must always fit a single page;
/// this is what bounds `split_to_fit` at three fragments.
pub const MAX_ENTRY_SIZE: usize = PAGE_SIZE
    - NODE_HEADER_SIZE
    - PTR_SIZE
    - OFFSET_SIZE
    - SLOT_HEADER_SIZE
    - ENTRY_SAFETY_MARGIN;

/// Low-water mark for sibling merging on delete.
/// A node whose size is above this is left alone after a deletion.
pub const MERGE_LOW_WATER: usize = PAGE_SIZE / 4;

/// Page id of the meta page. Allocators never hand this out.
pub const META_PAGE_ID: u32 = 0;

/// Magic constant identifying a dbite file: the ASCII bytes `DBITE001`
/// packed big-end-first into a u64. Stored little-endian on disk like
/// every other integer field.
pub const META_MAGIC: u64 = u64::from_be_bytes(*b"DBITE001");

/// Size of the meta header at the start of page 0. The rest of the
/// meta page is zero.
pub const META_HEADER_SIZE: usize = 28;

/// Size of a freelist trunk header: next-trunk pointer and entry count.
pub const TRUNK_HEADER_SIZE: usize = 8;

/// Number of free page ids one trunk page can hold.
pub const TRUNK_MAX_ENTRIES: usize = (PAGE_SIZE - TRUNK_HEADER_SIZE) / PTR_SIZE;

const _: () = assert!(
    MAX_ENTRY_SIZE == 4073,
    "MAX_ENTRY_SIZE derivation mismatch"
);

const _: () = assert!(
    NODE_HEADER_SIZE + PTR_SIZE + OFFSET_SIZE + SLOT_HEADER_SIZE + MAX_ENTRY_SIZE <= PAGE_SIZE,
    "a maximal entry must fit a single page"
);

const _: () = assert!(
    TRUNK_MAX_ENTRIES == 1022,
    "TRUNK_MAX_ENTRIES derivation mismatch"
);

const _: () = assert!(META_MAGIC == 0x4442495445303031);
