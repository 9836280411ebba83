//! # Configuration Module
//!
//! Central home for the on-disk layout constants shared by the page codec,
//! the B+tree, and the pager. See [`constants`] for the dependency graph
//! between values and the compile-time derivation checks.

pub mod constants;

pub use constants::{
    KEY_COUNT_SIZE, MAX_ENTRY_SIZE, MERGE_LOW_WATER, META_HEADER_SIZE, META_MAGIC, META_PAGE_ID,
    NODE_HEADER_SIZE, NODE_INTERNAL, NODE_LEAF, NODE_TYPE_SIZE, OFFSET_SIZE, PAGE_SIZE, PTR_SIZE,
    SLOT_HEADER_SIZE, TRUNK_HEADER_SIZE, TRUNK_MAX_ENTRIES,
};
