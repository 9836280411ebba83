//! # B+Tree Implementation
//!
//! This module implements the ordered key/value index at the heart of
//! dbite: a copy-on-write B+tree whose nodes are self-describing 4KB
//! pages.
//!
//! ## Node Types
//!
//! - **Leaf nodes** store the actual key-value pairs in sorted order.
//! - **Internal nodes** store separator keys and child page pointers.
//!   The separator at position i is the *first* key of the subtree
//!   rooted at child i, so descent picks the greatest separator that is
//!   less than or equal to the search key.
//!
//! ## Page Layout
//!
//! ```text
//! +----------------------+
//! | type (1B)            |  1 = internal, 2 = leaf
//! | n_keys (2B, LE)      |
//! +----------------------+
//! | pointers (4B each)   |  child page ids; zeroed in leaves
//! +----------------------+
//! | offsets (2B each)    |  end offset of each slot; slot 0 starts at 0
//! +----------------------+
//! | slots                |  [key_len:2][val_len:2][key][val] ...
//! +----------------------+
//! ```
//!
//! Both node types share this layout; leaves simply carry zeroed
//! pointers. See [`node`] for the codec and [`tree`] for the algorithms.
//!
//! ## Copy-on-Write
//!
//! Structural transforms never mutate a node in place: every insert and
//! delete rebuilds the path from leaf to root out of fresh nodes and
//! retires the replaced pages. Together with the pager's
//! meta-page-last commit ordering this yields crash-consistent
//! durability without a write-ahead log.
//!
//! ## Oversize Nodes and Splitting
//!
//! A mutated leaf or rebuilt internal node may transiently exceed one
//! page (builders allocate double-size buffers). `split_to_fit` turns
//! such a node into one, two, or at most three page-sized fragments;
//! three is the ceiling because a single entry is capped below one page.
//!
//! ## Thread Safety
//!
//! `BTree` borrows its pager mutably and is single-writer by
//! construction. Callers needing concurrency must serialize externally.

mod node;
mod tree;

pub use node::{Node, NodeKind};
pub use tree::BTree;
