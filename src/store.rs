//! # Store Facade
//!
//! This module provides the high-level entry point for embedders: a
//! [`Store`] owns the pager and binds a fresh [`BTree`] view to it for
//! every operation, so callers never juggle the tree/pager borrow
//! themselves.
//!
//! ## Usage
//!
//! ```ignore
//! use dbite::Store;
//!
//! let mut store = Store::open("./data.db")?;
//! store.put(b"APPLE", b"red")?;
//! store.commit()?;
//!
//! assert_eq!(store.get(b"APPLE")?, Some(b"red".to_vec()));
//! ```
//!
//! ## Transaction Model
//!
//! Mutations accumulate in the pager's dirty map and become durable only
//! at [`Store::commit`]. [`Store::abort`] rolls the session back to the
//! last committed state. Reads within a session observe the session's own
//! uncommitted writes.
//!
//! ## Single Writer
//!
//! Every method takes `&mut self`: the store is a single-writer embedded
//! database and performs no internal locking. Embedders wanting shared
//! access must serialize calls externally.

use std::path::Path;

use eyre::Result;

use crate::btree::BTree;
use crate::storage::Pager;

pub struct Store {
    pager: Pager,
}

impl Store {
    /// Opens (or creates) the store at `path`. A fresh file gets its
    /// empty root leaf allocated and committed immediately so the file
    /// on disk is self-consistent from the start.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut pager = Pager::open(path)?;
        if pager.root_page() == 0 {
            BTree::open(&mut pager)?;
            pager.commit()?;
        }
        Ok(Self { pager })
    }

    /// Inserts or replaces `key`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut tree = BTree::open(&mut self.pager)?;
        tree.insert(key, value)
    }

    /// Returns the value for `key`, or `None` when absent. Uncommitted
    /// writes of this session are visible.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tree = BTree::open(&mut self.pager)?;
        tree.search(key)
    }

    /// Removes `key`. Returns true iff the key existed.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let mut tree = BTree::open(&mut self.pager)?;
        tree.remove(key)
    }

    /// Makes every mutation since the last commit durable.
    pub fn commit(&mut self) -> Result<()> {
        self.pager.commit()
    }

    /// Discards every mutation since the last commit.
    pub fn abort(&mut self) -> Result<()> {
        self.pager.abort()
    }

    pub fn path(&self) -> &Path {
        self.pager.path()
    }

    pub fn txn_id(&self) -> u64 {
        self.pager.txn_id()
    }

    pub fn root_page(&self) -> u32 {
        self.pager.root_page()
    }

    pub fn has_uncommitted(&self) -> bool {
        self.pager.has_uncommitted()
    }

    pub fn dirty_count(&self) -> usize {
        self.pager.dirty_count()
    }
}
