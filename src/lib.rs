//! # dbite - Embedded Copy-on-Write Key/Value Store
//!
//! dbite is an embedded, single-file, persistent ordered key/value store
//! built on a copy-on-write B+tree over a paged file. This implementation
//! prioritizes:
//!
//! - **Crash consistency without a WAL**: mutations build fresh pages and
//!   the meta page is the single commit point
//! - **Exact, self-describing page formats**: every persisted page is
//!   4096 bytes and readable with nothing but the format tables below
//! - **A small, auditable core**: one pager, one node codec, one tree
//!
//! ## Quick Start
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
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Public API (Store)           │
//! ├─────────────────────────────────────┤
//! │   B+Tree (copy-on-write descent)    │
//! ├─────────────────────────────────────┤
//! │   Node Codec (page byte layout)     │
//! ├─────────────────────────────────────┤
//! │   Pager (dirty map, freelist,       │
//! │          atomic meta commit)        │
//! ├─────────────────────────────────────┤
//! │   Single backing file + fsync       │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! data.db
//! ├── page 0      meta page: magic, txn id, root, allocator, freelist
//! ├── page 1..    tree nodes, freelist trunks, or reusable pages
//! ```
//!
//! ## Transaction Model
//!
//! Single writer, no internal locking. Writes buffer in the pager until
//! `commit`, which flushes data pages, then the meta page, then fsyncs.
//! A crash between commits rolls back to the last committed tree because
//! copy-on-write never touches pages the old meta can reach.
//!
//! ## Module Overview
//!
//! - [`storage`]: pager, meta page, freelist trunks
//! - [`btree`]: node page codec and tree algorithms
//! - [`config`]: page layout constants and derivation checks
//! - [`cli`]: interactive shell used by the `dbite` binary

#[macro_use]
mod macros;

pub mod btree;
pub mod cli;
pub mod config;
pub mod storage;
mod store;

pub use btree::BTree;
pub use storage::Pager;
pub use store::Store;
