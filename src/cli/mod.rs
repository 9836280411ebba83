//! # CLI Module
//!
//! The interactive shell behind the `dbite` binary. The shell is a thin
//! wrapper over [`crate::Store`]: every command maps one-to-one onto a
//! store operation, and nothing in here touches pages or nodes directly.

mod repl;

pub use repl::Repl;
