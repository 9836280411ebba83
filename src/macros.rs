//! # Internal Macros
//!
//! dbite keeps two fixed-layout records on disk, the meta page header and
//! the freelist trunk header, both built from zerocopy little-endian
//! integer fields. Reading such a field means `.get()` and writing means
//! `.set()`; spelling that out per field buries the interesting code in
//! accessor noise, so the accessors are generated.
//!
//! ## zerocopy_accessors!
//!
//! Expands each `name: type` entry into a `name()` getter and a
//! `set_name()` setter over the underlying little-endian field. Only u32
//! and u64 arms exist because those are the only field widths the on-disk
//! headers use (page ids and the txn counter); a new field width means
//! adding an arm here.
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::little_endian::{U32, U64};
//!
//! #[repr(C)]
//! struct MetaHeader {
//!     txn_id: U64,
//!     root_page: U32,
//! }
//!
//! impl MetaHeader {
//!     zerocopy_accessors! {
//!         txn_id: u64,
//!         root_page: u32,
//!     }
//! }
//!
//! // header.txn_id() -> u64, header.set_txn_id(7)
//! // header.root_page() -> u32, header.set_root_page(3)
//! ```

/// Generates getter/setter pairs for zerocopy little-endian header fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    () => {};
    ($field:ident : u32, $($rest:tt)*) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field.set(val);
            }
        }
        $crate::zerocopy_accessors!($($rest)*);
    };
    ($field:ident : u64, $($rest:tt)*) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field.set(val);
            }
        }
        $crate::zerocopy_accessors!($($rest)*);
    };
    ($field:ident : $ty:tt) => {
        $crate::zerocopy_accessors!($field : $ty,);
    };
}
