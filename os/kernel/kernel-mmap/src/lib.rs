//! # Anonymous Memory Mappings
//!
//! User-facing memory mappings on top of the reference-counted page
//! allocator in `kernel-alloc`. A [`MappingTable`] tracks the mappings of
//! one address space inside the fixed window `[MMAP_BASE, MMAP_END)` and
//! turns first touches, unmaps, address space duplication and teardown into
//! `acquire_page`, `release_page` and `duplicate_page` calls.
//!
//! ```text
//!   map ──► region reserved, no pages
//!   fault ──► acquire_page          (count = 1)
//!   duplicate ──► duplicate_page    (count + 1, page shared by both tables)
//!   unmap / drop ──► release_page   (count - 1, freed at 0)
//! ```
//!
//! The user-visible ABI lives in [`flags`] and [`info`]: the `MAP_*` flag
//! bits, the [`MapInfo`] descriptor, and the `SUCCESS`/`FAILED` return
//! convention.
//!
//! Only anonymous mappings exist; there is no file backing.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod flags;
pub mod info;
mod region;
mod table;

pub use flags::{MAP_ANONYMOUS, MAP_FIXED, MAP_SHARED, MapFlags};
pub use info::{FAILED, MapInfo, SUCCESS, SyscallValue, into_syscall_ret};
pub use table::{MapError, MappingTable};
