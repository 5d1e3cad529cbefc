//! # Kernel Physical Page Allocation
//!
//! This crate owns the physical memory between the end of the kernel image
//! and the top of RAM and hands it out one 4 KiB page at a time. Pages carry
//! an owner count, so a page can be shared between several address spaces
//! (e.g. after a fork) and is only reclaimed when the last owner releases it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Page Allocator (frame_alloc)           │
//! │    • acquire / release / duplicate                  │
//! │    • one spin lock around all bookkeeping           │
//! │    • fill patterns on allocation and release        │
//! └───────┬──────────────────┬──────────────────┬───────┘
//!         │                  │                  │
//! ┌───────▼───────┐ ┌────────▼────────┐ ┌───────▼───────┐
//! │  Free List    │ │ Ref-Count Table │ │ Phys Mapper   │
//! │  LIFO, O(1)   │ │ u8 per page     │ │ PA → pointer  │
//! └───────┬───────┘ └────────┬────────┘ └───────────────┘
//!         │                  │
//! ┌───────▼──────────────────▼──────────────────────────┐
//! │               Page Index (page_index)               │
//! │    • physical address ⇄ dense index                 │
//! │    • alignment and bounds validation                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Page Lifecycle
//!
//! | State     | Owner count | On free list |
//! |-----------|-------------|--------------|
//! | Free      | 0           | yes          |
//! | Owned     | 1..=255     | no           |
//! | Bootstrap | 0           | no           |
//!
//! A page moves from *Bootstrap* to *Free* exactly once, while the allocator
//! seeds its pool. From then on it cycles between *Free* and *Owned*.
//!
//! ## Boot Order
//!
//! The per-page tables are boxed slices, so [`PageAllocator::new`] runs after
//! the kernel's global allocator is up. That heap must not be carved out of
//! the managed range.
//!
//! ## Failure Model
//!
//! Running out of pages, duplicating a free page, or exceeding the owner
//! limit are ordinary errors ([`PageAllocError`]). Releasing a foreign,
//! misaligned or already free page means the caller's bookkeeping is broken
//! and panics.
//!
//! ## Usage
//! ```rust
//! use kernel_alloc::{FrameAlloc, ManagedRange, OffsetPhysMapper, PageAllocator, Released};
//! use kernel_memory_addresses::PhysicalAddress;
//! use std::alloc::{alloc_zeroed, dealloc, Layout};
//!
//! let layout = Layout::from_size_align(4 * 4096, 4096).unwrap();
//! let backing = unsafe { alloc_zeroed(layout) };
//!
//! let range = ManagedRange::new(PhysicalAddress::new(0x20_0000), PhysicalAddress::new(0x20_4000));
//! let mapper = OffsetPhysMapper::for_buffer(backing, range.start());
//! let pages = unsafe { PageAllocator::new(mapper, range) };
//!
//! let page = pages.acquire_page().unwrap();
//! pages.duplicate_page(page.base()).unwrap();
//! assert_eq!(pages.release_page(page.base()), Released::StillShared { remaining: 1 });
//! assert_eq!(pages.release_page(page.base()), Released::Freed);
//!
//! drop(pages);
//! unsafe { dealloc(backing, layout) };
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod frame_alloc;
mod free_list;
pub mod page_index;
pub mod phys_mapper;
pub mod ref_count;

pub use frame_alloc::{ALLOC_FILL, FREE_FILL, FrameAlloc, PageAllocError, PageAllocator, PageStats, Released};
pub use page_index::{ManagedRange, PageIndex, PageIndexError};
pub use phys_mapper::{HhdmPhysMapper, OffsetPhysMapper, PhysMapper};
pub use ref_count::RefCount;
