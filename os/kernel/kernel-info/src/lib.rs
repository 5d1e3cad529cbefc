//! # Kernel Configuration
//!
//! This crate is the single source of truth for the compile-time memory
//! layout shared by the kernel's memory subsystems. It carries no code beyond
//! constants and their compile-time consistency checks.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             │  (BIOS, VGA, DMA buffers)       │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//! kernel end  ├─────────────────────────────────┤ (rounded up to a page)
//!             │    Available RAM                │
//!             │  (Managed by the page allocator)│
//! PHYS_STOP   └─────────────────────────────────┘
//! ```
//!
//! The page allocator manages `[kernel end, PHYS_STOP)`. Each managed page
//! can be shared by at most [`MAX_PAGE_REFERENCES`](memory::MAX_PAGE_REFERENCES)
//! owners.
//!
//! ## User Mapping Window
//!
//! Memory mappings requested by user programs are placed inside
//! `[MMAP_BASE, MMAP_END)`; at most [`MAX_MAP_INFO`](memory::MAX_MAP_INFO)
//! mappings exist per address space.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::memory::{PAGE_SIZE, PHYS_LOAD, PHYS_STOP};
//!
//! let managed_pages = (PHYS_STOP - PHYS_LOAD) / PAGE_SIZE;
//! assert!(managed_pages > 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
