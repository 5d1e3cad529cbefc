//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses and page bases used in
//! paging and memory management code.
//!
//! ## Overview
//!
//! | Concept | Generic | Description |
//! |----------|----------|-------------|
//! | [`MemoryAddress`] | – | A raw 64-bit address, either physical or virtual. |
//! | [`MemoryPage<S>`] | [`S: PageSize`](PageSize) | A page-aligned base address of a page of size `S`. |
//!
//! These are then wrapped to distinguish between virtual and physical spaces:
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Refer to virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Refer to physical memory or MMIO regions. |
//!
//! Only the 4 KiB base granularity ([`Size4K`]) is provided; it is the unit
//! the physical page allocator works in.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
//! assert!(!pa.is_aligned::<Size4K>());
//!
//! let page = pa.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x0000_0010_2000_0000);
//! assert_eq!(page.checked_add_pages(1).unwrap().base().as_u64(), 0x0000_0010_2000_1000);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys or for FFI use.
//! - All alignment and offset calculations are `const fn`.
//! - The phantom marker `S` enforces the page size at the type level instead of
//!   using constants, ensuring all conversions are explicit.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod memory_address;
mod memory_page;
mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use memory_address::MemoryAddress;
pub use memory_page::MemoryPage;
pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_offset_4k() {
        let a = MemoryAddress::new(0x1234_5678_9ABC_DEF0);
        let p = a.page::<Size4K>();
        assert_eq!(p.base().as_u64() & 0xFFF, 0);
        assert_eq!(a.offset::<Size4K>(), a.as_u64() & 0xFFF);
        assert_eq!(p.base().as_u64() + a.offset::<Size4K>(), a.as_u64());
    }

    #[test]
    fn virtual_vs_physical_wrappers() {
        let va = VirtualAddress::new(0xFFFF_FFFF_8000_1234);
        let vp = va.page::<Size4K>();
        assert_eq!(vp.base().as_u64() & 0xFFF, 0);
        assert_eq!(va.offset::<Size4K>(), 0x234);

        let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
        let pp = pa.page::<Size4K>();
        assert_eq!(pp.base().as_u64() & 0xFFF, 0);
        assert_eq!(pa.offset::<Size4K>(), 0x42);
    }

    #[test]
    fn alignment_helpers() {
        let a = MemoryAddress::new(0x12345);
        assert_eq!(a.align_down::<Size4K>().as_u64(), 0x12000);
        assert_eq!(a.align_up::<Size4K>().unwrap().as_u64(), 0x13000);
        assert_eq!(a.page::<Size4K>().base().as_u64(), 0x12000);
        assert!(!a.is_aligned::<Size4K>());
        assert!(MemoryAddress::new(0x13000).is_aligned::<Size4K>());
        assert_eq!(
            MemoryAddress::new(0x13000).align_up::<Size4K>().unwrap().as_u64(),
            0x13000
        );
    }

    #[test]
    fn align_up_reports_overflow() {
        assert!(MemoryAddress::new(u64::MAX).align_up::<Size4K>().is_none());
        assert!(PhysicalAddress::new(u64::MAX - 10).align_up::<Size4K>().is_none());
    }

    #[test]
    fn new_aligned_rejects_unaligned() {
        let pa = PhysicalAddress::new(0x8000);
        assert_eq!(PhysicalPage::<Size4K>::new_aligned(pa).unwrap().base(), pa);
        assert!(PhysicalPage::<Size4K>::new_aligned(pa + 8).is_none());
    }

    #[test]
    fn checked_add_pages_walks_and_overflows() {
        let p = PhysicalAddress::new(0x1000).page::<Size4K>();
        assert_eq!(p.checked_add_pages(3).unwrap().base().as_u64(), 0x4000);
        assert!(p.checked_add_pages(u64::MAX).is_none());
    }
}
