//! # Physical memory access
//!
//! The page allocator has to touch the pages it manages (it fills them with a
//! marker pattern on every allocation and release), but code can only
//! dereference *virtual* addresses. [`PhysMapper`] abstracts over how a
//! physical address becomes a usable pointer in the current address space.
//!
//! ## How does it work?
//! - With a higher-half direct map (HHDM), every physical address is mapped
//!   at `HHDM_BASE + pa`; [`HhdmPhysMapper`] adds that base.
//! - [`OffsetPhysMapper`] generalizes this to any fixed offset, which is also
//!   what hosted tests use to back "physical" pages with heap memory.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::{OffsetPhysMapper, PhysMapper};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let mut backing = [0u8; 16];
//! let phys = PhysicalAddress::new(0x4000);
//! let mapper = OffsetPhysMapper::for_buffer(backing.as_mut_ptr(), phys);
//! unsafe {
//!     let word: &mut u64 = mapper.phys_to_mut(phys + 8);
//!     *word = u64::MAX;
//! }
//! assert_eq!(backing[8..], [0xff; 8]);
//! ```

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses to *temporarily* usable pointers in the current
/// virtual address space (e.g., via identity map or a higher-half direct map, HHDM).
///
/// # Safety
/// - You must ensure `pa` is mapped as writable in the current page tables
///   for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference in the current address space.
    ///
    /// # Safety
    /// `pa .. pa + size_of::<T>()` must be mapped, writable, suitably aligned
    /// for `T` and not otherwise borrowed for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] that maps `pa` to the virtual address `pa + offset`
/// (wrapping, so offsets may be "negative").
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OffsetPhysMapper {
    offset: u64,
}

impl OffsetPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Mapper that makes `phys_base` resolve to `buffer`.
    #[must_use]
    pub fn for_buffer(buffer: *mut u8, phys_base: PhysicalAddress) -> Self {
        Self::new((buffer as u64).wrapping_sub(phys_base.as_u64()))
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysMapper for OffsetPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = pa.as_u64().wrapping_add(self.offset) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped at the offset.
        unsafe { &mut *va }
    }
}

/// [`PhysMapper`] implementation for kernels with a higher-half direct map (HHDM).
///
/// # Safety
/// - The HHDM mapping must be present and cover the referenced physical range.
/// - The returned pointer must only be used for valid, mapped, and writable memory.
#[derive(Debug, Copy, Clone, Default)]
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        // SAFETY: forwarded to the caller; see the trait contract.
        unsafe { OffsetPhysMapper::new(HHDM_BASE).phys_to_mut(pa) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_mapper_resolves_into_buffer() {
        let mut buf = [0u32; 4];
        let base = PhysicalAddress::new(0x1_0000);
        let m = OffsetPhysMapper::for_buffer(buf.as_mut_ptr().cast(), base);
        unsafe {
            *m.phys_to_mut::<u32>(base + 4) = 0xdead_beef;
        }
        assert_eq!(buf, [0, 0xdead_beef, 0, 0]);
    }

    #[test]
    fn hhdm_mapper_uses_the_direct_map_base() {
        let m = OffsetPhysMapper::new(HHDM_BASE);
        assert_eq!(m.offset(), HHDM_BASE);
    }
}
