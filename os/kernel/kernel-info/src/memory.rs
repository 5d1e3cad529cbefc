//! # Memory Layout

/// Size of a physical page managed by the page allocator.
pub const PAGE_SIZE: u64 = 4096;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel image is placed in *physical* memory (LMA).
///
/// The first managed page lies above the end of the image, which is only
/// known at link time; see `ManagedRange::from_kernel_end`.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Upper limit of physical memory the page allocator manages (exclusive).
pub const PHYS_STOP: u64 = PHYS_LOAD + 128 * 1024 * 1024;

/// Maximum number of owners a single physical page may have.
///
/// Duplicating a page reference beyond this bound fails.
pub const MAX_PAGE_REFERENCES: u8 = u8::MAX;

/// Lowest user virtual address handed out to memory mappings.
pub const MMAP_BASE: u64 = 0x6000_0000;

/// End of the memory mapping window (exclusive).
pub const MMAP_END: u64 = 0x8000_0000;

/// Maximum number of mappings per address space, and the number of
/// entries reported by the mapping descriptor table.
pub const MAX_MAP_INFO: usize = 16;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PHYS_LOAD.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_STOP.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_STOP > PHYS_LOAD);
    assert!(MMAP_BASE.is_multiple_of(PAGE_SIZE));
    assert!(MMAP_END.is_multiple_of(PAGE_SIZE));
    assert!(MMAP_END > MMAP_BASE);
};
