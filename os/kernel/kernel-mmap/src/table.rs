//! Per-address-space table of memory mappings.
//!
//! Mappings are reserved eagerly and backed lazily: [`MappingTable::map`] only
//! records the region, and [`MappingTable::fault`] pulls a page from the
//! allocator the first time an address inside it is touched. Every resident
//! page holds exactly one allocator reference per table that maps it.

use crate::region::Region;
use crate::{MapFlags, MapInfo};
use alloc::vec::Vec;
use kernel_alloc::{FrameAlloc, PageAllocError};
use kernel_info::memory::{MAX_MAP_INFO, MMAP_BASE, MMAP_END};
use kernel_memory_addresses::{PageSize, PhysicalPage, Size4K, VirtualAddress};
use log::{debug, trace};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("mapping length must be nonzero")]
    InvalidLength,
    #[error("address {0} cannot start a fixed mapping")]
    InvalidAddress(VirtualAddress),
    #[error("mapping at {0} overlaps an existing one")]
    Overlap(VirtualAddress),
    #[error("too many mappings")]
    TooManyMappings,
    #[error("no free virtual range of {0} bytes")]
    NoSpace(u64),
    #[error("address {0} is not mapped")]
    NotMapped(VirtualAddress),
    #[error("only anonymous mappings are supported")]
    Unsupported,
    #[error(transparent)]
    Alloc(#[from] PageAllocError),
}

/// Mappings of one address space, backed by pages from `A`.
///
/// Regions are kept sorted by start address and never overlap. Dropping the
/// table releases every page it holds.
pub struct MappingTable<'a, A: FrameAlloc + ?Sized> {
    frames: &'a A,
    regions: Vec<Region>,
}

impl<'a, A: FrameAlloc + ?Sized> MappingTable<'a, A> {
    #[must_use]
    pub const fn new(frames: &'a A) -> Self {
        Self {
            frames,
            regions: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Reserve `length` bytes (rounded up to whole pages) and return the
    /// start of the new mapping.
    ///
    /// With [`MapFlags::fixed`] the mapping starts at `addr`; otherwise `addr`
    /// is ignored and the lowest free range of the mapping window is used.
    ///
    /// # Errors
    /// - [`MapError::Unsupported`] for non-anonymous mappings.
    /// - [`MapError::InvalidLength`] for a zero length.
    /// - [`MapError::TooManyMappings`] once [`MAX_MAP_INFO`] regions exist.
    /// - [`MapError::InvalidAddress`] if a fixed `addr` is unaligned or the
    ///   mapping would leave the window, [`MapError::Overlap`] if it collides
    ///   with an existing mapping.
    /// - [`MapError::NoSpace`] if `length` exceeds the mapping window or no
    ///   gap is large enough.
    pub fn map(&mut self, addr: VirtualAddress, length: u64, flags: MapFlags) -> Result<VirtualAddress, MapError> {
        if !flags.anonymous() {
            return Err(MapError::Unsupported);
        }
        if length == 0 {
            return Err(MapError::InvalidLength);
        }
        if self.regions.len() >= MAX_MAP_INFO {
            return Err(MapError::TooManyMappings);
        }
        // Larger than the whole window; also keeps the rounding below in range.
        if length > MMAP_END - MMAP_BASE {
            return Err(MapError::NoSpace(length));
        }
        let page_count = length.div_ceil(Size4K::SIZE);
        let len_bytes = page_count * Size4K::SIZE;

        let start = if flags.fixed() {
            self.check_fixed(addr, len_bytes)?
        } else {
            self.find_gap(len_bytes).ok_or(MapError::NoSpace(len_bytes))?
        };

        let page_count = usize::try_from(page_count).map_err(|_| MapError::NoSpace(len_bytes))?;
        let at = self.regions.partition_point(|r| r.start() < start);
        self.regions.insert(at, Region::new(start, page_count, flags));
        debug!("mapped {len_bytes:#x} bytes at {start} ({flags:?})");
        Ok(start)
    }

    fn check_fixed(&self, addr: VirtualAddress, len_bytes: u64) -> Result<VirtualAddress, MapError> {
        if !addr.is_aligned::<Size4K>() || addr.as_u64() < MMAP_BASE {
            return Err(MapError::InvalidAddress(addr));
        }
        let end = match addr.checked_add(len_bytes) {
            Some(end) if end.as_u64() <= MMAP_END => end,
            _ => return Err(MapError::InvalidAddress(addr)),
        };
        if self.regions.iter().any(|r| r.overlaps(addr, end)) {
            return Err(MapError::Overlap(addr));
        }
        Ok(addr)
    }

    /// Lowest start in the window where `len_bytes` fit between mappings.
    fn find_gap(&self, len_bytes: u64) -> Option<VirtualAddress> {
        let mut cursor = MMAP_BASE;
        for region in &self.regions {
            if region.start().as_u64() - cursor >= len_bytes {
                break;
            }
            cursor = region.end().as_u64();
        }
        (MMAP_END - cursor >= len_bytes).then(|| VirtualAddress::new(cursor))
    }

    /// Make the page containing `va` resident and return its backing page.
    ///
    /// Touching an already resident page returns the same page again.
    ///
    /// # Errors
    /// [`MapError::NotMapped`] if `va` is outside every mapping, or the
    /// allocator's error if no page is available.
    pub fn fault(&mut self, va: VirtualAddress) -> Result<PhysicalPage<Size4K>, MapError> {
        let frames = self.frames;
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.contains(va))
            .ok_or(MapError::NotMapped(va))?;

        let slot = region.slot_mut(va);
        if let Some(page) = *slot {
            return Ok(page);
        }
        let page = frames.acquire_page()?;
        *slot = Some(page);
        trace!("page {} backed by {page}", va.page::<Size4K>());
        Ok(page)
    }

    /// Remove the mapping starting at `addr` and release its pages.
    ///
    /// # Errors
    /// [`MapError::NotMapped`] if no mapping starts at `addr`.
    pub fn unmap(&mut self, addr: VirtualAddress) -> Result<(), MapError> {
        let at = self
            .regions
            .iter()
            .position(|r| r.start() == addr)
            .ok_or(MapError::NotMapped(addr))?;
        let mut region = self.regions.remove(at);
        let resident = region.resident_count();
        region.release_all(self.frames);
        debug!("unmapped {addr}, released {resident} pages");
        Ok(())
    }

    /// Copy of this table for a duplicated address space.
    ///
    /// Every resident page gains one reference and is shared by both tables.
    /// Shared mappings stay shared; private ones are to be copied on write by
    /// the caller.
    ///
    /// # Errors
    /// The allocator's error if a page cannot take another reference. The
    /// references taken up to that point are released again.
    pub fn duplicate(&self) -> Result<Self, MapError> {
        let mut child = Self::new(self.frames);
        for region in &self.regions {
            let mut copy = region.empty_copy();
            for (index, page) in region.resident() {
                match self.frames.duplicate_page(page.base()) {
                    Ok(shared) => copy.set(index, shared),
                    Err(e) => {
                        // `child` releases the regions it already holds.
                        copy.release_all(self.frames);
                        return Err(e.into());
                    }
                }
            }
            child.regions.push(copy);
        }
        debug!("duplicated {} mappings", child.regions.len());
        Ok(child)
    }

    /// Describe the current mappings in ascending address order.
    #[must_use]
    pub fn info(&self) -> MapInfo {
        let mut info = MapInfo {
            total_mmaps: self.regions.len() as u64,
            ..MapInfo::default()
        };
        for (i, region) in self.regions.iter().enumerate() {
            info.addr[i] = region.start().as_u64();
            info.length[i] = region.len_bytes();
            info.n_loaded_pages[i] = region.resident_count() as u64;
        }
        info
    }

    /// Flags of the mapping containing `va`.
    #[must_use]
    pub fn flags_at(&self, va: VirtualAddress) -> Option<MapFlags> {
        self.regions.iter().find(|r| r.contains(va)).map(Region::flags)
    }
}

impl<A: FrameAlloc + ?Sized> Drop for MappingTable<'_, A> {
    fn drop(&mut self) {
        for region in &mut self.regions {
            region.release_all(self.frames);
        }
    }
}
