use crate::MapFlags;
use alloc::boxed::Box;
use alloc::vec;
use kernel_alloc::FrameAlloc;
use kernel_memory_addresses::{PageSize, PhysicalPage, Size4K, VirtualAddress};

/// One mapping: a page-aligned run of virtual pages and, for each, the
/// physical page backing it once it has been touched.
#[derive(Debug)]
pub(crate) struct Region {
    start: VirtualAddress,
    flags: MapFlags,
    pages: Box<[Option<PhysicalPage<Size4K>>]>,
}

impl Region {
    /// A region with no resident pages.
    pub(crate) fn new(start: VirtualAddress, page_count: usize, flags: MapFlags) -> Self {
        debug_assert!(start.is_aligned::<Size4K>());
        Self {
            start,
            flags,
            pages: vec![None; page_count].into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) const fn start(&self) -> VirtualAddress {
        self.start
    }

    #[inline]
    pub(crate) const fn flags(&self) -> MapFlags {
        self.flags
    }

    #[inline]
    pub(crate) fn len_bytes(&self) -> u64 {
        self.pages.len() as u64 * Size4K::SIZE
    }

    /// First address past the region.
    #[inline]
    pub(crate) fn end(&self) -> VirtualAddress {
        self.start + self.len_bytes()
    }

    #[inline]
    pub(crate) fn contains(&self, va: VirtualAddress) -> bool {
        va >= self.start && va < self.end()
    }

    pub(crate) fn overlaps(&self, start: VirtualAddress, end: VirtualAddress) -> bool {
        start < self.end() && self.start < end
    }

    pub(crate) fn resident_count(&self) -> usize {
        self.pages.iter().flatten().count()
    }

    /// Backing slot of the page containing `va`. `va` must lie in the region.
    pub(crate) fn slot_mut(&mut self, va: VirtualAddress) -> &mut Option<PhysicalPage<Size4K>> {
        let index = (va.as_u64() - self.start.as_u64()) >> Size4K::SHIFT;
        &mut self.pages[usize::try_from(index).unwrap_or(usize::MAX)]
    }

    /// An empty region with the same placement, for a duplicated table.
    pub(crate) fn empty_copy(&self) -> Self {
        Self::new(self.start, self.pages.len(), self.flags)
    }

    /// `(index, page)` for every resident page.
    pub(crate) fn resident(&self) -> impl Iterator<Item = (usize, PhysicalPage<Size4K>)> + '_ {
        self.pages
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (i, p)))
    }

    pub(crate) fn set(&mut self, index: usize, page: PhysicalPage<Size4K>) {
        self.pages[index] = Some(page);
    }

    /// Drop this region's reference to every resident page.
    pub(crate) fn release_all<A: FrameAlloc + ?Sized>(&mut self, frames: &A) {
        for slot in &mut self.pages {
            if let Some(page) = slot.take() {
                frames.release_page(page.base());
            }
        }
    }
}
