//! # Page index mapping
//!
//! Converts physical addresses inside the managed range into dense indices
//! `0..page_count` and back. Every per-page table in this crate is indexed by
//! [`PageIndex`], and the only way to obtain one from an address is
//! [`ManagedRange::index_of`], which checks alignment and bounds first.

use core::iter::FusedIterator;
use kernel_info::memory::{PAGE_SIZE, PHYS_LOAD, PHYS_STOP};
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K};

const _: () = assert!(Size4K::SIZE == PAGE_SIZE);

/// Why an address cannot be mapped to a [`PageIndex`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageIndexError {
    #[error("address {0} is not page aligned")]
    Unaligned(PhysicalAddress),
    #[error("address {0} is outside the managed range")]
    OutOfRange(PhysicalAddress),
}

/// Dense index of a page inside a [`ManagedRange`].
///
/// Produced only by validation, so holding one means the page it names is
/// page-aligned and inside the range it was derived from.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageIndex(usize);

impl PageIndex {
    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// A contiguous run of whole 4 KiB physical pages, `[start, end)`.
///
/// ### Invariants
/// - `start` is page aligned.
/// - `end = start + page_count * 4096` does not overflow.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ManagedRange {
    start: PhysicalPage<Size4K>,
    page_count: usize,
}

impl ManagedRange {
    /// Covers every page fully contained in `[start, end)`.
    ///
    /// `start` is rounded up to the next page boundary and a trailing
    /// partial page before `end` is dropped. An inverted or too small
    /// interval yields an empty range.
    #[must_use]
    pub fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        let Some(first) = start.align_up::<Size4K>() else {
            return Self::empty(start.align_down::<Size4K>());
        };
        let pages = end.as_u64().saturating_sub(first.as_u64()) / Size4K::SIZE;
        Self {
            start: first.page(),
            page_count: usize::try_from(pages).unwrap_or(usize::MAX),
        }
    }

    /// The range between the end of the kernel image and [`PHYS_STOP`].
    ///
    /// Nothing below [`PHYS_LOAD`] is ever managed, even if `kernel_end`
    /// claims otherwise.
    #[must_use]
    pub fn from_kernel_end(kernel_end: PhysicalAddress) -> Self {
        let start = kernel_end.max(PhysicalAddress::new(PHYS_LOAD));
        Self::new(start, PhysicalAddress::new(PHYS_STOP))
    }

    const fn empty(start: PhysicalAddress) -> Self {
        Self {
            start: PhysicalPage::from_addr(start),
            page_count: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start.base()
    }

    /// First address past the last managed page.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.start.base().as_u64() + self.len_bytes())
    }

    #[inline]
    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.page_count == 0
    }

    #[inline]
    #[must_use]
    pub const fn len_bytes(&self) -> u64 {
        self.page_count as u64 * Size4K::SIZE
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, pa: PhysicalAddress) -> bool {
        pa >= self.start() && pa < self.end()
    }

    /// Validate `pa` and return its dense index.
    ///
    /// # Errors
    /// [`PageIndexError::Unaligned`] if `pa` is not on a page boundary,
    /// [`PageIndexError::OutOfRange`] if it lies outside `[start, end)`.
    pub fn index_of(&self, pa: PhysicalAddress) -> Result<PageIndex, PageIndexError> {
        if !pa.is_aligned::<Size4K>() {
            return Err(PageIndexError::Unaligned(pa));
        }
        if !self.contains(pa) {
            return Err(PageIndexError::OutOfRange(pa));
        }
        let offset = (pa.as_u64() - self.start().as_u64()) >> Size4K::SHIFT;
        usize::try_from(offset)
            .map(PageIndex::new)
            .map_err(|_| PageIndexError::OutOfRange(pa))
    }

    /// Inverse of [`index_of`](Self::index_of).
    ///
    /// # Panics
    /// If `index` does not belong to this range.
    #[must_use]
    pub fn page_of(&self, index: PageIndex) -> PhysicalPage<Size4K> {
        assert!(index.0 < self.page_count, "{index:?} outside managed range");
        let Some(page) = self.start.checked_add_pages(index.0 as u64) else {
            unreachable!("managed range end overflows");
        };
        page
    }

    /// Like [`page_of`](Self::page_of), as a plain address.
    #[inline]
    #[must_use]
    pub fn address_of(&self, index: PageIndex) -> PhysicalAddress {
        self.page_of(index).base()
    }

    /// All indices of the range in ascending address order.
    #[must_use]
    pub fn indices(&self) -> Indices {
        Indices {
            next: 0,
            end: self.page_count,
        }
    }
}

/// Iterator over the [`PageIndex`] values of a [`ManagedRange`].
#[derive(Debug, Clone)]
pub struct Indices {
    next: usize,
    end: usize,
}

impl Iterator for Indices {
    type Item = PageIndex;

    fn next(&mut self) -> Option<PageIndex> {
        if self.next == self.end {
            return None;
        }
        let index = PageIndex::new(self.next);
        self.next += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Indices {}
impl FusedIterator for Indices {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn range() -> ManagedRange {
        ManagedRange::new(PhysicalAddress::new(0x8000), PhysicalAddress::new(0x10000))
    }

    #[test]
    fn rounds_start_up_and_truncates_partial_tail() {
        let r = ManagedRange::new(PhysicalAddress::new(0x8010), PhysicalAddress::new(0x10ff0));
        assert_eq!(r.start().as_u64(), 0x9000);
        assert_eq!(r.page_count(), 7);
        assert_eq!(r.end().as_u64(), 0x10000);
    }

    #[test]
    fn inverted_interval_is_empty() {
        let r = ManagedRange::new(PhysicalAddress::new(0x20000), PhysicalAddress::new(0x10000));
        assert!(r.is_empty());
        assert_eq!(r.indices().count(), 0);
        assert_eq!(
            r.index_of(PhysicalAddress::new(0x20000)),
            Err(PageIndexError::OutOfRange(PhysicalAddress::new(0x20000)))
        );
    }

    #[test]
    fn kernel_end_range_stops_at_phys_stop() {
        let r = ManagedRange::from_kernel_end(PhysicalAddress::new(PHYS_STOP - 3 * 4096 - 5));
        assert_eq!(r.start().as_u64(), PHYS_STOP - 3 * 4096);
        assert_eq!(r.page_count(), 3);
        assert_eq!(r.end().as_u64(), PHYS_STOP);
    }

    #[test]
    fn kernel_end_below_load_address_is_clamped() {
        let r = ManagedRange::from_kernel_end(PhysicalAddress::new(0x1000));
        assert_eq!(r.start().as_u64(), PHYS_LOAD);
        assert_eq!(r.len_bytes(), PHYS_STOP - PHYS_LOAD);
        assert_eq!(r.page_count() as u64, (PHYS_STOP - PHYS_LOAD) / PAGE_SIZE);
    }

    #[test]
    fn index_of_rejects_unaligned_and_out_of_range() {
        let r = range();
        assert_eq!(
            r.index_of(PhysicalAddress::new(0x8001)),
            Err(PageIndexError::Unaligned(PhysicalAddress::new(0x8001)))
        );
        assert_eq!(
            r.index_of(PhysicalAddress::new(0x7000)),
            Err(PageIndexError::OutOfRange(PhysicalAddress::new(0x7000)))
        );
        assert_eq!(
            r.index_of(PhysicalAddress::new(0x10000)),
            Err(PageIndexError::OutOfRange(PhysicalAddress::new(0x10000)))
        );
    }

    #[test]
    fn index_of_is_injective_and_inverted_by_address_of() {
        let r = range();
        let mut seen = HashSet::new();
        for index in r.indices() {
            let pa = r.address_of(index);
            assert!(pa.is_aligned::<Size4K>());
            assert_eq!(r.index_of(pa), Ok(index));
            assert!(seen.insert(index));
        }
        assert_eq!(seen.len(), r.page_count());
    }

    #[test]
    #[should_panic(expected = "outside managed range")]
    fn page_of_panics_for_foreign_index() {
        let _ = range().page_of(PageIndex::new(8));
    }
}
