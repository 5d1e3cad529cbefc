//! Reference-counted physical page allocator.
//!
//! [`PageAllocator`] owns every 4 KiB page of a [`ManagedRange`]. Pages are
//! handed out with one owner; further owners are added with
//! [`duplicate_page`](FrameAlloc::duplicate_page) and dropped with
//! [`release_page`](FrameAlloc::release_page). A page only goes back to the
//! free list when its last owner lets go.
//!
//! ```text
//!   FREE (0, listed) ──acquire──► OWNED(1) ──duplicate──► OWNED(k+1)
//!          ▲                         │  ▲                    │
//!          └────── release (1→0) ────┘  └── release (k→k-1) ─┘
//! ```
//!
//! All state sits behind one [`SpinLock`]; every operation takes it once,
//! does a bounded amount of work and returns. Nothing is logged while the
//! lock is held.

use crate::free_list::FreeList;
use crate::page_index::{ManagedRange, PageIndex, PageIndexError};
use crate::phys_mapper::PhysMapper;
use crate::ref_count::{RefCount, RefCountTable};
use core::fmt;
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K};
use kernel_sync::SpinLock;
use log::{debug, trace, warn};

/// Byte pattern written over a page when it is handed out.
pub const ALLOC_FILL: u8 = 0x05;

/// Byte pattern written over a page when it returns to the free list.
pub const FREE_FILL: u8 = 0x01;

#[allow(clippy::cast_possible_truncation)]
const PAGE_BYTES: usize = Size4K::SIZE as usize;

/// Recoverable page allocator failures.
///
/// Invalid addresses passed to [`release_page`](FrameAlloc::release_page)
/// are not in here: they mean the caller's bookkeeping is corrupt and halt
/// the kernel instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageAllocError {
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("page {0} is not allocated")]
    NotAllocated(PhysicalAddress),
    #[error("page {0} already has the maximum number of references")]
    TooManyReferences(PhysicalAddress),
    #[error(transparent)]
    InvalidAddress(#[from] PageIndexError),
}

/// What a [`release_page`](FrameAlloc::release_page) call did to the page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Released {
    /// That was the last owner; the page is back on the free list.
    Freed,
    /// Other owners remain.
    StillShared { remaining: u8 },
}

/// Accounting snapshot taken under the allocator lock.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Pages in the managed range.
    pub total: usize,
    /// Pages on the free list.
    pub free: usize,
    /// Pages with at least one owner.
    pub owned: usize,
}

/// The interface the virtual memory layer programs against.
///
/// All methods take `&self`; implementations serialize internally.
pub trait FrameAlloc {
    /// Allocate one zero-owner page and give it its first owner.
    ///
    /// # Errors
    /// [`PageAllocError::OutOfMemory`] when no page is free. No retry is
    /// attempted.
    fn acquire_page(&self) -> Result<PhysicalPage<Size4K>, PageAllocError>;

    /// Drop one owner of the page at `pa`.
    ///
    /// # Panics
    /// If `pa` is not a page-aligned address inside the managed range, or the
    /// page is already on the free list. Either means the caller's bookkeeping
    /// is corrupt.
    fn release_page(&self, pa: PhysicalAddress) -> Released;

    /// Add an owner to the already allocated page at `pa`.
    ///
    /// # Errors
    /// [`PageAllocError::InvalidAddress`] for unaligned or foreign addresses,
    /// [`PageAllocError::NotAllocated`] if the page has no owner,
    /// [`PageAllocError::TooManyReferences`] if it already has the maximum
    /// number of owners. State is unchanged on error.
    fn duplicate_page(&self, pa: PhysicalAddress) -> Result<PhysicalPage<Size4K>, PageAllocError>;
}

/// Owner counts and free list; always locked as one unit.
struct PageState {
    refs: RefCountTable,
    free: FreeList,
}

/// Physical page allocator with per-page reference counts.
pub struct PageAllocator<M: PhysMapper> {
    mapper: M,
    range: ManagedRange,
    state: SpinLock<PageState>,
}

impl<M: PhysMapper> PageAllocator<M> {
    /// Take ownership of every page in `range` and put all of them on the
    /// free list.
    ///
    /// Seeding goes through the regular release path, one page at a time in
    /// ascending order, so the first allocation returns the highest page.
    ///
    /// The owner counts and free links live on the kernel heap, one byte and
    /// one link per page, so the global allocator must already be running.
    ///
    /// # Safety
    /// - Every page of `range` must be real, writable RAM reachable through
    ///   `mapper`, and must not be used by anything else for as long as the
    ///   allocator (or any page it hands out) is alive.
    /// - Must be called once per range; two allocators over overlapping
    ///   ranges hand out the same pages.
    pub unsafe fn new(mapper: M, range: ManagedRange) -> Self {
        let state = PageState {
            refs: RefCountTable::new(range.page_count()),
            free: FreeList::new(range.page_count()),
        };
        let allocator = Self {
            mapper,
            range,
            state: SpinLock::new("kmem", state),
        };

        for index in range.indices() {
            let _ = allocator.release_index(index);
        }

        debug!(
            "page allocator managing {} pages in [{}, {})",
            range.page_count(),
            range.start(),
            range.end()
        );
        allocator
    }

    #[inline]
    #[must_use]
    pub const fn range(&self) -> &ManagedRange {
        &self.range
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Current owner count of the page at `pa` (0 for free pages).
    ///
    /// # Errors
    /// If `pa` is unaligned or outside the managed range.
    pub fn ref_count(&self, pa: PhysicalAddress) -> Result<u8, PageIndexError> {
        let index = self.range.index_of(pa)?;
        Ok(self.state.lock().refs.get(index).get())
    }

    /// Consistent snapshot of the allocator's accounting.
    #[must_use]
    pub fn stats(&self) -> PageStats {
        let state = self.state.lock();
        PageStats {
            total: self.range.page_count(),
            free: state.free.len(),
            owned: state.refs.owned(),
        }
    }

    /// Drop one owner of `index`, and relist the page if none remain.
    ///
    /// A page that has no owners and is not listed (during seeding) is listed
    /// right away.
    fn release_index(&self, index: PageIndex) -> Released {
        let mut state = self.state.lock();
        let remaining = state.refs.release(index);
        if !remaining.is_zero() {
            return Released::StillShared {
                remaining: remaining.get(),
            };
        }

        assert!(
            !state.free.contains(index),
            "release_page: double free of {}",
            self.range.address_of(index)
        );
        self.fill(index, FREE_FILL);
        state.free.push(index);
        Released::Freed
    }

    /// Overwrite the page at `index` with `byte`.
    ///
    /// Only called with the lock held, on a page that no caller can reach:
    /// either it has just lost its last owner, or it has not been returned to
    /// its first one yet.
    fn fill(&self, index: PageIndex, byte: u8) {
        let pa = self.range.address_of(index);
        // SAFETY: `pa` is a page of the managed range, which `new`'s caller
        // guaranteed to be mapped and exclusively ours; see above for why
        // nobody else holds a reference to it right now.
        let page: &mut [u8; PAGE_BYTES] = unsafe { self.mapper.phys_to_mut(pa) };
        page.fill(byte);
    }
}

impl<M: PhysMapper> FrameAlloc for PageAllocator<M> {
    fn acquire_page(&self) -> Result<PhysicalPage<Size4K>, PageAllocError> {
        let popped = {
            let mut state = self.state.lock();
            let popped = state.free.pop();
            if let Some(index) = popped {
                state.refs.claim(index);
                self.fill(index, ALLOC_FILL);
            }
            popped
        };

        let Some(index) = popped else {
            warn!("page allocator exhausted ({} pages)", self.range.page_count());
            return Err(PageAllocError::OutOfMemory);
        };
        let page = self.range.page_of(index);
        trace!("acquired page {page}");
        Ok(page)
    }

    fn release_page(&self, pa: PhysicalAddress) -> Released {
        let index = match self.range.index_of(pa) {
            Ok(index) => index,
            Err(e) => panic!("release_page: {e}"),
        };
        let released = self.release_index(index);
        trace!("released page {pa}: {released:?}");
        released
    }

    fn duplicate_page(&self, pa: PhysicalAddress) -> Result<PhysicalPage<Size4K>, PageAllocError> {
        let index = self.range.index_of(pa)?;
        let shared = self.state.lock().refs.share(index);
        match shared {
            Ok(count) => {
                trace!("duplicated page {pa}, {} owners", count.get());
                Ok(self.range.page_of(index))
            }
            Err(RefCount::ZERO) => {
                debug!("cannot duplicate page {pa}: not allocated");
                Err(PageAllocError::NotAllocated(pa))
            }
            Err(_) => {
                debug!("cannot duplicate page {pa}: reference limit reached");
                Err(PageAllocError::TooManyReferences(pa))
            }
        }
    }
}

impl<M: PhysMapper> fmt::Debug for PageAllocator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAllocator")
            .field("range", &self.range)
            .field("lock", &self.state)
            .finish_non_exhaustive()
    }
}
