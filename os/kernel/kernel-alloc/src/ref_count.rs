//! # Reference-count table
//!
//! One owner count per managed page. A count of zero means the page has no
//! owners: it is either on the free list or was never handed to the pool.

use crate::page_index::PageIndex;
use alloc::boxed::Box;
use alloc::vec;
use kernel_info::memory::MAX_PAGE_REFERENCES;

/// Number of owners of a physical page, `0..=RefCount::MAX`.
///
/// Increments are checked; reaching past [`RefCount::MAX`] is reported, never
/// wrapped or saturated.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RefCount(u8);

impl RefCount {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);
    pub const MAX: Self = Self(MAX_PAGE_REFERENCES);

    #[inline]
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// One more owner, or `None` at [`RefCount::MAX`].
    #[inline]
    #[must_use]
    pub const fn checked_increment(self) -> Option<Self> {
        if self.0 >= Self::MAX.0 {
            None
        } else {
            Some(Self(self.0 + 1))
        }
    }

    /// One owner less; stays at zero.
    #[inline]
    #[must_use]
    pub const fn decrement(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

/// Dense per-page array of [`RefCount`]s.
///
/// Also tracks how many pages currently have at least one owner so
/// accounting snapshots do not need to scan the table.
pub(crate) struct RefCountTable {
    counts: Box<[RefCount]>,
    owned: usize,
}

impl RefCountTable {
    /// A table of `page_count` entries, all zero.
    pub(crate) fn new(page_count: usize) -> Self {
        Self {
            counts: vec![RefCount::ZERO; page_count].into_boxed_slice(),
            owned: 0,
        }
    }

    #[inline]
    pub(crate) fn get(&self, index: PageIndex) -> RefCount {
        self.counts[index.as_usize()]
    }

    /// Number of pages with a nonzero count.
    #[inline]
    pub(crate) const fn owned(&self) -> usize {
        self.owned
    }

    /// Give an unowned page its first owner.
    pub(crate) fn claim(&mut self, index: PageIndex) {
        let count = &mut self.counts[index.as_usize()];
        debug_assert!(count.is_zero(), "claiming owned page {index:?}");
        *count = RefCount::ONE;
        self.owned += 1;
    }

    /// Add an owner to an owned page.
    ///
    /// Returns `Err` with the unchanged count if the page has no owner yet
    /// or is already at [`RefCount::MAX`].
    pub(crate) fn share(&mut self, index: PageIndex) -> Result<RefCount, RefCount> {
        let count = &mut self.counts[index.as_usize()];
        if count.is_zero() {
            return Err(*count);
        }
        let next = count.checked_increment().ok_or(*count)?;
        *count = next;
        Ok(next)
    }

    /// Drop one owner and return the remaining count.
    ///
    /// A count that is already zero stays zero.
    pub(crate) fn release(&mut self, index: PageIndex) -> RefCount {
        let count = &mut self.counts[index.as_usize()];
        if count.is_zero() {
            return RefCount::ZERO;
        }
        *count = count.decrement();
        if count.is_zero() {
            self.owned -= 1;
        }
        *count
    }
}
