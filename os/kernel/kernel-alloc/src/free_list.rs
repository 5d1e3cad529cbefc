//! # Free list
//!
//! Pages without an owner wait here until the next allocation. The list is
//! threaded through a per-page link table rather than through the pages, so
//! a free page's bytes are only ever the release fill pattern.

use crate::page_index::PageIndex;
use alloc::boxed::Box;
use alloc::vec;

/// Link slot kept for every managed page.
///
/// A page is either **detached** (owned, or never handed to the pool) or
/// **linked** into the free list, in which case the slot stores the index
/// of the next free page:
///
/// ```text
/// head ──► [7] ──► [2] ──► [5] ──► None
///          Linked  Linked  Linked
/// ```
///
/// The link lives in a side table instead of in the free page itself, so the
/// contents of a free page are never reinterpreted.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum FreeLink {
    Detached,
    Linked { next: Option<PageIndex> },
}

/// LIFO list of free pages threaded through a dense link table.
///
/// # Invariants
/// - Every index reachable from `head` is `Linked`, and every `Linked` slot
///   is reachable from `head` exactly once.
/// - `len` equals the number of `Linked` slots.
pub(crate) struct FreeList {
    head: Option<PageIndex>,
    links: Box<[FreeLink]>,
    len: usize,
}

impl FreeList {
    /// An empty list able to hold `page_count` pages.
    pub(crate) fn new(page_count: usize) -> Self {
        Self {
            head: None,
            links: vec![FreeLink::Detached; page_count].into_boxed_slice(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Whether `index` is currently linked into the list.
    #[inline]
    pub(crate) fn contains(&self, index: PageIndex) -> bool {
        matches!(self.links[index.as_usize()], FreeLink::Linked { .. })
    }

    /// Link `index` in as the new head.
    ///
    /// The caller must have checked that the page is not already linked;
    /// pushing it twice would turn the list into a cycle.
    pub(crate) fn push(&mut self, index: PageIndex) {
        let slot = &mut self.links[index.as_usize()];
        debug_assert_eq!(*slot, FreeLink::Detached, "{index:?} already on the free list");
        *slot = FreeLink::Linked { next: self.head };
        self.head = Some(index);
        self.len += 1;
    }

    /// Unlink and return the head, if any.
    pub(crate) fn pop(&mut self) -> Option<PageIndex> {
        let index = self.head?;
        let slot = &mut self.links[index.as_usize()];
        let FreeLink::Linked { next } = *slot else {
            unreachable!("free list head {index:?} is not linked");
        };
        *slot = FreeLink::Detached;
        self.head = next;
        self.len -= 1;
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_pages_in_lifo_order() {
        let mut l = FreeList::new(8);
        assert_eq!(l.len(), 0);
        assert_eq!(l.pop(), None);

        for i in [7, 2, 5] {
            l.push(PageIndex::new(i));
        }
        assert_eq!(l.len(), 3);
        assert!(l.contains(PageIndex::new(2)));
        assert!(!l.contains(PageIndex::new(3)));

        assert_eq!(l.pop(), Some(PageIndex::new(5)));
        assert_eq!(l.pop(), Some(PageIndex::new(2)));
        assert_eq!(l.pop(), Some(PageIndex::new(7)));
        assert_eq!(l.pop(), None);
        assert_eq!(l.len(), 0);
    }

    #[test]
    fn popped_pages_can_be_pushed_again() {
        let mut l = FreeList::new(2);
        l.push(PageIndex::new(0));
        let p = l.pop().unwrap();
        assert!(!l.contains(p));
        l.push(p);
        assert!(l.contains(p));
        assert_eq!(l.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already on the free list")]
    #[cfg(debug_assertions)]
    fn double_push_is_caught_in_debug_builds() {
        let mut l = FreeList::new(2);
        l.push(PageIndex::new(1));
        l.push(PageIndex::new(1));
    }
}
