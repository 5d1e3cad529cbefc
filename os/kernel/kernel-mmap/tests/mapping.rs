use kernel_alloc::{ALLOC_FILL, FrameAlloc, ManagedRange, OffsetPhysMapper, PageAllocError, PageAllocator};
use kernel_info::memory::{MAX_MAP_INFO, MMAP_BASE, MMAP_END};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_mmap::{
    FAILED, MAP_ANONYMOUS, MAP_FIXED, MAP_SHARED, MapError, MapFlags, MappingTable, SUCCESS, into_syscall_ret,
};
use std::alloc::{Layout, alloc_zeroed, dealloc};

const PHYS_BASE: u64 = 0x80_0000;
const PAGE: u64 = 4096;

/// Heap-backed page allocator; the allocator is dropped before its memory.
struct Pool {
    pages: PageAllocator<OffsetPhysMapper>,
    ptr: *mut u8,
    layout: Layout,
}

impl Pool {
    fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PAGE as usize, PAGE as usize).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        let range = ManagedRange::new(
            PhysicalAddress::new(PHYS_BASE),
            PhysicalAddress::new(PHYS_BASE + pages as u64 * PAGE),
        );
        let mapper = OffsetPhysMapper::for_buffer(ptr, range.start());
        Self {
            pages: unsafe { PageAllocator::new(mapper, range) },
            ptr,
            layout,
        }
    }

    fn first_byte(&self, pa: PhysicalAddress) -> u8 {
        unsafe { *self.ptr.add((pa.as_u64() - PHYS_BASE) as usize) }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}

fn flags(raw: u32) -> MapFlags {
    MapFlags::from_raw(raw).unwrap()
}

fn va(addr: u64) -> VirtualAddress {
    VirtualAddress::new(addr)
}

#[test]
fn fault_backs_pages_lazily_and_once() {
    let pool = Pool::new(8);
    let mut table = MappingTable::new(&pool.pages);

    let start = table.map(va(0), 3 * PAGE, flags(MAP_ANONYMOUS)).unwrap();
    assert_eq!(start, va(MMAP_BASE));
    assert_eq!(pool.pages.stats().owned, 0);

    let p = table.fault(start + 10).unwrap();
    assert_eq!(table.fault(start + (PAGE - 1)).unwrap(), p);
    assert_eq!(pool.pages.ref_count(p.base()), Ok(1));
    assert_eq!(pool.first_byte(p.base()), ALLOC_FILL);

    table.fault(start + 2 * PAGE).unwrap();
    let info = table.info();
    assert_eq!(info.total_mmaps, 1);
    assert_eq!(info.addr[0], MMAP_BASE);
    assert_eq!(info.length[0], 3 * PAGE);
    assert_eq!(info.n_loaded_pages[0], 2);

    assert_eq!(table.fault(start + 3 * PAGE), Err(MapError::NotMapped(start + 3 * PAGE)));
}

#[test]
fn unmap_and_drop_return_pages_to_the_allocator() {
    let pool = Pool::new(8);
    {
        let mut table = MappingTable::new(&pool.pages);
        let a = table.map(va(0), 2 * PAGE, flags(MAP_ANONYMOUS)).unwrap();
        let b = table.map(va(0), 2 * PAGE, flags(MAP_ANONYMOUS)).unwrap();
        for addr in [a, a + PAGE, b, b + PAGE] {
            table.fault(addr).unwrap();
        }
        assert_eq!(pool.pages.stats().owned, 4);

        assert_eq!(into_syscall_ret(table.unmap(a)), SUCCESS);
        assert_eq!(pool.pages.stats().owned, 2);
        assert_eq!(into_syscall_ret(table.unmap(a)), FAILED);
        assert_eq!(table.len(), 1);
    }
    assert_eq!(pool.pages.stats().free, 8);
}

#[test]
fn duplicated_table_shares_pages_until_both_let_go() {
    let pool = Pool::new(8);
    let mut parent = MappingTable::new(&pool.pages);
    let shared = table_page(&mut parent, MAP_ANONYMOUS | MAP_SHARED);
    let private = table_page(&mut parent, MAP_ANONYMOUS);

    let child = parent.duplicate().unwrap();
    assert_eq!(child.info(), parent.info());
    assert_eq!(child.flags_at(va(MMAP_BASE)).map(|f| f.shared()), Some(true));
    for pa in [shared, private] {
        assert_eq!(pool.pages.ref_count(pa), Ok(2));
    }

    drop(parent);
    for pa in [shared, private] {
        assert_eq!(pool.pages.ref_count(pa), Ok(1));
    }
    drop(child);
    assert_eq!(pool.pages.stats().owned, 0);
}

fn table_page(table: &mut MappingTable<'_, PageAllocator<OffsetPhysMapper>>, raw: u32) -> PhysicalAddress {
    let start = table.map(va(0), PAGE, flags(raw)).unwrap();
    table.fault(start).unwrap().base()
}

#[test]
fn failed_duplicate_rolls_back_taken_references() {
    let pool = Pool::new(4);
    let mut parent = MappingTable::new(&pool.pages);
    let first = table_page(&mut parent, MAP_ANONYMOUS);
    let second = table_page(&mut parent, MAP_ANONYMOUS);

    // saturate the second page so sharing it fails
    for _ in 1..255 {
        pool.pages.duplicate_page(second).unwrap();
    }
    assert_eq!(
        parent.duplicate().err(),
        Some(MapError::Alloc(PageAllocError::TooManyReferences(second)))
    );
    assert_eq!(pool.pages.ref_count(first), Ok(1));
    assert_eq!(pool.pages.ref_count(second), Ok(255));

    for _ in 1..255 {
        pool.pages.release_page(second);
    }
}

#[test]
fn fault_reports_exhaustion() {
    let pool = Pool::new(1);
    let mut table = MappingTable::new(&pool.pages);
    let start = table.map(va(0), 2 * PAGE, flags(MAP_ANONYMOUS)).unwrap();
    table.fault(start).unwrap();
    assert_eq!(
        table.fault(start + PAGE),
        Err(MapError::Alloc(PageAllocError::OutOfMemory))
    );
}

#[test]
fn fixed_mappings_are_validated() {
    let pool = Pool::new(1);
    let mut table = MappingTable::new(&pool.pages);
    let fixed = flags(MAP_ANONYMOUS | MAP_FIXED);

    let at = va(MMAP_BASE + 0x10_0000);
    assert_eq!(table.map(at, 2 * PAGE, fixed), Ok(at));
    assert_eq!(table.map(at + PAGE, PAGE, fixed), Err(MapError::Overlap(at + PAGE)));
    assert_eq!(table.map(at + 1, PAGE, fixed), Err(MapError::InvalidAddress(at + 1)));
    assert_eq!(
        table.map(va(MMAP_BASE - PAGE), PAGE, fixed),
        Err(MapError::InvalidAddress(va(MMAP_BASE - PAGE)))
    );
    assert_eq!(
        table.map(va(MMAP_END - PAGE), 2 * PAGE, fixed),
        Err(MapError::InvalidAddress(va(MMAP_END - PAGE)))
    );
    assert_eq!(table.map(at + 2 * PAGE, PAGE, fixed), Ok(at + 2 * PAGE));
}

#[test]
fn rejects_bad_requests() {
    let pool = Pool::new(1);
    let mut table = MappingTable::new(&pool.pages);
    assert_eq!(table.map(va(0), PAGE, flags(MAP_SHARED)), Err(MapError::Unsupported));
    assert_eq!(table.map(va(0), 0, flags(MAP_ANONYMOUS)), Err(MapError::InvalidLength));
    assert_eq!(
        into_syscall_ret(table.map(va(0), u64::MAX, flags(MAP_ANONYMOUS))),
        FAILED
    );
    assert!(table.is_empty());

    for _ in 0..MAX_MAP_INFO {
        table.map(va(0), PAGE, flags(MAP_ANONYMOUS)).unwrap();
    }
    assert_eq!(
        table.map(va(0), PAGE, flags(MAP_ANONYMOUS)),
        Err(MapError::TooManyMappings)
    );
    assert_eq!(table.info().total_mmaps, MAX_MAP_INFO as u64);
    assert!(!table.is_empty());
}
