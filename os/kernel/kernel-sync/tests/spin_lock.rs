use kernel_sync::SpinLock;
use std::collections::HashSet;
use std::panic;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn guard_holds_the_lock_until_dropped() {
    let kmem = SpinLock::new("kmem", [0u8; 4]);
    assert_eq!(kmem.name(), "kmem");

    let mut slots = kmem.lock();
    slots[2] = 7;
    assert!(kmem.is_locked());
    assert!(format!("{kmem:?}").contains("locked: true"));
    drop(slots);

    assert!(!kmem.is_locked());
    assert_eq!(*kmem.lock(), [0, 0, 7, 0]);
    assert!(format!("{kmem:?}").contains(r#"name: "kmem""#));
}

#[test]
fn unwinding_holder_releases_the_lock() {
    let kmem = SpinLock::new("kmem", vec![3usize, 1]);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let mut free = kmem.lock();
        free.push(3);
        assert!(!free[..2].contains(&3), "double free of 3");
    }));
    assert!(res.is_err());

    // the state written before the panic is still there
    assert!(!kmem.is_locked());
    assert_eq!(*kmem.lock(), [3, 1, 3]);
}

#[test]
fn exclusive_access_skips_the_lock() {
    let mut counts = SpinLock::new("refs", vec![0u8; 3].into_boxed_slice());
    counts.get_mut()[1] = 2;
    assert!(!counts.is_locked());
    assert_eq!(counts.lock()[1], 2);

    let counts = counts.into_inner();
    assert_eq!(&*counts, &[0, 2, 0]);
}

#[test]
fn concurrent_pops_hand_out_each_entry_once() {
    const THREADS: usize = 8;
    const ENTRIES: usize = 4_096;

    let free = Arc::new(SpinLock::new("kmem", (0..ENTRIES).collect::<Vec<_>>()));
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let free = Arc::clone(&free);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut taken = Vec::new();
                loop {
                    let next = free.lock().pop();
                    match next {
                        Some(entry) => taken.push(entry),
                        None => break taken,
                    }
                    thread::yield_now();
                }
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for h in handles {
        for entry in h.join().unwrap() {
            assert!(seen.insert(entry), "entry {entry} popped twice");
        }
    }
    assert_eq!(seen.len(), ENTRIES);
    assert!(free.lock().is_empty());
}

#[test]
fn lock_over_boxed_tables_is_shareable() {
    fn shareable<S: Send + Sync>(_: &S) {}
    let tables = SpinLock::new("kmem", (vec![0u8; 8].into_boxed_slice(), 0usize));
    shareable(&tables);
}
