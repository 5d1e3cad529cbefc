//! # Kernel synchronization primitives
//!
//! The kernel's memory subsystems serialize through a single kind of lock:
//! a busy-waiting [`SpinLock`]. Holders never block, so everything done under
//! the lock must be short and bounded.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
