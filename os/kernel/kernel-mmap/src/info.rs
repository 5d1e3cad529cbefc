use crate::MapError;
use kernel_info::memory::MAX_MAP_INFO;
use kernel_memory_addresses::VirtualAddress;
use log::debug;

/// Returned by a mapping call that has nothing else to report.
pub const SUCCESS: i64 = 0;
/// Returned by any failed mapping call.
pub const FAILED: i64 = -1;

/// Snapshot of an address space's mappings, laid out for copying to user
/// space. Only the first `total_mmaps` entries of each array are meaningful.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MapInfo {
    /// Number of mappings.
    pub total_mmaps: u64,
    /// Start address of each mapping.
    pub addr: [u64; MAX_MAP_INFO],
    /// Length of each mapping in bytes.
    pub length: [u64; MAX_MAP_INFO],
    /// Pages of each mapping currently backed by physical memory.
    pub n_loaded_pages: [u64; MAX_MAP_INFO],
}

/// Success value of a mapping call as seen by user space.
pub trait SyscallValue {
    fn into_ret(self) -> i64;
}

impl SyscallValue for () {
    fn into_ret(self) -> i64 {
        SUCCESS
    }
}

impl SyscallValue for VirtualAddress {
    #[allow(clippy::cast_possible_wrap)]
    fn into_ret(self) -> i64 {
        self.as_u64() as i64
    }
}

/// Collapse a mapping result into the user-visible return value.
pub fn into_syscall_ret<T: SyscallValue>(result: Result<T, MapError>) -> i64 {
    match result {
        Ok(value) => value.into_ret(),
        Err(e) => {
            debug!("mapping call failed: {e}");
            FAILED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_collapse_to_failed() {
        assert_eq!(into_syscall_ret::<()>(Err(MapError::InvalidLength)), FAILED);
        assert_eq!(into_syscall_ret(Ok(())), SUCCESS);
        assert_eq!(
            into_syscall_ret(Ok(VirtualAddress::new(0x6000_0000))),
            0x6000_0000
        );
    }

    #[test]
    fn descriptor_has_c_layout_size() {
        assert_eq!(core::mem::size_of::<MapInfo>(), 8 + 3 * 8 * MAX_MAP_INFO);
    }
}
