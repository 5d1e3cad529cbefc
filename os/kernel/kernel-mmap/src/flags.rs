use bitfield_struct::bitfield;

/// Share the mapping with duplicated address spaces.
pub const MAP_SHARED: u32 = 0x0002;
/// Not backed by a file; pages start out with the allocator's fill pattern.
pub const MAP_ANONYMOUS: u32 = 0x0004;
/// Place the mapping exactly at the requested address.
pub const MAP_FIXED: u32 = 0x0008;

/// Flags word of a map request, as passed in from user space.
///
/// | Bit  | Name        |
/// |------|-------------|
/// | 0    | reserved    |
/// | 1    | `shared`    |
/// | 2    | `anonymous` |
/// | 3    | `fixed`     |
/// | 4–31 | reserved    |
///
/// ### Example
/// ```rust
/// # use kernel_mmap::{MapFlags, MAP_ANONYMOUS, MAP_FIXED};
/// let flags = MapFlags::from_raw(MAP_ANONYMOUS | MAP_FIXED).unwrap();
/// assert!(flags.anonymous() && flags.fixed() && !flags.shared());
/// assert!(MapFlags::from_raw(0x100).is_none());
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct MapFlags {
    #[bits(1)]
    __: u8,

    /// `MAP_SHARED` (bit 1).
    pub shared: bool,

    /// `MAP_ANONYMOUS` (bit 2).
    pub anonymous: bool,

    /// `MAP_FIXED` (bit 3).
    pub fixed: bool,

    #[bits(28)]
    __: u32,
}

impl MapFlags {
    const KNOWN: u32 = MAP_SHARED | MAP_ANONYMOUS | MAP_FIXED;

    /// Decode a raw flags word; `None` if any unknown bit is set.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw & !Self::KNOWN != 0 {
            return None;
        }
        Some(Self::from_bits(raw))
    }
}
