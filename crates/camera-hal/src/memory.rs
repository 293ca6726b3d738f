//! Capability-aware aligned heap

use std::ops::BitOr;
use std::ptr::NonNull;

/// Heap capability mask (`MALLOC_CAP_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCaps(pub u32);

impl MemoryCaps {
    pub const DMA: MemoryCaps = MemoryCaps(1 << 3);
    pub const SPIRAM: MemoryCaps = MemoryCaps(1 << 10);
    pub const INTERNAL: MemoryCaps = MemoryCaps(1 << 11);

    pub fn contains(self, other: MemoryCaps) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MemoryCaps {
    type Output = MemoryCaps;

    fn bitor(self, rhs: MemoryCaps) -> MemoryCaps {
        MemoryCaps(self.0 | rhs.0)
    }
}

/// Allocator for buffers the DMA engine can write into
pub trait DmaAllocator: Send + Sync {
    /// Returns `None` when no region with `caps` can satisfy the request
    fn alloc_aligned(&self, align: usize, size: usize, caps: MemoryCaps) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `alloc_aligned` on this allocator with the same
    /// `align` and `size`, and must not be used afterwards.
    unsafe fn free(&self, ptr: NonNull<u8>, align: usize, size: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_union() {
        let caps = MemoryCaps::SPIRAM | MemoryCaps::DMA;
        assert!(caps.contains(MemoryCaps::DMA));
        assert!(caps.contains(MemoryCaps::SPIRAM));
        assert!(!caps.contains(MemoryCaps::INTERNAL));
    }
}
