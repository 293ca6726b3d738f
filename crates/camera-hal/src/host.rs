//! std-backed implementations usable on any host

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::time::Duration;

use crate::{Delay, DmaAllocator, MemoryCaps};

/// Delay backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// Aligned, zeroed allocations from the global allocator. Capability bits
/// are accepted and ignored: all host memory is "DMA capable".
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapDmaAllocator;

impl DmaAllocator for HeapDmaAllocator {
    fn alloc_aligned(&self, align: usize, size: usize, _caps: MemoryCaps) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let layout = Layout::from_size_align(size, align).ok()?;
        // SAFETY: layout has a nonzero size
        NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, align: usize, size: usize) {
        if let Ok(layout) = Layout::from_size_align(size, align) {
            alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}
