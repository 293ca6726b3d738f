//! DMA-capable frame buffers

use std::ptr::NonNull;
use std::sync::Arc;

use camera_hal::{DmaAllocator, EspErr, HalError};
use tracing::{debug, error};

use crate::params::{BufferParams, BUFFER_COUNT};

/// Two equally sized, aligned buffers owned for the device lifetime
pub struct FrameBufferPool {
    allocator: Arc<dyn DmaAllocator>,
    buffers: [NonNull<u8>; BUFFER_COUNT],
    size: usize,
    alignment: usize,
}

// SAFETY: the pool owns the allocations; the only other access is DMA
// writes into the slot the frame exchange hands to the receiver.
unsafe impl Send for FrameBufferPool {}
unsafe impl Sync for FrameBufferPool {}

impl FrameBufferPool {
    /// Allocate both buffers or none
    pub fn allocate(
        allocator: Arc<dyn DmaAllocator>,
        size: usize,
        params: &BufferParams,
    ) -> Result<Self, HalError> {
        let first = Self::alloc_one(allocator.as_ref(), size, params, 0)?;
        let second = match Self::alloc_one(allocator.as_ref(), size, params, 1) {
            Ok(ptr) => ptr,
            Err(e) => {
                // SAFETY: `first` was just returned by this allocator with these arguments
                unsafe { allocator.free(first, params.alignment, size) };
                return Err(e);
            }
        };

        debug!(
            "Allocated {} frame buffers of {} bytes at {:p} / {:p}",
            BUFFER_COUNT, size, first, second
        );
        Ok(Self {
            allocator,
            buffers: [first, second],
            size,
            alignment: params.alignment,
        })
    }

    fn alloc_one(
        allocator: &dyn DmaAllocator,
        size: usize,
        params: &BufferParams,
        index: usize,
    ) -> Result<NonNull<u8>, HalError> {
        allocator
            .alloc_aligned(params.alignment, size, params.caps)
            .ok_or_else(|| {
                error!("Frame buffer {} allocation failed ({} bytes)", index, size);
                HalError::new("heap_caps_aligned_alloc", EspErr::NoMem)
            })
    }

    /// Bytes per buffer
    pub fn buffer_size(&self) -> usize {
        self.size
    }

    pub fn as_ptrs(&self) -> [*mut u8; BUFFER_COUNT] {
        self.buffers.map(NonNull::as_ptr)
    }

    /// Contents of slot `index`.
    ///
    /// The caller must only read the slot the receiver is not writing into.
    pub fn slot(&self, index: usize) -> Option<&[u8]> {
        let ptr = self.buffers.get(index)?;
        // SAFETY: `ptr` points at `size` initialized bytes owned by this pool
        Some(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.size) })
    }
}

impl Drop for FrameBufferPool {
    fn drop(&mut self) {
        for ptr in self.buffers {
            // SAFETY: each buffer came from `self.allocator` with these arguments
            unsafe { self.allocator.free(ptr, self.alignment, self.size) };
        }
    }
}
