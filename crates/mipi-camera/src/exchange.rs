//! Lock-free frame handoff between the CSI interrupt and the poll loop
//!
//! Slot ownership lives in one packed atomic: the slot the receiver is
//! writing, the last completed slot waiting to be claimed, and the slot the
//! consumer holds. Both sides move it with a single read-modify-write, so a
//! claim can never observe a half-applied completion and the receiver is
//! never handed the slot the consumer is reading. There is no queue: a
//! completion that lands before the previous one was claimed drops the
//! earlier frame.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use camera_hal::{CsiEventHandler, CsiTransaction};

use crate::params::BUFFER_COUNT;

const _: () = assert!(BUFFER_COUNT == 2);

/// No slot
const NONE: u8 = 0b11;

/// Unpacked slot ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slots {
    /// Preferred slot for the next request
    next: u8,
    writing: u8,
    ready: u8,
    held: u8,
}

impl Slots {
    const IDLE: Slots = Slots {
        next: 0,
        writing: NONE,
        ready: NONE,
        held: NONE,
    };

    fn pack(self) -> u8 {
        self.next | self.writing << 1 | self.ready << 3 | self.held << 5
    }

    fn unpack(bits: u8) -> Self {
        Self {
            next: bits & 1,
            writing: (bits >> 1) & NONE,
            ready: (bits >> 3) & NONE,
            held: (bits >> 5) & NONE,
        }
    }

    /// Slot the receiver gets on its next request. When the consumer holds
    /// the preferred slot the receiver refills the other one, overwriting an
    /// unclaimed frame there.
    fn target(self) -> u8 {
        if self.next == self.held {
            self.next ^ 1
        } else {
            self.next
        }
    }
}

/// SPSC double-buffer exchange, registered as the CSI event handler
pub struct FrameExchange {
    /// DMA targets, published once before the receiver starts
    buffers: [AtomicPtr<u8>; BUFFER_COUNT],
    buffer_len: AtomicUsize,
    /// Packed [`Slots`]
    slots: AtomicU8,
    /// Completed transfers in the current telemetry window
    frames: AtomicU32,
    /// Completions that reported zero bytes
    dropped: AtomicU32,
}

impl Default for FrameExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExchange {
    pub fn new() -> Self {
        Self {
            buffers: [
                AtomicPtr::new(ptr::null_mut()),
                AtomicPtr::new(ptr::null_mut()),
            ],
            buffer_len: AtomicUsize::new(0),
            slots: AtomicU8::new(Slots::IDLE.pack()),
            frames: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Publish the DMA targets. Must happen before the receiver is started.
    pub fn install_buffers(&self, buffers: [*mut u8; BUFFER_COUNT], len: usize) {
        for (slot, buffer) in self.buffers.iter().zip(buffers) {
            slot.store(buffer, Ordering::Release);
        }
        self.buffer_len.store(len, Ordering::Release);
        self.slots.store(Slots::IDLE.pack(), Ordering::Release);
    }

    fn load(&self) -> Slots {
        Slots::unpack(self.slots.load(Ordering::Acquire))
    }

    /// Apply `f` atomically, returning the state it was applied to
    fn update(&self, mut f: impl FnMut(Slots) -> Option<Slots>) -> Option<Slots> {
        self.slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                f(Slots::unpack(bits)).map(Slots::pack)
            })
            .ok()
            .map(Slots::unpack)
    }

    /// Slot the receiver is writing, or will be handed on its next request
    pub fn write_index(&self) -> usize {
        let slots = self.load();
        if slots.writing != NONE {
            slots.writing as usize
        } else {
            slots.target() as usize
        }
    }

    pub fn is_frame_ready(&self) -> bool {
        self.load().ready != NONE
    }

    /// Claim the pending frame. The returned slot stays with the consumer,
    /// untouched by the receiver, until the next successful claim.
    pub fn take_frame(&self) -> Option<usize> {
        self.update(|slots| {
            (slots.ready != NONE).then_some(Slots {
                held: slots.ready,
                ready: NONE,
                ..slots
            })
        })
        .map(|prev| prev.ready as usize)
    }

    pub fn frames_received(&self) -> u32 {
        self.frames.load(Ordering::Acquire)
    }

    /// Read and zero the frame counter
    pub fn take_frames_received(&self) -> u32 {
        self.frames.swap(0, Ordering::AcqRel)
    }

    pub fn dropped_transfers(&self) -> u32 {
        self.dropped.load(Ordering::Acquire)
    }

    pub fn reset_counters(&self) {
        self.frames.store(0, Ordering::Release);
        self.dropped.store(0, Ordering::Release);
    }
}

impl CsiEventHandler for FrameExchange {
    fn on_get_new_trans(&self, trans: &mut CsiTransaction) -> bool {
        let mut index = 0;
        self.update(|slots| {
            let target = slots.target();
            index = target as usize;
            Some(Slots {
                writing: target,
                ready: if slots.ready == target { NONE } else { slots.ready },
                ..slots
            })
        });
        trans.buffer = self.buffers[index].load(Ordering::Acquire);
        trans.buflen = self.buffer_len.load(Ordering::Acquire);
        false
    }

    fn on_trans_finished(&self, trans: &CsiTransaction) -> bool {
        if trans.received_size == 0 {
            self.update(|slots| Some(Slots { writing: NONE, ..slots }));
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.update(|slots| {
            let completed = if slots.writing != NONE {
                slots.writing
            } else {
                slots.target()
            };
            Some(Slots {
                next: completed ^ 1,
                writing: NONE,
                ready: completed,
                held: slots.held,
            })
        });
        false
    }
}
