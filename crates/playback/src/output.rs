//! DMA slot ring bookkeeping and underrun accounting.
//!
//! The I2S peripheral plays from a small set of fixed PCM slot buffers.
//! This module tracks which slots are free: the decode task acquires a
//! free slot index, fills the buffer, and hands it to the DMA queue; the
//! transfer-complete interrupt releases the index back here.
//!
//! The buffers themselves are `static`s owned by the firmware crate; only
//! indexes move through this structure, so it stays target-independent and
//! host-testable.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Free-slot queue plus underrun counter for an `N`-slot DMA ring.
pub struct OutputRing<const N: usize> {
    free: Channel<CriticalSectionRawMutex, u8, N>,
    underruns: AtomicU32,
}

impl<const N: usize> OutputRing<N> {
    /// Create an empty ring. Call [`OutputRing::seed`] once at boot to
    /// mark every slot free.
    pub const fn new() -> Self {
        Self {
            free: Channel::new(),
            underruns: AtomicU32::new(0),
        }
    }

    /// Mark slots `0..N` free. Boot-time only, before any task runs.
    pub fn seed(&self) {
        for slot in 0..N {
            #[allow(clippy::cast_possible_truncation)] // slot rings are tiny
            let _ = self.free.try_send(slot as u8);
        }
    }

    /// Wait for a free slot to fill.
    pub async fn acquire(&self) -> u8 {
        self.free.receive().await
    }

    /// Release a slot from the DMA transfer-complete interrupt.
    ///
    /// Never blocks. If every slot is already free the decode task has
    /// starved the ring (the DMA replayed a stale buffer), so the oldest
    /// entry is dropped to make room and the underrun counter bumped.
    pub fn release_from_isr(&self, slot: u8) {
        if self.free.try_send(slot).is_err() {
            let _ = self.free.try_receive();
            let _ = self.free.try_send(slot);
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a starvation event seen directly by the output path (no
    /// filled buffer ready when the DMA needed one).
    pub fn note_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset the underrun counter.
    ///
    /// Read and reset are two separate atomic operations, so an underrun
    /// landing between them is absorbed by the reset and goes unreported.
    /// The consumer polls once a second for a status line; losing at most
    /// one count per poll window is acceptable there.
    pub fn underruns_get_and_reset(&self) -> u32 {
        let count = self.underruns.load(Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
        count
    }
}

impl<const N: usize> Default for OutputRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
