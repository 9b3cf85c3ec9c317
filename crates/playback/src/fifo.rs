//! Bounded byte FIFO backed by external SPI RAM.
//!
//! The stream task enqueues compressed audio as it arrives from the
//! network; the decode task dequeues it at playback rate. The backing
//! store is a [`BlockRam`], so every transfer goes over the SPI bus in
//! chunks of at most [`MAX_TRANSFER`] bytes and the index state lives
//! under an async mutex.
//!
//! # Concurrency
//!
//! Single producer, single consumer, from different Embassy tasks. Each
//! side parks on its own `Signal` (`space` for the producer, `data` for
//! the consumer); a `Signal` holds exactly one waker, which is all this
//! topology needs. Wakeups are advisory; both sides re-check the fill
//! level under the mutex after waking, so a spurious or stale signal
//! costs one loop iteration and nothing else.
//!
//! # Blocking semantics
//!
//! [`Fifo::enqueue`] returns once *all* bytes are stored, waiting for
//! space as needed; [`Fifo::dequeue`] returns once the output slice is
//! *full*. Partial progress is made as soon as any space/data exists;
//! neither side waits for room for its entire request at once.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use platform::spiram::{BlockRam, MAX_TRANSFER};

struct Inner<R> {
    ram: R,
    /// Byte address of the next write.
    write_pos: u32,
    /// Byte address of the next read.
    read_pos: u32,
    /// Bytes currently stored.
    fill: usize,
}

/// SPSC byte FIFO over external RAM.
pub struct Fifo<R: BlockRam> {
    inner: Mutex<CriticalSectionRawMutex, Inner<R>>,
    /// Signalled by the consumer after freeing space.
    space: Signal<CriticalSectionRawMutex, ()>,
    /// Signalled by the producer after storing data.
    data: Signal<CriticalSectionRawMutex, ()>,
    capacity: usize,
}

impl<R: BlockRam> Fifo<R> {
    /// Wrap a RAM device as an empty FIFO.
    ///
    /// The device is expected to have passed [`platform::spiram::self_test`]
    /// at boot; a FIFO over a dead link makes no forward progress.
    pub fn new(ram: R) -> Self {
        let capacity = ram.capacity();
        Self {
            inner: Mutex::new(Inner {
                ram,
                write_pos: 0,
                read_pos: 0,
                fill: 0,
            }),
            space: Signal::new(),
            data: Signal::new(),
            capacity,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently stored. Advisory: the value may be stale by the
    /// time the caller looks at it.
    pub async fn fill(&self) -> usize {
        self.inner.lock().await.fill
    }

    /// Bytes of free space. Advisory, like [`Fifo::fill`].
    pub async fn free(&self) -> usize {
        let fill = self.inner.lock().await.fill;
        self.capacity.saturating_sub(fill)
    }

    /// Store `data` in arrival order, waiting for space as needed.
    ///
    /// Returns when every byte is in the FIFO.
    pub async fn enqueue(&self, data: &[u8]) {
        let mut remaining = data;
        while !remaining.is_empty() {
            let stored = {
                let mut inner = self.inner.lock().await;
                let free = self.capacity.saturating_sub(inner.fill);
                // Clamp to the run that neither wraps the ring nor
                // exceeds one bus transfer.
                let run = self.capacity.saturating_sub(inner.write_pos as usize);
                let n = remaining.len().min(free).min(run).min(MAX_TRANSFER);
                if n == 0 {
                    0
                } else {
                    #[allow(clippy::indexing_slicing)] // n <= remaining.len()
                    let moved = inner_write(&mut inner, &remaining[..n]).await;
                    moved
                }
            };
            if stored == 0 {
                // Full (or a bus glitch): park until the consumer frees
                // space, then re-check. Signal::wait clears the token.
                self.space.wait().await;
                continue;
            }
            #[allow(clippy::indexing_slicing)] // stored <= remaining.len()
            {
                remaining = &remaining[stored..];
            }
            self.data.signal(());
        }
    }

    /// Fill `buf` in FIFO order, waiting for data as needed.
    ///
    /// Returns when the slice is completely full.
    pub async fn dequeue(&self, buf: &mut [u8]) {
        let mut filled = 0usize;
        while filled < buf.len() {
            let taken = {
                let mut inner = self.inner.lock().await;
                let run = self.capacity.saturating_sub(inner.read_pos as usize);
                let want = buf.len().saturating_sub(filled);
                let n = want.min(inner.fill).min(run).min(MAX_TRANSFER);
                if n == 0 {
                    0
                } else {
                    #[allow(clippy::indexing_slicing)] // filled + n <= buf.len()
                    let moved = inner_read(&mut inner, &mut buf[filled..filled.saturating_add(n)])
                        .await;
                    moved
                }
            };
            if taken == 0 {
                // Empty: park until the producer stores data.
                self.data.wait().await;
                continue;
            }
            filled = filled.saturating_add(taken);
            self.space.signal(());
        }
    }

    /// Discard all buffered bytes.
    ///
    /// Used on station change: stale audio must not play after a new
    /// stream is selected. Only the producer is woken (the consumer has
    /// nothing new to read).
    pub async fn clear(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.write_pos = 0;
            inner.read_pos = 0;
            inner.fill = 0;
        }
        self.space.signal(());
    }
}

/// Write a clamped run at `write_pos`, advancing indexes by the bytes the
/// bus actually moved.
async fn inner_write<R: BlockRam>(inner: &mut Inner<R>, data: &[u8]) -> usize {
    let moved = inner.ram.write(inner.write_pos, data).await;
    let capacity = inner.ram.capacity();
    #[allow(clippy::cast_possible_truncation)] // RAM capacity < 4 GiB
    {
        inner.write_pos = ((inner.write_pos as usize).saturating_add(moved) % capacity) as u32;
    }
    inner.fill = inner.fill.saturating_add(moved);
    moved
}

/// Read a clamped run at `read_pos`, advancing indexes by the bytes the
/// bus actually moved.
async fn inner_read<R: BlockRam>(inner: &mut Inner<R>, buf: &mut [u8]) -> usize {
    let moved = inner.ram.read(inner.read_pos, buf).await;
    let capacity = inner.ram.capacity();
    #[allow(clippy::cast_possible_truncation)] // RAM capacity < 4 GiB
    {
        inner.read_pos = ((inner.read_pos as usize).saturating_add(moved) % capacity) as u32;
    }
    inner.fill = inner.fill.saturating_sub(moved);
    moved
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use embassy_futures::join::join;
    use platform::mocks::MockRam;

    #[tokio::test]
    async fn test_round_trip_preserves_order() {
        let fifo = Fifo::new(MockRam::<256>::new());
        let data: Vec<u8> = (0..100u8).collect();
        fifo.enqueue(&data).await;
        assert_eq!(fifo.fill().await, 100);

        let mut out = [0u8; 100];
        fifo.dequeue(&mut out).await;
        assert_eq!(&out[..], &data[..]);
        assert_eq!(fifo.fill().await, 0);
    }

    #[tokio::test]
    async fn test_transfers_split_at_ring_boundary() {
        let fifo = Fifo::new(MockRam::<128>::new());
        // Move the indexes near the end of the ring.
        fifo.enqueue(&[0u8; 100]).await;
        let mut sink = [0u8; 100];
        fifo.dequeue(&mut sink).await;

        // This enqueue wraps: 28 bytes fit before the boundary.
        let data: Vec<u8> = (0..60u8).collect();
        fifo.enqueue(&data).await;
        let mut out = [0u8; 60];
        fifo.dequeue(&mut out).await;
        assert_eq!(&out[..], &data[..]);
    }

    #[tokio::test]
    async fn test_enqueue_blocks_until_consumer_frees_space() {
        // 300 bytes through a 128-byte FIFO: the producer must park at
        // least once and resume when the consumer drains.
        let fifo = Fifo::new(MockRam::<128>::new());
        let data: Vec<u8> = (0..300u16).map(|x| (x % 251) as u8).collect();

        let mut out = vec![0u8; 300];
        join(fifo.enqueue(&data), fifo.dequeue(&mut out)).await;
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_short_bus_transfers_still_complete() {
        // The bus moves at most 7 bytes per call; the FIFO loops must
        // accumulate without losing or duplicating bytes.
        let fifo = Fifo::new(MockRam::<128>::with_transfer_limit(7));
        let data: Vec<u8> = (0..200u8).collect();
        let mut out = vec![0u8; 200];
        join(fifo.enqueue(&data), fifo.dequeue(&mut out)).await;
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_clear_discards_buffered_bytes() {
        let fifo = Fifo::new(MockRam::<256>::new());
        fifo.enqueue(&[1, 2, 3, 4]).await;
        fifo.clear().await;
        assert_eq!(fifo.fill().await, 0);

        // New data after clear comes out first.
        fifo.enqueue(&[9, 8, 7]).await;
        let mut out = [0u8; 3];
        fifo.dequeue(&mut out).await;
        assert_eq!(out, [9, 8, 7]);
    }

    #[tokio::test]
    async fn test_capacity_reports_backing_ram() {
        let fifo = Fifo::new(MockRam::<1024>::new());
        assert_eq!(fifo.capacity(), 1024);
        assert_eq!(fifo.free().await, 1024);

        // fill + free stays conserved while data is buffered.
        fifo.enqueue(&[0u8; 100]).await;
        assert_eq!(fifo.fill().await + fifo.free().await, fifo.capacity());
    }
}
