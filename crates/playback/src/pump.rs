//! Decode pump: moves bytes from the FIFO through the decoder to the
//! output stage.
//!
//! The decoder wants a contiguous window that always holds at least one
//! complete frame, but the FIFO hands out bytes in arbitrary runs. The
//! pump owns a sliding chunk buffer: consumed bytes are dropped off the
//! front (`copy_within` to index 0) and the tail is topped up from the
//! FIFO before every decode call, so the decoder never sees a torn frame.

use platform::spiram::BlockRam;

use crate::control::StopToken;
use crate::decoder::{FrameDecoder, PcmFrame};
use crate::fifo::Fifo;

/// Decode window size in bytes.
///
/// Must hold the largest possible compressed frame plus the next sync
/// word; 2106 covers 320 kbps MP3 with padding.
pub const CHUNK_SIZE: usize = 2106;

/// Where decoded frames go. Implemented by the DMA feed in firmware and
/// by recording sinks in tests.
pub trait PcmSink {
    /// Accept one decoded frame. Backpressure lives here: the call parks
    /// until a DMA slot is free.
    async fn commit(&mut self, frame: &PcmFrame);
}

/// FIFO-to-sink decode loop.
pub struct DecodePump<D: FrameDecoder> {
    decoder: D,
    chunk: [u8; CHUNK_SIZE],
    /// Valid bytes in `chunk`.
    filled: usize,
    /// Consumed prefix of `chunk`.
    pos: usize,
    frame: PcmFrame,
    bad_frames: u32,
}

impl<D: FrameDecoder> DecodePump<D> {
    /// Wrap a decoder with an empty window.
    #[allow(clippy::large_stack_arrays)] // pump lives in a static or task stack sized for it
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            chunk: [0; CHUNK_SIZE],
            filled: 0,
            pos: 0,
            frame: PcmFrame::zeroed(),
            bad_frames: 0,
        }
    }

    /// Frames that failed to decode and were skipped over (resync).
    pub fn bad_frames(&self) -> u32 {
        self.bad_frames
    }

    /// Access the wrapped decoder (current stream format lives there).
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Run until `stop` is requested.
    ///
    /// The stop flag is polled once per decoded frame; a pump that is
    /// parked waiting for FIFO data acknowledges only after data arrives.
    pub async fn run<R, S>(&mut self, fifo: &Fifo<R>, sink: &mut S, stop: &StopToken)
    where
        R: BlockRam,
        S: PcmSink,
    {
        loop {
            if stop.is_requested() {
                stop.acknowledge();
                return;
            }

            self.refill(fifo).await;

            #[allow(clippy::indexing_slicing)] // pos <= filled <= CHUNK_SIZE invariant
            let window = &self.chunk[self.pos..self.filled];
            match self.decoder.decode_frame(window, &mut self.frame) {
                Ok(consumed) => {
                    self.pos = self
                        .pos
                        .saturating_add(consumed)
                        .min(self.filled);
                    if self.frame.len > 0 {
                        sink.commit(&self.frame).await;
                    }
                }
                Err(_) => {
                    // The window is full, so the frame at the front is
                    // unusable. Drop one byte and hunt for the next sync.
                    self.pos = self.pos.saturating_add(1).min(self.filled);
                    self.bad_frames = self.bad_frames.saturating_add(1);
                }
            }
        }
    }

    /// Slide the unconsumed tail to the front and top the window up from
    /// the FIFO. Parks until the window is full again.
    async fn refill<R: BlockRam>(&mut self, fifo: &Fifo<R>) {
        if self.pos > 0 {
            self.chunk.copy_within(self.pos..self.filled, 0);
            self.filled = self.filled.saturating_sub(self.pos);
            self.pos = 0;
        }
        if self.filled < CHUNK_SIZE {
            #[allow(clippy::indexing_slicing)] // filled <= CHUNK_SIZE invariant
            fifo.dequeue(&mut self.chunk[self.filled..]).await;
            self.filled = CHUNK_SIZE;
        }
    }
}
