//! Decoder abstractions: PCM frame type and the frame-decoder trait.
//!
//! The pipeline is codec-agnostic above this module: the decode pump feeds
//! compressed bytes to a [`FrameDecoder`] and hands the resulting
//! [`PcmFrame`]s to the output stage. The only concrete implementation is
//! the nanomp3-backed MP3 decoder in `mp3_decoder`.
//!
//! The fixed-size stack array in [`PcmFrame`] is intentional: PCM on its way
//! to the I2S DMA ring must never touch a heap.

/// Maximum decoded samples per frame (all channels interleaved).
///
/// MPEG1 Layer 3 produces at most 1152 samples per channel; stereo doubles
/// that.
pub const MAX_SAMPLES_PER_FRAME: usize = 1152 * 2;

/// A decoded PCM frame.
///
/// Samples are interleaved 16-bit signed integers (L R L R … for stereo).
/// The array is always fully allocated; `len` counts valid samples *per
/// channel*.
#[derive(Clone)]
pub struct PcmFrame {
    /// Interleaved sample storage.
    pub samples: [i16; MAX_SAMPLES_PER_FRAME],
    /// Number of valid samples per channel.
    pub len: usize,
    /// Sample rate in Hz as announced by the frame header.
    pub sample_rate: u32,
    /// Channel count (1 = mono, 2 = stereo).
    pub channels: u8,
}

impl PcmFrame {
    /// Create a zeroed frame suitable for use as an output buffer.
    pub const fn zeroed() -> Self {
        Self {
            samples: [0i16; MAX_SAMPLES_PER_FRAME],
            len: 0,
            sample_rate: 0,
            channels: 0,
        }
    }

    /// Valid interleaved samples (all channels).
    pub fn interleaved(&self) -> &[i16] {
        let n = self
            .len
            .saturating_mul(usize::from(self.channels.max(1)))
            .min(self.samples.len());
        #[allow(clippy::indexing_slicing)] // n clamped to samples.len() above
        &self.samples[..n]
    }
}

impl Default for PcmFrame {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Errors that a [`FrameDecoder`] may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// No complete frame in the input; refill and try again.
    NeedMoreData,
    /// The input starts with bytes that cannot begin a frame.
    BadFrame,
    /// The bitstream parameters are not supported by this decoder.
    Unsupported,
}

/// One-frame-at-a-time audio decoder.
pub trait FrameDecoder {
    /// Decoder error type.
    type Error: core::fmt::Debug;

    /// Decode one frame from the start of `input` into `output`.
    ///
    /// Returns the number of input bytes consumed. A successful call may
    /// still produce zero samples (`output.len == 0`) when the decoder
    /// skipped garbage while hunting for a sync word; the consumed bytes
    /// must be discarded either way.
    fn decode_frame(&mut self, input: &[u8], output: &mut PcmFrame)
        -> Result<usize, Self::Error>;

    /// Sample rate of the most recently decoded frame (0 before the first).
    fn sample_rate(&self) -> u32;

    /// Channel count of the most recently decoded frame (0 before the first).
    fn channels(&self) -> u8;
}
