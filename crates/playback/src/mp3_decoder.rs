//! nanomp3-based MP3 frame decoder.
//!
//! Implements the `FrameDecoder` trait using the `nanomp3` crate, a
//! pure-Rust no_std translation of minimp3 with ARM soundness fixes.
//!
//! # Feature flag
//!
//! The `nanomp3` dependency and the real decode path are gated behind the
//! `mp3` feature so the lower crates compile on targets that do not carry
//! the decoder tables (~40 KiB of flash).

use crate::decoder::{DecodeError, FrameDecoder, PcmFrame};

/// MP3 frame decoder backed by nanomp3.
///
/// `nanomp3::Decoder` has no internal input buffering; the caller (the
/// decode pump) must present a window that contains at least one complete
/// frame, 2106 bytes in the worst case (320 kbps @ 32 kHz, padded).
pub struct Mp3Decoder {
    sample_rate: u32,
    channels: u8,
    #[cfg(feature = "mp3")]
    inner: nanomp3::Decoder,
}

impl Mp3Decoder {
    /// Largest possible MP3 frame plus one sync word.
    ///
    /// 320 kbps at 32 kHz with padding is 1441 bytes; minimp3 additionally
    /// wants to see the next frame header to validate sync, and the
    /// historical choice of window is 2106 bytes.
    pub const MAX_FRAME_SIZE: usize = 2106;

    /// Create a new MP3 decoder.
    ///
    /// `sample_rate` and `channels` are zero until the first successful
    /// frame decode, at which point they track the frame headers.
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            channels: 0,
            #[cfg(feature = "mp3")]
            inner: nanomp3::Decoder::new(),
        }
    }
}

impl Default for Mp3Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for Mp3Decoder {
    type Error = DecodeError;

    /// Decode one MP3 frame from `input` into `output`.
    ///
    /// # nanomp3 API
    ///
    /// `nanomp3::Decoder::decode(mp3: &[u8], pcm: &mut [f32]) -> (usize, Option<FrameInfo>)`
    ///
    /// - `(consumed, Some(info))`: one frame decoded.
    /// - `(consumed > 0, None)`: garbage skipped while hunting for sync;
    ///   mapped to `Ok(consumed)` with `output.len == 0`.
    /// - `(0, None)`: the window holds no complete frame; refill.
    ///
    /// The f32 samples come out in [-1.0, 1.0] and are scaled to i16 for
    /// the 16-bit I2S path.
    #[cfg(feature = "mp3")]
    fn decode_frame(
        &mut self,
        input: &[u8],
        output: &mut PcmFrame,
    ) -> Result<usize, Self::Error> {
        if input.is_empty() {
            return Err(DecodeError::NeedMoreData);
        }

        // 2304 f32 samples = 9216 bytes of stack; the decode task stack is
        // sized for this.
        #[allow(clippy::large_stack_arrays)]
        let mut pcm_buf = [0.0f32; nanomp3::MAX_SAMPLES_PER_FRAME];

        let (consumed, info_opt) = self.inner.decode(input, &mut pcm_buf);

        match info_opt {
            Some(info) => {
                self.sample_rate = info.sample_rate;
                #[allow(clippy::cast_possible_truncation)] // channel count is 1 or 2
                {
                    self.channels = info.channels.num() as u8;
                }

                let produced = info
                    .samples_produced
                    .min(output.samples.len())
                    .min(pcm_buf.len());
                #[allow(clippy::indexing_slicing)] // produced clamped to both lengths
                for (dst, &src) in output.samples[..produced]
                    .iter_mut()
                    .zip(pcm_buf[..produced].iter())
                {
                    #[allow(clippy::cast_possible_truncation)] // clamped to i16 range
                    {
                        *dst = (src.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                    }
                }
                // `len` counts samples per channel.
                let ch = usize::from(self.channels.max(1));
                output.len = produced / ch;
                output.sample_rate = self.sample_rate;
                output.channels = self.channels;
                Ok(consumed)
            }
            None if consumed > 0 => {
                // Resync: bytes skipped, nothing produced.
                output.len = 0;
                Ok(consumed)
            }
            None => Err(DecodeError::NeedMoreData),
        }
    }

    #[cfg(not(feature = "mp3"))]
    fn decode_frame(
        &mut self,
        _input: &[u8],
        _output: &mut PcmFrame,
    ) -> Result<usize, Self::Error> {
        Err(DecodeError::Unsupported)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u8 {
        self.channels
    }
}
