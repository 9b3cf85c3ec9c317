//! Playback pipeline: SPI-RAM byte FIFO, MP3 frame decoding, DMA slot ring
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod control;
pub mod decoder;
pub mod fifo;
pub mod mp3_decoder;
pub mod output;
pub mod pump;

pub use control::StopToken;
pub use decoder::{DecodeError, FrameDecoder, PcmFrame};
pub use fifo::Fifo;
pub use mp3_decoder::Mp3Decoder;
pub use output::OutputRing;
pub use pump::{DecodePump, PcmSink, CHUNK_SIZE};

#[cfg(test)]
mod tests {
    /// PCM frame type tests
    mod frame_tests {
        use crate::decoder::{DecodeError, PcmFrame, MAX_SAMPLES_PER_FRAME};

        #[test]
        fn test_pcm_frame_holds_sample_count() {
            let mut frame = PcmFrame::zeroed();
            frame.len = 576;
            frame.sample_rate = 44_100;
            frame.channels = 2;
            assert_eq!(frame.len, 576);
            assert_eq!(frame.interleaved().len(), 1152);
        }

        #[test]
        fn test_pcm_frame_default_is_empty() {
            let frame = PcmFrame::default();
            assert_eq!(frame.len, 0);
            assert_eq!(frame.sample_rate, 0);
            assert_eq!(frame.channels, 0);
            assert!(frame.interleaved().is_empty());
        }

        #[test]
        fn test_mono_frame_interleaved_length() {
            let mut frame = PcmFrame::zeroed();
            frame.len = 1152;
            frame.channels = 1;
            assert_eq!(frame.interleaved().len(), 1152);
        }

        #[test]
        fn test_interleaved_never_exceeds_storage() {
            let mut frame = PcmFrame::zeroed();
            frame.len = MAX_SAMPLES_PER_FRAME;
            frame.channels = 2;
            assert_eq!(frame.interleaved().len(), MAX_SAMPLES_PER_FRAME);
        }

        #[test]
        fn test_decode_error_is_debug() {
            let e = DecodeError::BadFrame;
            let s = format!("{e:?}");
            assert!(!s.is_empty());
        }
    }

    /// Window size sanity
    mod pump_tests {
        use crate::mp3_decoder::Mp3Decoder;
        use crate::pump::CHUNK_SIZE;

        #[test]
        fn test_chunk_holds_worst_case_frame() {
            assert_eq!(CHUNK_SIZE, Mp3Decoder::MAX_FRAME_SIZE);
        }
    }
}
