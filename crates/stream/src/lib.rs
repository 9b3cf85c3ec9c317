//! Icecast/Shoutcast stream client: HTTP session, metadata demux, FIFO feed
//!
//! The client speaks just enough HTTP/1.0 to open an Icecast mountpoint,
//! requests in-band `icy` metadata, and splits the response into an audio
//! byte stream (pushed into the playback FIFO) and metadata blocks (parsed
//! into artist/title events).
//!
//! Transport is abstracted behind [`net::Network`], so the same client runs
//! over embassy-net TCP on hardware and over scripted mock sockets in host
//! tests.
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod http;
pub mod metadata;
pub mod net;

pub use client::{run, StopReason, StreamError, StreamStats};
pub use http::ProtocolError;
pub use metadata::{MetadataKind, MetadataParser};
pub use net::{ConnectError, Network};

/// Player-facing notifications raised while a stream session runs.
///
/// Implemented by the UI glue in firmware and by recording fakes in tests.
pub trait StreamEvents {
    /// The response headers parsed and audio is about to flow.
    fn stream_up(&mut self);

    /// A metadata field was extracted from an in-band block.
    ///
    /// `text` borrows a scratch buffer; copy it out before returning.
    fn metadata(&mut self, kind: MetadataKind, text: &str);
}
