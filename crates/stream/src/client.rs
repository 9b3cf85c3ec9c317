//! Stream session driver.
//!
//! One call to [`run`] is one connection lifecycle: connect, send the
//! mountpoint request, parse the response head, then pump the body until
//! the server closes, the socket fails, or a stop is requested. The
//! caller owns the retry/reconnect loop and decides what each
//! [`StopReason`] means for it.
//!
//! Backpressure falls out of the FIFO: when it is full, `enqueue` parks
//! this task and TCP flow control pushes back on the server.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_io_async::{Read, Write};
use platform::spiram::BlockRam;
use playback::control::StopToken;
use playback::fifo::Fifo;

use crate::http::{self, HeaderScanner, ProtocolError, MAX_HEAD};
use crate::metadata::MetadataParser;
use crate::net::{ConnectError, Network};
use crate::StreamEvents;

/// Socket read granularity, sized to the FIFO's bus transfer clamp.
const READ_CHUNK: usize = 64;

/// Why a session ended normally.
///
/// All of these mean "reconnect if the player still wants this station";
/// they are separated for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopReason {
    /// A stop was requested through the [`StopToken`].
    Requested,
    /// The server closed the connection.
    EndOfStream,
    /// The socket failed mid-stream.
    SocketError,
}

/// Why a session failed to establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// DNS/socket/TCP setup failed.
    Connect(ConnectError),
    /// The socket failed while the request or head was in flight.
    Socket,
    /// The server's response was unusable.
    Protocol(ProtocolError),
}

/// Session byte counter, polled by the status line.
pub struct StreamStats {
    bytes: AtomicU32,
}

impl StreamStats {
    /// Zeroed counter; lives in a `static`.
    pub const fn new() -> Self {
        Self {
            bytes: AtomicU32::new(0),
        }
    }

    fn record(&self, n: usize) {
        #[allow(clippy::cast_possible_truncation)] // poll interval keeps counts far below u32::MAX
        self.bytes.fetch_add(n as u32, Ordering::Relaxed);
    }

    /// Audio bytes received since the previous call.
    pub fn bytes_get_and_reset(&self) -> u32 {
        self.bytes.swap(0, Ordering::Relaxed)
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Body splitter: audio bytes to the FIFO, metadata blocks to the parser.
struct BodyDemux {
    /// Audio bytes between metadata blocks; 0 disables demuxing.
    metaint: u32,
    /// Audio bytes seen since the last metadata block.
    metapos: u32,
    /// Metadata bytes still expected in the current block.
    pending_meta: u32,
    parser: MetadataParser,
}

impl BodyDemux {
    fn new(metaint: u32) -> Self {
        Self {
            metaint,
            metapos: 0,
            pending_meta: 0,
            parser: MetadataParser::new(),
        }
    }

    /// How many bytes the next socket read should ask for.
    ///
    /// Never crosses an audio/metadata boundary, so `consume` always sees
    /// bytes of a single kind per read (the length byte is read alone).
    fn next_read_len(&self) -> usize {
        if self.pending_meta > 0 {
            (self.pending_meta as usize).min(READ_CHUNK)
        } else if self.metaint > 0 && self.metapos == self.metaint {
            1
        } else if self.metaint > 0 {
            (self.metaint.saturating_sub(self.metapos) as usize).min(READ_CHUNK)
        } else {
            READ_CHUNK
        }
    }

    /// Route a body fragment. Handles mixed-kind fragments so the head
    /// leftover (which can straddle boundaries) needs no special casing.
    async fn consume<R: BlockRam, E: StreamEvents>(
        &mut self,
        bytes: &[u8],
        fifo: &Fifo<R>,
        stats: &StreamStats,
        events: &mut E,
    ) {
        let mut rest = bytes;
        while !rest.is_empty() {
            if self.pending_meta > 0 {
                let n = (self.pending_meta as usize).min(rest.len());
                #[allow(clippy::indexing_slicing)] // n <= rest.len()
                self.parser.push(&rest[..n], events);
                #[allow(clippy::cast_possible_truncation)] // n <= pending_meta
                {
                    self.pending_meta = self.pending_meta.saturating_sub(n as u32);
                }
                #[allow(clippy::indexing_slicing)]
                {
                    rest = &rest[n..];
                }
            } else if self.metaint > 0 && self.metapos == self.metaint {
                // Length byte: block size follows in 16-byte units.
                if let Some((&len_byte, tail)) = rest.split_first() {
                    self.pending_meta = u32::from(len_byte).saturating_mul(16);
                    self.metapos = 0;
                    self.parser.reset();
                    rest = tail;
                }
            } else {
                let mut n = rest.len();
                if self.metaint > 0 {
                    n = n.min(self.metaint.saturating_sub(self.metapos) as usize);
                }
                #[allow(clippy::indexing_slicing)] // n <= rest.len()
                fifo.enqueue(&rest[..n]).await;
                stats.record(n);
                #[allow(clippy::cast_possible_truncation)] // n <= metaint gap
                {
                    self.metapos = self.metapos.saturating_add(n as u32);
                }
                #[allow(clippy::indexing_slicing)]
                {
                    rest = &rest[n..];
                }
            }
        }
    }
}

/// Run one stream session to completion.
///
/// `Ok` is a normal end (see [`StopReason`]); `Err` means the session
/// never got as far as audio. A stop raised at any point during the
/// session gets its acknowledgement on the way out, whatever the exit
/// path, so a blocking [`StopToken::stop`] can never hang on a session
/// that died on its own.
#[allow(clippy::too_many_arguments)] // session wiring; a context struct would just rename the problem
pub async fn run<N, R, E>(
    net: &mut N,
    host: &str,
    port: u16,
    path: &str,
    fifo: &Fifo<R>,
    events: &mut E,
    stats: &StreamStats,
    stop: &StopToken,
) -> Result<StopReason, StreamError>
where
    N: Network,
    R: BlockRam,
    E: StreamEvents,
{
    let result = session(net, host, port, path, fifo, events, stats, stop).await;
    if stop.is_requested() {
        stop.acknowledge();
    }
    result
}

#[allow(clippy::too_many_arguments)]
async fn session<N, R, E>(
    net: &mut N,
    host: &str,
    port: u16,
    path: &str,
    fifo: &Fifo<R>,
    events: &mut E,
    stats: &StreamStats,
    stop: &StopToken,
) -> Result<StopReason, StreamError>
where
    N: Network,
    R: BlockRam,
    E: StreamEvents,
{
    let request = http::write_request(host, path).map_err(StreamError::Protocol)?;

    let mut socket = net
        .connect(host, port)
        .await
        .map_err(StreamError::Connect)?;
    socket
        .write_all(request.as_bytes())
        .await
        .map_err(|_| StreamError::Socket)?;

    // Buffer the response head. The read that completes the head usually
    // carries the first body bytes too; those seed the demux below.
    let mut scanner = HeaderScanner::new();
    let mut head: heapless::Vec<u8, MAX_HEAD> = heapless::Vec::new();
    let mut buf = [0u8; READ_CHUNK];
    let leftover = loop {
        if stop.is_requested() {
            return Ok(StopReason::Requested);
        }
        let n = match socket.read(&mut buf).await {
            Ok(0) => return Err(StreamError::Protocol(ProtocolError::Truncated)),
            Ok(n) => n,
            Err(_) => return Err(StreamError::Socket),
        };
        #[allow(clippy::indexing_slicing)] // n <= buf.len() per Read contract
        let chunk = &buf[..n];
        let consumed = scanner.feed(chunk);
        #[allow(clippy::indexing_slicing)] // consumed <= n
        head.extend_from_slice(&chunk[..consumed])
            .map_err(|_| StreamError::Protocol(ProtocolError::HeaderTooLong))?;
        if scanner.done() {
            break consumed..n;
        }
    };

    let parsed = http::parse_head(&head).map_err(StreamError::Protocol)?;
    events.stream_up();

    let mut demux = BodyDemux::new(parsed.metaint);
    #[allow(clippy::indexing_slicing)] // leftover range bounded by the last read
    demux.consume(&buf[leftover], fifo, stats, events).await;

    loop {
        if stop.is_requested() {
            return Ok(StopReason::Requested);
        }
        let want = demux.next_read_len();
        #[allow(clippy::indexing_slicing)] // want <= READ_CHUNK
        match socket.read(&mut buf[..want]).await {
            Ok(0) => return Ok(StopReason::EndOfStream),
            Ok(n) => {
                #[allow(clippy::indexing_slicing)] // n <= want per Read contract
                demux.consume(&buf[..n], fifo, stats, events).await;
            }
            Err(_) => return Ok(StopReason::SocketError),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_length_tracks_metadata_boundary() {
        let mut demux = BodyDemux::new(100);
        assert_eq!(demux.next_read_len(), 64);
        demux.metapos = 60;
        assert_eq!(demux.next_read_len(), 40);
        demux.metapos = 100;
        assert_eq!(demux.next_read_len(), 1, "length byte is read alone");
        demux.pending_meta = 32;
        assert_eq!(demux.next_read_len(), 32);
    }

    #[test]
    fn test_read_length_without_metadata_is_full_chunks() {
        let demux = BodyDemux::new(0);
        assert_eq!(demux.next_read_len(), READ_CHUNK);
    }

    #[test]
    fn test_stats_get_and_reset() {
        let stats = StreamStats::new();
        stats.record(100);
        stats.record(28);
        assert_eq!(stats.bytes_get_and_reset(), 128);
        assert_eq!(stats.bytes_get_and_reset(), 0);
    }
}
