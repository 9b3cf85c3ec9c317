//! End-to-end stream sessions against scripted sockets.
//!
//! Exercises the whole client path (request, head parse, metadata demux,
//! FIFO feed) with byte-exact server responses, including the awkward
//! cases: tiny reads that straddle boundaries, rejected mountpoints, and
//! sockets that die mid-song.

// Integration test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::cell::RefCell;
use std::rc::Rc;

use platform::mocks::MockRam;
use playback::{Fifo, StopToken};
use stream::{ConnectError, MetadataKind, Network, StopReason, StreamError, StreamEvents};

// ─── Scripted transport ─────────────────────────────────────────────────────

#[derive(Debug)]
struct MockIoError;

impl embedded_io_async::Error for MockIoError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        embedded_io_async::ErrorKind::Other
    }
}

struct MockSocket {
    response: Vec<u8>,
    pos: usize,
    /// Serve at most this many bytes per read, to exercise short reads.
    read_limit: usize,
    /// Fail the read once this many response bytes have been served.
    fail_at: Option<usize>,
    /// Raise this stop right as the failing read returns, landing the
    /// request between the client's loop check and its error return.
    stop_on_fail: Option<Rc<StopToken>>,
    written: Rc<RefCell<Vec<u8>>>,
}

impl embedded_io_async::ErrorType for MockSocket {
    type Error = MockIoError;
}

impl embedded_io_async::Read for MockSocket {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, MockIoError> {
        if let Some(fail_at) = self.fail_at {
            if self.pos >= fail_at {
                if let Some(stop) = &self.stop_on_fail {
                    stop.request();
                }
                return Err(MockIoError);
            }
        }
        if self.pos >= self.response.len() {
            return Ok(0);
        }
        let mut n = buf.len().min(self.read_limit);
        n = n.min(self.response.len() - self.pos);
        if let Some(fail_at) = self.fail_at {
            n = n.min(fail_at - self.pos);
        }
        buf[..n].copy_from_slice(&self.response[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl embedded_io_async::Write for MockSocket {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, MockIoError> {
        self.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
}

struct MockNetwork {
    response: Vec<u8>,
    read_limit: usize,
    fail_at: Option<usize>,
    stop_on_fail: Option<Rc<StopToken>>,
    refuse: bool,
    written: Rc<RefCell<Vec<u8>>>,
    connected_to: RefCell<Option<(String, u16)>>,
}

impl MockNetwork {
    fn serving(response: Vec<u8>) -> Self {
        Self {
            response,
            read_limit: usize::MAX,
            fail_at: None,
            stop_on_fail: None,
            refuse: false,
            written: Rc::new(RefCell::new(Vec::new())),
            connected_to: RefCell::new(None),
        }
    }
}

impl Network for MockNetwork {
    type Socket<'a>
        = MockSocket
    where
        Self: 'a;

    async fn connect(&mut self, host: &str, port: u16) -> Result<MockSocket, ConnectError> {
        if self.refuse {
            return Err(ConnectError::Connect);
        }
        *self.connected_to.borrow_mut() = Some((host.to_owned(), port));
        Ok(MockSocket {
            response: self.response.clone(),
            pos: 0,
            read_limit: self.read_limit,
            fail_at: self.fail_at,
            stop_on_fail: self.stop_on_fail.clone(),
            written: Rc::clone(&self.written),
        })
    }
}

// ─── Event recording ────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    up: usize,
    metadata: Vec<(MetadataKind, String)>,
}

impl StreamEvents for Recorder {
    fn stream_up(&mut self) {
        self.up += 1;
    }
    fn metadata(&mut self, kind: MetadataKind, text: &str) {
        self.metadata.push((kind, text.to_owned()));
    }
}

// ─── Response builders ──────────────────────────────────────────────────────

fn audio_pattern(len: usize, counter: &mut u8) -> Vec<u8> {
    (0..len)
        .map(|_| {
            let b = *counter;
            *counter = counter.wrapping_add(1);
            b
        })
        .collect()
}

fn metadata_block(text: &str) -> Vec<u8> {
    let content = format!("StreamTitle='{text}';");
    let padded = content.len().div_ceil(16) * 16;
    let mut block = vec![u8::try_from(padded / 16).unwrap()];
    block.extend_from_slice(content.as_bytes());
    block.resize(1 + padded, 0);
    block
}

const METAINT: usize = 8192;

fn icy_response(songs: usize) -> Vec<u8> {
    let mut response =
        format!("ICY 200 OK\r\nicy-name: Test Radio\r\nicy-metaint: {METAINT}\r\n\r\n")
            .into_bytes();
    let mut counter = 0u8;
    for i in 0..songs {
        response.extend(audio_pattern(METAINT, &mut counter));
        response.extend(metadata_block(&format!("Artist{i} - Title{i}")));
    }
    response
}

// ─── Sessions ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_session_demuxes_audio_and_metadata() {
    let mut net = MockNetwork::serving(icy_response(3));
    let written = Rc::clone(&net.written);
    let fifo = Fifo::new(MockRam::<{ 32 * 1024 }>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Ok(StopReason::EndOfStream));
    assert_eq!(
        String::from_utf8(written.borrow().clone()).unwrap(),
        "GET /mount.mp3 HTTP/1.0\r\nHost: radio.example.com\r\nIcy-MetaData: 1\r\n\r\n"
    );
    assert_eq!(events.up, 1);
    assert_eq!(
        events.metadata,
        vec![
            (MetadataKind::Artist, "Artist0".to_owned()),
            (MetadataKind::Title, "Title0".to_owned()),
            (MetadataKind::Artist, "Artist1".to_owned()),
            (MetadataKind::Title, "Title1".to_owned()),
            (MetadataKind::Artist, "Artist2".to_owned()),
            (MetadataKind::Title, "Title2".to_owned()),
        ]
    );

    // Every audio byte made it into the FIFO, in order, with the metadata
    // stripped out.
    let total = 3 * METAINT;
    assert_eq!(stats.bytes_get_and_reset() as usize, total);
    assert_eq!(fifo.fill().await, total);
    let mut audio = vec![0u8; total];
    fifo.dequeue(&mut audio).await;
    let mut counter = 0u8;
    for (i, &b) in audio.iter().enumerate() {
        assert_eq!(b, counter, "audio byte {i} corrupted");
        counter = counter.wrapping_add(1);
    }
}

#[tokio::test]
async fn tiny_reads_do_not_tear_the_demux() {
    // 5-byte socket reads: head, length bytes, and metadata blocks all
    // arrive fragmented.
    let mut net = MockNetwork::serving(icy_response(2));
    net.read_limit = 5;
    let fifo = Fifo::new(MockRam::<{ 32 * 1024 }>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Ok(StopReason::EndOfStream));
    assert_eq!(events.metadata.len(), 4);
    assert_eq!(stats.bytes_get_and_reset() as usize, 2 * METAINT);
}

#[tokio::test]
async fn malformed_metadata_block_does_not_poison_the_next() {
    // Block 1 carries a value that never terminates; block 2 is well
    // formed. The demux must parse block 2 cleanly from scratch.
    let mut response =
        format!("ICY 200 OK\r\nicy-metaint: {METAINT}\r\n\r\n").into_bytes();
    let mut counter = 0u8;

    response.extend(audio_pattern(METAINT, &mut counter));
    let broken = b"StreamTitle='Broken";
    response.push(u8::try_from(broken.len().div_ceil(16)).unwrap());
    response.extend_from_slice(broken);
    response.resize(response.len() + (broken.len().div_ceil(16) * 16 - broken.len()), 0);

    response.extend(audio_pattern(METAINT, &mut counter));
    response.extend(metadata_block("Artist - Title"));

    let mut net = MockNetwork::serving(response);
    let fifo = Fifo::new(MockRam::<{ 32 * 1024 }>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Ok(StopReason::EndOfStream));
    assert_eq!(
        events.metadata,
        vec![
            (MetadataKind::Artist, "Artist".to_owned()),
            (MetadataKind::Title, "Title".to_owned()),
        ]
    );
    assert_eq!(stats.bytes_get_and_reset() as usize, 2 * METAINT);
}

#[tokio::test]
async fn rejected_mountpoint_enqueues_nothing() {
    let response = b"HTTP/1.0 404 Not Found\r\n\r\n<html>no such mount</html>".to_vec();
    let mut net = MockNetwork::serving(response);
    let fifo = Fifo::new(MockRam::<1024>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/gone.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert!(matches!(result, Err(StreamError::Protocol(_))));
    assert_eq!(events.up, 0, "stream_up must not fire on a rejected mount");
    assert_eq!(fifo.fill().await, 0);
    assert_eq!(stats.bytes_get_and_reset(), 0);
}

#[tokio::test]
async fn refused_connection_reports_connect_error() {
    let mut net = MockNetwork::serving(Vec::new());
    net.refuse = true;
    let fifo = Fifo::new(MockRam::<1024>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Err(StreamError::Connect(ConnectError::Connect)));
}

#[tokio::test]
async fn socket_failure_mid_stream_keeps_earlier_audio() {
    let head = "ICY 200 OK\r\n\r\n";
    let mut response = head.as_bytes().to_vec();
    let mut counter = 0u8;
    response.extend(audio_pattern(1000, &mut counter));
    let cutoff = head.len() + 600;

    let mut net = MockNetwork::serving(response);
    net.fail_at = Some(cutoff);
    let fifo = Fifo::new(MockRam::<4096>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Ok(StopReason::SocketError));
    assert_eq!(events.up, 1);
    // The 600 body bytes served before the failure were enqueued.
    assert_eq!(fifo.fill().await, 600);
}

#[tokio::test]
async fn stop_request_ends_the_session() {
    let mut net = MockNetwork::serving(icy_response(1));
    let fifo = Fifo::new(MockRam::<{ 16 * 1024 }>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();
    stop.request();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Ok(StopReason::Requested));
    assert_eq!(fifo.fill().await, 0);
}

#[tokio::test]
async fn stop_racing_a_socket_failure_is_still_acknowledged() {
    // The stop request lands after the loop's flag check but before the
    // failing read returns, so the session exits through the error path
    // with the stop pending. A blocking stop() must still be released.
    let head = "ICY 200 OK\r\n\r\n";
    let mut response = head.as_bytes().to_vec();
    let mut counter = 0u8;
    response.extend(audio_pattern(200, &mut counter));

    let stop = Rc::new(StopToken::new());
    let mut net = MockNetwork::serving(response);
    net.fail_at = Some(head.len() + 200);
    net.stop_on_fail = Some(Rc::clone(&stop));
    let fifo = Fifo::new(MockRam::<4096>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        8000,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Ok(StopReason::SocketError));
    // The acknowledgement was signalled on the way out, so the requester
    // side of the handshake completes instead of waiting forever.
    tokio::time::timeout(std::time::Duration::from_secs(1), stop.stop())
        .await
        .expect("stop handshake must complete after the session exits");
}

#[tokio::test]
async fn stream_without_metaint_is_pure_passthrough() {
    let mut response = b"HTTP/1.0 200 OK\r\nContent-Type: audio/mpeg\r\n\r\n".to_vec();
    let mut counter = 0u8;
    response.extend(audio_pattern(500, &mut counter));

    let mut net = MockNetwork::serving(response);
    let fifo = Fifo::new(MockRam::<4096>::new());
    let mut events = Recorder::default();
    let stats = stream::StreamStats::new();
    let stop = StopToken::new();

    let result = stream::run(
        &mut net,
        "radio.example.com",
        80,
        "/mount.mp3",
        &fifo,
        &mut events,
        &stats,
        &stop,
    )
    .await;

    assert_eq!(result, Ok(StopReason::EndOfStream));
    assert!(events.metadata.is_empty());
    assert_eq!(fifo.fill().await, 500);
    let mut audio = vec![0u8; 500];
    fifo.dequeue(&mut audio).await;
    let expected: Vec<u8> = (0..500usize).map(|i| (i % 256) as u8).collect();
    assert_eq!(audio, expected);
}
