//! Minimal HTTP/1.0 for Icecast mountpoints.
//!
//! Request building, a byte-at-a-time header end scanner, and just enough
//! response parsing to pull the status code and `icy-metaint` out of the
//! head. No general HTTP client lives here and none is wanted.

use core::fmt::Write as _;

/// Longest request line set we will emit.
pub const MAX_REQUEST: usize = 256;

/// Longest response head we will buffer before giving up.
pub const MAX_HEAD: usize = 1024;

/// HTTP/Icecast response violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Host + path do not fit in [`MAX_REQUEST`] bytes.
    RequestTooLong,
    /// Response head exceeded [`MAX_HEAD`] bytes without terminating.
    HeaderTooLong,
    /// Status line is not a 200.
    BadStatus,
    /// A header we depend on failed to parse.
    BadHeader,
    /// Connection closed before the head terminated.
    Truncated,
}

/// Build the mountpoint request.
///
/// `Icy-MetaData: 1` asks the server to interleave metadata blocks every
/// `icy-metaint` bytes; servers that do not support it simply omit the
/// header in their response.
pub fn write_request(
    host: &str,
    path: &str,
) -> Result<heapless::String<MAX_REQUEST>, ProtocolError> {
    let mut req = heapless::String::new();
    write!(
        req,
        "GET {path} HTTP/1.0\r\nHost: {host}\r\nIcy-MetaData: 1\r\n\r\n"
    )
    .map_err(|_| ProtocolError::RequestTooLong)?;
    Ok(req)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Init,
    Cr,
    CrLf,
    CrLfCr,
    Content,
}

/// Quick & dirty scanner for the end of the response head.
///
/// Consumes bytes until the `\r\n\r\n` terminator. Anything outside
/// printable ASCII (and CR/LF) also ends the head; compressed audio
/// starts with non-printable bytes, so a server that skips the blank
/// line cannot wedge the parser.
pub struct HeaderScanner {
    state: ScanState,
}

impl HeaderScanner {
    /// Scanner at the start of a response.
    pub const fn new() -> Self {
        Self {
            state: ScanState::Init,
        }
    }

    /// True once the head has terminated; remaining bytes are body.
    pub fn done(&self) -> bool {
        self.state == ScanState::Content
    }

    /// Consume leading head bytes from `buf`.
    ///
    /// Returns how many bytes of `buf` belong to the head; the rest is
    /// body payload. Once done, always returns 0.
    pub fn feed(&mut self, buf: &[u8]) -> usize {
        if self.done() {
            return 0;
        }
        for (i, &byte) in buf.iter().enumerate() {
            match byte {
                b'\r' => match self.state {
                    ScanState::Init => self.state = ScanState::Cr,
                    ScanState::CrLf => self.state = ScanState::CrLfCr,
                    _ => {
                        self.state = ScanState::Content;
                        return i;
                    }
                },
                b'\n' => match self.state {
                    ScanState::Cr => self.state = ScanState::CrLf,
                    ScanState::CrLfCr => {
                        self.state = ScanState::Content;
                        return i.saturating_add(1);
                    }
                    _ => {
                        self.state = ScanState::Content;
                        return i;
                    }
                },
                0x20..=0x7E => self.state = ScanState::Init,
                _ => {
                    self.state = ScanState::Content;
                    return i;
                }
            }
        }
        buf.len()
    }
}

impl Default for HeaderScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Fields extracted from the response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseHead {
    /// Audio bytes between metadata blocks; 0 when the server sends none.
    pub metaint: u32,
}

/// Parse the buffered head: status check plus `icy-metaint`.
///
/// Icecast answers either `HTTP/1.0 200 OK` or the pre-HTTP `ICY 200 OK`,
/// so the status check is a substring match on the first line.
pub fn parse_head(head: &[u8]) -> Result<ResponseHead, ProtocolError> {
    let mut lines = head.split(|&b| b == b'\n');
    let status = lines.next().ok_or(ProtocolError::BadStatus)?;
    if !contains(status, b" 200") {
        return Err(ProtocolError::BadStatus);
    }

    let mut metaint = 0u32;
    for line in lines {
        let line = trim_ascii(line);
        if let Some(value) = strip_prefix_ignore_case(line, b"icy-metaint:") {
            metaint = parse_u32(trim_ascii(value)).ok_or(ProtocolError::BadHeader)?;
        }
    }
    Ok(ResponseHead { metaint })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let Some((first, rest)) = bytes.split_first() {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let Some((last, rest)) = bytes.split_last() {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

fn strip_prefix_ignore_case<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        line.get(prefix.len()..)
    } else {
        None
    }
}

fn parse_u32(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        #[allow(clippy::arithmetic_side_effects)] // b is an ASCII digit
        let digit = u32::from(b - b'0');
        value = value.checked_mul(10)?.checked_add(digit)?;
    }
    Some(value)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn test_request_has_icy_metadata_header() {
        let req = write_request("radio.example.com", "/mount.mp3").unwrap();
        assert_eq!(
            req.as_str(),
            "GET /mount.mp3 HTTP/1.0\r\nHost: radio.example.com\r\nIcy-MetaData: 1\r\n\r\n"
        );
    }

    #[test]
    fn test_oversized_request_is_rejected() {
        let path: String = core::iter::repeat('a').take(300).collect();
        assert_eq!(
            write_request("h", &path),
            Err(ProtocolError::RequestTooLong)
        );
    }

    #[test]
    fn test_scanner_finds_crlfcrlf_boundary() {
        let mut scanner = HeaderScanner::new();
        let data = b"HTTP/1.0 200 OK\r\nicy-metaint: 8192\r\n\r\n\xFF\xFB\x90";
        let head = scanner.feed(data);
        assert!(scanner.done());
        assert_eq!(&data[..head], b"HTTP/1.0 200 OK\r\nicy-metaint: 8192\r\n\r\n");
        assert_eq!(scanner.feed(&data[head..]), 0);
    }

    #[test]
    fn test_scanner_spans_read_boundaries() {
        let mut scanner = HeaderScanner::new();
        let data = b"ICY 200 OK\r\n\r\nbody";
        let mut head_len = 0;
        for chunk in data.chunks(3) {
            head_len += scanner.feed(chunk);
            if scanner.done() {
                break;
            }
        }
        assert_eq!(head_len, 14);
    }

    #[test]
    fn test_scanner_stops_at_non_printable_byte() {
        // A server that never sends the blank line: the first audio byte
        // (0xFF) terminates the head.
        let mut scanner = HeaderScanner::new();
        let data = b"ICY 200 OK\r\n\xFF\xFB";
        let head = scanner.feed(data);
        assert!(scanner.done());
        assert_eq!(head, 12);
    }

    #[test]
    fn test_parse_head_extracts_metaint() {
        let head = b"HTTP/1.0 200 OK\r\nContent-Type: audio/mpeg\r\nICY-MetaInt: 16000\r\n\r\n";
        let parsed = parse_head(head).unwrap();
        assert_eq!(parsed.metaint, 16_000);
    }

    #[test]
    fn test_parse_head_without_metaint_defaults_to_zero() {
        let head = b"ICY 200 OK\r\nicy-name: Example Radio\r\n\r\n";
        assert_eq!(parse_head(head).unwrap().metaint, 0);
    }

    #[test]
    fn test_parse_head_rejects_non_200() {
        let head = b"HTTP/1.0 404 Not Found\r\n\r\n";
        assert_eq!(parse_head(head), Err(ProtocolError::BadStatus));
    }

    #[test]
    fn test_parse_head_rejects_garbage_metaint() {
        let head = b"ICY 200 OK\r\nicy-metaint: lots\r\n\r\n";
        assert_eq!(parse_head(head), Err(ProtocolError::BadHeader));
    }
}
