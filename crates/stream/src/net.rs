//! Transport seam for the stream client.

use embedded_io_async::{Read, Write};

/// Connection setup failure, coarse enough to drive a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectError {
    /// Host name did not resolve.
    Dns,
    /// No socket available (resource exhaustion).
    Socket,
    /// TCP connect failed or timed out.
    Connect,
}

/// Connection factory over some TCP implementation.
///
/// On hardware this wraps an embassy-net stack; host tests script it.
/// The socket type borrows the factory because real TCP sockets borrow
/// their rx/tx buffers from it.
pub trait Network {
    /// Connected socket type.
    type Socket<'a>: Read + Write
    where
        Self: 'a;

    /// Resolve `host` and open a TCP connection to `port`.
    async fn connect(&mut self, host: &str, port: u16)
        -> Result<Self::Socket<'_>, ConnectError>;
}
