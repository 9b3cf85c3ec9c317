//! embassy-net transport behind the stream client's `Network` seam.
//!
//! DNS runs over the stack's configured resolver (DHCP-provided on this
//! board); the TCP socket borrows its rx/tx buffers from this struct, so
//! one `EthernetNetwork` supports one stream session at a time, which is
//! all the appliance ever runs.

use embassy_net::dns::DnsQueryType;
use embassy_net::driver::Driver;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use stream::{ConnectError, Network};

/// Receive window. Icecast pushes at stream bitrate (~16 KiB/s for 128
/// kbps), so 4 KiB of TCP window rides out scheduler hiccups without
/// stalling the sender.
const RX_BUFFER: usize = 4096;
/// The request is under 256 bytes; nothing else is ever sent.
const TX_BUFFER: usize = 512;

/// How long DNS + TCP connect may take before the attempt is abandoned.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

/// Stream transport over an embassy-net stack.
pub struct EthernetNetwork<D: Driver + 'static> {
    stack: &'static Stack<D>,
    rx_buffer: [u8; RX_BUFFER],
    tx_buffer: [u8; TX_BUFFER],
}

impl<D: Driver + 'static> EthernetNetwork<D> {
    /// Wrap a running stack. Lives in a `StaticCell` next to the stack.
    #[allow(clippy::large_stack_arrays)] // initialised directly into its StaticCell
    pub fn new(stack: &'static Stack<D>) -> Self {
        Self {
            stack,
            rx_buffer: [0; RX_BUFFER],
            tx_buffer: [0; TX_BUFFER],
        }
    }
}

impl<D: Driver + 'static> Network for EthernetNetwork<D> {
    type Socket<'a>
        = TcpSocket<'a>
    where
        Self: 'a;

    async fn connect(
        &mut self,
        host: &str,
        port: u16,
    ) -> Result<TcpSocket<'_>, ConnectError> {
        let addrs = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|_| ConnectError::Dns)?;
        let addr = *addrs.first().ok_or(ConnectError::Dns)?;
        defmt::debug!("resolved {=str}", host);

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        // Dead-peer detection once the stream is up: Icecast sends
        // continuously, so a long silence means the connection is gone.
        socket.set_timeout(Some(Duration::from_secs(20)));

        match with_timeout(CONNECT_TIMEOUT, socket.connect((addr, port))).await {
            Ok(Ok(())) => Ok(socket),
            Ok(Err(_)) | Err(_) => Err(ConnectError::Connect),
        }
    }
}
