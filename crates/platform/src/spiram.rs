//! External SPI RAM abstraction: the FIFO backing store.
//!
//! The stream buffer lives in a serial RAM chip (23LC1024, 128 KiB) rather
//! than internal SRAM. The part is reached over SPI and moves at most 64
//! bytes per transfer, so everything above this layer must loop and
//! accumulate partial transfers.
//!
//! # Contract
//!
//! - [`MAX_TRANSFER`] (64) bytes per physical `read`/`write` call, and the
//!   actual count moved may be less than requested.
//! - No atomicity or ordering guarantee beyond a single call.
//! - Capacity is a boot-time constant; addresses wrap at the array boundary.
//!
//! # Wiring quirk
//!
//! One board revision swaps the SIO0/SIO1 and SIO2/SIO3 data lines between
//! the MCU and the RAM. In quad-I/O mode the address travels over the same
//! swapped lines, so the address word must be bit-swizzled before it is
//! shifted out. The swizzle is a pure function of the address and is kept
//! behind [`AddressTransform`] so the FIFO layer never sees it.

use core::marker::PhantomData;

use embedded_hal_async::spi::{Operation, SpiDevice};

/// Upper bound on bytes moved by one physical `read`/`write` call.
pub const MAX_TRANSFER: usize = 64;

/// Byte-addressable external RAM with bounded per-call transfers.
///
/// Implementations provide best-effort block access: each call moves
/// `min(len, MAX_TRANSFER)` bytes *at most* and returns the count actually
/// moved. Callers own the loop that accumulates a full request.
pub trait BlockRam {
    /// Total capacity in bytes (boot-time constant).
    fn capacity(&self) -> usize;

    /// Read up to [`MAX_TRANSFER`] bytes starting at `addr` into `buf`.
    ///
    /// Returns the number of bytes actually transferred (0 on a dead link).
    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> usize;

    /// Write up to [`MAX_TRANSFER`] bytes from `data` starting at `addr`.
    ///
    /// Returns the number of bytes actually transferred (0 on a dead link).
    async fn write(&mut self, addr: u32, data: &[u8]) -> usize;
}

/// Pure address mangling applied at the RAM boundary.
///
/// Identity on correctly-wired boards; [`QioPinSwap`] on the revision with
/// crossed data lines. Kept as a type parameter so the transform costs
/// nothing when it is the identity.
pub trait AddressTransform {
    /// Map a logical address to the address shifted out on the wire.
    fn apply(addr: u32) -> u32;
}

/// No address mangling (correctly-wired boards).
pub struct Identity;

impl AddressTransform for Identity {
    #[inline]
    fn apply(addr: u32) -> u32 {
        addr
    }
}

/// Swap SIO0/SIO1 and SIO2/SIO3 bit lanes in the address word.
///
/// Even/odd bit pairs trade places: `((a & 0xAAAA_AAAA) >> 1) |
/// ((a & 0x5555_5555) << 1)`. Applying it twice is the identity.
pub struct QioPinSwap;

impl AddressTransform for QioPinSwap {
    #[inline]
    fn apply(addr: u32) -> u32 {
        ((addr & 0xAAAA_AAAA) >> 1) | ((addr & 0x5555_5555) << 1)
    }
}

/// Self-test failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelfTestError {
    /// A read-back byte did not match what was written.
    Mismatch {
        /// Address of the mismatching byte.
        addr: u32,
        /// Byte that was written.
        expected: u8,
        /// Byte that came back.
        found: u8,
    },
    /// A transfer made no progress; the link is dead or absent.
    Stalled,
}

/// Write/read-back round trip validating the physical link.
///
/// Not a full memory test; it tells you whether the RAM chip is connected
/// well before the FIFO commits it to service. Exercises two 64-byte
/// pattern blocks at distinct addresses plus single- and double-byte writes
/// at sub-word-aligned addresses (catches stuck or swapped address lines).
pub async fn self_test<R: BlockRam>(ram: &mut R) -> Result<(), SelfTestError> {
    let mut a = [0u8; 64];
    let mut b = [0u8; 64];
    for (x, slot) in a.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)] // x < 64
        let x = x as u8;
        *slot = x ^ (x << 2);
    }
    for (x, slot) in b.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)] // x < 64
        let x = x as u8;
        *slot = 0xAA ^ x;
    }

    write_all(ram, 0x0, &a).await?;
    write_all(ram, 0x100, &b).await?;

    let mut rd = [0u8; 64];
    read_all(ram, 0x0, &mut rd).await?;
    compare(0x0, &a, &rd)?;
    read_all(ram, 0x100, &mut rd).await?;
    compare(0x100, &b, &rd)?;

    // Sub-word-aligned probes: a 1-byte write at 0x1 must survive a 2-byte
    // write at 0x2 (no aliasing between unaligned addresses).
    write_all(ram, 0x1, &[0x55]).await?;
    write_all(ram, 0x2, &[0x55, 0xAA]).await?;
    let mut one = [0u8; 1];
    read_all(ram, 0x1, &mut one).await?;
    compare(0x1, &[0x55], &one)?;
    let mut two = [0u8; 2];
    read_all(ram, 0x2, &mut two).await?;
    compare(0x2, &[0x55, 0xAA], &two)?;

    Ok(())
}

async fn write_all<R: BlockRam>(ram: &mut R, addr: u32, data: &[u8]) -> Result<(), SelfTestError> {
    let mut done = 0usize;
    while done < data.len() {
        #[allow(clippy::indexing_slicing)] // done < data.len() loop guard
        #[allow(clippy::cast_possible_truncation)] // test blocks are 64 bytes
        let n = ram.write(addr.wrapping_add(done as u32), &data[done..]).await;
        if n == 0 {
            return Err(SelfTestError::Stalled);
        }
        done = done.saturating_add(n);
    }
    Ok(())
}

async fn read_all<R: BlockRam>(ram: &mut R, addr: u32, buf: &mut [u8]) -> Result<(), SelfTestError> {
    let mut done = 0usize;
    while done < buf.len() {
        #[allow(clippy::indexing_slicing)] // done < buf.len() loop guard
        #[allow(clippy::cast_possible_truncation)] // test blocks are 64 bytes
        let n = ram.read(addr.wrapping_add(done as u32), &mut buf[done..]).await;
        if n == 0 {
            return Err(SelfTestError::Stalled);
        }
        done = done.saturating_add(n);
    }
    Ok(())
}

fn compare(base: u32, expected: &[u8], found: &[u8]) -> Result<(), SelfTestError> {
    for (i, (e, f)) in expected.iter().zip(found.iter()).enumerate() {
        if e != f {
            #[allow(clippy::cast_possible_truncation)] // i < 64
            return Err(SelfTestError::Mismatch {
                addr: base.wrapping_add(i as u32),
                expected: *e,
                found: *f,
            });
        }
    }
    Ok(())
}

/// 23LC1024 serial RAM driver (1 Mbit = 128 KiB).
///
/// Sequential-mode access: command byte (0x03 read / 0x02 write) followed by
/// a 24-bit address, then data. The chip has no page limit in sequential
/// mode, but transfers are clamped to [`MAX_TRANSFER`] to honor the
/// [`BlockRam`] contract (the original transport moved data through a
/// 16-word peripheral FIFO).
///
/// Bus errors surface as 0-byte transfers; link health is established by
/// [`self_test`] at boot before the device is committed to service.
pub struct Spi23lc1024<SPI, T = Identity> {
    spi: SPI,
    _transform: PhantomData<T>,
}

/// 23LC1024 command set.
const CMD_READ: u8 = 0x03;
const CMD_WRITE: u8 = 0x02;

impl<SPI, T> Spi23lc1024<SPI, T>
where
    SPI: SpiDevice,
    T: AddressTransform,
{
    /// Capacity of the 23LC1024 in bytes.
    pub const CAPACITY: usize = 128 * 1024;

    /// Wrap an SPI device. The chip-select discipline (one assertion per
    /// command sequence) is owned by the `SpiDevice` implementation.
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            _transform: PhantomData,
        }
    }

    /// Release the underlying SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }

    fn header(cmd: u8, addr: u32) -> [u8; 4] {
        let addr = T::apply(addr);
        #[allow(clippy::cast_possible_truncation)] // intentional byte extraction
        {
            [cmd, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
        }
    }
}

impl<SPI, T> BlockRam for Spi23lc1024<SPI, T>
where
    SPI: SpiDevice,
    T: AddressTransform,
{
    fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> usize {
        let len = buf.len().min(MAX_TRANSFER);
        if len == 0 {
            return 0;
        }
        let header = Self::header(CMD_READ, addr);
        #[allow(clippy::indexing_slicing)] // len <= buf.len() by construction
        let result = self
            .spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(&mut buf[..len])])
            .await;
        match result {
            Ok(()) => len,
            Err(_) => 0,
        }
    }

    async fn write(&mut self, addr: u32, data: &[u8]) -> usize {
        let len = data.len().min(MAX_TRANSFER);
        if len == 0 {
            return 0;
        }
        let header = Self::header(CMD_WRITE, addr);
        #[allow(clippy::indexing_slicing)] // len <= data.len() by construction
        let result = self
            .spi
            .transaction(&mut [Operation::Write(&header), Operation::Write(&data[..len])])
            .await;
        match result {
            Ok(()) => len,
            Err(_) => 0,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // tests use unwrap/expect for readable assertions
mod tests {
    use super::*;
    use crate::mocks::MockRam;
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    #[test]
    fn test_qio_pin_swap_is_an_involution() {
        for addr in [0u32, 1, 0x100, 0x0123_4567, 0xFFFF_FFFF, 0xAAAA_5555] {
            assert_eq!(QioPinSwap::apply(QioPinSwap::apply(addr)), addr);
        }
    }

    #[test]
    fn test_qio_pin_swap_swaps_even_odd_bit_pairs() {
        // bit0 ↔ bit1: 0b01 → 0b10
        assert_eq!(QioPinSwap::apply(0b01), 0b10);
        assert_eq!(QioPinSwap::apply(0b10), 0b01);
        // equal pair members are fixed points
        assert_eq!(QioPinSwap::apply(0b11), 0b11);
        assert_eq!(QioPinSwap::apply(0xFFFF_FFFF), 0xFFFF_FFFF);
    }

    #[test]
    fn test_identity_is_identity() {
        assert_eq!(Identity::apply(0xDEAD_BEEF), 0xDEAD_BEEF);
    }

    #[tokio::test]
    async fn test_self_test_passes_on_working_ram() {
        let mut ram: MockRam<1024> = MockRam::new();
        self_test(&mut ram).await.expect("mock RAM must pass the self-test");
    }

    #[tokio::test]
    async fn test_self_test_passes_with_short_transfers() {
        // Transfers capped at 7 bytes per call, so the loops must accumulate.
        let mut ram: MockRam<1024> = MockRam::with_transfer_limit(7);
        self_test(&mut ram).await.expect("short transfers must still pass");
    }

    #[tokio::test]
    async fn test_self_test_reports_mismatch() {
        struct StuckBit<R>(R);
        impl<R: BlockRam> BlockRam for StuckBit<R> {
            fn capacity(&self) -> usize {
                self.0.capacity()
            }
            async fn read(&mut self, addr: u32, buf: &mut [u8]) -> usize {
                let n = self.0.read(addr, buf).await;
                // Data line 3 stuck high.
                for b in buf.iter_mut().take(n) {
                    *b |= 0x08;
                }
                n
            }
            async fn write(&mut self, addr: u32, data: &[u8]) -> usize {
                self.0.write(addr, data).await
            }
        }

        let mut ram = StuckBit(MockRam::<1024>::new());
        let err = self_test(&mut ram).await.expect_err("stuck bit must be caught");
        assert!(matches!(err, SelfTestError::Mismatch { .. }));
    }

    #[tokio::test]
    async fn test_driver_read_wire_format() {
        // READ = 0x03 + 24-bit address, then data clocked in.
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x03, 0x00, 0x01, 0x00]),
            SpiTransaction::read_vec(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            SpiTransaction::transaction_end(),
        ];
        let spi = SpiMock::new(&expectations);
        let mut ram: Spi23lc1024<_, Identity> = Spi23lc1024::new(spi);

        let mut buf = [0u8; 4];
        let n = ram.read(0x100, &mut buf).await;
        assert_eq!(n, 4);
        assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF]);

        ram.release().done();
    }

    #[tokio::test]
    async fn test_driver_write_wire_format() {
        // WRITE = 0x02 + 24-bit address, then data clocked out.
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x02, 0x01, 0x00, 0x02]),
            SpiTransaction::write_vec(vec![0x55, 0xAA]),
            SpiTransaction::transaction_end(),
        ];
        let spi = SpiMock::new(&expectations);
        let mut ram: Spi23lc1024<_, Identity> = Spi23lc1024::new(spi);

        let n = ram.write(0x0001_0002, &[0x55, 0xAA]).await;
        assert_eq!(n, 2);

        ram.release().done();
    }

    #[tokio::test]
    async fn test_driver_swizzles_address_on_the_wire() {
        // 0x0001_0002 pin-swapped: even/odd bit pairs trade places.
        let wire = QioPinSwap::apply(0x0001_0002);
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![
                0x02,
                (wire >> 16) as u8,
                (wire >> 8) as u8,
                wire as u8,
            ]),
            SpiTransaction::write_vec(vec![0x42]),
            SpiTransaction::transaction_end(),
        ];
        let spi = SpiMock::new(&expectations);
        let mut ram: Spi23lc1024<_, QioPinSwap> = Spi23lc1024::new(spi);

        assert_eq!(ram.write(0x0001_0002, &[0x42]).await, 1);
        ram.release().done();
    }

    #[tokio::test]
    async fn test_driver_clamps_to_max_transfer() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x03, 0x00, 0x00, 0x00]),
            SpiTransaction::read_vec(vec![0u8; MAX_TRANSFER]),
            SpiTransaction::transaction_end(),
        ];
        let spi = SpiMock::new(&expectations);
        let mut ram: Spi23lc1024<_, Identity> = Spi23lc1024::new(spi);

        let mut buf = [0u8; 200];
        assert_eq!(ram.read(0, &mut buf).await, MAX_TRANSFER);
        ram.release().done();
    }
}
