//! Mock implementations for testing
//!
//! This module provides mock implementations of the platform traits
//! for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]
// Test support code: bounds are checked by clamp() and the fixtures are tiny.
#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use crate::audio::Dac;
use crate::spiram::{BlockRam, MAX_TRANSFER};

/// In-memory [`BlockRam`] with the real chip's transfer semantics.
///
/// Honors the 64-byte per-call clamp and can be configured to move even
/// fewer bytes per call, so callers' accumulation loops get exercised.
pub struct MockRam<const CAP: usize> {
    mem: [u8; CAP],
    transfer_limit: usize,
    reads: usize,
    writes: usize,
}

impl<const CAP: usize> Default for MockRam<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> MockRam<CAP> {
    /// Create a zero-filled mock RAM.
    pub fn new() -> Self {
        Self::with_transfer_limit(MAX_TRANSFER)
    }

    /// Create a mock RAM that moves at most `limit` bytes per call.
    ///
    /// `limit` is clamped to [`MAX_TRANSFER`]; 0 simulates a dead link.
    pub fn with_transfer_limit(limit: usize) -> Self {
        Self {
            mem: [0; CAP],
            transfer_limit: limit.min(MAX_TRANSFER),
            reads: 0,
            writes: 0,
        }
    }

    /// Number of physical read calls observed.
    pub fn read_calls(&self) -> usize {
        self.reads
    }

    /// Number of physical write calls observed.
    pub fn write_calls(&self) -> usize {
        self.writes
    }

    /// Direct view of the backing memory.
    pub fn contents(&self) -> &[u8] {
        &self.mem
    }

    fn clamp(&self, addr: u32, requested: usize) -> usize {
        let addr = addr as usize;
        if addr >= CAP {
            return 0;
        }
        requested.min(self.transfer_limit).min(CAP - addr)
    }
}

impl<const CAP: usize> BlockRam for MockRam<CAP> {
    fn capacity(&self) -> usize {
        CAP
    }

    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> usize {
        self.reads += 1;
        let n = self.clamp(addr, buf.len());
        let addr = addr as usize;
        buf[..n].copy_from_slice(&self.mem[addr..addr + n]);
        n
    }

    async fn write(&mut self, addr: u32, data: &[u8]) -> usize {
        self.writes += 1;
        let n = self.clamp(addr, data.len());
        let addr = addr as usize;
        self.mem[addr..addr + n].copy_from_slice(&data[..n]);
        n
    }
}

/// Mock DAC recording every control-plane call.
#[derive(Default)]
pub struct MockDac {
    init_calls: usize,
    sample_rates: heapless::Vec<u32, 16>,
    volumes: heapless::Vec<u8, 16>,
}

impl MockDac {
    /// Create a mock DAC.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of init calls observed.
    pub fn init_calls(&self) -> usize {
        self.init_calls
    }

    /// Sample rates programmed, in order.
    pub fn sample_rates(&self) -> &[u32] {
        &self.sample_rates
    }

    /// Volumes programmed, in order.
    pub fn volumes(&self) -> &[u8] {
        &self.volumes
    }
}

impl Dac for MockDac {
    type Error = core::convert::Infallible;

    async fn init(&mut self) -> Result<(), Self::Error> {
        self.init_calls += 1;
        Ok(())
    }

    async fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), Self::Error> {
        let _ = self.sample_rates.push(sample_rate);
        Ok(())
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), Self::Error> {
        let _ = self.volumes.push(volume);
        Ok(())
    }
}
