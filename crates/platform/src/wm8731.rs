//! WM8731 audio codec register addresses and constants.
//!
//! Reference: Wolfson WM8731 datasheet Rev 4.9, Register Map (p. 46).
//!
//! The WM8731 is a stereo codec with an I2C control port (7-bit device
//! address 0x1A with CSB low). Control writes are 16-bit words: bits 15:9
//! carry the 7-bit register address, bits 8:0 the 9-bit register value,
//! sent MSB-first as two bytes.

use crate::audio::Dac;

/// 7-bit I2C device address when the CSB pin is pulled low.
pub const WM8731_I2C_ADDR: u8 = 0x1A;

/// Register 0x02: Left headphone out (bit 8 = LRHPBOTH, mirror to right).
pub const REG_LHPOUT: u8 = 0x02;
/// Register 0x04: Analogue audio path control.
pub const REG_ANALOG_PATH: u8 = 0x04;
/// Register 0x05: Digital audio path control.
pub const REG_DIGITAL_PATH: u8 = 0x05;
/// Register 0x06: Power down control.
pub const REG_POWER_DOWN: u8 = 0x06;
/// Register 0x07: Digital audio interface format.
pub const REG_IFACE_FORMAT: u8 = 0x07;
/// Register 0x08: Sampling control (USB/normal mode, BOSR, SR[3:0]).
pub const REG_SAMPLING: u8 = 0x08;
/// Register 0x09: Active control (bit 0 activates the digital interface).
pub const REG_ACTIVE: u8 = 0x09;
/// Register 0x0F: Reset (writing 0 resets the device).
pub const REG_RESET: u8 = 0x0F;

/// Headphone volume for 0 dB output (1 dB steps).
pub const VOL_0DB: u8 = 0x79;
/// Minimum headphone volume (-73 dB); anything below mutes.
pub const VOL_MIN: u8 = 0x30;
/// Maximum headphone volume (+6 dB).
pub const VOL_MAX: u8 = 0x7F;

/// WM8731 driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wm8731Error<E> {
    /// I2C bus error.
    Bus(E),
    /// Sample rate has no USB-mode divider on this part.
    UnsupportedRate(u32),
}

/// WM8731 codec on an async I2C bus.
pub struct Wm8731<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C> Wm8731<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    /// Wrap an I2C bus at the default device address (CSB low).
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            addr: WM8731_I2C_ADDR,
        }
    }

    /// Release the underlying I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Write a 9-bit value to a 7-bit control register.
    async fn write_register(&mut self, reg: u8, value: u16) -> Result<(), Wm8731Error<I2C::Error>> {
        #[allow(clippy::cast_possible_truncation)] // low byte extraction
        let bytes = [(reg << 1) | ((value >> 8) as u8 & 0x01), value as u8];
        self.i2c
            .write(self.addr, &bytes)
            .await
            .map_err(Wm8731Error::Bus)
    }
}

impl<I2C> Dac for Wm8731<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    type Error = Wm8731Error<I2C::Error>;

    /// Initialize for I2S 16-bit playback.
    ///
    /// Startup sequence (interface activated last):
    /// 1. REG_RESET = 0: reset the device
    /// 2. REG_POWER_DOWN = 0x07: power up DAC and outputs, line/mic/ADC stay down
    /// 3. REG_ANALOG_PATH = 0x12: DAC selected, microphone muted
    /// 4. REG_DIGITAL_PATH = 0x00: DAC soft mute off
    /// 5. REG_IFACE_FORMAT = 0x02: I2S, 16-bit
    /// 6. REG_SAMPLING: 48 kHz USB mode
    /// 7. REG_ACTIVE = 1: activate the digital interface
    async fn init(&mut self) -> Result<(), Self::Error> {
        self.write_register(REG_RESET, 0x000).await?;
        self.write_register(REG_POWER_DOWN, 0x007).await?;
        self.write_register(REG_ANALOG_PATH, 0x012).await?;
        self.write_register(REG_DIGITAL_PATH, 0x000).await?;
        self.write_register(REG_IFACE_FORMAT, 0x002).await?;
        self.set_sample_rate(48_000).await?;
        self.write_register(REG_ACTIVE, 0x001).await
    }

    /// Program the sampling control register.
    ///
    /// USB mode (12 MHz MCLK): 48 kHz uses BOSR=0 SR=0x0, 44.1 kHz uses
    /// BOSR=1 SR=0x8. Other rates are rejected.
    async fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), Self::Error> {
        let value = match sample_rate {
            48_000 => 0x001,
            44_100 => 0x023,
            other => return Err(Wm8731Error::UnsupportedRate(other)),
        };
        self.write_register(REG_SAMPLING, value).await
    }

    /// Set headphone volume on both channels (bit 8 = LRHPBOTH).
    ///
    /// 1 dB steps: [`VOL_0DB`] (0x79) is 0 dB, below [`VOL_MIN`] mutes,
    /// values above [`VOL_MAX`] are clamped.
    async fn set_volume(&mut self, volume: u8) -> Result<(), Self::Error> {
        let volume = volume.min(VOL_MAX);
        self.write_register(REG_LHPOUT, 0x100 | u16::from(volume))
            .await
    }
}
