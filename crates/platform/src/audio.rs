//! Audio DAC abstraction

/// Audio DAC control trait.
///
/// Sample delivery is not part of this trait: PCM reaches the DAC through
/// the I2S/DMA slot ring, and this trait only covers the control-plane
/// writes (codec init, sample rate, volume) that travel over I2C.
pub trait Dac {
    /// Error type
    type Error: core::fmt::Debug;

    /// Initialize the codec into its playback configuration.
    async fn init(&mut self) -> Result<(), Self::Error>;

    /// Reconfigure the codec sample rate.
    ///
    /// Called when a decoded frame announces a rate different from the
    /// one currently programmed.
    async fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), Self::Error>;

    /// Set headphone output volume.
    ///
    /// The scale is codec-native; see the concrete driver for the mapping.
    async fn set_volume(&mut self, volume: u8) -> Result<(), Self::Error>;
}
