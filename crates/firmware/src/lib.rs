//! Network-radio appliance firmware
//!
//! Ties the layers together on STM32H7: Ethernet + embassy-net carry the
//! Icecast session, the 23LC1024 SPI RAM buffers the compressed stream,
//! nanomp3 decodes it, and the SAI peripheral clocks PCM out to a WM8731
//! codec via DMA.
//!
//! # Tasks
//!
//! ```text
//! stream task  - stream::run()        network → FIFO, metadata events
//! decode task  - playback::DecodePump FIFO → PCM slot ring
//! output task  - SAI DMA feed         slot ring → I2S
//! status task  - 1 Hz log line        fill level, throughput, underruns
//! control task - front-panel keys     play/pause, station, volume
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32H7 target (embassy, embedded HAL)
//! - `std` - Enable standard library (for testing)
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
#![allow(clippy::doc_markdown)] // chip and signal names read better unticked
#![allow(clippy::module_name_repetitions)]

pub mod player;
pub mod stations;

#[cfg(feature = "hardware")]
pub mod audio_out;
#[cfg(feature = "hardware")]
pub mod net;
#[cfg(feature = "hardware")]
pub mod tasks;

/// DMA slot count for the PCM output ring.
///
/// Two slots are the minimum for ping-pong; four absorb decode jitter
/// when the stream task hogs the SPI bus refilling the FIFO.
pub const PCM_SLOTS: usize = 4;
