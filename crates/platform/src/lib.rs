//! Hardware Abstraction Layer (HAL) for the network-radio appliance
//!
//! This crate provides trait-based abstractions for the hardware the
//! streaming pipeline touches, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate)
//!         ↓
//! Feature Layers (stream, playback)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC)
//! ```
//!
//! # Abstractions
//!
//! - [`BlockRam`] - external SPI RAM with bounded per-call transfers,
//!   the backing store of the stream FIFO
//! - [`Dac`] - audio DAC control (sample rate, volume)
//! - [`spiram::AddressTransform`] - pluggable address mangling for wiring
//!   quirks at the RAM boundary
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing)
//! - `hardware`: Physical hardware implementations
//! - `defmt`: Enable defmt logging

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and chip names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors; callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod audio;
#[cfg(any(test, feature = "std"))]
pub mod mocks;
pub mod spiram;
pub mod wm8731;

// Re-export main traits
pub use audio::Dac;
pub use spiram::{AddressTransform, BlockRam, Identity, QioPinSwap, SelfTestError, Spi23lc1024};
