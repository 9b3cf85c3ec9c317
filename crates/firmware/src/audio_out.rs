//! PCM slot buffers and the SAI output task.
//!
//! # Hardware: SAI1 Block A (master), 16-bit I2S, WM8731 codec in USB mode
//!
//! ## SAI1 Pin Assignments (STM32H743ZI LQFP-144)
//!   - PE2  → SAI1_MCLK_A  (12 MHz to the WM8731 CLKIN, USB mode)
//!   - PE4  → SAI1_FS_A    (frame sync / L-R clock)
//!   - PE5  → SAI1_SCK_A   (bit clock)
//!   - PE6  → SAI1_SD_A    (serial data out)
//!
//! ## Slot ownership
//!
//! The PCM slot buffers live in AXI SRAM (DMA1-reachable; DTCM is not).
//! A slot index is owned by exactly one side at a time:
//!
//! ```text
//! OUTPUT_RING (free) → decode task fills PCM_SLOTS[i] → FILLED queue
//!        ↑                                                   ↓
//!        └────────── output task after the DMA write ────────┘
//! ```
//!
//! The `static mut` array is sound under that discipline: an index never
//! sits in both queues, so no two tasks alias the same slot.

use embassy_stm32::peripherals::SAI1;
use embassy_stm32::sai::Sai;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use platform::audio::Dac;
use playback::decoder::{PcmFrame, MAX_SAMPLES_PER_FRAME};
use playback::output::OutputRing;
use playback::pump::PcmSink;

use crate::PCM_SLOTS;

/// Interleaved samples per slot: one worst-case MP3 frame.
pub const SLOT_SAMPLES: usize = MAX_SAMPLES_PER_FRAME;

// PCM slot storage in AXI SRAM (large buffer region, DMA1-accessible).
#[link_section = ".axisram"]
static mut PCM_SLOT_MEM: [[i16; SLOT_SAMPLES]; PCM_SLOTS] = [[0; SLOT_SAMPLES]; PCM_SLOTS];

/// Free-slot ring shared between the decode and output tasks.
pub static OUTPUT_RING: OutputRing<PCM_SLOTS> = OutputRing::new();

struct FilledSlot {
    slot: u8,
    samples: usize,
    sample_rate: u32,
}

/// Slots carrying decoded PCM, in decode order.
static FILLED: Channel<CriticalSectionRawMutex, FilledSlot, PCM_SLOTS> = Channel::new();

/// Exclusive view of one slot's buffer.
///
/// # Safety
///
/// The caller must hold the slot index from exactly one of the two queues
/// (see the module doc); `slot` must be < [`PCM_SLOTS`].
#[allow(clippy::mut_from_ref)] // free fn, no ref: exclusive access via queue ownership
unsafe fn slot_buffer(slot: u8) -> &'static mut [i16; SLOT_SAMPLES] {
    // SAFETY: queue ownership (documented above) guarantees no aliasing;
    // the index is produced only by seed()/release paths that keep it in
    // range.
    unsafe {
        let slots = &mut *core::ptr::addr_of_mut!(PCM_SLOT_MEM);
        slots.get_mut(usize::from(slot) % PCM_SLOTS).unwrap_unchecked()
    }
}

/// `PcmSink` writing decoded frames into the slot ring.
///
/// Backpressure: `commit` parks on the free ring when the output task is
/// behind, which in turn parks the decode pump, exactly the cadence the
/// DMA consumes at.
pub struct SlotSink;

impl PcmSink for SlotSink {
    async fn commit(&mut self, frame: &PcmFrame) {
        let slot = OUTPUT_RING.acquire().await;
        let samples = frame.interleaved();
        let n = samples.len().min(SLOT_SAMPLES);
        // SAFETY: `slot` was just acquired from the free ring.
        let buf = unsafe { slot_buffer(slot) };
        #[allow(clippy::indexing_slicing)] // n clamped to both lengths
        buf[..n].copy_from_slice(&samples[..n]);
        FILLED
            .send(FilledSlot {
                slot,
                samples: n,
                sample_rate: frame.sample_rate,
            })
            .await;
    }
}

/// SAI feed task: filled slots out of the queue, PCM into the DMA ring.
///
/// `Sai::write` returns when the DMA has taken the block, so releasing
/// the slot afterwards is the transfer-complete path. An empty queue at
/// that moment is an underrun: a silence block goes out instead so the
/// codec keeps clocking, and the counter is bumped for the status line.
#[embassy_executor::task]
pub async fn output_task(mut sai: Sai<'static, SAI1, u16>, mut dac: super::tasks::BoardDac) {
    // Short silence block; bounds how stale the ring can get while idle.
    static SILENCE: [i16; 256] = [0; 256];
    let mut current_rate = 0u32;

    loop {
        if let Some(volume) = super::tasks::VOLUME.try_take() {
            if dac.set_volume(volume).await.is_err() {
                defmt::warn!("codec volume write failed");
            }
        }
        match FILLED.try_receive() {
            Ok(filled) => {
                if filled.sample_rate != current_rate && filled.sample_rate != 0 {
                    match dac.set_sample_rate(filled.sample_rate).await {
                        Ok(()) => current_rate = filled.sample_rate,
                        Err(_) => defmt::warn!("codec rate change failed"),
                    }
                }
                // SAFETY: `filled.slot` came out of the FILLED queue.
                let buf = unsafe { slot_buffer(filled.slot) };
                #[allow(clippy::indexing_slicing)] // samples <= SLOT_SAMPLES by commit
                if sai.write(&buf[..filled.samples]).await.is_err() {
                    defmt::warn!("sai write error");
                }
                OUTPUT_RING.release_from_isr(filled.slot);
            }
            Err(_) => {
                // Only an underrun once playback has started; before that
                // the silence feed is just keeping the codec clocked.
                if current_rate != 0 {
                    OUTPUT_RING.note_underrun();
                }
                if sai.write(&SILENCE).await.is_err() {
                    defmt::warn!("sai write error");
                }
            }
        }
    }
}
