//! Task bodies and the shared statics that wire them together.
//!
//! Everything here runs on the single thread-mode executor. The tasks meet
//! only through the statics below; no task holds a reference into another.
//!
//! ```text
//! control_task ──PlayerAction──▶ COMMANDS ──▶ stream_task ──▶ FIFO
//!       │                                                       │
//!       └──────────▶ VOLUME ──▶ output_task ◀── slots ◀── decode_task
//! ```
//!
//! Station switching is a future cancellation, not a protocol: `stream_task`
//! `select`s the live session against the command channel, so a new command
//! simply drops the socket mid-read. The [`StopToken`] plumbing in the
//! stream and playback crates exists for orderly shutdown paths and is not
//! requested from here.

use embassy_futures::select::{select, Either};
use embassy_net::Stack;
use embassy_stm32::eth::generic_smi::GenericSMI;
use embassy_stm32::eth::Ethernet;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH1, DMA1_CH4, DMA1_CH5, ETH, I2C1, SPI2};
use embassy_stm32::spi::Spi;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Delay, Duration, Ticker, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;

use platform::wm8731::Wm8731;
use platform::Spi23lc1024;
use playback::{DecodePump, Fifo, Mp3Decoder, StopToken};
use stream::{MetadataKind, StopReason, StreamError, StreamStats};

use crate::audio_out::SlotSink;
use crate::net::EthernetNetwork;
use crate::stations::Station;

/// SPI bus carrying the 23LC1024 stream buffer.
pub type RamSpi = Spi<'static, SPI2, DMA1_CH0, DMA1_CH1>;

/// The external SPI RAM behind an exclusive-bus device (it is the only
/// peripheral on SPI2, so no bus mutex is needed).
pub type BoardRam = Spi23lc1024<ExclusiveDevice<RamSpi, Output<'static, AnyPin>, Delay>>;

/// The WM8731 codec on I2C1 (PB8 SCL / PB9 SDA).
pub type BoardDac = Wm8731<I2c<'static, I2C1, DMA1_CH4, DMA1_CH5>>;

/// Ethernet MAC + RMII PHY, the embassy-net link device.
pub type Device = Ethernet<'static, ETH, GenericSMI>;

/// Playback commands from the control task to the stream task.
pub enum StreamCommand {
    /// Connect to this station, dropping any live session first.
    Play(&'static Station),
    /// Drop the live session and go idle.
    Stop,
}

/// Control → stream command queue. Depth 4 absorbs a burst of key presses
/// while the stream task is inside a reconnect backoff.
pub static COMMANDS: Channel<CriticalSectionRawMutex, StreamCommand, 4> = Channel::new();

/// Latest requested codec volume; the output task applies it between blocks.
/// A `Signal` (not a channel) because only the newest value matters.
pub static VOLUME: Signal<CriticalSectionRawMutex, u8> = Signal::new();

/// Bytes-per-second accounting shared by the stream and status tasks.
pub static STREAM_STATS: StreamStats = StreamStats::new();

/// Shutdown token for the decode pump. Never requested in normal operation.
static PUMP_STOP: StopToken = StopToken::new();

/// Shutdown token handed to stream sessions. Never requested in normal
/// operation; station changes cancel the session future instead.
static STREAM_STOP: StopToken = StopToken::new();

/// How long to wait before redialing after a dropped or finished stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Backoff after a protocol-level failure (bad status line, DNS miss).
/// Longer than [`RECONNECT_DELAY`] so a misconfigured preset does not
/// hammer the server.
const FAILURE_DELAY: Duration = Duration::from_secs(5);

/// embassy-net stack runner.
#[embassy_executor::task]
pub async fn net_task(stack: &'static Stack<Device>) -> ! {
    stack.run().await
}

/// Logs stream lifecycle and song metadata to the console.
struct LogEvents;

impl stream::StreamEvents for LogEvents {
    fn stream_up(&mut self) {
        defmt::info!("stream up");
    }

    fn metadata(&mut self, kind: MetadataKind, text: &str) {
        match kind {
            MetadataKind::Artist => defmt::info!("artist: {=str}", text),
            MetadataKind::Title => defmt::info!("title:  {=str}", text),
        }
    }
}

/// Icecast session task: one live HTTP stream at a time, feeding the FIFO.
///
/// Idle until a [`StreamCommand::Play`] arrives, then loops the session:
/// a command received mid-session cancels the `stream::run` future (the
/// socket drops with it), a dropped connection redials the same station
/// after a short backoff.
#[embassy_executor::task]
pub async fn stream_task(
    net: &'static mut EthernetNetwork<Device>,
    fifo: &'static Fifo<BoardRam>,
) -> ! {
    let mut events = LogEvents;
    loop {
        let mut station = loop {
            match COMMANDS.receive().await {
                StreamCommand::Play(station) => break station,
                StreamCommand::Stop => {}
            }
        };

        'session: loop {
            // Stale compressed audio from the previous station or session
            // must not reach the decoder.
            fifo.clear().await;
            defmt::info!("tuning {=str} ({=str}:{=u16})", station.name, station.host, station.port);

            let session = stream::run(
                &mut *net,
                station.host,
                station.port,
                station.path,
                fifo,
                &mut events,
                &STREAM_STATS,
                &STREAM_STOP,
            );
            match select(session, COMMANDS.receive()).await {
                Either::First(outcome) => match outcome {
                    Ok(StopReason::EndOfStream) => {
                        defmt::info!("stream ended, redialing");
                        Timer::after(RECONNECT_DELAY).await;
                    }
                    Ok(StopReason::SocketError) => {
                        defmt::warn!("stream dropped, redialing");
                        Timer::after(RECONNECT_DELAY).await;
                    }
                    Ok(StopReason::Requested) => break 'session,
                    Err(StreamError::Connect(_)) => {
                        defmt::warn!("connect failed");
                        Timer::after(FAILURE_DELAY).await;
                    }
                    Err(StreamError::Socket) => {
                        defmt::warn!("socket error before stream start");
                        Timer::after(FAILURE_DELAY).await;
                    }
                    Err(StreamError::Protocol(_)) => {
                        defmt::warn!("bad server response");
                        Timer::after(FAILURE_DELAY).await;
                    }
                },
                Either::Second(command) => match command {
                    StreamCommand::Play(next) => station = next,
                    StreamCommand::Stop => break 'session,
                },
            }
        }
    }
}

/// Decode task: drains the FIFO through the MP3 decoder into the slot ring.
///
/// Runs unconditionally; when the stream task is idle the FIFO is empty and
/// the pump parks inside `dequeue`. A station switch splices the byte
/// stream mid-frame, which the pump absorbs as a short resync.
#[embassy_executor::task]
pub async fn decode_task(fifo: &'static Fifo<BoardRam>) -> ! {
    let mut pump = DecodePump::new(Mp3Decoder::new());
    let mut sink = SlotSink;
    loop {
        pump.run(fifo, &mut sink, &PUMP_STOP).await;
        PUMP_STOP.rearm();
    }
}

/// 1 Hz console status line: FIFO fill, network throughput, underruns.
#[embassy_executor::task]
pub async fn status_task(fifo: &'static Fifo<BoardRam>) -> ! {
    let mut ticker = Ticker::every(Duration::from_secs(1));
    loop {
        ticker.next().await;
        let fill = fifo.fill().await;
        let bytes = STREAM_STATS.bytes_get_and_reset();
        let underruns = crate::audio_out::OUTPUT_RING.underruns_get_and_reset();
        defmt::info!(
            "fifo {=usize}/{=usize} B | net {=u32} B/s | underruns {=u32}",
            fill,
            fifo.capacity(),
            bytes,
            underruns
        );
    }
}

/// Front-panel keys, active low with internal pull-ups, EXTI driven.
pub struct Keys {
    /// Toggles playback of the current preset.
    pub play_pause: embassy_stm32::exti::ExtiInput<'static, embassy_stm32::peripherals::PE7>,
    /// Steps to the next preset (wraps).
    pub next: embassy_stm32::exti::ExtiInput<'static, embassy_stm32::peripherals::PE8>,
    /// One volume step up.
    pub vol_up: embassy_stm32::exti::ExtiInput<'static, embassy_stm32::peripherals::PE9>,
    /// One volume step down.
    pub vol_down: embassy_stm32::exti::ExtiInput<'static, embassy_stm32::peripherals::PE10>,
}

/// Debounce hold-off after an accepted edge.
const DEBOUNCE: Duration = Duration::from_millis(30);

/// Routes one player decision to the task that acts on it.
async fn dispatch(action: crate::player::PlayerAction) {
    use crate::player::PlayerAction;
    match action {
        // A Play command interrupts any live session, so Start and Restart
        // land on the same wire.
        PlayerAction::Start(station) | PlayerAction::Restart(station) => {
            COMMANDS.send(StreamCommand::Play(station)).await;
        }
        PlayerAction::Stop => COMMANDS.send(StreamCommand::Stop).await,
        PlayerAction::Volume(volume) => VOLUME.signal(volume),
    }
}

/// Key input task: owns the [`Player`](crate::player::Player) state machine.
///
/// Starts the first preset on boot (the appliance has no screen; powering
/// on means listening), then maps key edges to player decisions.
#[embassy_executor::task]
pub async fn control_task(mut keys: Keys) -> ! {
    use embassy_futures::select::{select4, Either4};

    let mut player = crate::player::Player::new();

    // Power-on: volume to the saved default, first preset playing.
    VOLUME.signal(player.volume());
    dispatch(player.play_pause()).await;

    loop {
        let action = match select4(
            keys.play_pause.wait_for_falling_edge(),
            keys.next.wait_for_falling_edge(),
            keys.vol_up.wait_for_falling_edge(),
            keys.vol_down.wait_for_falling_edge(),
        )
        .await
        {
            Either4::First(()) => player.play_pause(),
            Either4::Second(()) => player.next_station(),
            Either4::Third(()) => player.volume_up(),
            Either4::Fourth(()) => player.volume_down(),
        };
        dispatch(action).await;
        Timer::after(DEBOUNCE).await;
    }
}
