//! Network-radio firmware: main entry point.
//!
//! Hardware-only entry point for STM32H743ZI (Nucleo-H743ZI pinout).

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_net::{Stack, StackResources};
use embassy_stm32::bind_interrupts;
use embassy_stm32::eth::generic_smi::GenericSMI;
use embassy_stm32::eth::{Ethernet, PacketQueue};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals;
use embassy_stm32::sai::{self, split_subblocks, Sai};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz;
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use static_cell::StaticCell;

use platform::wm8731::Wm8731;
use platform::{BlockRam, Dac, Spi23lc1024};
use playback::Fifo;

use firmware::audio_out::{OUTPUT_RING, SLOT_SAMPLES};
use firmware::net::EthernetNetwork;
use firmware::tasks::{self, BoardRam, Device, Keys};

// Panic handler + RTT log transport
use defmt_rtt as _;
use panic_probe as _;

bind_interrupts!(struct Irqs {
    ETH => embassy_stm32::eth::InterruptHandler;
    I2C1_EV => embassy_stm32::i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => embassy_stm32::i2c::ErrorInterruptHandler<peripherals::I2C1>;
});

/// SAI DMA ring, sized for two worst-case MP3 frames of slack.
const SAI_RING_SAMPLES: usize = SLOT_SAMPLES * 2;

// SAI DMA ring in AXI SRAM (DMA1-reachable; DTCM is not).
#[link_section = ".axisram"]
static SAI_RING: StaticCell<[u16; SAI_RING_SAMPLES]> = StaticCell::new();

static FIFO: StaticCell<Fifo<BoardRam>> = StaticCell::new();
static PACKETS: StaticCell<PacketQueue<4, 4>> = StaticCell::new();
static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static STACK: StaticCell<Stack<Device>> = StaticCell::new();
static NETWORK: StaticCell<EthernetNetwork<Device>> = StaticCell::new();

/// Clock tree configuration.
///
/// Everything hangs off PLL1 fed by the 8 MHz ST-LINK HSE (bypass):
///   - VCO = 8 MHz × 96 = 768 MHz
///   - DIVP = 2 → 384 MHz sysclk
///   - DIVQ = 64 → 12.000 MHz SAI1 kernel clock, passed straight through
///     as MCLK for the WM8731's USB-mode clocking (12 MHz exactly).
fn build_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::*;
    let mut config = embassy_stm32::Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(8_000_000),
        mode: HseMode::Bypass,
    });
    config.rcc.pll1 = Some(Pll {
        source: PllSource::HSE,
        prediv: PllPreDiv::DIV1,
        mul: PllMul::MUL96,
        divp: Some(PllDiv::DIV2),
        divq: Some(PllDiv::DIV64),
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P; // 384 MHz
    config.rcc.ahb_pre = AHBPrescaler::DIV2; // 192 MHz
    config.rcc.apb1_pre = APBPrescaler::DIV2; // 96 MHz
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    config.rcc.apb3_pre = APBPrescaler::DIV2;
    config.rcc.apb4_pre = APBPrescaler::DIV2;
    config.rcc.voltage_scale = VoltageScale::Scale1;
    config
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("network radio v{=str}", env!("CARGO_PKG_VERSION"));
    let p = embassy_stm32::init(build_config());

    // Step 1: external SPI RAM (23LC1024 on SPI2) and its boot self-test.
    //
    // The self-test writes two 64-byte patterns plus sub-word probes and
    // reads them back. A wiring or power fault here means the stream FIFO
    // would silently corrupt audio, so a failure halts boot.
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = Hertz(20_000_000); // 23LC1024 max SCK
    let spi = Spi::new(
        p.SPI2, p.PB10, p.PB15, p.PB14, p.DMA1_CH0, p.DMA1_CH1, spi_config,
    );
    let cs = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let Ok(ram_bus) = ExclusiveDevice::new(spi, cs, Delay) else {
        defmt::panic!("spi ram chip-select init failed"); // CS is Infallible
    };
    let mut ram = Spi23lc1024::new(ram_bus);
    if platform::spiram::self_test(&mut ram).await.is_err() {
        defmt::panic!("spi ram self-test failed");
    }
    defmt::info!("spi ram ok: {=usize} B stream buffer", ram.capacity());
    let fifo: &'static Fifo<BoardRam> = FIFO.init(Fifo::new(ram));

    // Step 2: Ethernet MAC + embassy-net stack, address via DHCP.
    //
    // RMII pinout (Nucleo-H743ZI on-board LAN8742A):
    //   PA1 REF_CLK, PA2 MDIO, PC1 MDC, PA7 CRS_DV,
    //   PC4/PC5 RXD0/1, PG13/PB13 TXD0/1, PG11 TX_EN
    let mac_addr = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01]; // locally administered
    let device = Ethernet::new(
        PACKETS.init(PacketQueue::new()),
        p.ETH,
        Irqs,
        p.PA1,
        p.PA2,
        p.PC1,
        p.PA7,
        p.PC4,
        p.PC5,
        p.PG13,
        p.PB13,
        p.PG11,
        GenericSMI::new(0),
        mac_addr,
    );
    // No RNG peripheral is wired up; a fixed seed only weakens TCP initial
    // sequence numbers, which this appliance does not rely on.
    let seed = 0x6e65_745f_7261_6469;
    let stack: &'static Stack<Device> = STACK.init(Stack::new(
        device,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    ));
    spawner.must_spawn(tasks::net_task(stack));
    defmt::info!("waiting for DHCP");
    stack.wait_config_up().await;
    defmt::info!("network up");

    // Step 3: SAI1 Block A as I2S master with 12 MHz MCLK out.
    //   PE2 MCLK, PE4 FS, PE5 SCK, PE6 SD (see audio_out for the layout)
    let (sub_block_a, _sub_block_b) = split_subblocks(p.SAI1);
    let mut sai_config = sai::Config::default();
    sai_config.mode = sai::Mode::Master;
    sai_config.tx_rx = sai::TxRx::Transmitter;
    sai_config.data_size = sai::DataSize::Data16;
    sai_config.stereo_mono = sai::StereoMono::Stereo;
    // Kernel clock is already 12 MHz (PLL1Q), pass it through as MCLK.
    sai_config.master_clock_divider = sai::MasterClockDivider::Div1;
    let sai = Sai::new_asynchronous_with_mclk(
        sub_block_a,
        p.PE5,
        p.PE6,
        p.PE4,
        p.PE2,
        p.DMA1_CH2,
        SAI_RING.init([0; SAI_RING_SAMPLES]),
        sai_config,
    );

    // Step 4: WM8731 codec on I2C1 (PB8 SCL / PB9 SDA), USB-mode clocking.
    let i2c = I2c::new(
        p.I2C1,
        p.PB8,
        p.PB9,
        Irqs,
        p.DMA1_CH4,
        p.DMA1_CH5,
        Hertz(100_000),
        Default::default(),
    );
    let mut dac = Wm8731::new(i2c);
    if dac.init().await.is_err() {
        defmt::panic!("wm8731 init failed");
    }
    defmt::info!("codec up");

    // Step 5: front-panel keys, active low on PE7..PE10.
    let keys = Keys {
        play_pause: ExtiInput::new(Input::new(p.PE7, Pull::Up), p.EXTI7),
        next: ExtiInput::new(Input::new(p.PE8, Pull::Up), p.EXTI8),
        vol_up: ExtiInput::new(Input::new(p.PE9, Pull::Up), p.EXTI9),
        vol_down: ExtiInput::new(Input::new(p.PE10, Pull::Up), p.EXTI10),
    };

    // Step 6: spawn the pipeline. Slot ring must be seeded before the
    // decode task can acquire a buffer.
    OUTPUT_RING.seed();
    let network = NETWORK.init(EthernetNetwork::new(stack));
    spawner.must_spawn(firmware::audio_out::output_task(sai, dac));
    spawner.must_spawn(tasks::decode_task(fifo));
    spawner.must_spawn(tasks::stream_task(network, fifo));
    spawner.must_spawn(tasks::status_task(fifo));
    spawner.must_spawn(tasks::control_task(keys));
    defmt::info!("boot complete");
}
