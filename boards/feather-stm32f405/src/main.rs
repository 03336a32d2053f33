#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3, UART4])]
mod app {
    use defmt::{info, trace, warn};
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
    use embassy_stm32::i2c::{self, I2c};
    use embassy_stm32::mode::Async;
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::time::Hertz;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_time::{Delay, Duration, Instant};
    use static_cell::StaticCell;

    use pulse_logger_core::indicator::StatusIndicator;
    use pulse_logger_core::{run_status_indicator, Node, NodeConfig};

    type PulseNode = Node<CriticalSectionRawMutex, I2c<'static, Async>, Delay>;
    type Indicator = StatusIndicator<Input<'static>, Output<'static>>;

    embassy_stm32::bind_interrupts!(struct I2cIrqs {
        I2C1_EV => i2c::EventInterruptHandler<peripherals::I2C1>;
        I2C1_ER => i2c::ErrorInterruptHandler<peripherals::I2C1>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        pulse: ExtiInput<'static>,
        indicator: Indicator,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Pulse logger starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        // HSE (12 MHz) / PREDIV(6) = 2 MHz, * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK), APB1 = 42 MHz feeds I2C1
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1;
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2;
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1;

        let p = embassy_stm32::init(config);
        info!("System initialized: SYSCLK=84MHz");

        // DS1307 and AT24C32 share I2C1 on the Feather's SCL/SDA pads
        let i2c = I2c::new(
            p.I2C1,
            p.PB6,
            p.PB7,
            I2cIrqs,
            p.DMA1_CH6,
            p.DMA1_CH0,
            i2c::Config::default(),
        );

        let node_config = NodeConfig::default();
        static NODE: StaticCell<PulseNode> = StaticCell::new();
        let node: &'static PulseNode = NODE.init(Node::new(node_config, i2c, Delay));

        let pulse = ExtiInput::new(p.PC2, p.EXTI2, Pull::Down);
        let indicator = StatusIndicator::new(
            Input::new(p.PB8, Pull::Up),
            Output::new(p.PC1, Level::Low, Speed::Low),
        );

        startup::spawn(node).ok();

        (Shared {}, Local { pulse, indicator })
    }

    /// Bring up the clock and the log, then start the node's tasks
    #[task(priority = 3)]
    async fn startup(_cx: startup::Context, node: &'static PulseNode) {
        match node.start().await {
            Ok(cursor) => info!("Log initialized, cursor {}", cursor),
            Err(e) => warn!("Log init failed: {:?}", e),
        }
        info!("Config: {}", node.config());

        clock_refresh::spawn(node).ok();
        event_logger::spawn(node).ok();
        status_indicator::spawn(node.config().indicator_poll).ok();
        pulse_edge::spawn(node).ok();
    }

    /// Pulse input edge handler, preempts every other task
    ///
    /// Only timestamps the edge and raises the pending flag.
    #[task(priority = 4, local = [pulse])]
    async fn pulse_edge(cx: pulse_edge::Context, node: &'static PulseNode) -> ! {
        loop {
            cx.local.pulse.wait_for_rising_edge().await;
            if !node.events.on_edge(Instant::now()) {
                trace!("pulse edge debounced");
            }
        }
    }

    #[task(priority = 3)]
    async fn event_logger(_cx: event_logger::Context, node: &'static PulseNode) -> ! {
        node.run_event_logger().await
    }

    #[task(priority = 2)]
    async fn clock_refresh(_cx: clock_refresh::Context, node: &'static PulseNode) -> ! {
        node.run_clock_refresh().await
    }

    #[task(priority = 1, local = [indicator])]
    async fn status_indicator(cx: status_indicator::Context, period: Duration) -> ! {
        info!("Status indicator task started");
        run_status_indicator(cx.local.indicator, period).await
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
