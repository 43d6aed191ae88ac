mod config;
mod screens;
mod utils;

use std::env::var;
use dotenv::dotenv;
use log::{debug, info};
use microwave_gpio::GpioDriver;
use microwave_gpio::delay::SpinDelay;
use microwave_gpio::gpiod::GpiodDriver;
use microwave_gpio::lcd::hd44780::bus::{ClcdPins, GpioClcdBus};
use microwave_gpio::lcd::hd44780::driver::{ClcdDriver, HD44780Driver};
use microwave_gpio::lcd::hd44780::sim::Simulator;
use microwave_gpio::raw::RawGpioDriver;
use sysinfo::System;
use crate::config::Config;
use crate::screens::Screens;
use crate::utils::{parse_pin_bus, Backend};

fn pins_from_env() -> eyre::Result<ClcdPins> {
    let pins = ClcdPins {
        rs: var("MICROWAVE_LCD_PIN_RS")?.parse()?,
        e: var("MICROWAVE_LCD_PIN_E")?.parse()?,
        data: parse_pin_bus(&var("MICROWAVE_LCD_PINS_DATA")?)?,
    };
    info!("LCD @ RS: {}, E: {}, Data: {:?}", pins.rs, pins.e, pins.data);
    Ok(pins)
}

/// Brings the display up and walks it through the screens the oven shows at start-up.
fn show_startup(lcd: &mut dyn HD44780Driver, config: &Config) -> eyre::Result<()> {
    debug!("Initializing LCD...");
    lcd.initialize_display()?;
    debug!("{:?} initialized.", lcd);

    let mut screens = Screens::new(lcd, config);
    screens.power_on_screen()?;
    screens.clear_screen()?;
    screens.display_menu_screen()?;

    info!("Menu displayed.");
    Ok(())
}

fn run_on<G: GpioDriver>(gpio: &G, config: &Config) -> eyre::Result<()> {
    debug!("{:?} initialized.", gpio);
    let pins = pins_from_env()?;
    let bus = GpioClcdBus::request(gpio, &pins)?;
    let mut lcd = ClcdDriver::new(bus, SpinDelay).with_timing(config.timing()?);
    show_startup(&mut lcd, config)
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!("Microwave starting...");
    info!(
        "System {} ({}), kernel {}, architecture {}",
        System::name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    config.validate()?;

    let backend: Backend = var("MICROWAVE_GPIO_BACKEND")
        .as_deref()
        .unwrap_or("gpiomem")
        .parse()?;
    info!("Using {:?} backend.", backend);

    match backend {
        Backend::GpioMem => run_on(&RawGpioDriver::new_gpiomem()?, &config),
        Backend::Mem => run_on(&RawGpioDriver::new_mem()?, &config),
        Backend::Gpiod => {
            let chip = var("MICROWAVE_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
            run_on(&GpiodDriver::open(&chip)?, &config)
        }
        Backend::Sim => {
            let sim = Simulator::new();
            let mut lcd = ClcdDriver::new(sim.bus(), sim.delay()).with_timing(config.timing()?);
            show_startup(&mut lcd, &config)?;
            info!(
                "Simulated {} transfers over {:?}: {:?}",
                sim.transfers().len(),
                sim.now(),
                sim.screen()
            );
            Ok(())
        }
    }
}
