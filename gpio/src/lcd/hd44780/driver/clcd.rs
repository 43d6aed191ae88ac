use crate::delay::Delay;
use crate::lcd::hd44780::bus::ClcdBus;
use crate::lcd::hd44780::driver::{
    CLEAR_DISPLAY, ClcdTiming, DISPLAY_ON_CURSOR_OFF, EIGHT_BIT_MODE, FOUR_BIT_MODE,
    HD44780Driver, RegisterSelect, TWO_LINES_5X8_4_BIT_MODE,
};
use crate::{GpioError, GpioResult};
use log::{debug, trace};
use std::time::Duration;

/// HD44780 driver over a write-only 4-bit bus.
///
/// There is no busy flag to poll, so every transfer ends with [ClcdTiming::command_settle], which
/// covers the slowest command. The E pin is held high for [ClcdTiming::enable_pulse] per nibble.
///
/// The driver takes `&mut self` for every transfer, so writes through one driver never interleave.
/// Sharing a display between threads needs a lock around the whole driver.
#[derive(Debug)]
pub struct ClcdDriver<B: ClcdBus, D: Delay> {
    bus: B,
    delay: D,
    timing: ClcdTiming,
    initialized: bool,
}

impl<B: ClcdBus, D: Delay> ClcdDriver<B, D> {
    /// Creates a driver with the datasheet timing. Nothing is sent until
    /// [HD44780Driver::initialize_display].
    pub fn new(bus: B, delay: D) -> Self {
        ClcdDriver {
            bus,
            delay,
            timing: ClcdTiming::default(),
            initialized: false,
        }
    }

    pub fn with_timing(mut self, timing: ClcdTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> &ClcdTiming {
        &self.timing
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Gives back the bus and the delay.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn pulse_e(&mut self) -> GpioResult<()> {
        self.bus.set_enable_line(true)?;
        self.delay.delay(self.timing.enable_pulse);
        self.bus.set_enable_line(false)?;
        Ok(())
    }

    /// Sends both nibbles of `byte` and waits for the controller to execute it.
    fn transmit(&mut self, byte: u8, mode: RegisterSelect) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", byte, mode.level());

        // RS has to be stable before the first E pulse and through both
        self.bus.set_mode_line(mode.level())?;

        let high_nibble = (byte >> 4) & 0x0F;
        let low_nibble = byte & 0x0F;

        trace!("Writing HN: {:04b}", high_nibble);
        self.bus.set_data_bus(high_nibble)?;
        self.pulse_e()?;

        trace!("Writing LN: {:04b}", low_nibble);
        self.bus.set_data_bus(low_nibble)?;
        self.pulse_e()?;

        self.delay.delay(self.timing.command_settle);
        Ok(())
    }

    fn init_command(&mut self, command: u8, settle: Duration) -> GpioResult<()> {
        self.transmit(command, RegisterSelect::Instruction)?;
        self.delay.delay(settle);
        Ok(())
    }
}

impl<B: ClcdBus, D: Delay> HD44780Driver for ClcdDriver<B, D> {
    fn initialize_display(&mut self) -> GpioResult<()> {
        self.initialized = false;
        let timing = self.timing;

        debug!("Configuring {:?} as output", self.bus);
        self.bus.configure_as_output()?;

        self.delay.delay(timing.power_on);

        // The controller may have powered up in either bus width. Three 8-bit function sets put it
        // into 8-bit mode whatever state it was in.
        debug!("Synchronizing");
        for settle in timing.sync {
            self.init_command(EIGHT_BIT_MODE, settle)?;
        }

        debug!("Switching to 4-bit mode");
        self.init_command(FOUR_BIT_MODE, timing.function_set)?;
        self.init_command(TWO_LINES_5X8_4_BIT_MODE, timing.function_set)?;
        self.init_command(CLEAR_DISPLAY, timing.clear)?;
        self.init_command(DISPLAY_ON_CURSOR_OFF, timing.display_control)?;

        self.initialized = true;
        debug!("Display initialized");
        Ok(())
    }

    fn write_raw(&mut self, byte: u8, mode: RegisterSelect) -> GpioResult<()> {
        if !self.initialized {
            return Err(GpioError::NotInitialized);
        }
        self.transmit(byte, mode)
    }

    fn wait(&mut self, duration: Duration) {
        self.delay.delay(duration);
    }

    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(CLEAR_DISPLAY)?;
        self.delay.delay(self.timing.clear);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::driver::LINE_1;
    use crate::lcd::hd44780::sim::{SimClcdBus, SimDelay, SimSignal, Simulator};

    fn driver(sim: &Simulator) -> ClcdDriver<SimClcdBus, SimDelay> {
        ClcdDriver::new(sim.bus(), sim.delay())
    }

    #[test]
    fn writes_before_initialization_are_refused() {
        let sim = Simulator::new();
        let mut lcd = driver(&sim);

        assert_eq!(lcd.write_raw(0x41, RegisterSelect::Data), Err(GpioError::NotInitialized));
        assert_eq!(lcd.put_char('A', LINE_1), Err(GpioError::NotInitialized));
        assert_eq!(lcd.print("", LINE_1), Err(GpioError::NotInitialized));
        assert!(!lcd.is_initialized());
        assert!(sim.events().is_empty());
    }

    #[test]
    fn initialization_configures_the_lines_first() {
        let sim = Simulator::new();
        let mut lcd = driver(&sim);
        lcd.initialize_display().unwrap();

        assert!(lcd.is_initialized());
        assert_eq!(sim.events()[0].signal, SimSignal::ConfigureOutput);
    }

    #[test]
    fn reinitialization_repeats_the_sequence() {
        let sim = Simulator::new();
        let mut lcd = driver(&sim);
        lcd.initialize_display().unwrap();
        let first: Vec<u8> = sim.transfers().iter().map(|t| t.byte).collect();

        sim.clear();
        lcd.initialize_display().unwrap();
        let second: Vec<u8> = sim.transfers().iter().map(|t| t.byte).collect();

        assert_eq!(first, second);
        assert!(lcd.is_initialized());
    }

    #[test]
    fn clear_display_waits_for_the_clear() {
        let sim = Simulator::new();
        let mut lcd = driver(&sim);
        lcd.initialize_display().unwrap();
        sim.clear();

        lcd.clear_display().unwrap();
        assert_eq!(
            sim.delays(),
            vec![
                Duration::from_micros(100),
                Duration::from_micros(100),
                Duration::from_micros(4100),
                Duration::from_micros(500),
            ]
        );
    }

    #[test]
    fn scaled_timing_is_used_everywhere() {
        let sim = Simulator::new();
        let timing = ClcdTiming::default().scaled(3).unwrap();
        let mut lcd = driver(&sim).with_timing(timing);
        lcd.initialize_display().unwrap();

        assert_eq!(sim.delays()[0], Duration::from_millis(90));
        for transfer in sim.transfers() {
            assert_eq!(transfer.pulses, [Duration::from_micros(300); 2]);
        }
    }

    #[test]
    fn wait_uses_the_injected_delay() {
        let sim = Simulator::new();
        let mut lcd = driver(&sim);

        lcd.wait(Duration::from_millis(3));
        assert_eq!(sim.delays(), vec![Duration::from_millis(3)]);
        assert_eq!(sim.now(), Duration::from_millis(3));
    }

    #[test]
    fn wide_bytes_split_into_two_nibbles() {
        let sim = Simulator::new();
        let mut lcd = driver(&sim);
        lcd.initialize_display().unwrap();
        sim.clear();

        lcd.write_raw(0xA5, RegisterSelect::Data).unwrap();
        let nibbles: Vec<u8> = sim.latches().iter().map(|latch| latch.nibble).collect();
        assert_eq!(nibbles, vec![0xA, 0x5]);
    }

    #[test]
    fn release_returns_the_bus() {
        let sim = Simulator::new();
        let mut lcd = driver(&sim);
        lcd.initialize_display().unwrap();
        let (mut bus, _delay) = lcd.release();

        // Still configured, still recording into the same simulator
        sim.clear();
        bus.set_enable_line(true).unwrap();
        assert_eq!(sim.events()[0].signal, SimSignal::EnableLine(true));
    }
}
