use crate::{GpioBus, GpioDriver, GpioPin, GpioResult};
use std::fmt::Debug;

/// The line operations the HD44780 4-bit write protocol is built from.
///
/// Implemented over GPIO pins by [GpioClcdBus], and by [SimClcdBus](super::sim::SimClcdBus) for
/// running without hardware.
pub trait ClcdBus: Debug {
    /// Configures RS, E and all four data lines as outputs.
    fn configure_as_output(&mut self) -> GpioResult<()>;

    /// Drives the RS line. `true` selects the data register, `false` the instruction register.
    fn set_mode_line(&mut self, data: bool) -> GpioResult<()>;

    /// Drives the E line. The controller latches the data lines on the falling edge.
    fn set_enable_line(&mut self, high: bool) -> GpioResult<()>;

    /// Drives D4–D7 with the lower four bits of `nibble`. Bit 0 goes to D4.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `nibble` is wider than four bits.
    fn set_data_bus(&mut self, nibble: u8) -> GpioResult<()>;
}

/// Which GPIO lines the display is wired to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ClcdPins {
    /// Register select.
    pub rs: usize,
    /// Enable.
    pub e: usize,
    /// D4, D5, D6, D7, in this order.
    pub data: [usize; 4],
}

/// [ClcdBus] over pins requested from a [GpioDriver].
#[derive(Debug)]
pub struct GpioClcdBus<'a> {
    pin_rs: Box<dyn GpioPin + 'a>,
    pin_e: Box<dyn GpioPin + 'a>,
    data_bus: Box<dyn GpioBus<4> + 'a>,
}

impl<'a> GpioClcdBus<'a> {
    pub fn new(
        pin_rs: Box<dyn GpioPin + 'a>,
        pin_e: Box<dyn GpioPin + 'a>,
        data_bus: Box<dyn GpioBus<4> + 'a>,
    ) -> Self {
        GpioClcdBus {
            pin_rs,
            pin_e,
            data_bus,
        }
    }

    /// Requests the pins in `pins` from `gpio`. They stay reserved until the bus is dropped.
    ///
    /// # Errors
    /// - `GpioError::AlreadyInUse` if any of the pins is already taken, including by this bus
    ///   itself (the same pin listed twice).
    /// - `GpioError::InvalidArgument` if a pin does not exist.
    pub fn request<G: GpioDriver>(gpio: &'a G, pins: &ClcdPins) -> GpioResult<Self> {
        let pin_rs = gpio.get_pin(pins.rs)?;
        let pin_e = gpio.get_pin(pins.e)?;
        let data_bus = gpio.get_pin_bus(pins.data)?;
        Ok(Self::new(pin_rs, pin_e, data_bus))
    }
}

impl ClcdBus for GpioClcdBus<'_> {
    fn configure_as_output(&mut self) -> GpioResult<()> {
        self.pin_rs.set_output()?;
        self.pin_e.set_output()?;
        self.data_bus.set_output()?;

        // E idles low, so the first rising edge is a real one
        self.pin_e.write(false)?;
        self.pin_rs.write(false)?;
        Ok(())
    }

    fn set_mode_line(&mut self, data: bool) -> GpioResult<()> {
        self.pin_rs.write(data)
    }

    fn set_enable_line(&mut self, high: bool) -> GpioResult<()> {
        self.pin_e.write(high)
    }

    fn set_data_bus(&mut self, nibble: u8) -> GpioResult<()> {
        self.data_bus.write_nibble(nibble)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GpioError, GpioResult};
    use std::cell::RefCell;

    /// Records `(pin, level)` for every write; reports 32 pins.
    #[derive(Debug, Default)]
    struct MockGpio {
        taken: RefCell<Vec<usize>>,
        outputs: RefCell<Vec<usize>>,
        writes: RefCell<Vec<(usize, bool)>>,
    }

    impl MockGpio {
        fn take(&self, index: usize) -> GpioResult<()> {
            if index >= 32 {
                return Err(GpioError::InvalidArgument);
            }
            let mut taken = self.taken.borrow_mut();
            if taken.contains(&index) {
                return Err(GpioError::AlreadyInUse);
            }
            taken.push(index);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct MockPin<'a> {
        gpio: &'a MockGpio,
        index: usize,
        output: bool,
    }

    impl GpioPin for MockPin<'_> {
        fn set_output(&mut self) -> GpioResult<()> {
            self.gpio.outputs.borrow_mut().push(self.index);
            self.output = true;
            Ok(())
        }

        fn is_output(&self) -> bool {
            self.output
        }

        fn write(&self, value: bool) -> GpioResult<()> {
            if !self.output {
                return Err(GpioError::NotInitialized);
            }
            self.gpio.writes.borrow_mut().push((self.index, value));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct MockBus<'a, const N: usize> {
        gpio: &'a MockGpio,
        indices: [usize; N],
        output: bool,
    }

    impl<const N: usize> GpioBus<N> for MockBus<'_, N> {
        fn set_output(&mut self) -> GpioResult<()> {
            self.gpio.outputs.borrow_mut().extend(self.indices);
            self.output = true;
            Ok(())
        }

        fn is_output(&self) -> bool {
            self.output
        }

        fn write(&self, values: &[bool; N]) -> GpioResult<()> {
            if !self.output {
                return Err(GpioError::NotInitialized);
            }
            let mut writes = self.gpio.writes.borrow_mut();
            for (&index, &value) in self.indices.iter().zip(values) {
                writes.push((index, value));
            }
            Ok(())
        }
    }

    impl GpioDriver for MockGpio {
        fn count(&self) -> GpioResult<usize> {
            Ok(32)
        }

        fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
            self.take(index)?;
            Ok(Box::new(MockPin {
                gpio: self,
                index,
                output: false,
            }))
        }

        fn get_pin_bus<const N: usize>(
            &self,
            indices: [usize; N],
        ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
            for index in indices {
                self.take(index)?;
            }
            Ok(Box::new(MockBus {
                gpio: self,
                indices,
                output: false,
            }))
        }
    }

    const PINS: ClcdPins = ClcdPins {
        rs: 22,
        e: 17,
        data: [26, 16, 20, 21],
    };

    #[test]
    fn configure_sets_every_line_to_output_and_idles_low() {
        let gpio = MockGpio::default();
        let mut bus = GpioClcdBus::request(&gpio, &PINS).unwrap();
        bus.configure_as_output().unwrap();

        let mut outputs = gpio.outputs.borrow().clone();
        outputs.sort();
        assert_eq!(outputs, vec![16, 17, 20, 21, 22, 26]);
        assert_eq!(*gpio.writes.borrow(), vec![(17, false), (22, false)]);
    }

    #[test]
    fn writes_before_configuration_fail() {
        let gpio = MockGpio::default();
        let mut bus = GpioClcdBus::request(&gpio, &PINS).unwrap();
        assert_eq!(bus.set_enable_line(true), Err(GpioError::NotInitialized));
        assert_eq!(bus.set_data_bus(0b1010), Err(GpioError::NotInitialized));
    }

    #[test]
    fn data_bus_maps_bit_zero_to_d4() {
        let gpio = MockGpio::default();
        let mut bus = GpioClcdBus::request(&gpio, &PINS).unwrap();
        bus.configure_as_output().unwrap();
        gpio.writes.borrow_mut().clear();

        bus.set_data_bus(0b0001).unwrap();
        assert_eq!(
            *gpio.writes.borrow(),
            vec![(26, true), (16, false), (20, false), (21, false)]
        );
    }

    #[test]
    fn wide_nibbles_are_rejected() {
        let gpio = MockGpio::default();
        let mut bus = GpioClcdBus::request(&gpio, &PINS).unwrap();
        bus.configure_as_output().unwrap();
        assert_eq!(bus.set_data_bus(0x12), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn duplicate_pins_are_refused() {
        let gpio = MockGpio::default();
        let pins = ClcdPins { e: 22, ..PINS };
        assert_eq!(
            GpioClcdBus::request(&gpio, &pins).unwrap_err(),
            GpioError::AlreadyInUse
        );
    }
}
