//! GPIO access through the Linux GPIO character device, using the gpiod library.
//!
//! Slower than [crate::raw::RawGpioDriver], but works on any board the kernel has a GPIO chip
//! driver for, and needs no access to `/dev/mem`.
use crate::{GpioBus, GpioDriver, GpioError, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO pins.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_pins: bits,
        }
    }

    /// Opens the GPIO chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: &str) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path)?;
        debug!("Opened {} with {} lines", path, chip.num_lines());
        Ok(Self::new(chip))
    }

    fn request_output<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<gpiod::Lines<gpiod::Output>> {
        let line = self.chip.request_lines(
            gpiod::Options::output(indices.map(|index| index as u32))
                .consumer(env!("CARGO_PKG_NAME")),
        )?;
        Ok(line)
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        Ok(Box::new(GpiodPin {
            driver: self,
            pin_index: index,
            line: None,
        }))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        let n = self.count()?;

        if indices.iter().any(|&index| index >= n) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for index in indices {
            self.used_pins.set_aliased(index, true);
        }

        Ok(Box::new(GpiodBus {
            driver: self,
            pin_indices: indices,
            line: None,
        }))
    }
}

struct GpiodPin<'a> {
    driver: &'a GpiodDriver,
    pin_index: usize,
    /// Requested on [GpioPin::set_output], released on drop.
    line: Option<gpiod::Lines<gpiod::Output>>,
}

impl Debug for GpiodPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for GpiodPin<'_> {
    fn set_output(&mut self) -> GpioResult<()> {
        if self.line.is_none() {
            self.line = Some(self.driver.request_output([self.pin_index])?);
        }
        Ok(())
    }

    fn is_output(&self) -> bool {
        self.line.is_some()
    }

    fn write(&self, value: bool) -> GpioResult<()> {
        let line = self.line.as_ref().ok_or(GpioError::NotInitialized)?;
        line.set_values([value])?;
        Ok(())
    }
}

impl Drop for GpiodPin<'_> {
    fn drop(&mut self) {
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

struct GpiodBus<'a, const N: usize> {
    driver: &'a GpiodDriver,
    pin_indices: [usize; N],
    line: Option<gpiod::Lines<gpiod::Output>>,
}

impl<const N: usize> Debug for GpiodBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for GpiodBus<'_, N> {
    fn set_output(&mut self) -> GpioResult<()> {
        if self.line.is_none() {
            self.line = Some(self.driver.request_output(self.pin_indices)?);
        }
        Ok(())
    }

    fn is_output(&self) -> bool {
        self.line.is_some()
    }

    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        let line = self.line.as_ref().ok_or(GpioError::NotInitialized)?;
        line.set_values(*values)?;
        Ok(())
    }
}

impl<const N: usize> Drop for GpiodBus<'_, N> {
    fn drop(&mut self) {
        for &index in &self.pin_indices {
            self.driver.used_pins.set_aliased(index, false);
        }
    }
}
