//! GPIO access through the memory-mapped BCM2837 (Raspberry Pi 2/3) register block.
//!
//! Only the registers the LCD needs are touched: the function select registers (to switch pins to
//! output) and the set/clear registers (to drive them).
use crate::{GpioBus, GpioDriver, GpioError, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use log::{debug, trace};
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

/// Pin function values of the GPFSELn registers.
const FUNCTION_INPUT: u8 = 0b000;
const FUNCTION_OUTPUT: u8 = 0b001;

pub struct RawGpioDriver {
    mmap: MmapRaw,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    const GPIO_BASE: u32 = 0x3F200000;

    const PIN_COUNT: usize = 58;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
                .offset(offset)
                .len(4096)
                .map_raw(&file)?;

        debug!("Mapped GPIO registers from {} at offset {:#x}", path, offset);

        Ok(RawGpioDriver {
            mmap,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps `/dev/gpiomem`, which exposes only the GPIO block and does not need root.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the GPIO block out of `/dev/mem` at the BCM2837 peripheral address. Needs root.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE as u64)
    }

    pub fn raw_get_pin_function(&self, pin_index: usize) -> GpioResult<u8> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_ptr() as *const u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let register_value = unsafe { register_ptr.read_volatile() };
        Ok(((register_value >> shift) & 0b111) as u8)
    }

    pub fn raw_set_pin_function(&self, pin_index: usize, function: u8) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }

        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        // Read-modify-write, so the other nine pins sharing the register keep their function
        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift);
        register_value |= (function as u32) << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        Ok(())
    }

    pub(crate) fn raw_set_pin_output(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPSETn/GPCLRn register
        let register_ptr = unsafe { mmap.add(if high { 0x1c / 4 } else { 0x28 / 4 } + pin_index / 32) };
        let shift = pin_index % 32;

        unsafe { register_ptr.write_volatile(1 << shift) };

        Ok(())
    }

    /// Returns the pin to its power-on state: input, output latch cleared.
    pub(crate) fn raw_release(&self, pin_index: usize) -> GpioResult<()> {
        self.raw_set_pin_output(pin_index, false)?;
        self.raw_set_pin_function(pin_index, FUNCTION_INPUT)?;
        Ok(())
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        Ok(Box::new(RawGpioPin {
            driver: self,
            pin_index: index,
            output: false,
        }))
    }

    fn get_pin_bus<const N: usize>(&self, indices: [usize; N]) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        let n = self.count()?;

        if indices.iter().any(|&index| index >= n) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in &indices {
            self.used_pins.set_aliased(index, true);
        }

        Ok(Box::new(RawGpioBus {
            driver: self,
            pin_indices: indices,
            output: false,
        }))
    }
}

struct RawGpioPin<'a> {
    driver: &'a RawGpioDriver,
    pin_index: usize,
    output: bool,
}

impl Debug for RawGpioPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for RawGpioPin<'_> {
    fn set_output(&mut self) -> GpioResult<()> {
        let previous = self.driver.raw_get_pin_function(self.pin_index)?;
        trace!("Pin {}: function {:03b} -> output", self.pin_index, previous);
        self.driver.raw_set_pin_function(self.pin_index, FUNCTION_OUTPUT)?;
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
        self.driver.raw_set_pin_output(self.pin_index, value)
    }
}

impl Drop for RawGpioPin<'_> {
    fn drop(&mut self) {
        if self.output {
            _ = self.driver.raw_release(self.pin_index);
        }
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

struct RawGpioBus<'a, const N: usize> {
    driver: &'a RawGpioDriver,
    pin_indices: [usize; N],
    output: bool,
}

impl<const N: usize> Debug for RawGpioBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for RawGpioBus<'_, N> {
    fn set_output(&mut self) -> GpioResult<()> {
        for &pin_index in &self.pin_indices {
            self.driver.raw_set_pin_function(pin_index, FUNCTION_OUTPUT)?;
        }
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
        for (&pin_index, &value) in self.pin_indices.iter().zip(values) {
            self.driver.raw_set_pin_output(pin_index, value)?;
        }
        Ok(())
    }
}

impl<const N: usize> Drop for RawGpioBus<'_, N> {
    fn drop(&mut self) {
        for &pin_index in &self.pin_indices {
            if self.output {
                _ = self.driver.raw_release(pin_index);
            }
            self.driver.used_pins.set_aliased(pin_index, false);
        }
    }
}
