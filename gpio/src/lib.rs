pub mod delay;
pub mod gpiod;
pub mod lcd;
pub mod raw;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the device has not been initialized")]
    NotInitialized,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Gets the GPIO pin at the given index.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;

    /// Gets the GPIO pin bus at the specific indices.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>>
    where
        Self: Sized;
}

/// A single GPIO line, owned by whoever requested it from a [GpioDriver].
///
/// Pins start in whatever direction the backend leaves them in. They have to be switched to output
/// with [GpioPin::set_output] before they can be driven.
pub trait GpioPin: Debug {
    /// Configures the pin as an output.
    fn set_output(&mut self) -> GpioResult<()>;

    /// Gets whether [GpioPin::set_output] has been called on this pin.
    fn is_output(&self) -> bool;

    /// Drives the pin high (`true`) or low (`false`).
    ///
    /// # Errors
    /// - `GpioError::NotInitialized` if the pin has not been configured as an output.
    fn write(&self, value: bool) -> GpioResult<()>;
}

/// A group of `N` GPIO lines driven together.
pub trait GpioBus<const N: usize>: Debug {
    /// Configures every line of the bus as an output.
    fn set_output(&mut self) -> GpioResult<()>;

    /// Gets whether [GpioBus::set_output] has been called on this bus.
    fn is_output(&self) -> bool;

    /// Writes the values to the lines, in the order the indices were given.
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBus<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let mut values = [false; 4];
        for (i, line) in values.iter_mut().enumerate() {
            *line = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct RecordingBus {
        output: bool,
        writes: RefCell<Vec<[bool; 4]>>,
    }

    impl GpioBus<4> for RecordingBus {
        fn set_output(&mut self) -> GpioResult<()> {
            self.output = true;
            Ok(())
        }

        fn is_output(&self) -> bool {
            self.output
        }

        fn write(&self, values: &[bool; 4]) -> GpioResult<()> {
            self.writes.borrow_mut().push(*values);
            Ok(())
        }
    }

    #[test]
    fn write_nibble_is_lsb_first() {
        let bus = RecordingBus::default();
        let dyn_bus: &dyn GpioBus<4> = &bus;
        dyn_bus.write_nibble(0b0011).unwrap();
        dyn_bus.write_nibble(0b1000).unwrap();

        assert_eq!(
            *bus.writes.borrow(),
            vec![[true, true, false, false], [false, false, false, true]]
        );
    }

    #[test]
    fn write_nibble_rejects_wide_values() {
        let bus = RecordingBus::default();
        let dyn_bus: &dyn GpioBus<4> = &bus;
        assert_eq!(dyn_bus.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert!(bus.writes.borrow().is_empty());
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: GpioError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, GpioError::Io(std::io::ErrorKind::PermissionDenied));
    }
}
