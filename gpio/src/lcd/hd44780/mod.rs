//! HD44780 character LCD module.
//!
//! The driver talks to the controller over a write-only 4-bit parallel bus: the RS (register select)
//! line, the E (enable) line, and the four upper data lines D4–D7. R/W is expected to be tied to GND,
//! so the busy flag can never be read and every write is followed by a fixed worst-case delay
//! instead.
//!
//! - [driver] holds the command set ([driver::HD44780Driver]), the timing table and the driver
//!   itself ([driver::ClcdDriver]).
//! - [bus] abstracts the four line operations the protocol needs ([bus::ClcdBus]), and implements
//!   them over any [GpioDriver](crate::GpioDriver).
//! - [sim] is a simulated bus and clock for running the protocol without hardware.

pub mod bus;
pub mod driver;
pub mod sim;
