//! HD44780 driver interface.
//!
//! See [HD44780Driver] for the command set, and [ClcdDriver] for the 4-bit, write-only
//! implementation of it.

mod clcd;

use crate::{GpioError, GpioResult};
pub use clcd::*;
use log::warn;
use std::fmt::Debug;
use std::time::Duration;

/// Function set: 8-bit interface. Sent as both nibbles (`0011`, `0011`), so each pulse is a full
/// 8-bit function set to a controller that is still in 8-bit mode.
pub const EIGHT_BIT_MODE: u8 = 0x33;
/// Function set: 4-bit interface. The `0010` pulse switches the controller to 4-bit framing.
pub const FOUR_BIT_MODE: u8 = 0x02;
/// Function set: 4-bit interface, 2 lines, 5×8 dots font.
pub const TWO_LINES_5X8_4_BIT_MODE: u8 = 0x28;
/// Clear display, cursor to address 0.
pub const CLEAR_DISPLAY: u8 = 0x01;
/// Display on, cursor off, blink off.
pub const DISPLAY_ON_CURSOR_OFF: u8 = 0x0C;

/// Set-DDRAM-address command for the first character of line 1.
pub const LINE_1: u8 = 0x80;
/// Set-DDRAM-address command for the first character of line 2.
pub const LINE_2: u8 = 0xC0;

/// Value of the RS line for a transfer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterSelect {
    /// RS low. The byte is a command.
    Instruction,
    /// RS high. The byte is a character code, stored at the cursor.
    Data,
}

impl RegisterSelect {
    /// The level the RS line is driven to.
    pub fn level(self) -> bool {
        self == RegisterSelect::Data
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

/// Delays of the write protocol and of the power-on sequence.
///
/// The defaults are the datasheet minimums. Controllers running from a slower oscillator need
/// proportionally longer delays, see [ClcdTiming::scaled]. Shortening them is not supported.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ClcdTiming {
    /// How long E is held high for each nibble.
    pub enable_pulse: Duration,
    /// Wait after every transfer, covering the slowest command execution time.
    pub command_settle: Duration,
    /// Wait after power-on before the first transfer.
    pub power_on: Duration,
    /// Extra waits after each of the three 8-bit function sets.
    pub sync: [Duration; 3],
    /// Extra wait after the 4-bit function set and after the lines/font function set.
    pub function_set: Duration,
    /// Extra wait after clear display.
    pub clear: Duration,
    /// Extra wait after display on/off control.
    pub display_control: Duration,
}

impl Default for ClcdTiming {
    fn default() -> Self {
        ClcdTiming {
            enable_pulse: Duration::from_micros(100),
            command_settle: Duration::from_micros(4100),
            power_on: Duration::from_millis(30),
            sync: [
                Duration::from_micros(4100),
                Duration::from_micros(100),
                Duration::from_micros(1),
            ],
            function_set: Duration::from_micros(100),
            clear: Duration::from_micros(500),
            display_control: Duration::from_micros(100),
        }
    }
}

impl ClcdTiming {
    /// Multiplies every delay by `factor`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `factor` is 0, as it would drop every delay below the
    ///   minimum.
    pub fn scaled(&self, factor: u32) -> GpioResult<Self> {
        if factor == 0 {
            return Err(GpioError::InvalidArgument);
        }
        Ok(ClcdTiming {
            enable_pulse: self.enable_pulse * factor,
            command_settle: self.command_settle * factor,
            power_on: self.power_on * factor,
            sync: self.sync.map(|delay| delay * factor),
            function_set: self.function_set * factor,
            clear: self.clear * factor,
            display_control: self.display_control * factor,
        })
    }
}

/// Converts a character to its code in the controller's character ROM.
///
/// The ROM matches ASCII for the printable range, and nothing else reliably, so everything outside
/// ASCII is shown as `?`.
pub fn rom_code(c: char) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        warn!("Non-ASCII character: {}", c);
        b'?'
    }
}

/// Write-only interface of an HD44780 controller.
///
/// Implementors provide [HD44780Driver::initialize_display] and [HD44780Driver::write_raw]; every
/// command and the character output are built on top of `write_raw`.
pub trait HD44780Driver: Debug {
    /// Configures the bus lines as outputs and runs the power-on initialization sequence, leaving
    /// the display cleared, in 2-line 4-bit mode, on, with the cursor hidden.
    ///
    /// Must be called once before any other method. Calling it again re-synchronizes the
    /// controller.
    fn initialize_display(&mut self) -> GpioResult<()>;

    /// Sends one byte to the controller, with RS set according to `mode`.
    ///
    /// Low-level escape hatch for commands not covered by the methods below.
    ///
    /// # Errors
    /// - `GpioError::NotInitialized` if [HD44780Driver::initialize_display] has not run yet.
    fn write_raw(&mut self, byte: u8, mode: RegisterSelect) -> GpioResult<()>;

    /// Blocks for `duration` on the same clock the controller delays run on.
    fn wait(&mut self, duration: Duration);

    /// Sends a command to the HD44780 controller.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.write_raw(command, RegisterSelect::Instruction)
    }

    /// Sends data to the HD44780 controller.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.write_raw(data, RegisterSelect::Data)
    }

    /// Writes `c` at `address`.
    ///
    /// `address` is sent as-is as an instruction, so it has to include the set-DDRAM-address bit
    /// (`0x80`), e.g. [LINE_1] + column.
    fn put_char(&mut self, c: char, address: u8) -> GpioResult<()> {
        self.send_command(address)?;
        self.send_data(rom_code(c))
    }

    /// Writes `text` starting at `address`, which is sent as-is as an instruction.
    ///
    /// Stops at the end of `text` or at the first NUL. The controller advances the cursor after
    /// each character; text running past the end of a line is not wrapped or truncated.
    fn print(&mut self, text: &str, address: u8) -> GpioResult<()> {
        self.send_command(address)?;
        for c in text.chars().take_while(|&c| c != '\0') {
            self.send_data(rom_code(c))?;
        }
        Ok(())
    }

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(0b00000010)
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the display.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the function set. `data_length` selects the 8-bit interface, so it has to stay `false`
    /// on a 4-bit bus.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> GpioResult<()> {
        let mut command = 0b00100000;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b01000000 | address;
        self.send_command(command)
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b10000000 | address;
        self.send_command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects every `write_raw` call.
    #[derive(Debug, Default)]
    struct Recorder {
        writes: Vec<(u8, RegisterSelect)>,
    }

    impl HD44780Driver for Recorder {
        fn initialize_display(&mut self) -> GpioResult<()> {
            Ok(())
        }

        fn write_raw(&mut self, byte: u8, mode: RegisterSelect) -> GpioResult<()> {
            self.writes.push((byte, mode));
            Ok(())
        }

        fn wait(&mut self, _duration: Duration) {}
    }

    use super::RegisterSelect::{Data, Instruction};

    #[test]
    fn put_char_selects_address_then_writes() {
        let mut lcd = Recorder::default();
        lcd.put_char('A', 0x80).unwrap();
        assert_eq!(lcd.writes, vec![(0x80, Instruction), (0x41, Data)]);
    }

    #[test]
    fn print_stops_at_nul() {
        let mut lcd = Recorder::default();
        lcd.print("Hi\0there", LINE_2).unwrap();
        assert_eq!(lcd.writes, vec![(0xC0, Instruction), (b'H', Data), (b'i', Data)]);
    }

    #[test]
    fn non_ascii_is_replaced() {
        let mut lcd = Recorder::default();
        lcd.print("°C", LINE_1).unwrap();
        assert_eq!(lcd.writes, vec![(0x80, Instruction), (b'?', Data), (b'C', Data)]);
    }

    #[test]
    fn command_bits() {
        let mut lcd = Recorder::default();
        lcd.set_display_control(true, false, false).unwrap();
        lcd.function_set(false, true, false).unwrap();
        lcd.set_entry_mode(CursorDirection::Right, false).unwrap();
        lcd.cursor_shift(true, CursorDirection::Left).unwrap();
        lcd.return_home().unwrap();
        lcd.clear_display().unwrap();

        let bytes: Vec<u8> = lcd.writes.iter().map(|&(byte, _)| byte).collect();
        assert_eq!(
            bytes,
            vec![DISPLAY_ON_CURSOR_OFF, TWO_LINES_5X8_4_BIT_MODE, 0x06, 0x18, 0x02, CLEAR_DISPLAY]
        );
        assert!(lcd.writes.iter().all(|&(_, mode)| mode == Instruction));
    }

    #[test]
    fn address_commands_are_validated() {
        let mut lcd = Recorder::default();
        assert_eq!(lcd.set_ddram_address(0x80), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.set_cgram_address(0x40), Err(GpioError::InvalidArgument));
        lcd.set_ddram_address(0x40).unwrap();
        lcd.set_cgram_address(0x08).unwrap();
        assert_eq!(lcd.writes, vec![(LINE_2, Instruction), (0x48, Instruction)]);
    }

    #[test]
    fn scaling_multiplies_every_delay() {
        let timing = ClcdTiming::default().scaled(2).unwrap();
        assert_eq!(timing.enable_pulse, Duration::from_micros(200));
        assert_eq!(timing.command_settle, Duration::from_micros(8200));
        assert_eq!(timing.power_on, Duration::from_millis(60));
        assert_eq!(timing.sync[2], Duration::from_micros(2));
        assert_eq!(timing.clear, Duration::from_millis(1));
        assert_eq!(ClcdTiming::default().scaled(0), Err(GpioError::InvalidArgument));
    }
}
