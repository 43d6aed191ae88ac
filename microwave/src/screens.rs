//! The oven screens that only need the display.
//!
//! Time and temperature entry and heating need the keypad and the heater, and are driven by the
//! oven controller on top of these.

use log::debug;
use microwave_gpio::GpioResult;
use microwave_gpio::lcd::hd44780::driver::{HD44780Driver, LINE_1, LINE_2};
use crate::config::Config;

/// Characters per menu slot, two slots per line.
const MENU_SLOT_WIDTH: usize = 8;

pub struct Screens<'a> {
    lcd: &'a mut dyn HD44780Driver,
    config: &'a Config,
}

impl<'a> Screens<'a> {
    pub fn new(lcd: &'a mut dyn HD44780Driver, config: &'a Config) -> Self {
        Screens { lcd, config }
    }

    /// Shows the configured banner on both lines and keeps it up for the configured hold.
    pub fn power_on_screen(&mut self) -> GpioResult<()> {
        debug!("Drawing power-on screen");
        self.lcd.clear_display()?;
        self.lcd.print(&self.config.banner[0], LINE_1)?;
        self.lcd.print(&self.config.banner[1], LINE_2)?;
        self.lcd.wait(self.config.power_on_hold());
        Ok(())
    }

    pub fn clear_screen(&mut self) -> GpioResult<()> {
        debug!("Clearing screen");
        self.lcd.clear_display()
    }

    /// Lays the menu entries out two per line, left to right.
    pub fn display_menu_screen(&mut self) -> GpioResult<()> {
        debug!("Drawing menu: {:?}", self.config.menu);
        self.lcd.clear_display()?;

        for (slot, entry) in self.config.menu.iter().enumerate() {
            let line = if slot / 2 == 0 { LINE_1 } else { LINE_2 };
            let address = line + ((slot % 2) * MENU_SLOT_WIDTH) as u8;
            let text: String = entry.chars().take(MENU_SLOT_WIDTH).collect();
            self.lcd.print(&text, address)?;
        }
        Ok(())
    }
}
