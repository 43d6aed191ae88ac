//! Simulated HD44780 bus and clock.
//!
//! A [Simulator] hands out a [SimClcdBus] and a [SimDelay] that share one event log and one virtual
//! clock. Delays advance the clock instantly instead of blocking, so a whole power-on sequence runs
//! in microseconds of real time while keeping its exact virtual timing.
//!
//! The log can be read back as raw line events, as latched nibbles, as paired transfers, or as the
//! text a 2-line controller would show.
//!
//! ```
//! use microwave_gpio::lcd::hd44780::driver::{ClcdDriver, HD44780Driver, LINE_1};
//! use microwave_gpio::lcd::hd44780::sim::Simulator;
//!
//! let sim = Simulator::new();
//! let mut lcd = ClcdDriver::new(sim.bus(), sim.delay());
//! lcd.initialize_display().unwrap();
//! lcd.print("Hello", LINE_1).unwrap();
//! assert_eq!(sim.screen().line(0, 5), "Hello");
//! ```
use crate::delay::Delay;
use crate::lcd::hd44780::bus::ClcdBus;
use crate::lcd::hd44780::driver::RegisterSelect;
use crate::{GpioError, GpioResult};
use log::trace;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::time::Duration;

/// A single change recorded by the simulator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SimSignal {
    /// All lines were configured as outputs.
    ConfigureOutput,
    /// RS was driven; `true` is the data register.
    ModeLine(bool),
    /// E was driven.
    EnableLine(bool),
    /// D4–D7 were driven with this nibble.
    DataBus(u8),
    /// The caller waited this long.
    Delay(Duration),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SimEvent {
    /// Virtual time at which the event happened. For delays, the time the delay started.
    pub at: Duration,
    pub signal: SimSignal,
}

/// One nibble, as latched by the controller on a falling edge of E.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SimLatch {
    pub mode: RegisterSelect,
    pub nibble: u8,
    /// How long E was high before falling.
    pub pulse: Duration,
    /// Virtual time of the falling edge.
    pub at: Duration,
}

/// Two consecutive latches, read as one byte, high nibble first.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SimTransfer {
    pub byte: u8,
    /// RS during the high nibble.
    pub mode: RegisterSelect,
    /// Whether RS stayed the same for both nibbles.
    pub stable_mode: bool,
    /// E pulse widths of the high and the low nibble.
    pub pulses: [Duration; 2],
    /// Virtual time the low nibble was latched.
    pub latched_at: Duration,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
struct SimLines {
    configured: bool,
    mode: bool,
    enable: bool,
    data: u8,
}

#[derive(Debug, Default)]
struct SimState {
    now: Duration,
    lines: SimLines,
    /// Line state at the start of `events`.
    origin: SimLines,
    events: Vec<SimEvent>,
}

impl SimState {
    fn record(&mut self, signal: SimSignal) {
        trace!("sim @ {:?}: {:?}", self.now, signal);
        self.events.push(SimEvent {
            at: self.now,
            signal,
        });
    }
}

/// Owner of the shared log and clock. Cloning it gives another handle to the same simulation.
#[derive(Clone, Default)]
pub struct Simulator {
    state: Rc<RefCell<SimState>>,
}

impl Debug for Simulator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        write!(f, "Simulator({:?}, {} events)", state.now, state.events.len())
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus recording into this simulator.
    pub fn bus(&self) -> SimClcdBus {
        SimClcdBus {
            state: Rc::clone(&self.state),
        }
    }

    /// A delay advancing this simulator's clock.
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            state: Rc::clone(&self.state),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.borrow().events.clone()
    }

    /// Forgets the recorded events. The clock and the line levels are kept.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.origin = state.lines;
        state.events.clear();
    }

    /// Every delay, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event.signal {
                SimSignal::Delay(duration) => Some(duration),
                _ => None,
            })
            .collect()
    }

    /// Every nibble latched by a falling edge of E, in order.
    pub fn latches(&self) -> Vec<SimLatch> {
        let state = self.state.borrow();
        let mut lines = state.origin;
        let mut rose_at = state.events.first().map(|event| event.at).unwrap_or_default();
        let mut latches = Vec::new();

        for event in &state.events {
            match event.signal {
                SimSignal::ConfigureOutput => lines.configured = true,
                SimSignal::ModeLine(level) => lines.mode = level,
                SimSignal::DataBus(nibble) => lines.data = nibble,
                SimSignal::EnableLine(true) if !lines.enable => {
                    lines.enable = true;
                    rose_at = event.at;
                }
                SimSignal::EnableLine(false) if lines.enable => {
                    lines.enable = false;
                    latches.push(SimLatch {
                        mode: if lines.mode {
                            RegisterSelect::Data
                        } else {
                            RegisterSelect::Instruction
                        },
                        nibble: lines.data,
                        pulse: event.at - rose_at,
                        at: event.at,
                    });
                }
                SimSignal::EnableLine(_) | SimSignal::Delay(_) => {}
            }
        }

        latches
    }

    /// Latches paired up into bytes. A trailing unpaired nibble is left out.
    pub fn transfers(&self) -> Vec<SimTransfer> {
        self.latches()
            .chunks_exact(2)
            .map(|pair| SimTransfer {
                byte: (pair[0].nibble << 4) | pair[1].nibble,
                mode: pair[0].mode,
                stable_mode: pair[0].mode == pair[1].mode,
                pulses: [pair[0].pulse, pair[1].pulse],
                latched_at: pair[1].at,
            })
            .collect()
    }

    /// Replays the recorded transfers on a model of the display memory.
    pub fn screen(&self) -> SimScreen {
        let mut screen = SimScreen::default();
        for transfer in self.transfers() {
            screen.apply(transfer.byte, transfer.mode);
        }
        screen
    }
}

/// Display data RAM of a 2-line controller, as far as the recorded writes define it.
///
/// Only what the driver sends is modelled: clear display, return home, set DDRAM address, and data
/// writes with the cursor moving right. Every other command is ignored.
#[derive(Clone, Eq, PartialEq)]
pub struct SimScreen {
    ddram: [u8; 0x80],
    address: u8,
}

impl Default for SimScreen {
    fn default() -> Self {
        SimScreen {
            ddram: [b' '; 0x80],
            address: 0,
        }
    }
}

impl Debug for SimScreen {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimScreen({:?}, {:?})", self.line(0, 16), self.line(1, 16))
    }
}

impl SimScreen {
    fn apply(&mut self, byte: u8, mode: RegisterSelect) {
        match mode {
            RegisterSelect::Data => {
                self.ddram[self.address as usize] = byte;
                self.address = (self.address + 1) & 0x7F;
            }
            RegisterSelect::Instruction if byte & 0x80 != 0 => {
                self.address = byte & 0x7F;
            }
            RegisterSelect::Instruction if byte == 0x01 => {
                self.ddram = [b' '; 0x80];
                self.address = 0;
            }
            RegisterSelect::Instruction if byte & 0xFE == 0x02 => {
                self.address = 0;
            }
            RegisterSelect::Instruction => {}
        }
    }

    /// The first `width` characters of line `row`. Line 1 starts at address `0x40`.
    ///
    /// # Panics
    /// If `row` is not 0 or 1.
    pub fn line(&self, row: usize, width: usize) -> String {
        let start = match row {
            0 => 0x00,
            1 => 0x40,
            _ => panic!("the display has 2 lines, got row {}", row),
        };
        let end = (start + width).min(self.ddram.len());
        self.ddram[start..end].iter().map(|&byte| byte as char).collect()
    }

    /// The address counter, where the next character would be written.
    pub fn address(&self) -> u8 {
        self.address
    }
}

/// [ClcdBus] recording into a [Simulator].
pub struct SimClcdBus {
    state: Rc<RefCell<SimState>>,
}

impl Debug for SimClcdBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimClcdBus({:?})", self.state.borrow().lines)
    }
}

impl SimClcdBus {
    fn drive(&mut self, signal: SimSignal) -> GpioResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.lines.configured {
            return Err(GpioError::NotInitialized);
        }
        match signal {
            SimSignal::ModeLine(level) => state.lines.mode = level,
            SimSignal::EnableLine(level) => state.lines.enable = level,
            SimSignal::DataBus(nibble) => state.lines.data = nibble,
            SimSignal::ConfigureOutput | SimSignal::Delay(_) => {}
        }
        state.record(signal);
        Ok(())
    }
}

impl ClcdBus for SimClcdBus {
    fn configure_as_output(&mut self) -> GpioResult<()> {
        let mut state = self.state.borrow_mut();
        state.lines.configured = true;
        state.record(SimSignal::ConfigureOutput);
        Ok(())
    }

    fn set_mode_line(&mut self, data: bool) -> GpioResult<()> {
        self.drive(SimSignal::ModeLine(data))
    }

    fn set_enable_line(&mut self, high: bool) -> GpioResult<()> {
        self.drive(SimSignal::EnableLine(high))
    }

    fn set_data_bus(&mut self, nibble: u8) -> GpioResult<()> {
        if nibble > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }
        self.drive(SimSignal::DataBus(nibble))
    }
}

/// [Delay] advancing a [Simulator]'s clock.
pub struct SimDelay {
    state: Rc<RefCell<SimState>>,
}

impl Debug for SimDelay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDelay({:?})", self.state.borrow().now)
    }
}

impl Delay for SimDelay {
    fn delay(&mut self, duration: Duration) {
        let mut state = self.state.borrow_mut();
        state.record(SimSignal::Delay(duration));
        state.now += duration;
    }
}
