use std::str::FromStr;
use eyre::eyre;

/// Parses four pin numbers separated by commas, semicolons or spaces.
pub fn parse_pin_bus(pin_str: &str) -> eyre::Result<[usize; 4]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| eyre!("Invalid number of data pins"))
}

/// Where the display lines are driven from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Backend {
    /// Memory-mapped registers through `/dev/gpiomem`.
    GpioMem,
    /// Memory-mapped registers through `/dev/mem`.
    Mem,
    /// The GPIO character device.
    Gpiod,
    /// No hardware, everything is recorded by the simulator.
    Sim,
}

impl FromStr for Backend {
    type Err = eyre::Report;

    fn from_str(s: &str) -> eyre::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpiomem" => Ok(Backend::GpioMem),
            "mem" => Ok(Backend::Mem),
            "gpiod" => Ok(Backend::Gpiod),
            "sim" => Ok(Backend::Sim),
            other => Err(eyre!("Unknown GPIO backend {:?}", other)),
        }
    }
}
