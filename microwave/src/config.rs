use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use dotenv::var;
use eyre::{eyre, WrapErr};
use microwave_gpio::lcd::hd44780::driver::ClcdTiming;
use serde::{Serialize, Deserialize};

/// Number of menu entries that fit on the 2-line display.
pub const MENU_SLOTS: usize = 4;

fn config_path() -> PathBuf {
    var("CONFIG_FILE")
        .unwrap_or_else(|_| "config.json".to_string())
        .into()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Multiplier for every LCD delay. 1 is the datasheet timing.
    pub timing_scale: u32,
    /// The two lines of the power-on screen.
    pub banner: [String; 2],
    /// How long the power-on screen stays up.
    pub power_on_hold_ms: u64,
    /// Menu entries, filled in two per line.
    pub menu: Vec<String>,
}

impl Config {
    /// Loads the config file named by `CONFIG_FILE` (default `config.json`).
    ///
    /// Returns `Ok(None)` only when the file does not exist. A file that exists but cannot be read
    /// or parsed is an error, so it is never replaced by the defaults.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> eyre::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path)
            .wrap_err_with(|| format!("Failed to open config {}", path.display()))?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .wrap_err_with(|| format!("Failed to parse config {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self) -> eyre::Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> eyre::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.timing_scale == 0 {
            return Err(eyre!("timing_scale must be at least 1"));
        }
        if self.menu.len() > MENU_SLOTS {
            return Err(eyre!(
                "{} menu entries configured, only {} fit on the display",
                self.menu.len(),
                MENU_SLOTS
            ));
        }
        Ok(())
    }

    pub fn timing(&self) -> eyre::Result<ClcdTiming> {
        Ok(ClcdTiming::default().scaled(self.timing_scale)?)
    }

    pub fn power_on_hold(&self) -> Duration {
        Duration::from_millis(self.power_on_hold_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timing_scale: 1,
            banner: [
                "  Powering ON".to_string(),
                " Microwave Oven".to_string(),
            ],
            power_on_hold_ms: 3000,
            menu: vec![
                "1.Micro".to_string(),
                "2.Grill".to_string(),
                "3.Convec".to_string(),
                "4.Start".to_string(),
            ],
        }
    }
}
