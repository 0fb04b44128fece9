//! Heater relay on a Linux sysfs GPIO line.
//!
//! The baseboard relay board is wired active-low: logic 0 energizes the coil.

use std::path::{Path, PathBuf};

use heatd_common::{Relay, RelayConfig, RelayError};
use tracing::{debug, warn};

pub struct SysfsRelay {
    root: PathBuf,
    pin_dir: PathBuf,
    pin: u32,
    active_low: bool,
    on: bool,
    released: bool,
}

impl SysfsRelay {
    /// Exports the pin if needed and drives it to the inactive level.
    pub fn open(config: &RelayConfig) -> Result<Self, RelayError> {
        let root = PathBuf::from(&config.sysfs_root);
        let pin_dir = root.join(format!("gpio{}", config.gpio_pin));

        if !pin_dir.exists() {
            write_attr(&root.join("export"), &config.gpio_pin.to_string())?;
        }

        // "high"/"low" switch to output with that initial level in one write,
        // so the relay never glitches on while being configured.
        let initial = if config.active_low { "high" } else { "low" };
        write_attr(&pin_dir.join("direction"), initial)?;
        debug!(pin = config.gpio_pin, initial, "gpio relay configured");

        Ok(Self {
            root,
            pin_dir,
            pin: config.gpio_pin,
            active_low: config.active_low,
            on: false,
            released: false,
        })
    }

    fn level(&self, on: bool) -> &'static str {
        if on != self.active_low {
            "1"
        } else {
            "0"
        }
    }
}

impl Relay for SysfsRelay {
    fn set(&mut self, on: bool) -> Result<(), RelayError> {
        if self.released {
            return Err(RelayError::Released);
        }
        write_attr(&self.pin_dir.join("value"), self.level(on))?;
        self.on = on;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }

    fn release(&mut self) -> Result<(), RelayError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.on = false;

        let direction = write_attr(&self.pin_dir.join("direction"), "in");
        if let Err(err) = &direction {
            warn!(pin = self.pin, "failed to return gpio to input: {err}");
        }
        write_attr(&self.root.join("unexport"), &self.pin.to_string())?;
        direction
    }
}

impl Drop for SysfsRelay {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(pin = self.pin, "gpio release on drop failed: {err}");
        }
    }
}

/// Returns an already exported pin to input and unexports it, for exits that
/// happen before the relay was opened. Errors are ignored.
pub fn release_if_exported(config: &RelayConfig) {
    let root = Path::new(&config.sysfs_root);
    let pin_dir = root.join(format!("gpio{}", config.gpio_pin));
    if !pin_dir.exists() {
        return;
    }
    let _ = write_attr(&pin_dir.join("direction"), "in");
    let _ = write_attr(&root.join("unexport"), &config.gpio_pin.to_string());
    debug!(pin = config.gpio_pin, "released exported gpio");
}

fn write_attr(path: &Path, value: &str) -> Result<(), RelayError> {
    std::fs::write(path, value).map_err(|source| RelayError::Io {
        path: path.to_path_buf(),
        source,
    })
}
