//! Linux I2C controller discovery
//!
//! Controllers are the `/dev/i2c-N` character devices. A selector is one of:
//! `auto` (lowest-numbered controller present), a bare bus number, or an
//! explicit device path. An address already bound to a kernel driver under
//! `/sys/bus/i2c/devices` is reported as busy instead of being opened.

use std::fs;
use std::path::{Path, PathBuf};

use alti_core::bus::{BlockingBus, BusController, OpenError};
use alti_core::config::AUTO_CONTROLLER;
use alti_core::ConnectionConfig;
use embedded_hal::i2c::ErrorKind;
use linux_embedded_hal::I2cdev;
use log::{debug, error, info};

const DEV_DIR: &str = "/dev";
const SYSFS_I2C_DEVICES: &str = "/sys/bus/i2c/devices";
const CONTROLLER_PREFIX: &str = "i2c-";

pub struct LinuxBusController {
    dev_dir: PathBuf,
    sysfs_dir: PathBuf,
}

impl LinuxBusController {
    pub fn new() -> Self {
        Self::with_roots(DEV_DIR, SYSFS_I2C_DEVICES)
    }

    fn with_roots(dev_dir: impl Into<PathBuf>, sysfs_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            sysfs_dir: sysfs_dir.into(),
        }
    }

    /// Resolve a selector to a controller device path, if one exists.
    fn resolve(&self, selector: &str) -> Option<PathBuf> {
        if selector.is_empty() || selector == AUTO_CONTROLLER {
            return self.first_controller();
        }

        let path = match selector.parse::<u32>() {
            Ok(bus) => self.dev_dir.join(format!("{CONTROLLER_PREFIX}{bus}")),
            Err(_) => PathBuf::from(selector),
        };
        path.exists().then_some(path)
    }

    fn first_controller(&self) -> Option<PathBuf> {
        let entries = match fs::read_dir(&self.dev_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", self.dev_dir.display(), e);
                return None;
            }
        };

        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                bus_number(&path).map(|bus| (bus, path))
            })
            .min_by_key(|(bus, _)| *bus)
            .map(|(_, path)| path)
    }

    /// Whether a kernel driver is bound to `address` on `bus`.
    fn address_claimed(&self, bus: u32, address: u8) -> bool {
        self.sysfs_dir
            .join(format!("{bus}-{address:04x}"))
            .join("driver")
            .exists()
    }
}

impl BusController for LinuxBusController {
    type Bus = BlockingBus<I2cdev>;

    fn open(&mut self, config: &ConnectionConfig<'_>) -> Result<Self::Bus, OpenError> {
        let path = self.resolve(config.controller).ok_or(OpenError::NotFound)?;

        if let Some(bus) = bus_number(&path) {
            if self.address_claimed(bus, config.address) {
                return Err(OpenError::Busy);
            }
        }

        // Clock rate belongs to the adapter driver, not to individual devices
        debug!(
            "Requested {} Hz on {}",
            config.speed.frequency_hz(),
            path.display()
        );

        let device = I2cdev::new(&path).map_err(|e| {
            error!("Failed to open {}: {:?}", path.display(), e);
            OpenError::Io(ErrorKind::Other)
        })?;

        info!("Opened I2C controller {}", path.display());
        Ok(BlockingBus::new(device))
    }
}

/// Bus number of an `i2c-N` controller path.
fn bus_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix(CONTROLLER_PREFIX)?
        .parse()
        .ok()
}
