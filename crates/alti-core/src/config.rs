use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::sensors::mpl3115a2::registers::{DEVICE_ADDRESS, Oversampling};

/// Selector that asks the bus controller to pick the first controller it finds.
pub const AUTO_CONTROLLER: &str = "auto";

pub const DEFAULT_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_INTERVAL_MS: u64 = 300;

/// I2C bus speed tier
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusSpeed {
    /// 100 kHz
    Standard,
    /// 400 kHz
    #[default]
    Fast,
}

impl BusSpeed {
    pub const fn frequency_hz(self) -> u32 {
        match self {
            Self::Standard => 100_000,
            Self::Fast => 400_000,
        }
    }
}

/// Where and how to reach the sensor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct ConnectionConfig<'a> {
    /// Bus controller selector, resolved by the [`crate::bus::BusController`]
    pub controller: &'a str,
    pub address: u8,
    pub speed: BusSpeed,
    /// Upper bound on a single bus transaction
    pub timeout_ms: u64,
}

impl<'a> ConnectionConfig<'a> {
    pub const fn new(controller: &'a str) -> Self {
        Self {
            controller,
            address: DEVICE_ADDRESS,
            speed: BusSpeed::Fast,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ConnectionConfig<'_> {
    fn default() -> Self {
        Self::new(AUTO_CONTROLLER)
    }
}

/// Register-level device settings written during initialization.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub oversampling: Oversampling,
}

/// Sampling loop settings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SamplerConfig {
    pub interval_ms: u64,
    /// Extra attempts for a failed read within the same tick
    pub read_retries: u8,
}

impl SamplerConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            read_retries: 0,
        }
    }
}
