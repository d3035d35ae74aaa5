//! Monitor settings, read from the environment
//!
//! An optional `.env` file in the working directory is loaded first.
//!
//! | Variable             | Default | Meaning                                      |
//! |----------------------|---------|----------------------------------------------|
//! | `ALTI_BUS`           | `auto`  | `auto`, `sim`, a bus number or a device path |
//! | `ALTI_INTERVAL_MS`   | `300`   | sampling interval                            |
//! | `ALTI_TIMEOUT_MS`    | `100`   | per-transaction bus timeout                  |
//! | `ALTI_READ_RETRIES`  | `0`     | extra read attempts within one tick          |
//! | `ALTI_OVERSAMPLING`  | `128`   | oversampling ratio (1, 2, 4, ... 128)        |
//! | `ALTI_RUN_FOR_SECS`  | unset   | stop sampling after this long                |

use core::ops::RangeInclusive;
use core::str::FromStr;

use alti_core::config::{AUTO_CONTROLLER, DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use alti_core::sensors::mpl3115a2::Oversampling;
use alti_core::{ConnectionConfig, DeviceConfig, SamplerConfig};
use embassy_time::Duration;
use log::{info, warn};

use crate::app_state::AppError;

/// Longest accepted sampling interval (one hour)
const MAX_INTERVAL_MS: u64 = 3_600_000;
/// Longest accepted bus transaction timeout (one minute)
const MAX_TIMEOUT_MS: u64 = 60_000;
/// Longest accepted run time (one year)
const MAX_RUN_FOR_SECS: u64 = 365 * 24 * 60 * 60;

pub struct Settings {
    pub bus: String,
    pub timeout_ms: u64,
    pub sampler: SamplerConfig,
    pub device: DeviceConfig,
    pub run_for: Option<Duration>,
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded settings from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let bus = lookup("ALTI_BUS").unwrap_or_else(|| AUTO_CONTROLLER.to_string());
        let timeout_ms = parse(
            &lookup,
            "ALTI_TIMEOUT_MS",
            DEFAULT_TIMEOUT_MS,
            1..=MAX_TIMEOUT_MS,
            "milliseconds (1-60000)",
        )?;
        let interval_ms = parse(
            &lookup,
            "ALTI_INTERVAL_MS",
            DEFAULT_INTERVAL_MS,
            1..=MAX_INTERVAL_MS,
            "milliseconds (1-3600000)",
        )?;
        let read_retries = parse(
            &lookup,
            "ALTI_READ_RETRIES",
            0u8,
            0..=u8::MAX,
            "a retry count (0-255)",
        )?;

        let ratio = parse(
            &lookup,
            "ALTI_OVERSAMPLING",
            128u32,
            1..=128,
            "1, 2, 4, 8, 16, 32, 64 or 128",
        )?;
        let oversampling = Oversampling::from_ratio(ratio).ok_or_else(|| AppError::Config {
            key: "ALTI_OVERSAMPLING",
            value: ratio.to_string(),
            expected: "1, 2, 4, 8, 16, 32, 64 or 128",
        })?;

        let run_for = match lookup("ALTI_RUN_FOR_SECS") {
            Some(_) => Some(Duration::from_secs(parse(
                &lookup,
                "ALTI_RUN_FOR_SECS",
                0u64,
                0..=MAX_RUN_FOR_SECS,
                "seconds (0-31536000)",
            )?)),
            None => None,
        };

        Ok(Self {
            bus,
            timeout_ms,
            sampler: SamplerConfig {
                interval_ms,
                read_retries,
            },
            device: DeviceConfig { oversampling },
            run_for,
        })
    }

    pub fn connection(&self) -> ConnectionConfig<'_> {
        ConnectionConfig {
            timeout_ms: self.timeout_ms,
            ..ConnectionConfig::new(&self.bus)
        }
    }
}

/// Read `key`, falling back to `default` when unset. Values outside `range`
/// are rejected so that later `Duration`/`Instant` arithmetic cannot overflow.
fn parse<T: FromStr + PartialOrd>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
    range: RangeInclusive<T>,
    expected: &'static str,
) -> Result<T, AppError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    let parsed: Result<T, _> = value.trim().parse();
    match parsed {
        Ok(parsed) if range.contains(&parsed) => Ok(parsed),
        _ => Err(AppError::Config {
            key,
            value,
            expected,
        }),
    }
}
