//! Error types for device bring-up and sampling

use embedded_hal_async::i2c::{Error as I2cError, ErrorKind};
use thiserror_no_std::Error;

/// A failed bus transaction.
///
/// Reported per sampling cycle; never fatal to the sampling loop.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("I2C bus error: {0}")]
    Bus(ErrorKind),
    #[error("I2C transaction timed out")]
    Timeout,
}

impl TransportError {
    /// Reduce a HAL-specific bus error to its portable kind.
    pub fn from_bus<E: I2cError>(error: E) -> Self {
        Self::Bus(error.kind())
    }
}

/// Failures that end device initialization. None are retried automatically.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("No I2C controllers were found on the system")]
    NoControllerFound,
    #[error(
        "Slave address {address:#04x} is currently in use by another owner. \
        Please ensure that nothing else is using the device."
    )]
    DeviceBusy { address: u8 },
    #[error("Failed to communicate with device: {0}")]
    InitializationFailed(TransportError),
}
