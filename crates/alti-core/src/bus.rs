//! Bus transport plumbing
//!
//! The sensor talks over anything implementing the async
//! `embedded_hal_async::i2c::I2c` trait. This module adds the two seams the
//! driver needs around it:
//!
//! - [`BusController`], which resolves a controller selector and opens the
//!   device at the configured address, reporting a missing controller or a
//!   claimed address distinctly from I/O failure.
//! - [`BlockingBus`], which lets a blocking `embedded_hal::i2c::I2c`
//!   implementation (such as a Linux `/dev/i2c-N` handle) stand in for an
//!   async one.

use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};
use thiserror_no_std::Error;

use crate::config::ConnectionConfig;
use crate::error::{DeviceError, TransportError};

/// Why a bus controller could not hand out a device.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    #[error("no bus controller matches the selector")]
    NotFound,
    #[error("address is claimed by another owner")]
    Busy,
    #[error("failed to open bus controller: {0}")]
    Io(ErrorKind),
}

impl OpenError {
    /// Map onto the initialization error taxonomy for a device at `address`.
    pub const fn into_device_error(self, address: u8) -> DeviceError {
        match self {
            Self::NotFound => DeviceError::NoControllerFound,
            Self::Busy => DeviceError::DeviceBusy { address },
            Self::Io(kind) => DeviceError::InitializationFailed(TransportError::Bus(kind)),
        }
    }
}

/// Resolves a controller selector to an open bus.
///
/// Implemented by the platform layer; the core never enumerates hardware
/// itself.
pub trait BusController {
    type Bus: I2c;

    /// Open the device described by `config`.
    fn open(&mut self, config: &ConnectionConfig<'_>) -> Result<Self::Bus, OpenError>;
}

/// Async view of a blocking I2C implementation.
///
/// Each call runs to completion before returning, so the executor is held
/// for the duration of the transaction. That is acceptable for a single
/// sensor polled a few times per second, which is what it is used for.
pub struct BlockingBus<T> {
    bus: T,
}

impl<T> BlockingBus<T> {
    #[inline]
    pub const fn new(bus: T) -> Self {
        Self { bus }
    }

    /// Give back the wrapped bus.
    pub fn into_inner(self) -> T {
        self.bus
    }
}

impl<T> ErrorType for BlockingBus<T>
where
    T: ErrorType,
{
    type Error = T::Error;
}

impl<T> I2c for BlockingBus<T>
where
    T: embedded_hal::i2c::I2c,
{
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.read(address, read)
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.bus.write(address, write)
    }

    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus.write_read(address, write, read)
    }

    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus.transaction(address, operations)
    }
}
