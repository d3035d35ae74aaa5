//! MPL3115A2 precision altimeter driver
//!
//! Bring-up is two register writes, control register first:
//!
//! | Register    | Value  | Meaning                                        |
//! |-------------|--------|------------------------------------------------|
//! | CTRL_REG1   | `0x39` | barometer mode, OSR = 128, active              |
//! | PT_DATA_CFG | `0x07` | data-ready events for altitude/pressure + temp |
//!
//! After that every measurement is a single write-then-read of six bytes
//! starting at the status register; the device auto-increments its register
//! pointer across the block.

mod decode;
pub mod registers;

pub use decode::{RawRegisterSnapshot, Sample, decode};
pub use registers::{ControlRegister, DataConfig, Oversampling, StatusFlags};

use embassy_time::{Duration, Instant, with_timeout};
use embedded_hal_async::i2c::{Error as I2cError, I2c};
use log::{debug, error, info};

use super::Sensor;
use crate::bus::BusController;
use crate::config::{ConnectionConfig, DeviceConfig};
use crate::error::{DeviceError, TransportError};
use registers::{Register, SNAPSHOT_LEN};

/// A decoded sample together with when and in what state it was captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub captured_at: Instant,
    pub status: StatusFlags,
    pub sample: Sample,
}

impl Reading {
    /// Decode `snapshot` and stamp it with the current time.
    pub fn capture(snapshot: &RawRegisterSnapshot) -> Self {
        Self {
            captured_at: Instant::now(),
            status: snapshot.status(),
            sample: decode(snapshot),
        }
    }
}

/// Handle to an initialized MPL3115A2.
///
/// Owns the bus for as long as it lives; [`Mpl3115a2::release`] hands it back.
pub struct Mpl3115a2<I> {
    i2c: I,
    address: u8,
    timeout: Duration,
}

impl<I: I2c> Mpl3115a2<I> {
    /// Open the device through `controller` and configure it with the
    /// default register settings.
    pub async fn initialize<C>(
        controller: &mut C,
        config: &ConnectionConfig<'_>,
    ) -> Result<Self, DeviceError>
    where
        C: BusController<Bus = I>,
    {
        Self::initialize_with(controller, config, &DeviceConfig::default()).await
    }

    /// Open the device through `controller` and configure it.
    ///
    /// Failure here is terminal for this attempt; nothing is retried.
    pub async fn initialize_with<C>(
        controller: &mut C,
        config: &ConnectionConfig<'_>,
        device: &DeviceConfig,
    ) -> Result<Self, DeviceError>
    where
        C: BusController<Bus = I>,
    {
        let i2c = controller.open(config).map_err(|e| {
            error!(
                "Failed to open controller '{}' for address {:#04x}: {}",
                config.controller, config.address, e
            );
            e.into_device_error(config.address)
        })?;

        let mut sensor = Self::new(i2c, config);
        sensor.configure(device).await?;
        Ok(sensor)
    }

    /// Wrap an already-open bus without touching the device.
    pub fn new(i2c: I, config: &ConnectionConfig<'_>) -> Self {
        Self {
            i2c,
            address: config.address,
            timeout: config.timeout(),
        }
    }

    /// Write CTRL_REG1 then PT_DATA_CFG.
    pub async fn configure(&mut self, device: &DeviceConfig) -> Result<(), DeviceError> {
        let control = ControlRegister::barometer(device.oversampling);

        self.write_register(Register::CtrlReg1, control.bits())
            .await
            .map_err(|e| {
                error!("MPL3115A2 CTRL_REG1 write failed: {}", e);
                DeviceError::InitializationFailed(e)
            })?;

        self.write_register(Register::PtDataCfg, DataConfig::all_events().bits())
            .await
            .map_err(|e| {
                error!("MPL3115A2 PT_DATA_CFG write failed: {}", e);
                DeviceError::InitializationFailed(e)
            })?;

        info!(
            "MPL3115A2 at {:#04x} active (barometer mode, OSR = {})",
            self.address,
            device.oversampling.ratio()
        );

        Ok(())
    }

    /// Read the six status/data registers in one transaction.
    ///
    /// Either all six bytes arrive or an error is returned.
    pub async fn read_snapshot(&mut self) -> Result<RawRegisterSnapshot, TransportError> {
        let mut buf = [0u8; SNAPSHOT_LEN];
        let write = [Register::Status.addr()];

        bounded(
            self.timeout,
            self.i2c.write_read(self.address, &write, &mut buf),
        )
        .await?;

        debug!("MPL3115A2 snapshot: {:02x?}", buf);
        Ok(RawRegisterSnapshot::new(buf))
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back, ending ownership of the device.
    pub fn release(self) -> I {
        self.i2c
    }

    async fn write_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), TransportError> {
        bounded(
            self.timeout,
            self.i2c.write(self.address, &[register.addr(), value]),
        )
        .await
    }
}

/// Run one bus operation under `timeout`.
///
/// A blocking transport (see [`crate::bus::BlockingBus`]) completes on its
/// first poll, so `with_timeout` never fires for it and a stalled transfer
/// comes back as whatever error the driver chose. A failure that arrives
/// after the deadline is therefore reported as `Timeout` too.
async fn bounded<F, E>(timeout: Duration, op: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), E>>,
    E: I2cError,
{
    let started = Instant::now();
    match with_timeout(timeout, op).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if started.elapsed() >= timeout => {
            debug!("Bus error {:?} after deadline", e.kind());
            Err(TransportError::Timeout)
        }
        Ok(Err(e)) => Err(TransportError::from_bus(e)),
        Err(_) => Err(TransportError::Timeout),
    }
}

impl<I: I2c> Sensor for Mpl3115a2<I> {
    type Readings = Reading;

    async fn read(&mut self) -> Result<Reading, TransportError> {
        let snapshot = self.read_snapshot().await?;
        Ok(Reading::capture(&snapshot))
    }
}
