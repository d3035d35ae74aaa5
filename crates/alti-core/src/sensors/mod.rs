pub mod mpl3115a2;

use crate::error::TransportError;

/// Trait for sensors that produce typed readings.
///
/// The sampling loop only needs this: one bounded read per tick, reported
/// as a reading or as the transport failure that prevented it.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Self::Readings, TransportError>>;
}

pub use mpl3115a2::Mpl3115a2;
