//! Application-wide state and error types for the monitor

use alti_core::DeviceError;
use log::info;
use thiserror_no_std::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    Initializing,
    SensorsRunning,
    Stopped,
    Error,
}

impl AppRunState {
    /// Move to `next`, logging the transition.
    pub fn advance(&mut self, next: AppRunState) {
        info!("Monitor state: {:?} -> {:?}", self, next);
        *self = next;
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid setting {key}={value:?}: expected {expected}")]
    Config {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("Sensor error: {0}")]
    Sensor(DeviceError),
}

impl From<DeviceError> for AppError {
    fn from(error: DeviceError) -> Self {
        Self::Sensor(error)
    }
}
