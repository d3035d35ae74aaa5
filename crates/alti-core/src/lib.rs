//! Hardware-independent core library for alti-rs
//!
//! This crate contains all platform-agnostic logic for driving an MPL3115A2
//! barometric altimeter: the register map, the one-time device configuration,
//! the pure snapshot decoder and the fixed-interval sampling loop.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the monitor binary and tests).

#![no_std]

extern crate alloc;

pub mod bus;
pub mod config;
pub mod error;
pub mod sampling;
pub mod sensors;

pub use config::{BusSpeed, ConnectionConfig, DeviceConfig, SamplerConfig};
pub use error::{DeviceError, TransportError};
pub use sampling::{
    ChannelConsumer, SampleConsumer, SampleResult, Sampler, SamplerControl, SamplerState,
};
pub use sensors::mpl3115a2::{Mpl3115a2, RawRegisterSnapshot, Reading, Sample, decode};
