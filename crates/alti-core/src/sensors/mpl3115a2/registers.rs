//! MPL3115A2 register map and configuration bit layouts.

use serde::{Deserialize, Serialize};

/// Fixed 7-bit slave address of the MPL3115A2.
pub const DEVICE_ADDRESS: u8 = 0x60;

/// Number of bytes read per sampling transaction, starting at [`Register::Status`].
pub const SNAPSHOT_LEN: usize = 6;

/// Registers touched by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// DR_STATUS, followed by OUT_P_MSB/CSB/LSB and OUT_T_MSB/LSB
    Status = 0x00,
    /// PT_DATA_CFG, data-ready event flags
    PtDataCfg = 0x13,
    /// CTRL_REG1, mode, oversampling and standby
    CtrlReg1 = 0x26,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

// CTRL_REG1 bits
const CTRL_OS_SHIFT: u8 = 3;
const CTRL_SBYB: u8 = 1 << 0;

// PT_DATA_CFG bits
const CFG_DREM: u8 = 1 << 2;
const CFG_PDEFE: u8 = 1 << 1;
const CFG_TDEFE: u8 = 1 << 0;

// DR_STATUS bits
const STATUS_PTOW: u8 = 1 << 7;
const STATUS_POW: u8 = 1 << 6;
const STATUS_TOW: u8 = 1 << 5;
const STATUS_PTDR: u8 = 1 << 3;
const STATUS_PDR: u8 = 1 << 2;
const STATUS_TDR: u8 = 1 << 1;

/// Oversampling ratio, stored in CTRL_REG1 bits 5:3.
///
/// Higher ratios average more internal conversions per output sample,
/// trading output rate for noise. The minimum time between samples at
/// `X128` is 512 ms on the device, which is why readings taken faster than
/// that may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Oversampling {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
    #[default]
    X128 = 7,
}

impl Oversampling {
    /// Register field value (0..=7)
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Averaging factor this setting represents
    pub const fn ratio(self) -> u8 {
        1 << (self as u8)
    }

    /// Parse an averaging factor such as `128`.
    pub const fn from_ratio(ratio: u32) -> Option<Self> {
        match ratio {
            1 => Some(Self::X1),
            2 => Some(Self::X2),
            4 => Some(Self::X4),
            8 => Some(Self::X8),
            16 => Some(Self::X16),
            32 => Some(Self::X32),
            64 => Some(Self::X64),
            128 => Some(Self::X128),
            _ => None,
        }
    }
}

/// CTRL_REG1 contents.
///
/// The ALT bit (7) is always left clear: OUT_P holds pressure in Pascals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRegister {
    pub oversampling: Oversampling,
    pub active: bool,
}

impl ControlRegister {
    /// Active barometer mode with the given oversampling ratio.
    pub const fn barometer(oversampling: Oversampling) -> Self {
        Self {
            oversampling,
            active: true,
        }
    }

    pub const fn bits(self) -> u8 {
        let sbyb = if self.active { CTRL_SBYB } else { 0 };
        (self.oversampling.bits() << CTRL_OS_SHIFT) | sbyb
    }
}

impl Default for ControlRegister {
    fn default() -> Self {
        Self::barometer(Oversampling::default())
    }
}

/// PT_DATA_CFG contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConfig {
    pub data_ready_event: bool,
    pub pressure_event: bool,
    pub temperature_event: bool,
}

impl DataConfig {
    /// Data-ready events enabled for altitude/pressure and temperature.
    pub const fn all_events() -> Self {
        Self {
            data_ready_event: true,
            pressure_event: true,
            temperature_event: true,
        }
    }

    pub const fn bits(self) -> u8 {
        let mut bits = 0;
        if self.data_ready_event {
            bits |= CFG_DREM;
        }
        if self.pressure_event {
            bits |= CFG_PDEFE;
        }
        if self.temperature_event {
            bits |= CFG_TDEFE;
        }
        bits
    }
}

/// Decoded DR_STATUS byte, the first byte of every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// New pressure/altitude or temperature data is available.
    pub const fn data_ready(self) -> bool {
        self.0 & STATUS_PTDR != 0
    }

    pub const fn pressure_ready(self) -> bool {
        self.0 & STATUS_PDR != 0
    }

    pub const fn temperature_ready(self) -> bool {
        self.0 & STATUS_TDR != 0
    }

    /// Previous data was overwritten before it was read.
    pub const fn overwritten(self) -> bool {
        self.0 & (STATUS_PTOW | STATUS_POW | STATUS_TOW) != 0
    }
}
