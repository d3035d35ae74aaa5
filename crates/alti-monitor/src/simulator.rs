//! Simulated MPL3115A2 for running the monitor without hardware.
//!
//! The simulated device answers the same register protocol as the real part:
//! a register pointer set by the first written byte, auto-increment on
//! reads and writes, and no conversions while `CTRL_REG1` holds it in
//! standby. Every read starting at `DR_STATUS` latches a fresh synthetic
//! sample.

use std::time::Instant;

use alti_core::bus::{BlockingBus, BusController, OpenError};
use alti_core::sensors::mpl3115a2::registers::{DEVICE_ADDRESS, Register};
use alti_core::ConnectionConfig;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use log::{debug, info};

/// Controller selector that routes the monitor to the simulator.
pub const SIM_CONTROLLER: &str = "sim";

/// Size of the simulated register file (0x00..=0x2D on the real part).
const REGISTER_COUNT: usize = 0x2E;

/// DR_STATUS after a completed conversion: PDR, TDR and PTDR set.
const STATUS_DATA_READY: u8 = 0x0E;

// SBYB bit of CTRL_REG1
const CTRL_ACTIVE: u8 = 1 << 0;

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Generates synthetic conditions that vary slowly over time.
struct MockSensorGenerator {
    started: Instant,
}

impl MockSensorGenerator {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Current (pressure kPa, temperature °C).
    fn conditions(&self) -> (f64, f64) {
        let t = self.started.elapsed().as_secs_f64();

        // Pressure: 100.9-101.7 kPa, a passing weather front
        let pressure = 101.3 + 0.3 * (t / 90.0).sin() + 0.1 * (t / 13.0).cos();

        // Temperature: 20-23 °C with a shorter cycle
        let temperature = 21.5 + 1.2 * (t / 60.0).sin() + 0.3 * (t / 7.0).cos();

        (pressure, temperature)
    }
}

/// Encode physical values into the `DR_STATUS..OUT_T_LSB` register block.
fn encode(pressure_kpa: f64, temperature_c: f64) -> [u8; 6] {
    // Q18.2 pascals, left-aligned in 24 bits
    let quarter_pa = ((pressure_kpa * 4000.0).round() as u32) & 0x000F_FFFF;
    let raw_pressure = quarter_pa << 4;

    // Q8.4 degrees, left-aligned in 16 bits
    let sixteenths = ((temperature_c * 16.0).round() as i32 as u32) & 0x0FFF;
    let raw_temperature = sixteenths << 4;

    [
        STATUS_DATA_READY,
        (raw_pressure >> 16) as u8,
        (raw_pressure >> 8) as u8,
        raw_pressure as u8,
        (raw_temperature >> 8) as u8,
        raw_temperature as u8,
    ]
}

// ---------------------------------------------------------------------------
// Simulated device
// ---------------------------------------------------------------------------

pub struct SimulatedSensor {
    address: u8,
    registers: [u8; REGISTER_COUNT],
    pointer: usize,
    generator: MockSensorGenerator,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            address: DEVICE_ADDRESS,
            registers: [0; REGISTER_COUNT],
            pointer: 0,
            generator: MockSensorGenerator::new(),
        }
    }

    fn active(&self) -> bool {
        self.registers[Register::CtrlReg1.addr() as usize] & CTRL_ACTIVE != 0
    }

    fn latch(&mut self) {
        let (pressure, temperature) = self.generator.conditions();
        let block = encode(pressure, temperature);
        self.registers[..block.len()].copy_from_slice(&block);
    }

    fn write_registers(&mut self, bytes: &[u8]) {
        let Some((&register, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = register as usize % REGISTER_COUNT;
        for &byte in data {
            self.registers[self.pointer] = byte;
            self.pointer = (self.pointer + 1) % REGISTER_COUNT;
        }
    }

    fn read_registers(&mut self, buffer: &mut [u8]) {
        if self.pointer == Register::Status.addr() as usize && self.active() {
            self.latch();
        }
        for byte in buffer.iter_mut() {
            *byte = self.registers[self.pointer];
            self.pointer = (self.pointer + 1) % REGISTER_COUNT;
        }
    }
}

impl ErrorType for SimulatedSensor {
    type Error = ErrorKind;
}

impl I2c for SimulatedSensor {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.write_registers(bytes),
                Operation::Read(buffer) => self.read_registers(buffer),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Hands out a single simulated device; a second open reports it as busy.
pub struct SimulatedController {
    claimed: bool,
}

impl SimulatedController {
    pub fn new() -> Self {
        Self { claimed: false }
    }
}

impl BusController for SimulatedController {
    type Bus = BlockingBus<SimulatedSensor>;

    fn open(&mut self, config: &ConnectionConfig<'_>) -> Result<Self::Bus, OpenError> {
        if self.claimed {
            debug!("Simulated device already claimed");
            return Err(OpenError::Busy);
        }
        self.claimed = true;
        info!(
            "Using simulated MPL3115A2 (requested address {:#04x})",
            config.address
        );
        Ok(BlockingBus::new(SimulatedSensor::new()))
    }
}
