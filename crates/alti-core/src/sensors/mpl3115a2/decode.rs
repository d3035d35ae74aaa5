//! Conversion of raw register snapshots into physical units.
//!
//! Everything here is pure: a snapshot in, a sample out. Every 6-byte
//! pattern decodes to a defined value.

use super::registers::{SNAPSHOT_LEN, StatusFlags};

/// Reference sea-level pressure of the vendor altitude formula, in Pa.
const SEA_LEVEL_PA: f64 = 101326.0;
const ALTITUDE_SCALE: f64 = 44330.77;
const ALTITUDE_EXPONENT: f64 = 0.1902632;

/// The six bytes starting at DR_STATUS, exactly as read from the bus.
///
/// Layout: `[status, p_msb, p_csb, p_lsb, t_msb, t_lsb]`. Only the high
/// nibble of `p_lsb` and `t_lsb` carries data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRegisterSnapshot([u8; SNAPSHOT_LEN]);

impl RawRegisterSnapshot {
    pub const fn new(bytes: [u8; SNAPSHOT_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; SNAPSHOT_LEN] {
        &self.0
    }

    pub const fn status(&self) -> StatusFlags {
        StatusFlags::from_bits(self.0[0])
    }

    /// 20-bit OUT_P field, left-aligned in 24 bits with the low nibble cleared.
    pub const fn raw_pressure(&self) -> u32 {
        ((self.0[1] as u32) << 16) | ((self.0[2] as u32) << 8) | (self.0[3] & 0xF0) as u32
    }

    /// 12-bit OUT_T field, left-aligned in 16 bits with the low nibble cleared.
    pub const fn raw_temperature(&self) -> u32 {
        ((self.0[4] as u32) << 8) | (self.0[5] & 0xF0) as u32
    }
}

impl From<[u8; SNAPSHOT_LEN]> for RawRegisterSnapshot {
    fn from(bytes: [u8; SNAPSHOT_LEN]) -> Self {
        Self::new(bytes)
    }
}

/// One decoded barometer-mode measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub pressure_kpa: f64,
    pub altitude_m: f64,
    pub temperature_c: f64,
    pub temperature_f: f64,
}

/// Decode a barometer-mode snapshot.
///
/// Both fields are read as unsigned with no sign extension, so OUT_T values
/// at or above `0x80` (below-freezing temperatures on the device) decode as
/// 128 °C and up rather than as negatives.
pub fn decode(snapshot: &RawRegisterSnapshot) -> Sample {
    let raw_p = snapshot.raw_pressure();

    // Integer Pascals sit above bit 6, quarter Pascals in bits 5:4.
    let pressure_kpa = ((raw_p >> 6) as f64 + ((raw_p >> 4) & 0x03) as f64 / 4.0) / 1000.0;
    let altitude_m = altitude_from_pressure(pressure_kpa);
    let (temperature_c, temperature_f) = temperatures(snapshot);

    Sample {
        pressure_kpa,
        altitude_m,
        temperature_c,
        temperature_f,
    }
}

/// Vendor barometric formula. Constants must stay exactly as given.
fn altitude_from_pressure(pressure_kpa: f64) -> f64 {
    let pressure_pa = pressure_kpa * 1000.0;
    ALTITUDE_SCALE * (1.0 - libm::pow(pressure_pa / SEA_LEVEL_PA, ALTITUDE_EXPONENT)) / 100.0
}

fn temperatures(snapshot: &RawRegisterSnapshot) -> (f64, f64) {
    let celsius = snapshot.raw_temperature() as f64 / 256.0;
    (celsius, celsius * 1.8 + 32.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bytes: [u8; 6]) -> RawRegisterSnapshot {
        RawRegisterSnapshot::new(bytes)
    }

    /// Small deterministic generator so the property tests cover varied bytes.
    fn pseudo_random_snapshots(count: usize) -> impl Iterator<Item = [u8; 6]> {
        let mut state: u32 = 0x1234_5678;
        (0..count).map(move |_| {
            let mut bytes = [0u8; 6];
            for b in bytes.iter_mut() {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                *b = (state >> 24) as u8;
            }
            bytes
        })
    }

    #[test]
    fn test_known_vector() {
        let sample = decode(&snapshot([0x00, 0x30, 0x00, 0x00, 0x19, 0x00]));

        assert_eq!(sample.pressure_kpa, 49.152);
        assert_eq!(sample.temperature_c, 25.0);
        assert_eq!(sample.temperature_f, 77.0);
    }

    #[test]
    fn test_raw_field_assembly() {
        let s = snapshot([0x00, 0x30, 0x00, 0x00, 0x19, 0x00]);
        assert_eq!(s.raw_pressure(), 3_145_728);
        assert_eq!(s.raw_temperature(), 6400);
    }

    #[test]
    fn test_quarter_pascal_fraction() {
        // raw_p = 0x000030: integer part 0, fraction bits 0b11
        let sample = decode(&snapshot([0x00, 0x00, 0x00, 0x30, 0x00, 0x00]));
        assert_eq!(sample.pressure_kpa, 0.75 / 1000.0);

        // raw_p = 0x000050: integer part 1, fraction bits 0b01
        let sample = decode(&snapshot([0x00, 0x00, 0x00, 0x50, 0x00, 0x00]));
        assert_eq!(sample.pressure_kpa, 1.25 / 1000.0);
    }

    #[test]
    fn test_temperature_fraction_nibble() {
        // 0x19_80 => 25 + 8/16
        let sample = decode(&snapshot([0x00, 0x00, 0x00, 0x00, 0x19, 0x80]));
        assert_eq!(sample.temperature_c, 25.5);
    }

    #[test]
    fn test_altitude_is_zero_at_reference_pressure() {
        // 101326 Pa << 6 = 0x62F380
        let sample = decode(&snapshot([0x00, 0x62, 0xF3, 0x80, 0x00, 0x00]));
        assert_eq!(sample.pressure_kpa, 101.326);
        assert!(sample.altitude_m.abs() < 1e-9, "altitude {}", sample.altitude_m);
    }

    #[test]
    fn test_altitude_decreases_with_pressure() {
        let low = decode(&snapshot([0x00, 0x5F, 0x00, 0x00, 0x00, 0x00]));
        let high = decode(&snapshot([0x00, 0x62, 0x00, 0x00, 0x00, 0x00]));
        assert!(low.pressure_kpa < high.pressure_kpa);
        assert!(low.altitude_m > high.altitude_m);
    }

    #[test]
    fn test_altitude_formula_constants() {
        let sample = decode(&snapshot([0x00, 0x30, 0x00, 0x00, 0x19, 0x00]));
        let expected = 44330.77 * (1.0 - libm::pow(49152.0 / 101326.0, 0.1902632)) / 100.0;
        assert!((sample.altitude_m - expected).abs() < 1e-9);
    }

    #[test]
    fn test_low_nibbles_never_affect_output() {
        for bytes in pseudo_random_snapshots(256) {
            let base = decode(&snapshot(bytes));

            let mut p_noise = bytes;
            p_noise[3] |= 0x0F;
            assert_eq!(decode(&snapshot(p_noise)), base);

            let mut t_noise = bytes;
            t_noise[5] |= 0x0F;
            assert_eq!(decode(&snapshot(t_noise)), base);
        }
    }

    #[test]
    fn test_status_byte_never_affects_sample() {
        let with_status = decode(&snapshot([0xFF, 0x61, 0x23, 0x40, 0x15, 0x30]));
        let without = decode(&snapshot([0x00, 0x61, 0x23, 0x40, 0x15, 0x30]));
        assert_eq!(with_status, without);
    }

    #[test]
    fn test_fahrenheit_invariant_holds_exactly() {
        for bytes in pseudo_random_snapshots(512) {
            let sample = decode(&snapshot(bytes));
            assert_eq!(sample.temperature_f, sample.temperature_c * 1.8 + 32.0);
        }
    }

    #[test]
    fn test_decode_is_total_and_deterministic() {
        let extremes = [[0x00; 6], [0xFF; 6]];
        for bytes in extremes.into_iter().chain(pseudo_random_snapshots(512)) {
            let first = decode(&snapshot(bytes));
            let second = decode(&snapshot(bytes));
            assert_eq!(first, second);
            assert!(first.pressure_kpa.is_finite());
            assert!(first.altitude_m.is_finite());
            assert!(first.temperature_c.is_finite());
        }
    }

    #[test]
    fn test_temperature_is_not_sign_extended() {
        // -1.0 °C in two's complement reads back as 255.0 °C
        let sample = decode(&snapshot([0x00, 0x62, 0xF3, 0x80, 0xFF, 0x00]));
        assert_eq!(sample.temperature_c, 255.0);
        assert_eq!(sample.temperature_f, 255.0 * 1.8 + 32.0);
    }
}
