//! Terminal presentation of sampling outcomes

use alti_core::SampleResult;

/// Render one sampling outcome as the five status lines shown per tick.
pub fn render(result: &SampleResult) -> String {
    match result {
        Ok(reading) => {
            let sample = &reading.sample;
            format!(
                "Pressure: {:.2} kPa\n\
                 Altitude: {:.2} m\n\
                 Temperature in Celsius: {:.2} °C\n\
                 Temperature in Fahrenheit: {:.2} °F\n\
                 Status: Running",
                sample.pressure_kpa, sample.altitude_m, sample.temperature_c, sample.temperature_f
            )
        }
        Err(e) => format!(
            "Pressure: Error\n\
             Altitude: Error\n\
             Temperature in Celsius: Error\n\
             Temperature in Fahrenheit: Error\n\
             Status: Failed to read from Altimeter, Barometer and Temperature Sensor: {}",
            e
        ),
    }
}
