//! NTC thermistor temperature sensor (10 kOhm @ 25 C, B = 3950).
//!
//! Wired in a voltage-divider with a fixed 10 kOhm resistor, read via
//! the ESP32-S3 ADC.  The simplified Beta equation converts resistance to
//! temperature.  Feeds the advisory check only.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1_CH8 via the oneshot API (initialised by hw_init).
//! On host/test: reads the simulated channel.

use crate::app::ports::TemperatureAdvisory;
use crate::drivers::hw_init;
use crate::error::SensorError;
use crate::pins;

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

pub struct TemperatureSensor {
    channel: u32,
}

impl Default for TemperatureSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureSensor {
    pub fn new() -> Self {
        Self {
            channel: pins::ADC1_CH_TEMP,
        }
    }
}

impl TemperatureAdvisory for TemperatureSensor {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        let raw = hw_init::adc1_read(self.channel).ok_or(SensorError::AdcReadFailed)?;
        adc_to_celsius(raw).ok_or(SensorError::OutOfRange(raw))
    }
}

/// `None` when the divider is open or shorted.
pub fn adc_to_celsius(raw: u16) -> Option<f32> {
    let voltage = (f32::from(raw) / ADC_MAX) * V_REF;
    if voltage <= 0.01 || voltage >= (V_REF - 0.01) {
        return None;
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return None;
    }
    Some((1.0 / inv_t) - 273.15)
}
