//! Potentiometer input on an ADC1 oneshot channel.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the channel through `hw_init::adc1_read`.
//! On host/test: reads the simulated channel (`hw_init::sim_set_adc`).
//!
//! The native 12-bit conversion is widened to the full 16-bit range so
//! every downstream stage works on `[0, 65535]` regardless of the ADC.

use crate::app::ports::AnalogChannel;
use crate::drivers::hw_init;
use crate::error::SensorError;
use crate::pins;

pub struct Potentiometer {
    channel: u32,
    name: &'static str,
}

impl Potentiometer {
    pub fn new(channel: u32, name: &'static str) -> Self {
        Self { channel, name }
    }

    /// Wiper feeding the pulse-width mapping.
    pub fn pulse_width() -> Self {
        Self::new(pins::ADC1_CH_PULSE_WIDTH, "pulse_width")
    }

    /// Wiper feeding the off-time mapping.
    pub fn off_time() -> Self {
        Self::new(pins::ADC1_CH_OFF_TIME, "off_time")
    }
}

impl AnalogChannel for Potentiometer {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        match hw_init::adc1_read(self.channel) {
            Some(raw) => Ok(widen_12_to_16(raw)),
            None => {
                log::debug!("POT: {} (ADC1 ch{}) read failed", self.name, self.channel);
                Err(SensorError::AdcReadFailed)
            }
        }
    }
}

/// Bit-replicate a 12-bit code to 16 bits (0 → 0, 4095 → 65535).
pub fn widen_12_to_16(raw: u16) -> u16 {
    let raw = raw.min(4095);
    (raw << 4) | (raw >> 8)
}
