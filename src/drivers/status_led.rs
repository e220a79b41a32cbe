//! Single-channel status LED driver.
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal::pwm::SetDutyCycle`: LEDC on ESP-IDF, the
//! simulated channel or a test double elsewhere.  Duty is expressed on a
//! 16-bit scale and rescaled to the channel's native resolution.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::pwm::SetDutyCycle;

use crate::error::ActuatorError;

/// Full-scale duty on the driver's 16-bit scale.
pub const DUTY_FULL: u16 = u16::MAX;

pub struct StatusLed<P> {
    pwm: P,
    current: u16,
}

impl<P: SetDutyCycle> StatusLed<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm, current: 0 }
    }

    /// Set brightness on a `0..=65535` scale.
    pub fn set_duty(&mut self, duty: u16) -> Result<(), ActuatorError> {
        self.pwm
            .set_duty_cycle_fraction(duty, DUTY_FULL)
            .map_err(|_| ActuatorError::PwmWriteFailed)?;
        self.current = duty;
        Ok(())
    }

    /// Set brightness as a percentage; values above 100 saturate.
    pub fn set_percent(&mut self, percent: u8) -> Result<(), ActuatorError> {
        let percent = u32::from(percent.min(100));
        self.set_duty((percent * u32::from(DUTY_FULL) / 100) as u16)
    }

    pub fn off(&mut self) -> Result<(), ActuatorError> {
        self.set_duty(0)
    }

    /// Last duty applied successfully.
    pub fn current(&self) -> u16 {
        self.current
    }
}

/// The LED behind its own lock so a duty write and its record stay paired.
pub struct IndicatorHandle<P> {
    inner: Arc<Mutex<StatusLed<P>>>,
}

impl<P> Clone for IndicatorHandle<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: SetDutyCycle> IndicatorHandle<P> {
    pub fn new(led: StatusLed<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(led)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, StatusLed<P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
