//! Hardware adapter: bridges ESP32 peripherals to `embedded-hal` traits.
//!
//! The drivers in [`crate::drivers`] are generic over `InputPin`,
//! `OutputPin` and `SetDutyCycle`; this module supplies the concrete pins
//! backed by `hw_init`.  On non-espidf targets the same types talk to the
//! atomics-backed simulation.

use core::convert::Infallible;

use embedded_hal::digital::{self, ErrorType as DigitalErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{self, ErrorType as PwmErrorType, SetDutyCycle};

use crate::drivers::hw_init;
use crate::pins;

// ── Errors ────────────────────────────────────────────────────

/// A GPIO register write was rejected by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioWriteError(pub i32);

impl digital::Error for GpioWriteError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// An LEDC duty update was rejected by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedcWriteError(pub u32);

impl pwm::Error for LedcWriteError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

// ── Input ─────────────────────────────────────────────────────

/// Configured GPIO input (pull-up set in `hw_init`).
pub struct GpioInput {
    gpio: i32,
}

impl GpioInput {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub fn enable_switch() -> Self {
        Self::new(pins::ENABLE_SWITCH_GPIO)
    }
}

impl DigitalErrorType for GpioInput {
    type Error = Infallible;
}

impl InputPin for GpioInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(hw_init::gpio_read(self.gpio))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!hw_init::gpio_read(self.gpio))
    }
}

// ── Output ────────────────────────────────────────────────────

/// Configured GPIO push-pull output.
pub struct GpioOutput {
    gpio: i32,
}

impl GpioOutput {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub fn pulse_line() -> Self {
        Self::new(pins::PULSE_OUTPUT_GPIO)
    }

    fn write(&mut self, high: bool) -> Result<(), GpioWriteError> {
        if hw_init::gpio_write(self.gpio, high) {
            Ok(())
        } else {
            Err(GpioWriteError(self.gpio))
        }
    }
}

impl DigitalErrorType for GpioOutput {
    type Error = GpioWriteError;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

// ── PWM ───────────────────────────────────────────────────────

/// One LEDC channel at the resolution configured in `hw_init`.
pub struct LedcPwm {
    channel: u32,
}

impl LedcPwm {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }

    pub fn status_led() -> Self {
        Self::new(pins::LEDC_CH_STATUS)
    }
}

impl PwmErrorType for LedcPwm {
    type Error = LedcWriteError;
}

impl SetDutyCycle for LedcPwm {
    fn max_duty_cycle(&self) -> u16 {
        hw_init::LEDC_MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if hw_init::ledc_set(self.channel, duty.min(hw_init::LEDC_MAX_DUTY)) {
            Ok(())
        } else {
            Err(LedcWriteError(self.channel))
        }
    }
}
