//! Pulse output line driver.
//!
//! A dumb actuator over any `embedded-hal` output pin.  Tracks the level it
//! last drove successfully so the control service can mirror it into the
//! shared `pulse_active` flag.
//!
//! ## Safety contract
//!
//! `release()` is the fail-safe path: it is attempted on every fault and on
//! shutdown, and the tracked level is cleared even if the write reports an
//! error so the line is never assumed to be asserted.

use embedded_hal::digital::OutputPin;

use crate::error::ActuatorError;

pub struct PulseOutput<O> {
    pin: O,
    asserted: bool,
}

impl<O: OutputPin> PulseOutput<O> {
    /// Takes the pin and drives it low.
    pub fn new(mut pin: O) -> Result<Self, ActuatorError> {
        pin.set_low().map_err(|_| ActuatorError::OutputWriteFailed)?;
        Ok(Self {
            pin,
            asserted: false,
        })
    }

    pub fn assert(&mut self) -> Result<(), ActuatorError> {
        self.pin.set_high().map_err(|_| ActuatorError::OutputWriteFailed)?;
        self.asserted = true;
        Ok(())
    }

    pub fn release(&mut self) -> Result<(), ActuatorError> {
        self.asserted = false;
        self.pin.set_low().map_err(|_| ActuatorError::OutputWriteFailed)
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    /// Give the pin back (tests and teardown).
    pub fn into_inner(self) -> O {
        self.pin
    }
}
