//! Unified error types for the pulse controller firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! travel through the shared state and FSM inputs without allocation.
//!
//! The control loop never raises on a bad reading: faults are returned as
//! values and the state machine interprets them as transition triggers.

use core::fmt;

// ---------------------------------------------------------------------------
// Fault taxonomy
// ---------------------------------------------------------------------------

/// Coarse classification used by the state machine and the top-level runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Bad or missing sensor data.  Recovered locally: keep the last valid
    /// timing, raise `error_flag`, move to `Error` until a pass validates.
    Sensor,
    /// Mapped timing fell outside its bounds.  Unreachable with clamped
    /// mapping; handled exactly like a sensor fault.
    Mapping,
    /// Anything else.  Forces the output low and stops both tasks.
    Unhandled,
}

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An input could not be read or returned implausible data.
    Sensor(SensorError),
    /// A mapped timing value was out of bounds.
    Mapping(MappingFault),
    /// Driving an output failed.
    Actuator(ActuatorError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Uncategorised failure (task spawn, peripheral init, ...).
    Unhandled(&'static str),
}

impl Error {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Sensor(_) => FaultKind::Sensor,
            Self::Mapping(_) => FaultKind::Mapping,
            Self::Actuator(_) | Self::Config(_) | Self::Unhandled(_) => FaultKind::Unhandled,
        }
    }

    /// True for faults the state machine recovers from on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), FaultKind::Sensor | FaultKind::Mapping)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Mapping(e) => write!(f, "mapping: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Unhandled(msg) => write!(f, "unhandled: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// GPIO read returned an error.
    GpioReadFailed,
    /// Filtered reading is outside the plausible raw window.
    OutOfRange(u16),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::OutOfRange(raw) => write!(f, "reading {raw} out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Mapping faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFault {
    PulseWidthOutOfBounds(i32),
    OffTimeOutOfBounds(i32),
}

impl fmt::Display for MappingFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PulseWidthOutOfBounds(v) => write!(f, "pulse width {v} ms out of bounds"),
            Self::OffTimeOutOfBounds(v) => write!(f, "off time {v} ms out of bounds"),
        }
    }
}

impl From<MappingFault> for Error {
    fn from(e: MappingFault) -> Self {
        Self::Mapping(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Pulse output GPIO set failed.
    OutputWriteFailed,
    /// Indicator PWM duty write failed.
    PwmWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputWriteFailed => write!(f, "output write failed"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
