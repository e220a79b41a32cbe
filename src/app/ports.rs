//! Port traits: the boundary between the control core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Digital I/O and the indicator PWM use the `embedded-hal` 1.0 traits
//! directly (`InputPin`, `OutputPin`, `SetDutyCycle`, `DelayNs`).  The
//! traits here cover what `embedded-hal` does not: analog channels,
//! monotonic time, the event log, persisted configuration and the
//! temperature advisory.
//!
//! All port errors are typed; callers handle every variant explicitly.

use crate::config::ControllerConfig;
use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// Analog channel (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// Produces one raw sample in `[0, 65535]` per call.
pub trait AnalogChannel {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

impl<T: AnalogChannel + ?Sized> AnalogChannel for &mut T {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        (**self).read_raw()
    }
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
pub trait TimePort {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event log port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// Where transitions, faults and completed pulses are recorded.
///
/// Called at most once per transition or pulse.  Failures never alter
/// control flow: the service reports them with `log::warn!` and moves on.
pub trait EventLog {
    fn log_event(&mut self, message: &str, level: log::Level) -> Result<(), LogError>;

    fn log_pulse(&mut self, width_ms: u16) -> Result<(), LogError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Returns [`ControllerConfig::default()`] if nothing is stored.
    fn read_config(&self) -> Result<ControllerConfig, ConfigError>;

    fn write_config(&mut self, config: &ControllerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Temperature advisory
// ───────────────────────────────────────────────────────────────

/// Advisory temperature source.  Never gates control decisions.
pub trait TemperatureAdvisory {
    fn read_temperature(&mut self) -> Result<f32, SensorError>;

    /// Read and compare against `threshold_c`.
    fn check_temperature(&mut self, threshold_c: f32) -> Result<(f32, bool), SensorError> {
        let celsius = self.read_temperature()?;
        Ok((celsius, celsius > threshold_c))
    }
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from [`EventLog`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    /// The sink could not accept the record.
    Unavailable,
}

impl core::fmt::Display for LogError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "event log unavailable"),
        }
    }
}

impl std::error::Error for LogError {}
