//! Outbound control events.
//!
//! The [`ControlService`](super::service::ControlService) formats these and
//! hands them to the [`EventLog`](super::ports::EventLog) port.

use core::fmt;

use crate::error::Error;
use crate::fsm::StateId;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// The control task has started (carries initial state).
    Started(StateId),

    /// The state machine transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A sampling pass failed; last valid timing retained.
    SensorFault(Error),

    /// The enable switch was released while the output was asserted.
    PulseAborted { after_ms: u32, width_ms: u16 },

    /// Advisory temperature reading crossed the threshold.
    TemperatureAdvisory { celsius: f32, threshold_c: f32 },

    /// Orderly or fault-driven stop.
    Shutdown,
}

impl ControlEvent {
    pub fn level(&self) -> log::Level {
        match self {
            Self::Started(_) | Self::StateChanged { .. } | Self::Shutdown => log::Level::Info,
            Self::SensorFault(_) | Self::PulseAborted { .. } | Self::TemperatureAdvisory { .. } => {
                log::Level::Warn
            }
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started(state) => write!(f, "START | initial_state={:?}", state),
            Self::StateChanged { from, to } => write!(f, "STATE | {:?} -> {:?}", from, to),
            Self::SensorFault(e) => write!(f, "FAULT | {} (holding last valid timing)", e),
            Self::PulseAborted { after_ms, width_ms } => {
                write!(f, "PULSE | aborted after {}/{} ms", after_ms, width_ms)
            }
            Self::TemperatureAdvisory {
                celsius,
                threshold_c,
            } => write!(f, "TEMP | {:.1}\u{00b0}C above {:.1}\u{00b0}C", celsius, threshold_c),
            Self::Shutdown => write!(f, "STOP | output low, tasks stopping"),
        }
    }
}
