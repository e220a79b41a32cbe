//! Log-based event log adapter.
//!
//! Implements [`EventLog`] by writing control events and completed pulses
//! to the `log` facade (ESP-IDF logger on target, `env_logger` on host).

use log::{Level, log, log_enabled};

use crate::app::ports::{EventLog, LogError};

/// Adapter that logs every event to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    pulses: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed pulses recorded so far.
    pub fn pulse_count(&self) -> u64 {
        self.pulses
    }
}

impl EventLog for LogEventSink {
    fn log_event(&mut self, message: &str, level: Level) -> Result<(), LogError> {
        log!(target: "pulsectl::events", level, "{}", message);
        Ok(())
    }

    fn log_pulse(&mut self, width_ms: u16) -> Result<(), LogError> {
        self.pulses += 1;
        if log_enabled!(target: "pulsectl::events", Level::Trace) {
            log!(target: "pulsectl::events", Level::Trace, "PULSE | #{} width={}ms", self.pulses, width_ms);
        }
        Ok(())
    }
}
