//! Indicator task: renders controller status on the status LED.
//!
//! Reads the shared snapshot every refresh, picks a pattern and writes the
//! resulting duty.  Never touches the pulse output or the FSM.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use log::{info, warn};

use crate::config::ControllerConfig;
use crate::drivers::led_patterns::{LedPatternEngine, Pattern};
use crate::drivers::status_led::IndicatorHandle;
use crate::drivers::watchdog::{WatchdogLiaison, WatchdogTimer, sleep_fed};
use crate::error::ActuatorError;
use crate::fsm::StateId;
use crate::shared::{ShutdownSignal, StateReader, StateSnapshot};

use super::ports::TimePort;

/// Pattern for a controller snapshot.
///
/// Startup blinks, Error fault-blinks, Pulsing (or any asserted output)
/// shows solid and Ready/Running breathe.
pub fn select_pattern(snapshot: &StateSnapshot, cfg: &ControllerConfig) -> Pattern {
    match snapshot.state {
        StateId::Startup => Pattern::startup(cfg),
        StateId::Error => Pattern::fault(cfg),
        StateId::Pulsing => Pattern::Solid,
        _ if snapshot.pulse_active => Pattern::Solid,
        _ => Pattern::breathing(cfg),
    }
}

pub struct IndicatorTask<P, C, W> {
    reader: StateReader,
    led: IndicatorHandle<P>,
    engine: LedPatternEngine,
    clock: C,
    watchdog: Arc<WatchdogLiaison<W>>,
    config: ControllerConfig,
    last_ms: Option<u64>,
    write_fault: bool,
}

impl<P, C, W> IndicatorTask<P, C, W>
where
    P: SetDutyCycle,
    C: DelayNs + TimePort,
    W: WatchdogTimer,
{
    pub fn new(
        reader: StateReader,
        led: IndicatorHandle<P>,
        clock: C,
        watchdog: Arc<WatchdogLiaison<W>>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            reader,
            led,
            engine: LedPatternEngine::new(),
            clock,
            watchdog,
            config,
            last_ms: None,
            write_fault: false,
        }
    }

    /// Render one frame and return the duty written.
    pub fn step(&mut self) -> Result<u16, ActuatorError> {
        let snapshot = self.reader.snapshot();
        let pattern = select_pattern(&snapshot, &self.config);
        let now = self.clock.now_ms();
        let delta = self.last_ms.map_or(0, |last| now.saturating_sub(last));
        self.last_ms = Some(now);

        let duty = self
            .engine
            .tick(pattern, u32::try_from(delta).unwrap_or(u32::MAX));
        self.led.lock().set_duty(duty)?;
        Ok(duty)
    }

    /// Refresh until shutdown, then switch the LED off.
    ///
    /// A failed duty write is cosmetic: it is warned about once and the
    /// task keeps running.
    pub fn run(&mut self, shutdown: &ShutdownSignal) {
        info!("LED: indicator running");
        let refresh = u32::from(self.config.indicator_refresh_ms);
        while !shutdown.is_requested() {
            match self.step() {
                Ok(_) => self.write_fault = false,
                Err(e) if !self.write_fault => {
                    warn!("LED: {}", e);
                    self.write_fault = true;
                }
                Err(_) => {}
            }
            self.watchdog.feed();
            sleep_fed(&*self.watchdog, &mut self.clock, refresh, |_| shutdown.is_requested());
        }
        if let Err(e) = self.led.lock().off() {
            warn!("LED: failed to switch off: {}", e);
        }
        info!("LED: indicator stopped");
    }

    pub fn active_pattern(&self) -> Option<Pattern> {
        self.engine.active()
    }
}
