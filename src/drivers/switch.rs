//! Debounced enable switch.
//!
//! ## Debounce rule
//!
//! A raw level becomes the stable level only when all of these hold:
//! it differs from the current stable level, it matches the previous raw
//! reading (two consecutive polls agree), it has read the same for at least
//! `window_ms`, and at least `window_ms` has passed since the last accepted
//! transition.  A glitch shorter than the window is never reported, and at
//! most one transition is accepted per window.
//!
//! The pure state lives in [`SwitchDebouncer`]; [`EnableSwitch`] wraps it
//! around any `embedded-hal` input pin and applies the wiring polarity.

use embedded_hal::digital::InputPin;

use crate::error::SensorError;

/// Debounce state, owned solely by the main control task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchDebouncer {
    raw_level: bool,
    raw_since_ms: u64,
    stable_level: bool,
    last_change_ms: u64,
    window_ms: u64,
}

impl SwitchDebouncer {
    pub fn new(window_ms: u64, initial: bool, now_ms: u64) -> Self {
        Self {
            raw_level: initial,
            raw_since_ms: now_ms,
            stable_level: initial,
            last_change_ms: now_ms,
            window_ms,
        }
    }

    /// Feed one raw reading; returns the (possibly updated) stable level.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> bool {
        if raw != self.raw_level {
            self.raw_level = raw;
            self.raw_since_ms = now_ms;
            return self.stable_level;
        }
        if raw != self.stable_level
            && now_ms.saturating_sub(self.raw_since_ms) >= self.window_ms
            && now_ms.saturating_sub(self.last_change_ms) >= self.window_ms
        {
            self.stable_level = raw;
            self.last_change_ms = now_ms;
        }
        self.stable_level
    }

    pub fn level(&self) -> bool {
        self.stable_level
    }

    pub fn last_change_ms(&self) -> u64 {
        self.last_change_ms
    }
}

/// Enable input with polarity and debounce applied.  `true` = enabled.
pub struct EnableSwitch<P> {
    pin: P,
    active_low: bool,
    debouncer: SwitchDebouncer,
}

impl<P: InputPin> EnableSwitch<P> {
    /// Starts in the inactive state.
    pub fn new(pin: P, active_low: bool, window_ms: u64, now_ms: u64) -> Self {
        Self {
            pin,
            active_low,
            debouncer: SwitchDebouncer::new(window_ms, false, now_ms),
        }
    }

    /// Sample the pin and advance the debouncer.
    ///
    /// A failed read leaves the debounce state untouched and is returned
    /// as `GpioReadFailed`; the caller treats that poll as inactive.
    pub fn poll(&mut self, now_ms: u64) -> Result<bool, SensorError> {
        let high = self.pin.is_high().map_err(|_| SensorError::GpioReadFailed)?;
        let active = high != self.active_low;
        Ok(self.debouncer.update(active, now_ms))
    }

    /// Last debounced level without touching the pin.
    pub fn is_active(&self) -> bool {
        self.debouncer.level()
    }
}
