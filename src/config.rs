//! Controller configuration parameters
//!
//! All tunable parameters for the pulse controller.  Loaded once at boot
//! from the config store (NVS) and never consulted on the timing-critical
//! path afterwards.

use serde::{Deserialize, Serialize};

use crate::shared::{OFF_TIME_RANGE_MS, PULSE_WIDTH_RANGE_MS};

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Sampling ---
    /// Readings per sampling pass (min 3: lowest and highest are discarded)
    pub sample_count: u8,
    /// Spacing between readings (milliseconds)
    pub sample_interval_ms: u16,
    /// Lowest plausible filtered raw value
    pub raw_valid_min: u16,
    /// Highest plausible filtered raw value
    pub raw_valid_max: u16,
    /// Curve steepness for the off-time log mapping
    pub off_time_aggression: f32,

    // --- Enable switch ---
    /// Minimum time between accepted switch transitions (milliseconds)
    pub debounce_ms: u16,
    /// Enable input reads LOW when active (pull-up wiring)
    pub enable_active_low: bool,

    // --- Watchdog ---
    /// Hardware watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,
    /// Longest uninterrupted sleep; every sleep is chunked to this
    pub feed_interval_ms: u32,

    // --- State machine timing ---
    /// Wait between Ready refresh cycles (milliseconds)
    pub ready_poll_ms: u32,
    /// Wait between Error re-sampling attempts (milliseconds)
    pub error_retry_ms: u32,

    // --- Fallbacks (seed the last-valid timing at boot) ---
    pub fallback_pulse_width_ms: u16,
    pub fallback_off_time_ms: u16,

    // --- Status indicator ---
    pub startup_blink_count: u8,
    /// On time and off time of one startup blink (milliseconds)
    pub startup_blink_ms: u16,
    pub fault_blink_count: u8,
    pub fault_blink_ms: u16,
    pub fault_pause_ms: u16,
    pub breathing_period_ms: u16,
    /// Shared-state re-read period for the indicator task (milliseconds)
    pub indicator_refresh_ms: u16,

    // --- Temperature advisory (never gates control) ---
    pub temperature_threshold_c: f32,
    pub temperature_check_interval_ms: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Sampling
            sample_count: 15,
            sample_interval_ms: 5,
            raw_valid_min: 0,
            raw_valid_max: u16::MAX,
            off_time_aggression: 1.5,

            // Enable switch
            debounce_ms: 20,
            enable_active_low: true,

            // Watchdog
            watchdog_timeout_ms: 2000,
            feed_interval_ms: 20,

            // State machine
            ready_poll_ms: 50,
            error_retry_ms: 500,

            // Fallbacks
            fallback_pulse_width_ms: 100,
            fallback_off_time_ms: 1000,

            // Indicator
            startup_blink_count: 3,
            startup_blink_ms: 150,
            fault_blink_count: 3,
            fault_blink_ms: 150,
            fault_pause_ms: 800,
            breathing_period_ms: 2000,
            indicator_refresh_ms: 20,

            // Temperature advisory
            temperature_threshold_c: 70.0,
            temperature_check_interval_ms: 10_000,
        }
    }
}

impl ControllerConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(3..=crate::sensors::sampler::MAX_SAMPLES as u8).contains(&self.sample_count) {
            return Err("sample_count must be 3–64");
        }
        if self.sample_interval_ms > 100 {
            return Err("sample_interval_ms must be 0–100");
        }
        if self.raw_valid_min >= self.raw_valid_max {
            return Err("raw_valid_min must be < raw_valid_max");
        }
        if !(1.0..=10.0).contains(&self.off_time_aggression) {
            return Err("off_time_aggression must be 1.0–10.0");
        }
        if self.debounce_ms < 20 {
            return Err("debounce_ms must be >= 20");
        }
        if self.feed_interval_ms == 0 || self.feed_interval_ms >= self.watchdog_timeout_ms {
            return Err("feed_interval_ms must be > 0 and < watchdog_timeout_ms");
        }
        if self.ready_poll_ms == 0 || self.error_retry_ms == 0 {
            return Err("ready_poll_ms and error_retry_ms must be > 0");
        }
        if !PULSE_WIDTH_RANGE_MS.contains(&self.fallback_pulse_width_ms) {
            return Err("fallback_pulse_width_ms must be 30–200");
        }
        if !OFF_TIME_RANGE_MS.contains(&self.fallback_off_time_ms) {
            return Err("fallback_off_time_ms must be 0–5000");
        }
        if self.indicator_refresh_ms == 0 || self.indicator_refresh_ms >= 100 {
            return Err("indicator_refresh_ms must be 1–99");
        }
        if u32::from(self.indicator_refresh_ms) >= self.watchdog_timeout_ms {
            return Err("indicator_refresh_ms must be < watchdog_timeout_ms");
        }
        if self.breathing_period_ms < 2 || self.startup_blink_ms == 0 || self.fault_blink_ms == 0 {
            return Err("indicator periods must be > 0");
        }
        Ok(())
    }

    /// Total length of the cosmetic startup blink sequence.
    pub fn startup_sequence_ms(&self) -> u32 {
        u32::from(self.startup_blink_count) * 2 * u32::from(self.startup_blink_ms)
    }
}
