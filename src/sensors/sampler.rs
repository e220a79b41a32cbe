//! Outlier-rejecting averaging sampler.
//!
//! Takes `count` readings from one channel spaced `interval_ms` apart,
//! drops the single lowest and highest, and returns the floor mean of the
//! rest.  The delay passed in is expected to feed the watchdog between
//! readings (see [`crate::drivers::watchdog::FeedingDelay`]).

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::app::ports::AnalogChannel;
use crate::config::ControllerConfig;
use crate::error::SensorError;

/// Upper bound on readings per pass (stack buffer capacity).
pub const MAX_SAMPLES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogSampler {
    count: usize,
    interval_ms: u32,
    valid_min: u16,
    valid_max: u16,
}

impl AnalogSampler {
    /// `count` is clamped into `3..=MAX_SAMPLES`.
    pub fn new(count: usize, interval_ms: u32, valid_min: u16, valid_max: u16) -> Self {
        Self {
            count: count.clamp(3, MAX_SAMPLES),
            interval_ms,
            valid_min,
            valid_max,
        }
    }

    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self::new(
            usize::from(cfg.sample_count),
            u32::from(cfg.sample_interval_ms),
            cfg.raw_valid_min,
            cfg.raw_valid_max,
        )
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Delay spent by one pass.
    pub fn pass_ms(&self) -> u32 {
        self.gaps().saturating_mul(self.interval_ms)
    }

    /// Copy whose interval is shortened so that `passes` back-to-back
    /// passes spend at most `budget_ms` in delays.  With a budget below
    /// one gap per reading the readings are taken back to back.
    pub fn fit_within(&self, budget_ms: u32, passes: u32) -> Self {
        let gaps = self.gaps().saturating_mul(passes.max(1));
        Self {
            interval_ms: self.interval_ms.min(budget_ms / gaps),
            ..*self
        }
    }

    fn gaps(&self) -> u32 {
        // count is at least 3
        (self.count - 1) as u32
    }

    /// Run one sampling pass.
    pub fn sample<C, D>(&self, channel: &mut C, delay: &mut D) -> Result<u16, SensorError>
    where
        C: AnalogChannel + ?Sized,
        D: DelayNs + ?Sized,
    {
        let mut readings: Vec<u16, MAX_SAMPLES> = Vec::new();
        for i in 0..self.count {
            if i > 0 && self.interval_ms > 0 {
                delay.delay_ms(self.interval_ms);
            }
            let raw = channel.read_raw()?;
            // capacity is guaranteed by the clamp in new()
            let _ = readings.push(raw);
        }

        let value = trimmed_mean(&mut readings);
        if value < self.valid_min || value > self.valid_max {
            log::debug!("SAMPLER: filtered value {} outside plausible window", value);
            return Err(SensorError::OutOfRange(value));
        }
        Ok(value)
    }
}

/// Sort, drop one value at each end, floor-average the remainder.
pub fn trimmed_mean(readings: &mut [u16]) -> u16 {
    if readings.len() < 3 {
        return readings.iter().copied().min().unwrap_or(0);
    }
    readings.sort_unstable();
    let inner = &readings[1..readings.len() - 1];
    let sum: u32 = inner.iter().map(|&r| u32::from(r)).sum();
    (sum / inner.len() as u32) as u16
}
