//! Mock hardware for integration tests.
//!
//! Everything runs on a shared simulated clock that only advances when a
//! delay is requested, so pulse timing can be asserted to the millisecond.
//! Outputs record every level change with its timestamp.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

use pulsectl::app::ports::{AnalogChannel, EventLog, LogError, TimePort};
use pulsectl::drivers::watchdog::WatchdogTimer;
use pulsectl::error::{Error, SensorError};

// ── Simulated clock ───────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ns: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ns.fetch_add(ms * 1_000_000, Ordering::SeqCst);
    }
}

impl TimePort for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst) / 1_000_000
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns.fetch_add(u64::from(ns), Ordering::SeqCst);
    }
}

// ── Analog channel ────────────────────────────────────────────

/// Potentiometer stand-in with a settable value and a fault switch.
#[derive(Debug, Clone)]
pub struct MockChannel {
    raw: Arc<AtomicU16>,
    fail: Arc<AtomicBool>,
    reads: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl MockChannel {
    pub fn new(raw: u16) -> Self {
        Self {
            raw: Arc::new(AtomicU16::new(raw)),
            fail: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_raw(&self, raw: u16) {
        self.raw.store(raw, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AnalogChannel for MockChannel {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(SensorError::AdcReadFailed)
        } else {
            Ok(self.raw.load(Ordering::SeqCst))
        }
    }
}

// ── Enable switch ─────────────────────────────────────────────

/// Active-low switch driven by a time script of `(from_ms, pressed)`.
///
/// The entry with the latest `from_ms` not after the current time wins;
/// before the first entry the switch is released.
#[derive(Debug, Clone)]
pub struct MockSwitch {
    clock: SimClock,
    script: Arc<Mutex<Vec<(u64, bool)>>>,
    fail: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockSwitch {
    pub fn new(clock: &SimClock, script: Vec<(u64, bool)>) -> Self {
        Self {
            clock: clock.clone(),
            script: Arc::new(Mutex::new(script)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pressed_from(clock: &SimClock, at_ms: u64) -> Self {
        Self::new(clock, vec![(at_ms, true)])
    }

    pub fn released(clock: &SimClock) -> Self {
        Self::new(clock, Vec::new())
    }

    /// Append a scripted change.
    pub fn push(&self, at_ms: u64, pressed: bool) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((at_ms, pressed));
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn pressed(&self) -> bool {
        let now = self.clock.now_ms();
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(at, _)| *at <= now)
            .max_by_key(|(at, _)| *at)
            .is_some_and(|(_, pressed)| *pressed)
    }
}

impl digital::ErrorType for MockSwitch {
    type Error = ErrorKind;
}

impl InputPin for MockSwitch {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ErrorKind::Other);
        }
        Ok(!self.pressed())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

// ── Pulse output ──────────────────────────────────────────────

/// Records `(time_ms, level)` for every write.
#[derive(Debug, Clone)]
pub struct MockOutput {
    clock: SimClock,
    writes: Arc<Mutex<Vec<(u64, bool)>>>,
    fail: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockOutput {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            writes: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(u64, bool)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Level of the most recent write (low if never written).
    pub fn level(&self) -> bool {
        self.writes().last().is_some_and(|(_, level)| *level)
    }

    /// Level changes only, as `(time_ms, level)`.
    pub fn edges(&self) -> Vec<(u64, bool)> {
        let mut edges = Vec::new();
        let mut current = false;
        for (t, level) in self.writes() {
            if level != current {
                edges.push((t, level));
                current = level;
            }
        }
        edges
    }

    /// `(high_ms, following_low_ms)` for each complete high/low pair.
    pub fn periods(&self) -> Vec<(u64, u64)> {
        let edges = self.edges();
        edges
            .windows(3)
            .filter(|w| w[0].1 && !w[1].1 && w[2].1)
            .map(|w| (w[1].0 - w[0].0, w[2].0 - w[1].0))
            .collect()
    }

    fn record(&mut self, level: bool) -> Result<(), ErrorKind> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ErrorKind::Other);
        }
        let now = self.clock.now_ms();
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((now, level));
        Ok(())
    }
}

impl digital::ErrorType for MockOutput {
    type Error = ErrorKind;
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(true)
    }
}

// ── Status LED ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MockLed {
    duties: Arc<Mutex<Vec<u16>>>,
}

#[allow(dead_code)]
impl MockLed {
    pub fn duties(&self) -> Vec<u16> {
        self.duties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl pwm::ErrorType for MockLed {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for MockLed {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duty);
        Ok(())
    }
}

// ── Watchdog ──────────────────────────────────────────────────

/// Counts feeds and tracks the longest gap between them in sim time.
#[derive(Debug)]
pub struct CountingWatchdog {
    clock: SimClock,
    armed_ms: AtomicU64,
    last_feed_ms: AtomicU64,
    max_gap_ms: AtomicU64,
    feeds: AtomicU64,
}

#[allow(dead_code)]
impl CountingWatchdog {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            armed_ms: AtomicU64::new(0),
            last_feed_ms: AtomicU64::new(clock.now_ms()),
            max_gap_ms: AtomicU64::new(0),
            feeds: AtomicU64::new(0),
        }
    }

    pub fn feeds(&self) -> u64 {
        self.feeds.load(Ordering::SeqCst)
    }

    pub fn max_gap_ms(&self) -> u64 {
        self.max_gap_ms.load(Ordering::SeqCst)
    }

    pub fn armed_timeout_ms(&self) -> u64 {
        self.armed_ms.load(Ordering::SeqCst)
    }
}

impl WatchdogTimer for CountingWatchdog {
    fn arm(&self, timeout_ms: u32) -> Result<(), Error> {
        self.armed_ms.store(u64::from(timeout_ms), Ordering::SeqCst);
        Ok(())
    }

    fn feed(&self) {
        let now = self.clock.now_ms();
        let prev = self.last_feed_ms.swap(now, Ordering::SeqCst);
        self.max_gap_ms
            .fetch_max(now.saturating_sub(prev), Ordering::SeqCst);
        self.feeds.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Event log ─────────────────────────────────────────────────

/// Captures events and pulses; can be told to fail every call.
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub events: Vec<String>,
    pub pulses: Vec<u16>,
    pub failing: bool,
    pub attempts: usize,
}

#[allow(dead_code)]
impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.events.iter().any(|e| e.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.events.iter().filter(|e| e.contains(needle)).count()
    }
}

impl EventLog for RecordingLog {
    fn log_event(&mut self, message: &str, _level: log::Level) -> Result<(), LogError> {
        self.attempts += 1;
        if self.failing {
            return Err(LogError::Unavailable);
        }
        self.events.push(message.to_owned());
        Ok(())
    }

    fn log_pulse(&mut self, width_ms: u16) -> Result<(), LogError> {
        self.attempts += 1;
        if self.failing {
            return Err(LogError::Unavailable);
        }
        self.pulses.push(width_ms);
        Ok(())
    }
}
