//! Cross-task controller state.
//!
//! The main control task owns the only [`ControlWriter`]; the indicator task
//! holds a [`StateReader`] and can do nothing but take snapshots.  Every
//! access goes through one `std::sync::Mutex`, and a commit replaces both
//! timing fields inside a single critical section so a reader never sees a
//! half-updated pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, MappingFault};
use crate::fsm::StateId;

/// Permitted pulse width (milliseconds).
pub const PULSE_WIDTH_RANGE_MS: core::ops::RangeInclusive<u16> = 30..=200;
/// Permitted off time (milliseconds).
pub const OFF_TIME_RANGE_MS: core::ops::RangeInclusive<u16> = 0..=5000;

/// A validated pulse-width / off-time pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    pulse_width_ms: u16,
    off_time_ms: u16,
}

impl PulseTiming {
    /// Build a timing pair from mapped values, rejecting anything out of
    /// bounds.
    pub fn new(pulse_width_ms: i32, off_time_ms: i32) -> Result<Self, MappingFault> {
        let width = u16::try_from(pulse_width_ms)
            .ok()
            .filter(|w| PULSE_WIDTH_RANGE_MS.contains(w))
            .ok_or(MappingFault::PulseWidthOutOfBounds(pulse_width_ms))?;
        let off = u16::try_from(off_time_ms)
            .ok()
            .filter(|o| OFF_TIME_RANGE_MS.contains(o))
            .ok_or(MappingFault::OffTimeOutOfBounds(off_time_ms))?;
        Ok(Self {
            pulse_width_ms: width,
            off_time_ms: off,
        })
    }

    pub fn pulse_width_ms(&self) -> u16 {
        self.pulse_width_ms
    }

    pub fn off_time_ms(&self) -> u16 {
        self.off_time_ms
    }
}

/// Point-in-time copy of the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub state: StateId,
    pub timing: PulseTiming,
    pub last_valid: PulseTiming,
    pub error_flag: bool,
    pub pulse_active: bool,
}

#[derive(Debug)]
struct SharedState {
    current_state: StateId,
    timing: PulseTiming,
    last_valid: PulseTiming,
    error_flag: bool,
    pulse_active: bool,
}

impl SharedState {
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state: self.current_state,
            timing: self.timing,
            last_valid: self.last_valid,
            error_flag: self.error_flag,
            pulse_active: self.pulse_active,
        }
    }
}

fn lock(inner: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    // The guarded data is plain values that are never left half-written.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create the shared state seeded with `fallback` as both the current and
/// the last valid timing.
pub fn shared_state(fallback: PulseTiming) -> (ControlWriter, StateReader) {
    let inner = Arc::new(Mutex::new(SharedState {
        current_state: StateId::Startup,
        timing: fallback,
        last_valid: fallback,
        error_flag: false,
        pulse_active: false,
    }));
    let reader = StateReader {
        inner: Arc::clone(&inner),
    };
    (ControlWriter { inner }, reader)
}

/// Exclusive write handle.  Deliberately not `Clone`.
#[derive(Debug)]
pub struct ControlWriter {
    inner: Arc<Mutex<SharedState>>,
}

impl ControlWriter {
    /// Commit the outcome of one sampling pass.
    ///
    /// On success the new timing becomes both current and last valid and
    /// `error_flag` clears.  On failure the current timing reverts to the
    /// last valid pair and `error_flag` is raised.
    pub fn commit_sample(&self, outcome: Result<PulseTiming, Error>) -> StateSnapshot {
        let mut s = lock(&self.inner);
        match outcome {
            Ok(timing) => {
                s.timing = timing;
                s.last_valid = timing;
                s.error_flag = false;
            }
            Err(_) => {
                s.timing = s.last_valid;
                s.error_flag = true;
            }
        }
        s.snapshot()
    }

    pub fn set_state(&self, state: StateId) {
        lock(&self.inner).current_state = state;
    }

    pub fn set_pulse_active(&self, active: bool) {
        lock(&self.inner).pulse_active = active;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        lock(&self.inner).snapshot()
    }
}

/// Read-only handle.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct StateReader {
    inner: Arc<Mutex<SharedState>>,
}

impl StateReader {
    pub fn snapshot(&self) -> StateSnapshot {
        lock(&self.inner).snapshot()
    }
}

/// Cooperative stop request shared by both tasks.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;

    fn timing(w: i32, o: i32) -> PulseTiming {
        PulseTiming::new(w, o).unwrap()
    }

    #[test]
    fn timing_bounds_are_inclusive() {
        assert!(PulseTiming::new(30, 0).is_ok());
        assert!(PulseTiming::new(200, 5000).is_ok());
        assert_eq!(
            PulseTiming::new(29, 0),
            Err(MappingFault::PulseWidthOutOfBounds(29))
        );
        assert_eq!(
            PulseTiming::new(100, 5001),
            Err(MappingFault::OffTimeOutOfBounds(5001))
        );
        assert_eq!(
            PulseTiming::new(100, -1),
            Err(MappingFault::OffTimeOutOfBounds(-1))
        );
    }

    #[test]
    fn seeded_with_fallback() {
        let (writer, reader) = shared_state(timing(100, 1000));
        let s = reader.snapshot();
        assert_eq!(s.state, StateId::Startup);
        assert_eq!(s.timing, timing(100, 1000));
        assert_eq!(s.last_valid, s.timing);
        assert!(!s.error_flag);
        assert!(!s.pulse_active);
        assert_eq!(writer.snapshot(), s);
    }

    #[test]
    fn failed_commit_restores_last_valid() {
        let (writer, reader) = shared_state(timing(100, 1000));
        writer.commit_sample(Ok(timing(150, 300)));
        let s = writer.commit_sample(Err(SensorError::AdcReadFailed.into()));
        assert!(s.error_flag);
        assert_eq!(s.timing, timing(150, 300));
        assert_eq!(reader.snapshot().timing, timing(150, 300));

        let s = writer.commit_sample(Ok(timing(40, 0)));
        assert!(!s.error_flag);
        assert_eq!(s.last_valid, timing(40, 0));
    }

    #[test]
    fn reader_sees_writer_updates() {
        let (writer, reader) = shared_state(timing(100, 1000));
        writer.set_state(StateId::Pulsing);
        writer.set_pulse_active(true);
        let s = reader.clone().snapshot();
        assert_eq!(s.state, StateId::Pulsing);
        assert!(s.pulse_active);
    }

    #[test]
    fn concurrent_readers_never_see_torn_timing() {
        let (writer, reader) = shared_state(timing(30, 0));
        let pairs = [timing(30, 0), timing(200, 5000)];
        let r = reader.clone();
        let handle = std::thread::spawn(move || {
            for _ in 0..10_000 {
                let t = r.snapshot().timing;
                assert!(t == pairs[0] || t == pairs[1], "torn read: {t:?}");
            }
        });
        for i in 0..10_000 {
            writer.commit_sample(Ok(pairs[i % 2]));
        }
        handle.join().unwrap();
    }

    #[test]
    fn shutdown_signal_is_shared() {
        let a = ShutdownSignal::new();
        let b = a.clone();
        assert!(!b.is_requested());
        a.request();
        assert!(b.is_requested());
    }
}
