//! Task Watchdog Timer (TWDT) driver and the feeding helpers.
//!
//! [`TaskWatchdog`] wraps the ESP-IDF TWDT: once armed, the device panics
//! and resets if nothing feeds it within the timeout.  Both control tasks
//! share one [`WatchdogLiaison`], and every blocking wait in the firmware
//! goes through [`sleep_fed`] or [`FeedingDelay`] so that no single sleep
//! exceeds `feed_interval_ms` without a feed.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use embedded_hal::delay::DelayNs;

use crate::app::ports::TimePort;
use crate::error::Error;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Hardware watchdog seam.
pub trait WatchdogTimer: Send + Sync {
    /// Configure the timeout and start supervision.  Called once at boot.
    fn arm(&self, timeout_ms: u32) -> Result<(), Error>;

    /// Reset the countdown.
    fn feed(&self);
}

impl<T: WatchdogTimer + ?Sized> WatchdogTimer for std::sync::Arc<T> {
    fn arm(&self, timeout_ms: u32) -> Result<(), Error> {
        (**self).arm(timeout_ms)
    }

    fn feed(&self) {
        (**self).feed();
    }
}

// ── ESP TWDT / host simulation ───────────────────────────────

/// The task watchdog.
///
/// On ESP-IDF the TWDT is reconfigured with panic-on-trigger and the
/// calling task subscribes.  Feeds go through a TWDT *user* handle so that
/// either task may feed.  On the host it records feed times and logs an
/// overrun when two feeds are further apart than the timeout.
pub struct TaskWatchdog {
    timeout_ms: AtomicU32,
    #[cfg(target_os = "espidf")]
    user: std::sync::Mutex<Option<esp_task_wdt_user_handle_t>>,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    last_feed_ms: AtomicU64,
    #[cfg(not(target_os = "espidf"))]
    overruns: AtomicU32,
}

impl Default for TaskWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWatchdog {
    pub fn new() -> Self {
        Self {
            timeout_ms: AtomicU32::new(0),
            #[cfg(target_os = "espidf")]
            user: std::sync::Mutex::new(None),
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            last_feed_ms: AtomicU64::new(0),
            #[cfg(not(target_os = "espidf"))]
            overruns: AtomicU32::new(0),
        }
    }

    /// Number of detected feed gaps longer than the timeout (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

// SAFETY: the user handle is an opaque token owned by the TWDT; all access
// goes through the mutex.
#[cfg(target_os = "espidf")]
unsafe impl Send for TaskWatchdog {}
#[cfg(target_os = "espidf")]
unsafe impl Sync for TaskWatchdog {}

#[cfg(target_os = "espidf")]
impl WatchdogTimer for TaskWatchdog {
    fn arm(&self, timeout_ms: u32) -> Result<(), Error> {
        let cfg = esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: plain FFI calls with a stack config and a static name.
        unsafe {
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK as i32 {
                log::warn!("Watchdog: reconfigure returned {} (may already be configured)", ret);
                let ret = esp_task_wdt_init(&cfg);
                if ret != ESP_OK as i32 {
                    return Err(Error::Unhandled("TWDT init failed"));
                }
            }
            let mut handle: esp_task_wdt_user_handle_t = core::ptr::null_mut();
            let ret = esp_task_wdt_add_user(b"pulsectl\0".as_ptr().cast(), &mut handle);
            if ret != ESP_OK as i32 {
                return Err(Error::Unhandled("TWDT user subscribe failed"));
            }
            *self.user.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handle);
        }
        self.timeout_ms.store(timeout_ms, Ordering::Relaxed);
        log::info!("Watchdog: armed ({} ms timeout, panic on trigger)", timeout_ms);
        Ok(())
    }

    fn feed(&self) {
        let guard = self.user.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = *guard {
            // SAFETY: handle came from esp_task_wdt_add_user and is never removed.
            unsafe {
                esp_task_wdt_reset_user(handle);
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl WatchdogTimer for TaskWatchdog {
    fn arm(&self, timeout_ms: u32) -> Result<(), Error> {
        if timeout_ms == 0 {
            return Err(Error::Config("watchdog timeout must be > 0"));
        }
        self.timeout_ms.store(timeout_ms, Ordering::Relaxed);
        self.last_feed_ms
            .store(self.start.elapsed().as_millis() as u64, Ordering::Relaxed);
        log::info!("Watchdog(sim): armed ({} ms timeout)", timeout_ms);
        Ok(())
    }

    fn feed(&self) {
        let timeout = u64::from(self.timeout_ms.load(Ordering::Relaxed));
        if timeout == 0 {
            return;
        }
        let now = self.start.elapsed().as_millis() as u64;
        let prev = self.last_feed_ms.swap(now, Ordering::Relaxed);
        if now.saturating_sub(prev) > timeout {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            log::error!("Watchdog(sim): {} ms without a feed (timeout {} ms)", now - prev, timeout);
        }
    }
}

// ── Liaison ──────────────────────────────────────────────────

/// Shared arm/feed front end with the configured feed interval.
pub struct WatchdogLiaison<W> {
    timer: W,
    feed_interval_ms: u32,
    feeds: AtomicU64,
}

impl<W: WatchdogTimer> WatchdogLiaison<W> {
    pub fn new(timer: W, feed_interval_ms: u32) -> Self {
        Self {
            timer,
            feed_interval_ms: feed_interval_ms.max(1),
            feeds: AtomicU64::new(0),
        }
    }

    pub fn arm(&self, timeout_ms: u32) -> Result<(), Error> {
        if self.feed_interval_ms >= timeout_ms {
            return Err(Error::Config("feed interval must be shorter than watchdog timeout"));
        }
        self.timer.arm(timeout_ms)
    }

    pub fn feed(&self) {
        self.timer.feed();
        self.feeds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn feed_interval_ms(&self) -> u32 {
        self.feed_interval_ms
    }

    /// Total feeds since construction, across all tasks.
    pub fn feed_count(&self) -> u64 {
        self.feeds.load(Ordering::Relaxed)
    }

    pub fn timer(&self) -> &W {
        &self.timer
    }
}

/// How a fed sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full duration elapsed.
    Completed,
    /// The poll callback asked to stop early.
    Interrupted { elapsed_ms: u32 },
}

/// Sleep `total_ms` in chunks of at most the feed interval, feeding after
/// every chunk and then calling `poll` with the current time.  Returning
/// `true` from `poll` ends the sleep early.
///
/// An uninterrupted sleep feeds exactly `ceil(total_ms / feed_interval)`
/// times.
pub fn sleep_fed<W, C, F>(
    liaison: &WatchdogLiaison<W>,
    clock: &mut C,
    total_ms: u32,
    mut poll: F,
) -> SleepOutcome
where
    W: WatchdogTimer,
    C: DelayNs + TimePort + ?Sized,
    F: FnMut(u64) -> bool,
{
    let mut elapsed = 0u32;
    while elapsed < total_ms {
        let chunk = liaison.feed_interval_ms().min(total_ms - elapsed);
        clock.delay_ms(chunk);
        elapsed += chunk;
        liaison.feed();
        if poll(clock.now_ms()) && elapsed < total_ms {
            return SleepOutcome::Interrupted { elapsed_ms: elapsed };
        }
    }
    SleepOutcome::Completed
}

/// `DelayNs` wrapper that splits every delay at the feed interval.
pub struct FeedingDelay<'a, W, D: ?Sized> {
    liaison: &'a WatchdogLiaison<W>,
    inner: &'a mut D,
}

impl<'a, W: WatchdogTimer, D: DelayNs + ?Sized> FeedingDelay<'a, W, D> {
    pub fn new(liaison: &'a WatchdogLiaison<W>, inner: &'a mut D) -> Self {
        Self { liaison, inner }
    }
}

impl<W: WatchdogTimer, D: DelayNs + ?Sized> DelayNs for FeedingDelay<'_, W, D> {
    fn delay_ns(&mut self, ns: u32) {
        let chunk_ns = self.liaison.feed_interval_ms().saturating_mul(1_000_000);
        let mut remaining = ns;
        while remaining > 0 {
            let step = remaining.min(chunk_ns);
            self.inner.delay_ns(step);
            remaining -= step;
            self.liaison.feed();
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        let mut remaining = ms;
        while remaining > 0 {
            let step = remaining.min(self.liaison.feed_interval_ms());
            self.inner.delay_ms(step);
            remaining -= step;
            self.liaison.feed();
        }
    }
}
