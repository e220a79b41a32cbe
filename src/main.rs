//! PulseCtl Firmware: Main Entry Point
//!
//! Two cooperating tasks around a shared snapshot:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Potentiometer ×2  GpioInput   GpioOutput   LedcPwm            │
//! │  (AnalogChannel)   (enable)    (pulse line) (status LED)       │
//! │  SystemClock       LogEventSink  NvsConfigStore  TaskWatchdog  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────────┐   ┌─────────────────────────┐    │
//! │  │ ControlService (App core)│──▶│ IndicatorTask (Pro core)│    │
//! │  │ FSM · sampling · output  │   │ pattern from snapshot   │    │
//! │  └──────────────────────────┘   └─────────────────────────┘    │
//! │            writes ─▶ shared snapshot ─▶ reads                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use pulsectl::adapters::hardware::{GpioInput, GpioOutput, LedcPwm};
use pulsectl::adapters::log_sink::LogEventSink;
use pulsectl::adapters::nvs::NvsConfigStore;
use pulsectl::adapters::time::SystemClock;
use pulsectl::app::indicator::IndicatorTask;
use pulsectl::app::ports::ConfigPort;
use pulsectl::app::service::{ControlHardware, ControlService, persist_last_valid};
use pulsectl::config::ControllerConfig;
use pulsectl::drivers::status_led::{IndicatorHandle, StatusLed};
use pulsectl::drivers::task_pin::{Core, spawn_on_core};
use pulsectl::drivers::watchdog::{TaskWatchdog, WatchdogLiaison};
use pulsectl::sensors::potentiometer::Potentiometer;
use pulsectl::sensors::temperature::TemperatureSensor;
use pulsectl::shared::{PulseTiming, ShutdownSignal, shared_state};

const CONTROL_PRIORITY: u8 = 10;
const CONTROL_STACK_KB: usize = 16;
const INDICATOR_PRIORITY: u8 = 2;
const INDICATOR_STACK_KB: usize = 8;

// ── Logging ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Ok(())
}

// ── Simulation hooks ──────────────────────────────────────────

/// `PULSECTL_SIM_ENABLE=1` holds the enable switch active;
/// `PULSECTL_SIM_SECONDS=N` requests an orderly shutdown after N seconds.
#[cfg(not(target_os = "espidf"))]
fn configure_simulation(config: &ControllerConfig, shutdown: &ShutdownSignal) {
    use pulsectl::drivers::hw_init::sim_set_enable_level;

    if std::env::var("PULSECTL_SIM_ENABLE").is_ok_and(|v| v == "1") {
        sim_set_enable_level(!config.enable_active_low);
        info!("SIM: enable switch held active");
    }
    if let Some(secs) = std::env::var("PULSECTL_SIM_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        let shutdown = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_secs(secs));
            info!("SIM: run time elapsed, stopping");
            shutdown.request();
        });
    }
}

#[cfg(target_os = "espidf")]
fn configure_simulation(_config: &ControllerConfig, _shutdown: &ShutdownSignal) {}

// ── Configuration ─────────────────────────────────────────────

fn load_config(store: Option<&NvsConfigStore>) -> ControllerConfig {
    let Some(store) = store else {
        return ControllerConfig::default();
    };
    match store.read_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            ControllerConfig::default()
        }
    }
}

/// Remember the last valid timing for the next boot.
fn save_last_valid(store: Option<&mut NvsConfigStore>, config: &ControllerConfig, timing: PulseTiming) {
    let Some(store) = store else {
        return;
    };
    match persist_last_valid(store, config, timing) {
        Ok(true) => info!(
            "Config: fallback timing saved ({} ms / {} ms)",
            timing.pulse_width_ms(),
            timing.off_time_ms()
        ),
        Ok(false) => {}
        Err(e) => warn!("Config: fallback save failed ({})", e),
    }
}

// ── Fatal path ────────────────────────────────────────────────

/// The output is already low.  On hardware stop feeding and let the task
/// watchdog reset the chip.
#[cfg(target_os = "espidf")]
fn halt(err: anyhow::Error) -> Result<()> {
    error!("FATAL: {:#}, waiting for watchdog reset", err);
    loop {
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
}

#[cfg(not(target_os = "espidf"))]
fn halt(err: anyhow::Error) -> Result<()> {
    error!("FATAL: {:#}", err);
    Err(err)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PulseCtl v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    if let Err(e) = run() {
        return halt(e);
    }
    info!("Shutdown complete");
    Ok(())
}

fn run() -> Result<()> {
    // ── 1. Peripherals ────────────────────────────────────────
    pulsectl::drivers::hw_init::init_peripherals().context("peripheral init")?;

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let mut nvs = match NvsConfigStore::new() {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = load_config(nvs.as_ref());
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => warn!("Config: could not render ({})", e),
    }

    let fallback = PulseTiming::new(
        i32::from(config.fallback_pulse_width_ms),
        i32::from(config.fallback_off_time_ms),
    )
    .map_err(pulsectl::error::Error::from)
    .context("stored fallback timing")?;

    // ── 3. Watchdog, shared state, shutdown ───────────────────
    let watchdog = Arc::new(WatchdogLiaison::new(TaskWatchdog::new(), config.feed_interval_ms));
    watchdog.arm(config.watchdog_timeout_ms).context("watchdog arm")?;

    let (writer, reader) = shared_state(fallback);
    let shutdown = ShutdownSignal::new();
    configure_simulation(&config, &shutdown);

    // ── 4. Indicator task ─────────────────────────────────────
    let led = IndicatorHandle::new(StatusLed::new(LedcPwm::status_led()));
    let mut indicator = IndicatorTask::new(
        reader,
        led,
        SystemClock::new(),
        Arc::clone(&watchdog),
        config.clone(),
    );
    let indicator_shutdown = shutdown.clone();
    let indicator_handle = spawn_on_core(
        Core::Pro,
        INDICATOR_PRIORITY,
        INDICATOR_STACK_KB,
        "indicator\0",
        move || indicator.run(&indicator_shutdown),
    )
    .context("spawn indicator task")?;

    // ── 5. Control task ───────────────────────────────────────
    let hw = ControlHardware {
        pulse_width: Potentiometer::pulse_width(),
        off_time: Potentiometer::off_time(),
        enable: GpioInput::enable_switch(),
        output: GpioOutput::pulse_line(),
        clock: SystemClock::new(),
    };
    let control_config = config.clone();
    let control_watchdog = Arc::clone(&watchdog);
    let control_shutdown = shutdown.clone();
    let control_handle = spawn_on_core(
        Core::App,
        CONTROL_PRIORITY,
        CONTROL_STACK_KB,
        "control\0",
        move || -> pulsectl::error::Result<PulseTiming> {
            let mut service =
                ControlService::new(control_config, hw, control_watchdog, writer, control_shutdown)?
                    .with_temperature(Box::new(TemperatureSensor::new()));
            let mut sink = LogEventSink::new();
            let result = service.run(&mut sink);
            info!("Control: {} pulses logged", sink.pulse_count());
            result.map(|()| service.snapshot().last_valid)
        },
    );
    let control_handle = match control_handle {
        Ok(handle) => handle,
        Err(e) => {
            shutdown.request();
            return Err(e).context("spawn control task");
        }
    };

    // ── 6. Join ───────────────────────────────────────────────
    let outcome = control_handle.join();
    shutdown.request();
    if indicator_handle.join().is_err() {
        warn!("Indicator task panicked");
    }

    let last_valid = match outcome {
        Ok(Ok(timing)) => timing,
        Ok(Err(e)) => return Err(e).context("control task"),
        Err(_) => anyhow::bail!("control task panicked"),
    };
    save_last_valid(nvs.as_mut(), &config, last_valid);
    Ok(())
}
