//! Integration tests for the ControlService → FSM → output pipeline.
//!
//! These run on the host against the mocks in `mock_hw` and a simulated
//! clock, so every pulse edge lands on an exact millisecond.

use std::sync::Arc;

use pulsectl::app::indicator::IndicatorTask;
use pulsectl::app::ports::TimePort;
use pulsectl::app::service::{ControlHardware, ControlService};
use pulsectl::config::ControllerConfig;
use pulsectl::control::mapping;
use pulsectl::drivers::led_patterns::Pattern;
use pulsectl::drivers::status_led::{IndicatorHandle, StatusLed};
use pulsectl::drivers::watchdog::WatchdogLiaison;
use pulsectl::fsm::StateId;
use pulsectl::shared::{PulseTiming, ShutdownSignal, StateReader, shared_state};

use crate::mock_hw::{
    CountingWatchdog, MockChannel, MockLed, MockOutput, MockSwitch, RecordingLog, SimClock,
};

const WIDTH_RAW: u16 = u16::MAX;
const OFF_RAW: u16 = 30_000;

type Service = ControlService<MockChannel, MockSwitch, MockOutput, SimClock, CountingWatchdog>;

struct Rig {
    clock: SimClock,
    pulse_width: MockChannel,
    off_time: MockChannel,
    switch: MockSwitch,
    output: MockOutput,
    watchdog: Arc<WatchdogLiaison<CountingWatchdog>>,
    reader: StateReader,
    shutdown: ShutdownSignal,
    config: ControllerConfig,
}

fn rig_with(config: ControllerConfig, script: Vec<(u64, bool)>) -> (Service, Rig) {
    let clock = SimClock::new();
    let pulse_width = MockChannel::new(WIDTH_RAW);
    let off_time = MockChannel::new(OFF_RAW);
    let switch = MockSwitch::new(&clock, script);
    let output = MockOutput::new(&clock);
    let watchdog = Arc::new(WatchdogLiaison::new(
        CountingWatchdog::new(&clock),
        config.feed_interval_ms,
    ));
    watchdog.arm(config.watchdog_timeout_ms).unwrap();

    let fallback = PulseTiming::new(
        i32::from(config.fallback_pulse_width_ms),
        i32::from(config.fallback_off_time_ms),
    )
    .unwrap();
    let (writer, reader) = shared_state(fallback);
    let shutdown = ShutdownSignal::new();

    let hw = ControlHardware {
        pulse_width: pulse_width.clone(),
        off_time: off_time.clone(),
        enable: switch.clone(),
        output: output.clone(),
        clock: clock.clone(),
    };
    let service = ControlService::new(
        config.clone(),
        hw,
        Arc::clone(&watchdog),
        writer,
        shutdown.clone(),
    )
    .unwrap();

    (
        service,
        Rig {
            clock,
            pulse_width,
            off_time,
            switch,
            output,
            watchdog,
            reader,
            shutdown,
            config,
        },
    )
}

fn rig(script: Vec<(u64, bool)>) -> (Service, Rig) {
    rig_with(ControllerConfig::default(), script)
}

fn expected_width() -> u64 {
    mapping::pulse_width_ms(WIDTH_RAW) as u64
}

fn expected_off() -> u64 {
    mapping::off_time_ms(OFF_RAW, mapping::DEFAULT_AGGRESSION) as u64
}

/// Cycle until `state` is reached; panics after `limit` cycles.
fn cycle_until(service: &mut Service, log: &mut RecordingLog, state: StateId, limit: usize) {
    for _ in 0..limit {
        if service.run_cycle(log).unwrap() == state {
            return;
        }
    }
    panic!("never reached {:?}, stuck in {:?}", state, service.state());
}

// ── Scenario A: switch off at boot → Ready, output low ──────

#[test]
fn idle_boot_settles_in_ready_with_output_low() {
    let (mut service, rig) = rig(Vec::new());
    let mut log = RecordingLog::new();

    service.start(&mut log).unwrap();
    assert_eq!(service.state(), StateId::Startup);
    assert!(
        rig.clock.now_ms() >= u64::from(rig.config.startup_sequence_ms()),
        "startup blink sequence should run before the first cycle"
    );

    for _ in 0..20 {
        service.run_cycle(&mut log).unwrap();
    }

    assert_eq!(service.state(), StateId::Ready);
    assert!(rig.output.edges().is_empty(), "output must never go high");
    assert!(!service.output_asserted());
    assert!(log.contains("STATE | Startup -> Ready"));

    let snap = rig.reader.snapshot();
    assert_eq!(snap.state, StateId::Ready);
    assert!(!snap.error_flag);
    assert!(!snap.pulse_active);
    assert_eq!(snap.timing.pulse_width_ms() as u64, expected_width());
    assert_eq!(snap.timing.off_time_ms() as u64, expected_off());

    let led = MockLed::default();
    let mut indicator = IndicatorTask::new(
        rig.reader.clone(),
        IndicatorHandle::new(StatusLed::new(led.clone())),
        rig.clock.clone(),
        Arc::clone(&rig.watchdog),
        rig.config.clone(),
    );
    indicator.step().unwrap();
    assert_eq!(
        indicator.active_pattern(),
        Some(Pattern::breathing(&rig.config))
    );
    assert_eq!(led.duties().len(), 1);
}

// ── Scenario B: switch on → steady pulse train ──────────────

#[test]
fn enabled_switch_produces_exact_pulse_train() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::new();
    assert!(expected_off() >= 140, "off time must cover the sampling pass");

    service.start(&mut log).unwrap();
    let mut states = Vec::new();
    for _ in 0..60 {
        states.push(service.run_cycle(&mut log).unwrap());
    }

    let periods = rig.output.periods();
    assert!(periods.len() >= 5, "expected several pulses, got {:?}", periods);
    for (high, low) in &periods {
        assert_eq!(*high, expected_width());
        assert_eq!(*low, expected_off());
    }

    // Ready → Running → Pulsing, then Running/Pulsing alternate.
    states.dedup();
    let first_running = states.iter().position(|s| *s == StateId::Running).unwrap();
    assert_eq!(states[first_running - 1], StateId::Ready);
    for pair in states[first_running..].windows(2) {
        match pair {
            [StateId::Running, StateId::Pulsing] | [StateId::Pulsing, StateId::Running] => {}
            other => panic!("unexpected sequence {:?}", other),
        }
    }

    assert!(log.pulses.len() >= periods.len());
    assert!(log.pulses.iter().all(|w| u64::from(*w) == expected_width()));
    assert!(
        rig.watchdog.timer().max_gap_ms() <= u64::from(rig.config.feed_interval_ms),
        "watchdog gap {} ms exceeds feed interval",
        rig.watchdog.timer().max_gap_ms()
    );
}

#[test]
fn short_off_times_are_not_stretched_by_sampling() {
    let pass_ms = 2 * 14 * 5;
    for off_raw in [0u16, 20_000] {
        let off = mapping::off_time_ms(off_raw, mapping::DEFAULT_AGGRESSION) as u64;
        assert!(off < pass_ms, "off time {} ms covers a full pass", off);

        let (mut service, rig) = rig(vec![(0, true)]);
        rig.off_time.set_raw(off_raw);
        let mut log = RecordingLog::new();
        service.start(&mut log).unwrap();
        for _ in 0..60 {
            service.run_cycle(&mut log).unwrap();
        }

        let periods = rig.output.periods();
        assert!(periods.len() >= 5, "expected several pulses, got {:?}", periods);
        for (high, low) in &periods {
            assert_eq!((*high, *low), (expected_width(), off));
        }
        assert!(rig.watchdog.timer().max_gap_ms() <= u64::from(rig.config.feed_interval_ms));
    }
}

#[test]
fn pulse_active_tracks_the_output_line() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();
    for _ in 0..30 {
        service.run_cycle(&mut log).unwrap();
        let snap = rig.reader.snapshot();
        assert_eq!(snap.pulse_active, rig.output.level());
        if snap.pulse_active {
            assert_eq!(snap.state, StateId::Pulsing);
        }
    }
}

#[test]
fn pot_change_applies_to_the_next_pulse() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();
    cycle_until(&mut service, &mut log, StateId::Pulsing, 20);

    rig.pulse_width.set_raw(0);
    for _ in 0..20 {
        service.run_cycle(&mut log).unwrap();
    }

    let widths: Vec<u64> = rig.output.periods().iter().map(|(h, _)| *h).collect();
    assert_eq!(widths.first().copied(), Some(expected_width()));
    assert_eq!(widths.last().copied(), Some(30));
}

// ── Scenario C: sensor faults → Error → recovery ────────────

#[test]
fn sensor_faults_force_error_and_recover_on_first_valid_read() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();
    cycle_until(&mut service, &mut log, StateId::Pulsing, 20);

    rig.pulse_width.set_failing(true);
    rig.off_time.set_failing(true);
    cycle_until(&mut service, &mut log, StateId::Error, 10);

    let snap = rig.reader.snapshot();
    assert!(snap.error_flag);
    assert!(!service.output_asserted());
    assert!(!rig.output.level());
    assert_eq!(snap.last_valid.pulse_width_ms() as u64, expected_width());
    assert_eq!(log.count("FAULT |"), 1, "fault logged once per episode");

    // Three further failing retries keep the output low.
    let edges_before = rig.output.edges().len();
    for _ in 0..3 {
        assert_eq!(service.run_cycle(&mut log).unwrap(), StateId::Error);
    }
    assert_eq!(rig.output.edges().len(), edges_before);

    rig.pulse_width.set_failing(false);
    rig.off_time.set_failing(false);
    // One retry cycle samples successfully, the next leaves Error.
    service.run_cycle(&mut log).unwrap();
    assert!(!rig.reader.snapshot().error_flag);
    assert_eq!(service.run_cycle(&mut log).unwrap(), StateId::Ready);
}

#[test]
fn failed_initial_sampling_enters_error_with_fallback_timing() {
    let (mut service, rig) = rig(Vec::new());
    rig.pulse_width.set_failing(true);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();

    assert_eq!(service.run_cycle(&mut log).unwrap(), StateId::Error);
    let snap = rig.reader.snapshot();
    assert!(snap.error_flag);
    assert_eq!(snap.timing.pulse_width_ms(), rig.config.fallback_pulse_width_ms);
    assert_eq!(snap.timing.off_time_ms(), rig.config.fallback_off_time_ms);
    assert_eq!(rig.off_time.reads(), 0, "second channel skipped after a failure");
}

#[test]
fn implausible_reading_counts_as_fault() {
    let config = ControllerConfig {
        raw_valid_min: 1_000,
        ..ControllerConfig::default()
    };
    let (mut service, rig) = rig_with(config, Vec::new());
    rig.off_time.set_raw(10);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();
    assert_eq!(service.run_cycle(&mut log).unwrap(), StateId::Error);
    assert!(log.contains("out of range"));
}

// ── Switch release mid-pulse ────────────────────────────────

#[test]
fn release_mid_pulse_aborts_immediately() {
    // Dry run to find when the first pulse starts.
    let (mut dry, dry_rig) = rig(vec![(0, true)]);
    let mut dry_log = RecordingLog::new();
    dry.start(&mut dry_log).unwrap();
    cycle_until(&mut dry, &mut dry_log, StateId::Pulsing, 20);
    let rise = dry_rig.output.edges()[0].0;

    let (mut service, rig) = rig(vec![(0, true), (rise + 60, false)]);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();
    cycle_until(&mut service, &mut log, StateId::Pulsing, 20);

    let edges = rig.output.edges();
    assert_eq!(edges.len(), 2, "output should already be low: {:?}", edges);
    assert_eq!(edges[0], (rise, true));
    let high_for = edges[1].0 - rise;
    assert!(high_for < expected_width(), "pulse ran {} ms", high_for);
    assert!(high_for <= 60 + 2 * u64::from(rig.config.feed_interval_ms));
    assert!(!rig.reader.snapshot().pulse_active);
    assert!(log.contains("PULSE | aborted"));
    assert!(log.pulses.is_empty(), "an aborted pulse is not a completed one");

    assert_eq!(service.run_cycle(&mut log).unwrap(), StateId::Ready);
}

#[test]
fn release_during_off_time_returns_to_ready() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();
    cycle_until(&mut service, &mut log, StateId::Pulsing, 20);
    // High phase done; release before the off time runs out.
    rig.switch.push(rig.clock.now_ms() + 160, false);
    cycle_until(&mut service, &mut log, StateId::Ready, 10);
    assert!(!rig.output.level());
    assert_eq!(log.pulses.len(), 1);
}

#[test]
fn switch_read_failure_is_treated_as_inactive() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::new();
    service.start(&mut log).unwrap();
    cycle_until(&mut service, &mut log, StateId::Running, 20);

    rig.switch.set_failing(true);
    for _ in 0..5 {
        service.run_cycle(&mut log).unwrap();
    }
    assert_eq!(service.state(), StateId::Ready);
    assert!(!rig.output.level());
}

// ── Collaborator failures ───────────────────────────────────

#[test]
fn event_log_failures_do_not_alter_control() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::failing();
    service.start(&mut log).unwrap();
    for _ in 0..30 {
        service.run_cycle(&mut log).unwrap();
    }
    assert!(log.attempts > 0);
    assert!(log.events.is_empty());
    assert!(!rig.output.periods().is_empty());
    assert!(service.pulse_count() > 0);
}

#[test]
fn output_write_failure_stops_the_service() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let mut log = RecordingLog::new();
    rig.output.set_failing(true);

    let result = service.run(&mut log);
    assert!(result.is_err());
    assert!(!result.unwrap_err().is_recoverable());
    assert!(rig.shutdown.is_requested());
    assert!(!service.output_asserted());
    assert!(log.contains("STOP |"));
}

// ── Threaded run / shutdown ─────────────────────────────────

#[test]
fn run_stops_on_shutdown_with_output_low() {
    let (mut service, rig) = rig(vec![(0, true)]);
    let shutdown = rig.shutdown.clone();

    // The indicator gets its own clock so it cannot stretch the control
    // task's feed gaps.
    let led = MockLed::default();
    let mut indicator = IndicatorTask::new(
        rig.reader.clone(),
        IndicatorHandle::new(StatusLed::new(led.clone())),
        SimClock::new(),
        Arc::clone(&rig.watchdog),
        rig.config.clone(),
    );
    let indicator_shutdown = shutdown.clone();
    let indicator_handle = std::thread::spawn(move || indicator.run(&indicator_shutdown));

    let handle = std::thread::spawn(move || {
        let mut log = RecordingLog::new();
        let result = service.run(&mut log);
        (result, log, service.pulse_count())
    });

    std::thread::sleep(std::time::Duration::from_millis(50));
    shutdown.request();
    let (result, log, pulses) = handle.join().unwrap();
    indicator_handle.join().unwrap();

    assert!(result.is_ok());
    assert!(!rig.output.level());
    assert!(!rig.reader.snapshot().pulse_active);
    assert!(log.contains("STOP |"));
    assert!(pulses > 0);
    assert!(rig.watchdog.timer().max_gap_ms() <= u64::from(rig.config.feed_interval_ms));
    assert!(rig.watchdog.feed_count() >= rig.clock.now_ms() / u64::from(rig.config.feed_interval_ms));

    let duties = led.duties();
    assert!(duties.len() > 1, "indicator should have refreshed");
    assert_eq!(duties.last().copied(), Some(0), "indicator off after shutdown");
}
