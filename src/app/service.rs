//! Control service, the main control task.
//!
//! [`ControlService`] owns the FSM, the sampler, the enable switch, the
//! pulse output and the write side of the shared state.  Each cycle it
//! ticks the FSM and then carries out what the handlers asked for:
//!
//! ```text
//!   tick FSM ─▶ publish state ─▶ drive output ─▶ fed hold (switch polled,
//!   release forces output low) ─▶ sample + map + commit ─▶ poll switch
//! ```
//!
//! Every wait goes through the watchdog liaison, so no path blocks longer
//! than one feed interval without a feed.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::control::mapping;
use crate::drivers::pulse_output::PulseOutput;
use crate::drivers::switch::EnableSwitch;
use crate::drivers::watchdog::{FeedingDelay, SleepOutcome, WatchdogLiaison, WatchdogTimer, sleep_fed};
use crate::error::Result;
use crate::fsm::context::{FsmContext, Hold, HoldKind};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::sensors::sampler::AnalogSampler;
use crate::shared::{ControlWriter, PulseTiming, ShutdownSignal, StateSnapshot};

use super::events::ControlEvent;
use super::ports::{AnalogChannel, ConfigError, ConfigPort, EventLog, TemperatureAdvisory, TimePort};

/// Peripherals owned by the control task.
pub struct ControlHardware<A, S, O, C> {
    pub pulse_width: A,
    pub off_time: A,
    pub enable: S,
    pub output: O,
    pub clock: C,
}

/// The main control task.
pub struct ControlService<A, S, O, C, W> {
    fsm: Fsm,
    ctx: FsmContext,
    sampler: AnalogSampler,
    pulse_width: A,
    off_time: A,
    switch: EnableSwitch<S>,
    switch_fault: bool,
    output: PulseOutput<O>,
    clock: C,
    watchdog: Arc<WatchdogLiaison<W>>,
    shared: ControlWriter,
    shutdown: ShutdownSignal,
    temperature: Option<Box<dyn TemperatureAdvisory + Send>>,
    last_temp_check_ms: u64,
    temp_exceeded: bool,
    cycles: u64,
    pulses: u64,
}

impl<A, S, O, C, W> ControlService<A, S, O, C, W>
where
    A: AnalogChannel,
    S: InputPin,
    O: OutputPin,
    C: DelayNs + TimePort,
    W: WatchdogTimer,
{
    /// Build the service.  Drives the output low immediately.
    ///
    /// Does **not** start the FSM; [`run`](Self::run) or
    /// [`start`](Self::start) does that.
    pub fn new(
        config: ControllerConfig,
        hw: ControlHardware<A, S, O, C>,
        watchdog: Arc<WatchdogLiaison<W>>,
        shared: ControlWriter,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let output = PulseOutput::new(hw.output)?;
        let now = hw.clock.now_ms();
        let switch = EnableSwitch::new(
            hw.enable,
            config.enable_active_low,
            u64::from(config.debounce_ms),
            now,
        );
        let fallback = shared.snapshot().last_valid;
        Ok(Self {
            fsm: Fsm::new(build_state_table(), StateId::Startup),
            sampler: AnalogSampler::from_config(&config),
            ctx: FsmContext::new(config, fallback),
            pulse_width: hw.pulse_width,
            off_time: hw.off_time,
            switch,
            switch_fault: false,
            output,
            clock: hw.clock,
            watchdog,
            shared,
            shutdown,
            temperature: None,
            last_temp_check_ms: now,
            temp_exceeded: false,
            cycles: 0,
            pulses: 0,
        })
    }

    /// Attach the advisory temperature source.
    pub fn with_temperature(mut self, sensor: Box<dyn TemperatureAdvisory + Send>) -> Self {
        self.temperature = Some(sensor);
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter Startup and carry out its blink wait and first sampling pass.
    pub fn start(&mut self, log: &mut impl EventLog) -> Result<()> {
        self.fsm.start(&mut self.ctx);
        let state = self.fsm.current_state();
        self.shared.set_state(state);
        emit(log, &ControlEvent::Started(state));
        info!("CTRL: started in {:?}", state);
        self.execute(log)
    }

    /// Run one control cycle.  Returns the state the cycle ran in.
    pub fn run_cycle(&mut self, log: &mut impl EventLog) -> Result<StateId> {
        self.cycles += 1;
        if let Some(t) = self.fsm.tick(&mut self.ctx) {
            self.shared.set_state(t.to);
            emit(log, &ControlEvent::StateChanged { from: t.from, to: t.to });
        }
        self.execute(log)?;
        Ok(self.fsm.current_state())
    }

    /// Start, then cycle until shutdown is requested or an unhandled fault
    /// occurs.  The output is low on return either way; on a fault the
    /// shutdown signal is raised so the indicator task stops too.
    pub fn run(&mut self, log: &mut impl EventLog) -> Result<()> {
        let mut result = self.start(log);
        while result.is_ok() && !self.shutdown.is_requested() {
            result = self.run_cycle(log).map(|_| ());
        }
        self.stop(log);
        if let Err(e) = result {
            error!("CTRL: unhandled fault: {}", e);
            self.shutdown.request();
        }
        result
    }

    /// Force the output low and publish the final state.
    pub fn stop(&mut self, log: &mut impl EventLog) {
        self.ctx.force_low();
        if let Err(e) = self.apply_output() {
            error!("CTRL: failed to release output on stop: {}", e);
        }
        emit(log, &ControlEvent::Shutdown);
        info!("CTRL: stopped after {} cycles, {} pulses", self.cycles, self.pulses);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.shared.snapshot()
    }

    pub fn output_asserted(&self) -> bool {
        self.output.is_asserted()
    }

    /// Completed (not aborted) pulses since start.
    pub fn pulse_count(&self) -> u64 {
        self.pulses
    }

    // ── Internal ──────────────────────────────────────────────

    /// Carry out the commands the handlers left in the context.
    fn execute(&mut self, log: &mut impl EventLog) -> Result<()> {
        self.apply_output()?;

        if let Some(width) = self.ctx.commands.completed_pulse {
            self.pulses += 1;
            if let Err(e) = log.log_pulse(width) {
                warn!("CTRL: pulse log failed: {}", e);
            }
        }

        self.ctx.inputs.hold_interrupted = false;
        if let Some(hold) = self.ctx.commands.hold {
            self.hold(hold, log)?;
        }

        if self.ctx.commands.sample {
            self.sample_and_commit(log);
        }

        let now = self.clock.now_ms();
        self.ctx.inputs.switch_active = poll_enable(&mut self.switch, &mut self.switch_fault, now);

        if matches!(self.fsm.current_state(), StateId::Ready | StateId::Error) {
            self.check_temperature(log, now);
        }
        Ok(())
    }

    /// Mirror `commands.output_high` onto the pin and the shared flag.
    fn apply_output(&mut self) -> Result<()> {
        let want = self.ctx.commands.output_high;
        if want == self.output.is_asserted() {
            return Ok(());
        }
        if want {
            self.output.assert()?;
            self.shared.set_pulse_active(true);
        } else {
            self.shared.set_pulse_active(false);
            self.output.release()?;
        }
        Ok(())
    }

    fn hold(&mut self, hold: Hold, log: &mut impl EventLog) -> Result<()> {
        let interrupt_on = match hold.kind {
            HoldKind::Fixed => None,
            HoldKind::UntilRelease => Some(false),
            HoldKind::UntilPress => Some(true),
        };
        let Self {
            switch,
            switch_fault,
            clock,
            watchdog,
            shutdown,
            ..
        } = self;
        let outcome = sleep_fed(&**watchdog, clock, hold.ms, |now| {
            let active = poll_enable(switch, switch_fault, now);
            shutdown.is_requested() || interrupt_on == Some(active)
        });

        if let SleepOutcome::Interrupted { elapsed_ms } = outcome {
            self.ctx.inputs.hold_interrupted = true;
            if self.output.is_asserted() {
                self.ctx.commands.output_high = false;
                self.apply_output()?;
                emit(
                    log,
                    &ControlEvent::PulseAborted {
                        after_ms: elapsed_ms,
                        width_ms: self.ctx.pulse_width_ms,
                    },
                );
            }
        }
        Ok(())
    }

    /// Sample both channels through a feeding delay and map to timing.
    ///
    /// With a budget the reading interval shrinks so both passes fit in it.
    fn sample_timing(&mut self, budget_ms: Option<u32>) -> Result<PulseTiming> {
        let aggression = f64::from(self.ctx.config.off_time_aggression);
        let sampler = match budget_ms {
            Some(budget) => self.sampler.fit_within(budget, 2),
            None => self.sampler,
        };
        if sampler != self.sampler {
            debug!("CTRL: recheck squeezed to {} ms per pass", sampler.pass_ms());
        }
        let mut delay = FeedingDelay::new(&*self.watchdog, &mut self.clock);
        let width_raw = sampler.sample(&mut self.pulse_width, &mut delay)?;
        let off_raw = sampler.sample(&mut self.off_time, &mut delay)?;
        Ok(PulseTiming::new(
            mapping::pulse_width_ms(width_raw),
            mapping::off_time_ms(off_raw, aggression),
        )?)
    }

    fn sample_and_commit(&mut self, log: &mut impl EventLog) {
        let started = self.clock.now_ms();
        let outcome = self.sample_timing(self.ctx.commands.sample_within);
        let elapsed = self.clock.now_ms().saturating_sub(started);

        let was_faulted = self.ctx.inputs.error_flag;
        let snap = self.shared.commit_sample(outcome);
        self.ctx.inputs.error_flag = snap.error_flag;
        self.ctx.inputs.timing = snap.timing;
        self.ctx.inputs.sample_elapsed_ms = u32::try_from(elapsed).unwrap_or(u32::MAX);

        match outcome {
            Ok(timing) => {
                self.ctx.inputs.last_fault = None;
                debug!(
                    "CTRL: timing width={}ms off={}ms ({} ms sampling)",
                    timing.pulse_width_ms(),
                    timing.off_time_ms(),
                    elapsed
                );
            }
            Err(e) => {
                self.ctx.inputs.last_fault = Some(e);
                if !was_faulted {
                    emit(log, &ControlEvent::SensorFault(e));
                }
            }
        }
    }

    fn check_temperature(&mut self, log: &mut impl EventLog, now: u64) {
        let interval = u64::from(self.ctx.config.temperature_check_interval_ms);
        let threshold = self.ctx.config.temperature_threshold_c;
        let Some(sensor) = self.temperature.as_mut() else {
            return;
        };
        if now.saturating_sub(self.last_temp_check_ms) < interval {
            return;
        }
        self.last_temp_check_ms = now;
        match sensor.check_temperature(threshold) {
            Ok((celsius, exceeded)) => {
                if exceeded && !self.temp_exceeded {
                    emit(
                        log,
                        &ControlEvent::TemperatureAdvisory {
                            celsius,
                            threshold_c: threshold,
                        },
                    );
                }
                self.temp_exceeded = exceeded;
            }
            Err(e) => debug!("CTRL: temperature read failed: {}", e),
        }
    }
}

/// Poll the switch; a read failure counts as inactive and is warned about
/// once per failure episode.
fn poll_enable<S: InputPin>(switch: &mut EnableSwitch<S>, fault: &mut bool, now_ms: u64) -> bool {
    match switch.poll(now_ms) {
        Ok(level) => {
            if *fault {
                info!("CTRL: enable switch readable again");
                *fault = false;
            }
            level
        }
        Err(e) => {
            if !*fault {
                warn!("CTRL: {} on enable switch, treating as inactive", e);
                *fault = true;
            }
            false
        }
    }
}

fn emit(log: &mut impl EventLog, event: &ControlEvent) {
    let text = event.to_string();
    if let Err(e) = log.log_event(&text, event.level()) {
        warn!("CTRL: event log failed ({}): {}", e, text);
    }
}

/// Write `timing` back as the stored fallback if it differs.
///
/// Returns whether anything was written.
pub fn persist_last_valid(
    store: &mut impl ConfigPort,
    config: &ControllerConfig,
    timing: PulseTiming,
) -> core::result::Result<bool, ConfigError> {
    if config.fallback_pulse_width_ms == timing.pulse_width_ms()
        && config.fallback_off_time_ms == timing.off_time_ms()
    {
        return Ok(false);
    }
    let updated = ControllerConfig {
        fallback_pulse_width_ms: timing.pulse_width_ms(),
        fallback_off_time_ms: timing.off_time_ms(),
        ..config.clone()
    };
    store.write_config(&updated)?;
    Ok(true)
}
