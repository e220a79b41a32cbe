//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the blackboard the state handlers read from and write
//! to.  The control service fills [`FsmInputs`] from hardware after each
//! cycle; handlers answer with [`FsmCommands`] (output level, how long to
//! hold, whether to sample) which the service applies.  No handler touches
//! hardware or sleeps.

use crate::config::ControllerConfig;
use crate::error::Error;
use crate::shared::PulseTiming;

// ---------------------------------------------------------------------------
// Inputs (written by the control service; read-only to state handlers)
// ---------------------------------------------------------------------------

/// Observations from the previous cycle.
#[derive(Debug, Clone, Copy)]
pub struct FsmInputs {
    /// Debounced enable switch level.
    pub switch_active: bool,
    /// The most recent sampling pass failed validation.
    pub error_flag: bool,
    /// Committed timing (fresh, or the last valid fallback).
    pub timing: PulseTiming,
    /// The previous hold ended early on its interrupt condition.
    pub hold_interrupted: bool,
    /// Wall time spent in the previous sampling pass (milliseconds).
    pub sample_elapsed_ms: u32,
    /// Fault from the most recent failed sampling pass.
    pub last_fault: Option<Error>,
}

impl FsmInputs {
    pub fn new(timing: PulseTiming) -> Self {
        Self {
            switch_active: false,
            error_flag: false,
            timing,
            hold_interrupted: false,
            sample_elapsed_ms: 0,
            last_fault: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands (written by state handlers; applied by the control service)
// ---------------------------------------------------------------------------

/// What ends a hold before its full duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldKind {
    /// Runs to completion.
    Fixed,
    /// Ends when the debounced switch goes inactive.
    UntilRelease,
    /// Ends when the debounced switch goes active.
    UntilPress,
}

/// A watchdog-fed wait requested by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hold {
    pub ms: u32,
    pub kind: HoldKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsmCommands {
    /// Desired output level.  Persistent until a handler changes it.
    pub output_high: bool,
    /// Wait to perform this cycle.  Cleared every tick.
    pub hold: Option<Hold>,
    /// Run one sampling pass of both channels this cycle.  Cleared every tick.
    pub sample: bool,
    /// Squeeze that pass into this many milliseconds.  Cleared every tick.
    pub sample_within: Option<u32>,
    /// A pulse of this width ran to completion.  Cleared every tick.
    pub completed_pulse: Option<u16>,
}

impl FsmCommands {
    /// Drop the one-shot requests, keep the output level.
    pub fn clear_one_shot(&mut self) {
        self.hold = None;
        self.sample = false;
        self.sample_within = None;
        self.completed_pulse = None;
    }

    pub fn hold(&mut self, ms: u32, kind: HoldKind) {
        self.hold = Some(Hold { ms, kind });
    }
}

/// Sub-phase of one pulse cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulsePhase {
    /// Output asserted for the pulse width.
    High,
    /// Output low, timing re-sampled.
    Recheck,
    /// Output low for the remainder of the off time.
    Low,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,

    pub inputs: FsmInputs,
    pub commands: FsmCommands,
    pub pulse_phase: PulsePhase,

    /// Width of the pulse currently in flight, latched on assert.
    pub pulse_width_ms: u16,

    pub config: ControllerConfig,
}

impl FsmContext {
    /// `fallback` seeds the timing until the first sampling pass commits.
    pub fn new(config: ControllerConfig, fallback: PulseTiming) -> Self {
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            inputs: FsmInputs::new(fallback),
            commands: FsmCommands::default(),
            pulse_phase: PulsePhase::High,
            pulse_width_ms: fallback.pulse_width_ms(),
            config,
        }
    }

    /// Drive the output low and forget the pulse in flight.
    pub fn force_low(&mut self) {
        self.commands.output_high = false;
        self.pulse_phase = PulsePhase::High;
    }
}
