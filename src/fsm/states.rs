//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.
//!
//! ```text
//!  STARTUP ──[sampled ok]──▶ READY ──[switch on, no error]──▶ RUNNING
//!     │                      ▲  │                               │
//!     │                      │  └──[sample failed]──┐           ▼
//!     │                      │                      │        PULSING
//!     │                      ├──[switch off]────────┼── High → Recheck → Low
//!     │                      │                      │           │
//!     │                      │                      ▼           └──▶ RUNNING
//!     └──[sample failed]─────┴───[sampled ok]──── ERROR ◀──[recheck failed]
//! ```

use super::context::{FsmContext, HoldKind, PulsePhase};
use super::{StateDescriptor, StateId};
use log::{debug, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Startup
        StateDescriptor {
            id: StateId::Startup,
            name: "Startup",
            on_enter: Some(startup_enter),
            on_exit: None,
            on_update: startup_update,
        },
        // Index 1: Ready
        StateDescriptor {
            id: StateId::Ready,
            name: "Ready",
            on_enter: Some(ready_enter),
            on_exit: None,
            on_update: ready_update,
        },
        // Index 2: Running
        StateDescriptor {
            id: StateId::Running,
            name: "Running",
            on_enter: None,
            on_exit: None,
            on_update: running_update,
        },
        // Index 3: Pulsing
        StateDescriptor {
            id: StateId::Pulsing,
            name: "Pulsing",
            on_enter: Some(pulsing_enter),
            on_exit: Some(pulsing_exit),
            on_update: pulsing_update,
        },
        // Index 4: Error
        StateDescriptor {
            id: StateId::Error,
            name: "Error",
            on_enter: Some(error_enter),
            on_exit: None,
            on_update: error_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  STARTUP state
// ═══════════════════════════════════════════════════════════════════════════

fn startup_enter(ctx: &mut FsmContext) {
    ctx.force_low();
    // Blink sequence runs to completion, then the first sampling pass.
    ctx.commands
        .hold(ctx.config.startup_sequence_ms(), HoldKind::Fixed);
    ctx.commands.sample = true;
}

fn startup_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.inputs.error_flag {
        warn!("FSM: initial sampling failed");
        Some(StateId::Error)
    } else {
        Some(StateId::Ready)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY state
// ═══════════════════════════════════════════════════════════════════════════

fn ready_enter(ctx: &mut FsmContext) {
    ctx.force_low();
}

fn ready_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.inputs.error_flag {
        return Some(StateId::Error);
    }
    if ctx.inputs.switch_active {
        return Some(StateId::Running);
    }
    ctx.commands.hold(ctx.config.ready_poll_ms, HoldKind::UntilPress);
    ctx.commands.sample = true;
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING state
// ═══════════════════════════════════════════════════════════════════════════

fn running_update(_ctx: &mut FsmContext) -> Option<StateId> {
    Some(StateId::Pulsing)
}

// ═══════════════════════════════════════════════════════════════════════════
//  PULSING state
// ═══════════════════════════════════════════════════════════════════════════

fn pulsing_enter(ctx: &mut FsmContext) {
    let width = ctx.inputs.timing.pulse_width_ms();
    ctx.pulse_width_ms = width;
    ctx.pulse_phase = PulsePhase::High;
    ctx.commands.output_high = true;
    ctx.commands.hold(u32::from(width), HoldKind::UntilRelease);
}

fn pulsing_exit(ctx: &mut FsmContext) {
    ctx.force_low();
}

fn pulsing_update(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.pulse_phase {
        PulsePhase::High => {
            ctx.commands.output_high = false;
            if ctx.inputs.hold_interrupted || !ctx.inputs.switch_active {
                debug!("FSM: pulse aborted by switch release");
                return Some(StateId::Ready);
            }
            ctx.commands.completed_pulse = Some(ctx.pulse_width_ms);
            ctx.commands.sample = true;
            // recheck pass is fitted into the current off time
            ctx.commands.sample_within = Some(u32::from(ctx.inputs.timing.off_time_ms()));
            ctx.pulse_phase = PulsePhase::Recheck;
            None
        }
        PulsePhase::Recheck => {
            if ctx.inputs.error_flag {
                return Some(StateId::Error);
            }
            if !ctx.inputs.switch_active {
                return Some(StateId::Ready);
            }
            let off = u32::from(ctx.inputs.timing.off_time_ms());
            let remaining = off.saturating_sub(ctx.inputs.sample_elapsed_ms);
            ctx.commands.hold(remaining, HoldKind::UntilRelease);
            ctx.pulse_phase = PulsePhase::Low;
            None
        }
        PulsePhase::Low => {
            if ctx.inputs.hold_interrupted || !ctx.inputs.switch_active {
                Some(StateId::Ready)
            } else {
                Some(StateId::Running)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR state
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut FsmContext) {
    ctx.force_low();
    if let Some(fault) = ctx.inputs.last_fault {
        warn!("FSM: entering Error ({})", fault);
    }
}

fn error_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.commands.output_high = false;
    if !ctx.inputs.error_flag {
        return Some(StateId::Ready);
    }
    ctx.commands.hold(ctx.config.error_retry_ms, HoldKind::Fixed);
    ctx.commands.sample = true;
    None
}
