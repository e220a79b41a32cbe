//! LED pattern engine for the single-channel status indicator.
//!
//! The indicator task selects a [`Pattern`] from the controller snapshot on
//! every refresh and calls [`LedPatternEngine::tick`] with the elapsed time;
//! the engine returns the brightness to write on the 16-bit duty scale.
//! Switching to a different pattern restarts it from phase zero.
//!
//! | Pattern       | Shape                                          |
//! |---------------|------------------------------------------------|
//! | Off           | dark                                           |
//! | Solid         | full brightness                                |
//! | Breathing     | triangular ramp 0 → full → 0 over `period_ms`  |
//! | StartupBlink  | `count` on/off blinks, then dark               |
//! | FaultBlink    | `count` blinks, `pause_ms` dark, repeat        |

use crate::config::ControllerConfig;
use crate::drivers::status_led::DUTY_FULL;

/// Pattern identifier with its timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Off,
    Solid,
    Breathing { period_ms: u32 },
    StartupBlink { count: u8, on_ms: u32 },
    FaultBlink { count: u8, on_ms: u32, pause_ms: u32 },
}

impl Pattern {
    pub fn breathing(cfg: &ControllerConfig) -> Self {
        Self::Breathing {
            period_ms: u32::from(cfg.breathing_period_ms),
        }
    }

    pub fn startup(cfg: &ControllerConfig) -> Self {
        Self::StartupBlink {
            count: cfg.startup_blink_count,
            on_ms: u32::from(cfg.startup_blink_ms),
        }
    }

    pub fn fault(cfg: &ControllerConfig) -> Self {
        Self::FaultBlink {
            count: cfg.fault_blink_count,
            on_ms: u32::from(cfg.fault_blink_ms),
            pause_ms: u32::from(cfg.fault_pause_ms),
        }
    }
}

/// Stack-allocated, no heap.
#[derive(Debug, Default)]
pub struct LedPatternEngine {
    phase_ms: u32,
    active: Option<Pattern>,
}

impl LedPatternEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `delta_ms` and render `pattern`.
    pub fn tick(&mut self, pattern: Pattern, delta_ms: u32) -> u16 {
        if self.active == Some(pattern) {
            self.phase_ms = self.phase_ms.wrapping_add(delta_ms);
        } else {
            self.active = Some(pattern);
            self.phase_ms = 0;
        }
        Self::generate(pattern, self.phase_ms)
    }

    pub fn active(&self) -> Option<Pattern> {
        self.active
    }

    fn generate(pattern: Pattern, phase_ms: u32) -> u16 {
        match pattern {
            Pattern::Off => 0,
            Pattern::Solid => DUTY_FULL,
            Pattern::Breathing { period_ms } => Self::triangle(phase_ms, period_ms),
            Pattern::StartupBlink { count, on_ms } => {
                let on_ms = on_ms.max(1);
                let blink = phase_ms / (2 * on_ms);
                if blink < u32::from(count) && phase_ms % (2 * on_ms) < on_ms {
                    DUTY_FULL
                } else {
                    0
                }
            }
            Pattern::FaultBlink {
                count,
                on_ms,
                pause_ms,
            } => {
                let on_ms = on_ms.max(1);
                let burst = u32::from(count) * 2 * on_ms;
                let cycle = phase_ms % (burst + pause_ms).max(1);
                if cycle < burst && cycle % (2 * on_ms) < on_ms {
                    DUTY_FULL
                } else {
                    0
                }
            }
        }
    }

    /// Triangular approximation of a sine: ramps 0 → full → 0 over
    /// `period_ms`.
    fn triangle(phase_ms: u32, period_ms: u32) -> u16 {
        let period = u64::from(period_ms.max(2));
        let pos = u64::from(phase_ms) % period;
        let half = period / 2;
        let full = u64::from(DUTY_FULL);
        let level = if pos < half {
            pos * full / half
        } else {
            (period - pos) * full / (period - half)
        };
        level.min(full) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_and_off() {
        let mut e = LedPatternEngine::new();
        assert_eq!(e.tick(Pattern::Solid, 20), DUTY_FULL);
        assert_eq!(e.tick(Pattern::Off, 20), 0);
    }

    #[test]
    fn breathing_ramps_up_and_down() {
        assert_eq!(LedPatternEngine::triangle(0, 2000), 0);
        assert_eq!(LedPatternEngine::triangle(1000, 2000), DUTY_FULL);
        assert_eq!(LedPatternEngine::triangle(2000, 2000), 0);
        let quarter = LedPatternEngine::triangle(500, 2000);
        assert!(quarter > 30_000 && quarter < 35_000);
    }

    #[test]
    fn pattern_change_resets_phase() {
        let mut e = LedPatternEngine::new();
        let breathing = Pattern::Breathing { period_ms: 2000 };
        e.tick(breathing, 0);
        let mid = e.tick(breathing, 1000);
        assert_eq!(mid, DUTY_FULL);
        e.tick(Pattern::Solid, 20);
        // back to breathing restarts at the bottom of the ramp
        assert_eq!(e.tick(breathing, 1000), 0);
    }

    #[test]
    fn startup_blinks_count_then_stays_dark() {
        let p = Pattern::StartupBlink { count: 3, on_ms: 150 };
        let on: Vec<bool> = (0..20)
            .map(|i| LedPatternEngine::generate(p, i * 50) == DUTY_FULL)
            .collect();
        // 150 ms on, 150 ms off, three times, then dark
        let expected: Vec<bool> = (0..20u32)
            .map(|i| {
                let t = i * 50;
                t < 900 && t % 300 < 150
            })
            .collect();
        assert_eq!(on, expected);
        assert_eq!(LedPatternEngine::generate(p, 5000), 0);
    }

    #[test]
    fn fault_blink_repeats_after_pause() {
        let p = Pattern::FaultBlink {
            count: 2,
            on_ms: 100,
            pause_ms: 600,
        };
        assert_eq!(LedPatternEngine::generate(p, 0), DUTY_FULL);
        assert_eq!(LedPatternEngine::generate(p, 150), 0);
        assert_eq!(LedPatternEngine::generate(p, 250), DUTY_FULL);
        assert_eq!(LedPatternEngine::generate(p, 500), 0);
        // cycle = 400 burst + 600 pause
        assert_eq!(LedPatternEngine::generate(p, 1000), DUTY_FULL);
    }

    #[test]
    fn patterns_from_config() {
        let cfg = ControllerConfig::default();
        assert_eq!(Pattern::breathing(&cfg), Pattern::Breathing { period_ms: 2000 });
        assert_eq!(
            Pattern::fault(&cfg),
            Pattern::FaultBlink {
                count: 3,
                on_ms: 150,
                pause_ms: 800
            }
        );
    }
}
