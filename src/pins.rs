//! GPIO / peripheral pin assignments for the pulse controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Analog inputs (ADC1, oneshot, 12 dB attenuation)
// ---------------------------------------------------------------------------

/// Pulse-width potentiometer wiper.  ADC1 channel 3 (GPIO 4 on ESP32-S3).
pub const PULSE_WIDTH_POT_GPIO: i32 = 4;
pub const ADC1_CH_PULSE_WIDTH: u32 = 3;

/// Off-time potentiometer wiper.  ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const OFF_TIME_POT_GPIO: i32 = 5;
pub const ADC1_CH_OFF_TIME: u32 = 4;

/// NTC thermistor (advisory only).  ADC1 channel 8 (GPIO 9 on ESP32-S3).
pub const TEMP_ADC_GPIO: i32 = 9;
pub const ADC1_CH_TEMP: u32 = 8;

/// Native ADC resolution; raw samples are scaled up to the full 16-bit range.
pub const ADC_NATIVE_BITS: u32 = 12;

// ---------------------------------------------------------------------------
// Digital I/O
// ---------------------------------------------------------------------------

/// Enable switch.  Active-low with internal pull-up.
pub const ENABLE_SWITCH_GPIO: i32 = 16;

/// Pulse output line driving the external equipment.  HIGH = asserted.
pub const PULSE_OUTPUT_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Status indicator (single LED on LEDC)
// ---------------------------------------------------------------------------

pub const STATUS_LED_GPIO: i32 = 11;
pub const LEDC_CH_STATUS: u32 = 0;

/// LEDC timer resolution (bits).  13-bit gives 0 – 8191 duty levels.
pub const LED_PWM_RESOLUTION_BITS: u32 = 13;
/// LEDC base frequency for the status LED (5 kHz, flicker-free).
pub const LED_PWM_FREQ_HZ: u32 = 5_000;
