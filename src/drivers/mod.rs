//! Actuator and input drivers, hardware initialisation, and task helpers.

pub mod hw_init;
pub mod led_patterns;
pub mod pulse_output;
pub mod status_led;
pub mod switch;
pub mod task_pin;
pub mod watchdog;
