//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements                           | Connects to              |
//! |------------|--------------------------------------|--------------------------|
//! | `hardware` | InputPin / OutputPin / SetDutyCycle  | ESP32 GPIO, LEDC         |
//! | `log_sink` | EventLog                             | Serial log output        |
//! | `nvs`      | ConfigPort                           | NVS / in-memory store    |
//! | `time`     | TimePort + DelayNs                   | ESP32 system timer       |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
