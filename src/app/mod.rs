//! Application core.
//!
//! The two tasks of the controller, [`service::ControlService`] and
//! [`indicator::IndicatorTask`], plus the port traits they talk through.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`] or the `embedded-hal` traits, keeping this layer fully
//! testable without real peripherals.

pub mod events;
pub mod indicator;
pub mod ports;
pub mod service;
