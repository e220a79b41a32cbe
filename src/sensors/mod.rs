//! Sensor subsystem: analog inputs and the outlier-rejecting sampler.

pub mod potentiometer;
pub mod sampler;
pub mod temperature;
