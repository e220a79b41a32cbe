//! Control-side arithmetic: scaling filtered readings into pulse timing.

pub mod mapping;
