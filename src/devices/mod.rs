// src/devices/mod.rs

// Thin front-ends that speak one protocol family through a `CommandEngine`.

pub mod at_modem;
pub mod ezo;

pub use at_modem::{AtModem, SignalQuality};
pub use ezo::{CalPoint, EzoProbe, EzoStatus, RestartReason};
