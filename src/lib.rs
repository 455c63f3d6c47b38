// src/lib.rs

#![no_std] // Specify no_std at the crate root

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod common;
pub mod devices;
pub mod engine;

// Re-export key types for convenience
pub use common::{
    CmdError, CommandFrame, EngineConfig, ProtocolProfile, ResponseBuffer, ResponseOutcome,
    AT_PROFILE, EZO_PROFILE,
};
pub use engine::CommandEngine;
