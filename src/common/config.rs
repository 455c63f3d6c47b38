// src/common/config.rs

use super::timing;

/// Pacing knobs for a [`CommandEngine`](crate::engine::CommandEngine).
///
/// The round-trip budget itself is passed per call, these only control how the
/// engine spaces out its polls.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Delay between two read polls while a reply is pending.
    pub poll_interval_us: u32,
    /// Number of `WouldBlock` answers tolerated while writing one frame.
    pub write_retries: u32,
    /// Delay between two stabilization samples.
    pub sample_interval_ms: u32,
}

impl EngineConfig {
    pub const fn new() -> Self {
        EngineConfig {
            poll_interval_us: timing::POLL_INTERVAL.as_micros() as u32,
            write_retries: timing::WRITE_RETRIES,
            sample_interval_ms: 0,
        }
    }

    /// Preset for EZO probe circuits: samples are spaced one second apart.
    pub const fn ezo() -> Self {
        EngineConfig {
            sample_interval_ms: timing::EZO_SAMPLE_INTERVAL.as_millis() as u32,
            ..Self::new()
        }
    }

    /// Preset for AT-command modems.
    pub const fn at_modem() -> Self {
        Self::new()
    }

    pub const fn with_poll_interval_us(mut self, us: u32) -> Self {
        self.poll_interval_us = us;
        self
    }

    pub const fn with_write_retries(mut self, retries: u32) -> Self {
        self.write_retries = retries;
        self
    }

    pub const fn with_sample_interval_ms(mut self, ms: u32) -> Self {
        self.sample_interval_ms = ms;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
