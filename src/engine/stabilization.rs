// src/engine/stabilization.rs

//! Waiting for a measured quantity to settle before committing a calibration.

use super::CommandEngine;
use crate::common::{
    error::CmdError,
    frame::CommandFrame,
    hal_traits::{CmdSerial, CmdTimer},
    token::{ProtocolProfile, ResponseOutcome},
};
use arrayvec::ArrayString;
use core::fmt::Debug;

/// Longest reading text kept for comparison. EZO multi-parameter readings
/// (e.g. conductivity `EC,TDS,S,SG`) fit comfortably.
pub const READING_CAP: usize = 48;

/// Raw text of one reading, e.g. `"7.02"`.
pub type Reading = ArrayString<READING_CAP>;

/// What counts as "settled".
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StabilityMode {
    /// Consecutive readings must be identical.
    Matching,
    /// Consecutive readings must each differ from the previous one.
    Differing,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SamplerState {
    Sampling,
    Converged,
}

/// Pure sample-comparison state machine.
///
/// `run` is the length of the current qualifying run, counting the reading that
/// started it. Convergence happens once `run` reaches the threshold. The sampler
/// puts no cap on the number of samples; callers bound that themselves.
#[derive(Debug, Clone)]
pub struct StabilizationSampler {
    mode: StabilityMode,
    threshold: u8,
    last: Option<Reading>,
    run: u8,
    samples: u32,
    state: SamplerState,
}

impl StabilizationSampler {
    /// A threshold of 0 behaves like 1: the first reading converges.
    pub const fn new(threshold: u8, mode: StabilityMode) -> Self {
        StabilizationSampler {
            mode,
            threshold,
            last: None,
            run: 0,
            samples: 0,
            state: SamplerState::Sampling,
        }
    }

    /// Identical-readings sampler with the given threshold.
    pub const fn matching(threshold: u8) -> Self {
        Self::new(threshold, StabilityMode::Matching)
    }

    /// Feeds one successful reading.
    ///
    /// Readings longer than [`READING_CAP`] are ignored, as are readings fed
    /// after convergence.
    pub fn observe(&mut self, reading: &str) -> SamplerState {
        if self.state == SamplerState::Converged {
            return self.state;
        }
        let Ok(reading) = Reading::from(reading) else {
            return self.state;
        };

        let extends_run = match &self.last {
            None => false,
            Some(last) => match self.mode {
                StabilityMode::Matching => *last == reading,
                StabilityMode::Differing => *last != reading,
            },
        };
        self.run = if extends_run { self.run.saturating_add(1) } else { 1 };
        self.last = Some(reading);
        self.samples += 1;

        if self.run >= self.threshold.max(1) {
            self.state = SamplerState::Converged;
        }
        self.state
    }

    /// Back to `Sampling` with no history.
    pub fn reset(&mut self) {
        *self = Self::new(self.threshold, self.mode);
    }

    #[inline]
    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// The settled reading, once converged.
    pub fn stable_reading(&self) -> Option<&str> {
        match self.state {
            SamplerState::Converged => self.last.as_ref().map(|r| r.as_str()),
            SamplerState::Sampling => None,
        }
    }

    #[inline]
    pub fn last_reading(&self) -> Option<&str> {
        self.last.as_ref().map(|r| r.as_str())
    }

    #[inline]
    pub fn run(&self) -> u8 {
        self.run
    }

    /// Successful readings observed since the last reset.
    #[inline]
    pub fn samples(&self) -> u32 {
        self.samples
    }

    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    #[inline]
    pub fn mode(&self) -> StabilityMode {
        self.mode
    }
}

/// Outcome of a committed calibration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationReport {
    /// The reading that satisfied the sampler.
    pub stable_reading: Reading,
    /// Read commands issued, including inconclusive ones.
    pub attempts: u32,
}

impl<IF, const C: usize> CommandEngine<IF, C>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    /// Issues `read` until `sampler` converges or `max_attempts` read commands
    /// have been sent.
    ///
    /// The sampler is reset first. Device errors, timeouts, status replies and
    /// replies without a payload count as attempts but leave the sampler alone.
    /// Transport errors abort immediately.
    pub fn sample_until_stable(
        &mut self,
        read: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
        sampler: &mut StabilizationSampler,
        max_attempts: u32,
    ) -> Result<Reading, CmdError<IF::Error>> {
        self.sample_counting_attempts(read, profile, budget, sampler, max_attempts)
            .map(|(reading, _)| reading)
    }

    /// Waits for a stable reading, then sends `commit` in a fresh round trip.
    pub fn calibrate(
        &mut self,
        read: &CommandFrame,
        commit: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
        sampler: &mut StabilizationSampler,
        max_attempts: u32,
    ) -> Result<CalibrationReport, CmdError<IF::Error>> {
        let (stable_reading, attempts) =
            self.sample_counting_attempts(read, profile, budget, sampler, max_attempts)?;
        debug!("stable at `{}` after {} attempts, sending `{}`", stable_reading.as_str(), attempts, commit.text());

        self.execute(commit, profile, budget)?;
        Ok(CalibrationReport {
            stable_reading,
            attempts,
        })
    }

    fn sample_counting_attempts(
        &mut self,
        read: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
        sampler: &mut StabilizationSampler,
        max_attempts: u32,
    ) -> Result<(Reading, u32), CmdError<IF::Error>> {
        sampler.reset();

        for attempt in 1..=max_attempts {
            if attempt > 1 && self.config.sample_interval_ms > 0 {
                self.interface.delay_ms(self.config.sample_interval_ms);
            }

            let outcome = self.round_trip(read, profile, budget)?;
            if outcome != ResponseOutcome::Success {
                debug!("sample {} inconclusive: {:?}", attempt, outcome);
                continue;
            }
            let Some(text) = profile.payload(&self.buffer, read) else {
                debug!("sample {} carried no reading", attempt);
                continue;
            };

            trace!("sample {}: `{}`", attempt, text);
            if sampler.observe(text) == SamplerState::Converged {
                if let Some(stable) = sampler.stable_reading().and_then(|s| Reading::from(s).ok()) {
                    return Ok((stable, attempt));
                }
            }
        }

        warn!("no stable reading after {} attempts", max_attempts);
        Err(CmdError::NotConverged {
            attempts: max_attempts,
        })
    }
}
