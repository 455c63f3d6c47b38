// src/engine/async_engine.rs

// Async counterpart of `CommandEngine`. Same buffer discipline, same outcomes;
// the poll delay and the transport calls are awaited instead of blocking.

use super::stabilization::{Reading, SamplerState, StabilizationSampler};
use crate::common::{
    buffer::ResponseBuffer,
    config::EngineConfig,
    error::CmdError,
    frame::CommandFrame,
    hal_traits::CmdSerialAsync,
    timing,
    token::{Classification, ProtocolProfile, ResponseOutcome},
};
use embedded_hal_async::delay::DelayNs;

pub struct AsyncCommandEngine<IF, D, const C: usize = { super::DEFAULT_BUFFER_LEN }>
where
    IF: CmdSerialAsync,
    D: DelayNs,
{
    interface: IF,
    delay: D,
    buffer: ResponseBuffer<C>,
    config: EngineConfig,
}

impl<IF, D, const C: usize> AsyncCommandEngine<IF, D, C>
where
    IF: CmdSerialAsync,
    D: DelayNs,
{
    pub fn new(interface: IF, delay: D) -> Self {
        Self::with_config(interface, delay, EngineConfig::default())
    }

    pub fn with_config(interface: IF, delay: D, config: EngineConfig) -> Self {
        AsyncCommandEngine {
            interface,
            delay,
            buffer: ResponseBuffer::new(),
            config,
        }
    }

    /// See [`CommandEngine::round_trip`](super::CommandEngine::round_trip).
    pub async fn round_trip(
        &mut self,
        frame: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
    ) -> Result<ResponseOutcome, CmdError<IF::Error>> {
        self.buffer.clear();
        self.write_frame(frame).await?;

        let mut chunk = [0u8; timing::READ_CHUNK];
        for _ in 0..budget {
            match self.interface.read(&mut chunk).await {
                Ok(n) => self.buffer.append(&chunk[..n.min(chunk.len())]),
                Err(e) => {
                    self.buffer.clear();
                    return Err(CmdError::Io(e));
                }
            }

            if let Classification::Terminal(outcome) = profile.classify_reply(&self.buffer, frame) {
                debug!("{} `{}`: {:?}", profile.name, frame.text(), outcome);
                return Ok(outcome);
            }

            self.delay.delay_us(self.config.poll_interval_us).await;
        }

        warn!("{} `{}`: no terminal token after {} polls", profile.name, frame.text(), budget);
        self.buffer.clear();
        Ok(ResponseOutcome::Timeout)
    }

    pub async fn execute(
        &mut self,
        frame: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
    ) -> Result<(), CmdError<IF::Error>> {
        self.round_trip(frame, profile, budget).await?.into_result()
    }

    /// See [`CommandEngine::sample_until_stable`](super::CommandEngine::sample_until_stable).
    pub async fn sample_until_stable(
        &mut self,
        read: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
        sampler: &mut StabilizationSampler,
        max_attempts: u32,
    ) -> Result<Reading, CmdError<IF::Error>> {
        sampler.reset();

        for attempt in 1..=max_attempts {
            if attempt > 1 && self.config.sample_interval_ms > 0 {
                self.delay.delay_ms(self.config.sample_interval_ms).await;
            }
            if self.round_trip(read, profile, budget).await? != ResponseOutcome::Success {
                continue;
            }
            let Some(text) = profile.payload(&self.buffer, read) else {
                continue;
            };
            if sampler.observe(text) == SamplerState::Converged {
                if let Some(stable) = sampler.stable_reading().and_then(|s| Reading::from(s).ok()) {
                    return Ok(stable);
                }
            }
        }

        Err(CmdError::NotConverged {
            attempts: max_attempts,
        })
    }

    #[inline]
    pub fn response(&self) -> &ResponseBuffer<C> {
        &self.buffer
    }

    pub fn release(self) -> (IF, D) {
        (self.interface, self.delay)
    }

    async fn write_frame(&mut self, frame: &CommandFrame) -> Result<(), CmdError<IF::Error>> {
        let mut remaining = frame.as_bytes();
        let mut stalls = 0u32;
        while !remaining.is_empty() {
            let n = self.interface.write(remaining).await.map_err(CmdError::Io)?;
            if n == 0 {
                stalls += 1;
                if stalls > self.config.write_retries {
                    return Err(CmdError::WriteStalled);
                }
                self.delay.delay_us(self.config.poll_interval_us).await;
                continue;
            }
            remaining = &remaining[n.min(remaining.len())..];
        }
        self.interface.flush().await.map_err(CmdError::Io)
    }
}
