// src/engine/mod.rs

mod io_helpers;
pub mod stabilization;

#[cfg(feature = "async")]
pub mod async_engine;

pub use stabilization::{CalibrationReport, Reading, SamplerState, StabilityMode, StabilizationSampler};

#[cfg(feature = "async")]
pub use async_engine::AsyncCommandEngine;

use crate::common::{
    buffer::ResponseBuffer,
    config::EngineConfig,
    error::CmdError,
    frame::CommandFrame,
    hal_traits::{CmdSerial, CmdTimer},
    token::{Classification, ProtocolProfile, ResponseOutcome},
};
use core::fmt::Debug;

/// Default response buffer size. Comfortably holds an EZO `i` or `Status` reply
/// plus its response code, or a multi-line AT answer.
pub const DEFAULT_BUFFER_LEN: usize = 256;

/// Drives command/response exchanges with one text-protocol module.
///
/// The engine owns the transport and the response buffer, so only one exchange
/// can be in flight per device handle and no partial reply can leak from one
/// command into the next.
#[derive(Debug)]
pub struct CommandEngine<IF, const C: usize = DEFAULT_BUFFER_LEN>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    interface: IF,
    buffer: ResponseBuffer<C>,
    config: EngineConfig,
}

impl<IF, const C: usize> CommandEngine<IF, C>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    pub fn new(interface: IF) -> Self {
        Self::with_config(interface, EngineConfig::default())
    }

    pub fn with_config(interface: IF, config: EngineConfig) -> Self {
        CommandEngine {
            interface,
            buffer: ResponseBuffer::new(),
            config,
        }
    }

    /// Sends `frame` and polls for a terminal token at most `budget` times.
    ///
    /// The buffer is cleared before sending. On `Timeout` (and on transport
    /// errors) it is cleared again before returning; for every other outcome the
    /// reply stays available through [`response`](Self::response) until the
    /// next round trip.
    ///
    /// `Err` is only returned for transport failures. Device errors and timeouts
    /// are ordinary outcomes.
    pub fn round_trip(
        &mut self,
        frame: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
    ) -> Result<ResponseOutcome, CmdError<IF::Error>> {
        self.buffer.clear();
        self.write_frame(frame)?;

        for iteration in 0..budget {
            if let Err(e) = self.poll_once() {
                self.buffer.clear();
                return Err(e);
            }

            if let Classification::Terminal(outcome) = profile.classify_reply(&self.buffer, frame) {
                match outcome {
                    ResponseOutcome::Success => {
                        debug!("{} `{}`: ok after {} polls", profile.name, frame.text(), iteration + 1)
                    }
                    _ => warn!("{} `{}`: {:?}", profile.name, frame.text(), outcome),
                }
                return Ok(outcome);
            }

            self.interface.delay_us(self.config.poll_interval_us);
        }

        warn!("{} `{}`: no terminal token after {} polls", profile.name, frame.text(), budget);
        self.buffer.clear();
        Ok(ResponseOutcome::Timeout)
    }

    /// A round trip where anything but `Success` is an error.
    pub fn execute(
        &mut self,
        frame: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
    ) -> Result<(), CmdError<IF::Error>> {
        self.round_trip(frame, profile, budget)?.into_result()
    }

    /// Sends `frame` and returns the first non-token, non-echo reply line.
    pub fn query(
        &mut self,
        frame: &CommandFrame,
        profile: &ProtocolProfile,
        budget: u32,
    ) -> Result<&str, CmdError<IF::Error>> {
        self.execute(frame, profile, budget)?;
        profile
            .payload(&self.buffer, frame)
            .ok_or(CmdError::InvalidFormat)
    }

    /// Content received during the last round trip.
    #[inline]
    pub fn response(&self) -> &ResponseBuffer<C> {
        &self.buffer
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    #[inline]
    pub fn interface(&self) -> &IF {
        &self.interface
    }

    #[inline]
    pub fn interface_mut(&mut self) -> &mut IF {
        &mut self.interface
    }

    /// Gives the transport back.
    pub fn release(self) -> IF {
        self.interface
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{
        mock::{MockCommError, MockInterface},
        token::{DeviceStatus, AT_PROFILE, EZO_PROFILE},
    };

    fn ezo(body: &str) -> CommandFrame {
        CommandFrame::new(body, &EZO_PROFILE).unwrap()
    }

    #[test]
    fn test_engine_construction() {
        let engine: CommandEngine<_> = CommandEngine::new(MockInterface::new());
        assert!(engine.response().is_empty());
        assert_eq!(engine.response().capacity(), DEFAULT_BUFFER_LEN);
        assert_eq!(*engine.config(), EngineConfig::default());
    }

    #[test]
    fn test_cal_dry_success_after_empty_reads() {
        let mut mock_if = MockInterface::new();
        mock_if.stage_empty(2);
        mock_if.stage_chunk(b"\r*OK\r");
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        let outcome = engine.round_trip(&ezo("Cal,dry"), &EZO_PROFILE, 50).unwrap();
        assert_eq!(outcome, ResponseOutcome::Success);
        assert!(engine.response().contains(b"*OK"));
        assert_eq!(engine.interface().written(), b"Cal,dry");
        assert_eq!(engine.interface().write_calls, 1);
        assert_eq!(engine.interface().read_calls, 3); // early exit
    }

    #[test]
    fn test_status_times_out_after_exact_budget() {
        let mock_if = MockInterface::new();
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        let outcome = engine.round_trip(&ezo("Status"), &EZO_PROFILE, 50).unwrap();
        assert_eq!(outcome, ResponseOutcome::Timeout);
        assert_eq!(engine.interface().read_calls, 50);
        assert_eq!(engine.interface().delay_calls, 50);
        assert_eq!(engine.interface().write_calls, 1);
        assert!(engine.response().is_empty());
    }

    #[test]
    fn test_terminates_for_any_budget() {
        for budget in [1u32, 2, 7, 100] {
            let mut engine: CommandEngine<_, 16> = CommandEngine::new(MockInterface::new());
            let outcome = engine.round_trip(&ezo("R"), &EZO_PROFILE, budget).unwrap();
            assert_eq!(outcome, ResponseOutcome::Timeout);
            assert_eq!(engine.interface().read_calls, budget);
        }
    }

    #[test]
    fn test_zero_budget_still_writes() {
        let mut engine: CommandEngine<_> = CommandEngine::new(MockInterface::new());
        let outcome = engine.round_trip(&ezo("Find"), &EZO_PROFILE, 0).unwrap();
        assert_eq!(outcome, ResponseOutcome::Timeout);
        assert_eq!(engine.interface().written(), b"Find");
        assert_eq!(engine.interface().read_calls, 0);
    }

    #[test]
    fn test_timeout_does_not_leak_into_next_command() {
        let mut mock_if = MockInterface::new();
        // First command only ever sees half a token.
        mock_if.stage_chunk(b"12.3\r*O");
        mock_if.stage_empty(2);
        // Second command's reply completes the stale "*O" only if it leaked.
        mock_if.stage_chunk(b"K\r");
        mock_if.stage_empty(3);
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        let first = engine.round_trip(&ezo("R"), &EZO_PROFILE, 3).unwrap();
        assert_eq!(first, ResponseOutcome::Timeout);
        assert!(engine.response().is_empty());

        let second = engine.round_trip(&ezo("R"), &EZO_PROFILE, 4).unwrap();
        assert_eq!(second, ResponseOutcome::Timeout);
        assert!(engine.response().is_empty());
    }

    #[test]
    fn test_previous_reply_cleared_before_next_send() {
        let mut mock_if = MockInterface::new();
        mock_if.stage_chunk(b"7.00\r*OK\r");
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        assert_eq!(engine.round_trip(&ezo("R"), &EZO_PROFILE, 5).unwrap(), ResponseOutcome::Success);
        assert!(engine.response().contains(b"7.00"));

        // Nothing staged: the earlier *OK must not satisfy this one.
        assert_eq!(engine.round_trip(&ezo("R"), &EZO_PROFILE, 5).unwrap(), ResponseOutcome::Timeout);
    }

    #[test]
    fn test_reply_split_across_reads() {
        let mut mock_if = MockInterface::new();
        mock_if.stage_chunk(b"\r\n+CSQ: 1");
        mock_if.stage_empty(1);
        mock_if.stage_chunk(b"8,99\r\n\r\nO");
        mock_if.stage_chunk(b"K\r\n");
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        let frame = CommandFrame::new("AT+CSQ", &AT_PROFILE).unwrap();
        assert_eq!(engine.round_trip(&frame, &AT_PROFILE, 10).unwrap(), ResponseOutcome::Success);
        assert_eq!(engine.interface().read_calls, 4);
        assert_eq!(AT_PROFILE.payload(engine.response(), &frame), Some("+CSQ: 18,99"));
    }

    #[test]
    fn test_device_error_and_status_outcomes() {
        let mut mock_if = MockInterface::new();
        mock_if.stage_chunk(b"\r*ER\r");
        mock_if.stage_chunk(b"\r*SL\r");
        mock_if.stage_chunk(b"\r\nERROR\r\n");
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        assert_eq!(engine.round_trip(&ezo("Cal,bogus"), &EZO_PROFILE, 5).unwrap(), ResponseOutcome::DeviceError);
        assert!(engine.response().contains(b"*ER"));
        assert_eq!(
            engine.round_trip(&ezo("Sleep"), &EZO_PROFILE, 5).unwrap(),
            ResponseOutcome::Status(DeviceStatus::Sleep)
        );
        let at = CommandFrame::new("AT+FOO", &AT_PROFILE).unwrap();
        assert!(matches!(engine.execute(&at, &AT_PROFILE, 5), Err(CmdError::DeviceError)));
    }

    #[test]
    fn test_long_reply_keeps_tail() {
        let mut mock_if = MockInterface::new();
        mock_if.stage_chunk(b"?I,pH,2.16\r?STATUS,P,5.038\r");
        mock_if.stage_chunk(b"*OK\r");
        let mut engine: CommandEngine<_, 8> = CommandEngine::new(mock_if);

        assert_eq!(engine.round_trip(&ezo("i"), &EZO_PROFILE, 5).unwrap(), ResponseOutcome::Success);
        assert_eq!(engine.response().len(), 8);
        assert_eq!(engine.response().as_bytes(), b"038\r*OK\r");
    }

    #[test]
    fn test_query_returns_payload() {
        let mut mock_if = MockInterface::new();
        mock_if.stage_chunk(b"?STATUS,P,3.74\r*OK\r");
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        assert_eq!(engine.query(&ezo("Status"), &EZO_PROFILE, 5).unwrap(), "?STATUS,P,3.74");
    }

    #[test]
    fn test_query_without_payload_is_invalid_format() {
        let mut mock_if = MockInterface::new();
        mock_if.stage_chunk(b"*OK\r");
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        assert!(matches!(engine.query(&ezo("R"), &EZO_PROFILE, 5), Err(CmdError::InvalidFormat)));
    }

    #[test]
    fn test_read_error_propagates_and_clears() {
        let mut mock_if = MockInterface::new();
        mock_if.fail_reads = true;
        let mut engine: CommandEngine<_> = CommandEngine::new(mock_if);

        let result = engine.round_trip(&ezo("R"), &EZO_PROFILE, 5);
        assert!(matches!(result, Err(CmdError::Io(MockCommError))));
        assert!(engine.response().is_empty());
        assert_eq!(engine.interface().read_calls, 1);
    }

    #[test]
    fn test_release_returns_interface() {
        let mut engine: CommandEngine<_> = CommandEngine::new(MockInterface::new());
        let _ = engine.round_trip(&ezo("Find"), &EZO_PROFILE, 1);
        let mock_if = engine.release();
        assert_eq!(mock_if.written(), b"Find");
    }
}
