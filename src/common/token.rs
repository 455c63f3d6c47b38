// src/common/token.rs

//! Terminal tokens and the classifier that turns a response buffer into an outcome.

use super::{buffer::ResponseBuffer, error::CmdError, frame::CommandFrame};

/// Non-success, non-error terminal states a module can report.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceStatus {
    /// `*OV` - supply voltage above the operating range.
    OverVoltage,
    /// `*UV` - supply voltage below the operating range.
    UnderVoltage,
    /// `*RS` - the circuit reset.
    Reset,
    /// `*RE` - boot finished, ready for commands.
    Ready,
    /// `*SL` - entering sleep.
    Sleep,
    /// `*WA` - woke up from sleep.
    Wake,
}

/// Final classification of one command exchange.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResponseOutcome {
    Success,
    DeviceError,
    Timeout,
    Status(DeviceStatus),
}

impl ResponseOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseOutcome::Success)
    }

    /// Maps everything but `Success` onto the matching [`CmdError`].
    pub fn into_result<E: core::fmt::Debug>(self) -> Result<(), CmdError<E>> {
        match self {
            ResponseOutcome::Success => Ok(()),
            ResponseOutcome::DeviceError => Err(CmdError::DeviceError),
            ResponseOutcome::Timeout => Err(CmdError::Timeout),
            ResponseOutcome::Status(status) => Err(CmdError::UnexpectedStatus(status)),
        }
    }
}

/// Result of scanning the buffer once.
///
/// `Pending` only exists inside the polling loop, a round trip always resolves
/// it to a [`ResponseOutcome`] before returning.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Classification {
    Pending,
    Terminal(ResponseOutcome),
}

/// A byte pattern that ends an exchange, and what it means.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TerminalToken {
    pub pattern: &'static [u8],
    pub outcome: ResponseOutcome,
}

impl TerminalToken {
    pub const fn new(pattern: &'static [u8], outcome: ResponseOutcome) -> Self {
        TerminalToken { pattern, outcome }
    }
}

/// Framing and token set of one protocol family.
///
/// `tokens` are checked in order and the first one found wins, so error tokens
/// belong in front of the success token.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProtocolProfile {
    pub name: &'static str,
    /// Joins a command body to its parameter.
    pub separator: u8,
    /// Appended to every frame; may be empty.
    pub terminator: &'static [u8],
    pub tokens: &'static [TerminalToken],
}

/// Hayes-style modems: `OK` / `ERROR`, parameters after `=`, commands sent verbatim.
pub const AT_PROFILE: ProtocolProfile = ProtocolProfile {
    name: "AT",
    separator: b'=',
    terminator: b"",
    tokens: &[
        TerminalToken::new(b"ERROR", ResponseOutcome::DeviceError),
        TerminalToken::new(b"OK", ResponseOutcome::Success),
    ],
};

/// Atlas Scientific EZO circuits in UART mode with response codes enabled.
pub const EZO_PROFILE: ProtocolProfile = ProtocolProfile {
    name: "EZO",
    separator: b',',
    terminator: b"",
    tokens: &[
        TerminalToken::new(b"*ER", ResponseOutcome::DeviceError),
        TerminalToken::new(b"*OV", ResponseOutcome::Status(DeviceStatus::OverVoltage)),
        TerminalToken::new(b"*UV", ResponseOutcome::Status(DeviceStatus::UnderVoltage)),
        TerminalToken::new(b"*RS", ResponseOutcome::Status(DeviceStatus::Reset)),
        TerminalToken::new(b"*RE", ResponseOutcome::Status(DeviceStatus::Ready)),
        TerminalToken::new(b"*SL", ResponseOutcome::Status(DeviceStatus::Sleep)),
        TerminalToken::new(b"*WA", ResponseOutcome::Status(DeviceStatus::Wake)),
        TerminalToken::new(b"*OK", ResponseOutcome::Success),
    ],
};

impl ProtocolProfile {
    /// Classifies the current buffer content. Case-sensitive, whole tokens only.
    pub fn classify<const C: usize>(&self, buffer: &ResponseBuffer<C>) -> Classification {
        self.classify_from(buffer, 0)
    }

    /// Classifies the reply to `sent`, ignoring the module echoing the command
    /// back at the start of the buffer. An echo still arriving classifies as
    /// `Pending`.
    pub fn classify_reply<const C: usize>(
        &self,
        buffer: &ResponseBuffer<C>,
        sent: &CommandFrame,
    ) -> Classification {
        self.classify_from(buffer, echo_len(buffer.as_bytes(), sent.text().as_bytes()))
    }

    fn classify_from<const C: usize>(&self, buffer: &ResponseBuffer<C>, start: usize) -> Classification {
        self.tokens
            .iter()
            .find(|token| buffer.contains_from(start, token.pattern))
            .map_or(Classification::Pending, |token| {
                Classification::Terminal(token.outcome)
            })
    }

    /// Whether `line` is exactly one of this profile's tokens.
    pub fn is_token_line(&self, line: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| token.pattern == line.as_bytes())
    }

    /// The first reply line that is neither a terminal token nor the module
    /// echoing `sent` back.
    pub fn payload<'a, const C: usize>(
        &self,
        buffer: &'a ResponseBuffer<C>,
        sent: &CommandFrame,
    ) -> Option<&'a str> {
        buffer
            .lines()
            .find(|line| !self.is_token_line(line) && *line != sent.text())
    }
}

// Bytes at the start of `received` taken up by line breaks and an echo of
// `echo`, complete or partial.
fn echo_len(received: &[u8], echo: &[u8]) -> usize {
    let lead = received
        .iter()
        .take_while(|b| **b == b'\r' || **b == b'\n')
        .count();
    let rest = &received[lead..];
    if echo.is_empty() {
        lead
    } else if rest.starts_with(echo) {
        lead + echo.len()
    } else if echo.starts_with(rest) {
        received.len()
    } else {
        lead
    }
}
