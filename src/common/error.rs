// src/common/error.rs

use super::token::DeviceStatus;
use core::convert::Infallible;

#[derive(Debug, thiserror::Error)]
pub enum CmdError<E = ()>
where
    E: core::fmt::Debug, // Still need Debug for the generic Io error
{
    /// Underlying I/O error from the transport implementation.
    #[error("I/O error: {0:?}")] // Format string requires Debug on E
    Io(E),

    /// No terminal token arrived within the polling budget.
    #[error("Operation timed out")]
    Timeout,

    /// The module answered with its error token.
    #[error("Device reported an error")]
    DeviceError,

    /// The module answered with a status token where a success was expected.
    #[error("Unexpected device status: {0:?}")]
    UnexpectedStatus(DeviceStatus),

    /// Non-printable byte in a command body or parameter.
    #[error("Invalid character in command: {0:#04x}")]
    InvalidCharacter(u8),

    /// Command frame does not fit the frame buffer.
    #[error("Frame overflow: needed {needed}, got {got}")]
    FrameOverflow { needed: usize, got: usize },

    /// The transport kept refusing the command bytes.
    #[error("Transport did not accept the command")]
    WriteStalled,

    /// Readings never settled within the caller's attempt cap.
    #[error("Readings did not converge after {attempts} attempts")]
    NotConverged { attempts: u32 },

    /// Reply payload was missing or could not be parsed.
    #[error("Invalid response format")]
    InvalidFormat,
}

/// Errors from building commands, before any transport is involved.
pub type FrameError = CmdError<Infallible>;

impl FrameError {
    /// Re-types an I/O-free error so it can flow through a driver's `Result`.
    pub fn widen<E: core::fmt::Debug>(self) -> CmdError<E> {
        match self {
            CmdError::Io(never) => match never {},
            CmdError::Timeout => CmdError::Timeout,
            CmdError::DeviceError => CmdError::DeviceError,
            CmdError::UnexpectedStatus(s) => CmdError::UnexpectedStatus(s),
            CmdError::InvalidCharacter(c) => CmdError::InvalidCharacter(c),
            CmdError::FrameOverflow { needed, got } => CmdError::FrameOverflow { needed, got },
            CmdError::WriteStalled => CmdError::WriteStalled,
            CmdError::NotConverged { attempts } => CmdError::NotConverged { attempts },
            CmdError::InvalidFormat => CmdError::InvalidFormat,
        }
    }
}

// No manual Display impl needed - thiserror handles it.
