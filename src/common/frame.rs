// src/common/frame.rs

use arrayvec::{ArrayString, ArrayVec};
use core::fmt::{self, Write};
use core::str;

use super::{
    error::{CmdError, FrameError},
    token::ProtocolProfile,
};

/// Longest frame (body, separator, parameter and terminator) we will send.
/// Long enough for an `AT+CGDCONT` line with a realistic APN.
pub const MAX_FRAME_LEN: usize = 128;

/// A fully formatted command, ready to be written to the transport.
///
/// Built once through a [`ProtocolProfile`] and never modified afterwards. The
/// `Display` implementation prints the command text without the terminator.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: ArrayVec<u8, MAX_FRAME_LEN>,
    text_len: usize,
}

impl CommandFrame {
    /// A bare command, e.g. `Status` or `AT`.
    pub fn new(body: &str, profile: &ProtocolProfile) -> Result<Self, FrameError> {
        Self::build(body, None, profile)
    }

    /// A command with one parameter joined by the profile's separator,
    /// e.g. `Cal,80` or `AT+CGDCONT=1,"IP","apn"`.
    pub fn with_param(
        body: &str,
        param: &str,
        profile: &ProtocolProfile,
    ) -> Result<Self, FrameError> {
        Self::build(body, Some(param), profile)
    }

    /// Like [`with_param`](Self::with_param) but formats any `Display` value,
    /// e.g. a calibration point `7.00`.
    pub fn with_display_param<T: fmt::Display>(
        body: &str,
        param: T,
        profile: &ProtocolProfile,
    ) -> Result<Self, FrameError> {
        let mut rendered = ArrayString::<MAX_FRAME_LEN>::new();
        if write!(rendered, "{}", param).is_err() {
            return Err(CmdError::FrameOverflow {
                needed: body.len() + 1 + rendered_len(&param) + profile.terminator.len(),
                got: MAX_FRAME_LEN,
            });
        }
        Self::build(body, Some(rendered.as_str()), profile)
    }

    fn build(
        body: &str,
        param: Option<&str>,
        profile: &ProtocolProfile,
    ) -> Result<Self, FrameError> {
        check_printable(body.as_bytes())?;
        if let Some(p) = param {
            check_printable(p.as_bytes())?;
        }

        let text_len = body.len() + param.map_or(0, |p| 1 + p.len());
        let needed = text_len + profile.terminator.len();
        if needed > MAX_FRAME_LEN {
            return Err(CmdError::FrameOverflow {
                needed,
                got: MAX_FRAME_LEN,
            });
        }

        let mut bytes = ArrayVec::new();
        // Length checked above, none of these can fail.
        let _ = bytes.try_extend_from_slice(body.as_bytes());
        if let Some(p) = param {
            bytes.push(profile.separator);
            let _ = bytes.try_extend_from_slice(p.as_bytes());
        }
        let _ = bytes.try_extend_from_slice(profile.terminator);

        Ok(CommandFrame { bytes, text_len })
    }

    /// Everything that goes on the wire, terminator included.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The command text without the terminator.
    pub fn text(&self) -> &str {
        // Only printable ASCII gets in, see `check_printable`.
        str::from_utf8(&self.bytes[..self.text_len]).unwrap_or("")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Length of `value` once formatted.
fn rendered_len<T: fmt::Display>(value: &T) -> usize {
    struct Counter(usize);

    impl Write for Counter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 += s.len();
            Ok(())
        }
    }

    let mut counter = Counter(0);
    let _ = write!(counter, "{}", value);
    counter.0
}

fn check_printable(bytes: &[u8]) -> Result<(), FrameError> {
    match bytes.iter().find(|b| !(0x20..=0x7e).contains(*b)) {
        Some(bad) => Err(CmdError::InvalidCharacter(*bad)),
        None => Ok(()),
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame({:?})", self.text())
    }
}
