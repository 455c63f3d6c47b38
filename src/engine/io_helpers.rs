// src/engine/io_helpers.rs

use super::CommandEngine;
use crate::common::{
    error::CmdError,
    frame::CommandFrame,
    hal_traits::{CmdSerial, CmdTimer},
    timing,
};
use core::fmt::Debug;

// Implementation block for I/O related helpers
impl<IF, const C: usize> CommandEngine<IF, C>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    /// Writes the whole frame and flushes it.
    ///
    /// `WouldBlock` (or a zero-length accept) is retried after one poll
    /// interval, at most `write_retries` times over the whole frame.
    pub(super) fn write_frame(&mut self, frame: &CommandFrame) -> Result<(), CmdError<IF::Error>> {
        let mut remaining = frame.as_bytes();
        let mut stalls = 0u32;

        while !remaining.is_empty() {
            match self.interface.write(remaining) {
                Ok(n) if n > 0 => remaining = &remaining[n.min(remaining.len())..],
                Ok(_) | Err(nb::Error::WouldBlock) => self.stall(&mut stalls)?,
                Err(nb::Error::Other(e)) => return Err(CmdError::Io(e)),
            }
        }

        loop {
            match self.interface.flush() {
                Ok(()) => break,
                Err(nb::Error::WouldBlock) => self.stall(&mut stalls)?,
                Err(nb::Error::Other(e)) => return Err(CmdError::Io(e)),
            }
        }

        trace!("sent `{}` ({} bytes)", frame.text(), frame.len());
        Ok(())
    }

    fn stall(&mut self, stalls: &mut u32) -> Result<(), CmdError<IF::Error>> {
        *stalls += 1;
        if *stalls > self.config.write_retries {
            warn!("transport refused the frame {} times", *stalls);
            return Err(CmdError::WriteStalled);
        }
        self.interface.delay_us(self.config.poll_interval_us);
        Ok(())
    }

    /// One non-blocking read into the response buffer. Returns the byte count.
    pub(super) fn poll_once(&mut self) -> Result<usize, CmdError<IF::Error>> {
        let mut chunk = [0u8; timing::READ_CHUNK];
        match self.interface.read(&mut chunk) {
            Ok(n) => {
                let n = n.min(chunk.len());
                self.buffer.append(&chunk[..n]);
                if n > 0 {
                    trace!("rx {} bytes, buffer {:?}", n, self.buffer);
                }
                Ok(n)
            }
            Err(nb::Error::WouldBlock) => Ok(0),
            Err(nb::Error::Other(e)) => Err(CmdError::Io(e)),
        }
    }
}
