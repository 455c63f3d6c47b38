// src/common/hal_traits.rs

use core::fmt::Debug;

/// Abstraction for the delays the polling loops need.
///
/// With the `impl-generic-hal` feature, [`HalInterface`] provides this on top of
/// `embedded_hal::delay::DelayNs`.
pub trait CmdTimer {
    /// Delay for at least the specified number of microseconds.
    fn delay_us(&mut self, us: u32);

    /// Delay for at least the specified number of milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Abstraction for non-blocking byte transport to a text-protocol module.
pub trait CmdSerial {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Reads whatever is available, up to `buf.len()` bytes.
    ///
    /// Returns `Ok(n)` with the number of bytes placed in `buf` (possibly 0), or
    /// `Err(nb::Error::WouldBlock)` if nothing is available yet. Both mean
    /// "try again later" to the engine.
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Queues as many of `bytes` as the transmitter accepts.
    ///
    /// Returns `Ok(n)` with the number of bytes accepted, or
    /// `Err(nb::Error::WouldBlock)` if the transmit buffer is full.
    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, Self::Error>;

    /// Attempts to flush the transmit buffer, ensuring all written bytes have been sent.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}

/// Abstraction for asynchronous byte transport (requires 'async' feature).
#[cfg(feature = "async")]
#[allow(async_fn_in_trait)]
pub trait CmdSerialAsync {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Reads whatever is available, up to `buf.len()` bytes. May return 0.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Writes a prefix of `bytes` and returns how many were accepted.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Asynchronously flushes the transmit buffer.
    async fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Pairs a [`CmdSerial`] transport with an embedded-hal delay provider so the
/// two can be handed to an engine as one interface.
#[cfg(feature = "impl-generic-hal")]
#[derive(Debug)]
pub struct HalInterface<S, D> {
    pub serial: S,
    pub delay: D,
}

#[cfg(feature = "impl-generic-hal")]
impl<S, D> HalInterface<S, D> {
    pub fn new(serial: S, delay: D) -> Self {
        HalInterface { serial, delay }
    }

    pub fn release(self) -> (S, D) {
        (self.serial, self.delay)
    }
}

#[cfg(feature = "impl-generic-hal")]
impl<S, D> CmdTimer for HalInterface<S, D>
where
    D: embedded_hal::delay::DelayNs,
{
    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

#[cfg(feature = "impl-generic-hal")]
impl<S, D> CmdSerial for HalInterface<S, D>
where
    S: CmdSerial,
{
    type Error = S::Error;

    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        self.serial.read(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, Self::Error> {
        self.serial.write(bytes)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.serial.flush()
    }
}

#[cfg(all(test, feature = "impl-generic-hal"))]
mod tests {
    use super::*;
    use crate::common::mock::MockInterface;

    struct CountingDelay {
        total_ns: u64,
    }

    impl embedded_hal::delay::DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    #[test]
    fn test_hal_interface_forwards() {
        let mut mock = MockInterface::new();
        mock.stage_chunk(b"OK");
        let mut iface = HalInterface::new(mock, CountingDelay { total_ns: 0 });

        iface.delay_ms(2);
        iface.delay_us(5);
        assert_eq!(iface.delay.total_ns, 2_005_000);

        let mut buf = [0u8; 4];
        assert_eq!(iface.read(&mut buf), Ok(2));
        assert_eq!(&buf[..2], b"OK");
        assert_eq!(iface.write(b"AT"), Ok(2));

        let (serial, _delay) = iface.release();
        assert_eq!(serial.written(), b"AT");
    }
}
