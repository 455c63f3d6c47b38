// src/devices/at_modem.rs

//! Hayes-style AT command modems (cellular and Bluetooth modules).

use crate::common::{
    error::{CmdError, FrameError},
    frame::{CommandFrame, MAX_FRAME_LEN},
    hal_traits::{CmdSerial, CmdTimer},
    timing,
    token::{ResponseOutcome, AT_PROFILE},
    EngineConfig,
};
use crate::engine::{CommandEngine, DEFAULT_BUFFER_LEN};
use arrayvec::ArrayString;
use core::fmt::{Debug, Write};

const SET_APN: &str = "AT+CGDCONT";

/// `+CSQ: <rssi>,<ber>` as reported by the module.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SignalQuality {
    /// 0..=31, or 99 when unknown.
    pub rssi: u8,
    /// 0..=7, or 99 when unknown.
    pub ber: u8,
}

impl SignalQuality {
    pub fn parse(line: &str) -> Option<Self> {
        let (rssi, ber) = line.strip_prefix("+CSQ:")?.split_once(',')?;
        Some(SignalQuality {
            rssi: rssi.trim().parse().ok()?,
            ber: ber.trim().parse().ok()?,
        })
    }

    /// Received signal strength in dBm (27.007 mapping), `None` when unknown.
    pub fn dbm(&self) -> Option<i16> {
        match self.rssi {
            0..=31 => Some(-113 + 2 * self.rssi as i16),
            _ => None,
        }
    }
}

pub struct AtModem<IF, const C: usize = DEFAULT_BUFFER_LEN>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    engine: CommandEngine<IF, C>,
    budget: u32,
}

impl<IF, const C: usize> AtModem<IF, C>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    pub fn new(interface: IF) -> Self {
        Self::from_engine(CommandEngine::with_config(interface, EngineConfig::at_modem()))
    }

    pub fn from_engine(engine: CommandEngine<IF, C>) -> Self {
        AtModem {
            engine,
            budget: timing::AT_COMMAND_BUDGET,
        }
    }

    /// Poll budget used for every command sent through this modem.
    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Sends `body` (plus `=param` if given) and returns the raw outcome.
    pub fn command(
        &mut self,
        body: &str,
        param: Option<&str>,
    ) -> Result<ResponseOutcome, CmdError<IF::Error>> {
        let frame = match param {
            Some(p) => CommandFrame::with_param(body, p, &AT_PROFILE),
            None => CommandFrame::new(body, &AT_PROFILE),
        }
        .map_err(Self::widen)?;
        self.engine.round_trip(&frame, &AT_PROFILE, self.budget)
    }

    /// `AT`
    pub fn ping(&mut self) -> Result<(), CmdError<IF::Error>> {
        self.command("AT", None)?.into_result()
    }

    /// `ATE0` / `ATE1`
    pub fn set_echo(&mut self, enabled: bool) -> Result<(), CmdError<IF::Error>> {
        self.command(if enabled { "ATE1" } else { "ATE0" }, None)?
            .into_result()
    }

    /// `AT+CGDCONT=1,"IP","<apn>"`
    pub fn set_apn(&mut self, apn: &str) -> Result<(), CmdError<IF::Error>> {
        let mut param = ArrayString::<MAX_FRAME_LEN>::new();
        if write!(param, "1,\"IP\",\"{}\"", apn).is_err() {
            return Err(CmdError::FrameOverflow {
                needed: SET_APN.len() + "=1,\"IP\",\"\"".len() + apn.len(),
                got: MAX_FRAME_LEN,
            });
        }
        self.command(SET_APN, Some(param.as_str()))?
            .into_result()
    }

    /// `AT+CSQ`
    pub fn signal_quality(&mut self) -> Result<SignalQuality, CmdError<IF::Error>> {
        let frame = CommandFrame::new("AT+CSQ", &AT_PROFILE).map_err(Self::widen)?;
        let line = self.engine.query(&frame, &AT_PROFILE, self.budget)?;
        SignalQuality::parse(line).ok_or(CmdError::InvalidFormat)
    }

    pub fn engine(&self) -> &CommandEngine<IF, C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CommandEngine<IF, C> {
        &mut self.engine
    }

    pub fn release(self) -> IF {
        self.engine.release()
    }

    fn widen(e: FrameError) -> CmdError<IF::Error> {
        e.widen()
    }
}
