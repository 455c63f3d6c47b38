// src/devices/ezo.rs

//! Atlas Scientific EZO probe circuits (pH, ORP, DO, EC, RTD, ...) in UART mode.
//!
//! Only the command/response plumbing common to the whole family lives here.
//! Response codes (`*OK`, `*ER`, ...) must be enabled on the circuit, which is
//! the factory default; see [`EzoProbe::set_response_codes`].

use crate::common::{
    error::{CmdError, FrameError},
    frame::CommandFrame,
    hal_traits::{CmdSerial, CmdTimer},
    timing,
    token::{DeviceStatus, ResponseOutcome, EZO_PROFILE},
    EngineConfig,
};
use crate::engine::{
    CalibrationReport, CommandEngine, Reading, StabilizationSampler, DEFAULT_BUFFER_LEN,
};
use core::fmt::{self, Debug};

/// How many stabilization samples a calibration may take before giving up.
pub const DEFAULT_CALIBRATION_ATTEMPTS: u32 = 60;

/// A calibration command.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CalPoint {
    /// `Cal,dry` (conductivity, dissolved oxygen).
    Dry,
    /// `Cal,<n>` single-point calibration (conductivity, ORP, RTD).
    Single(f32),
    /// `Cal,low,<n>`
    Low(f32),
    /// `Cal,mid,<n>`
    Mid(f32),
    /// `Cal,high,<n>`
    High(f32),
}

impl CalPoint {
    pub fn frame(&self) -> Result<CommandFrame, FrameError> {
        match *self {
            CalPoint::Dry => CommandFrame::new("Cal,dry", &EZO_PROFILE),
            CalPoint::Single(v) => CommandFrame::with_display_param("Cal", v, &EZO_PROFILE),
            CalPoint::Low(v) => CommandFrame::with_display_param("Cal,low", TwoDecimals(v), &EZO_PROFILE),
            CalPoint::Mid(v) => CommandFrame::with_display_param("Cal,mid", TwoDecimals(v), &EZO_PROFILE),
            CalPoint::High(v) => {
                CommandFrame::with_display_param("Cal,high", TwoDecimals(v), &EZO_PROFILE)
            }
        }
    }
}

// pH buffer values go out as `7.00`, not `7`.
struct TwoDecimals(f32);

impl fmt::Display for TwoDecimals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Why the circuit last restarted, from the `Status` reply.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RestartReason {
    PoweredOff,
    SoftwareReset,
    BrownOut,
    Watchdog,
    Unknown,
}

impl RestartReason {
    fn from_code(code: &str) -> Self {
        match code {
            "P" => RestartReason::PoweredOff,
            "S" => RestartReason::SoftwareReset,
            "B" => RestartReason::BrownOut,
            "W" => RestartReason::Watchdog,
            _ => RestartReason::Unknown,
        }
    }
}

/// Parsed `?STATUS,<reason>,<voltage>` reply.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EzoStatus {
    pub restart_reason: RestartReason,
    pub supply_voltage: f32,
}

impl EzoStatus {
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.strip_prefix("?STATUS,")?.split(',');
        let restart_reason = RestartReason::from_code(fields.next()?.trim());
        let supply_voltage = fields.next()?.trim().parse().ok()?;
        Some(EzoStatus {
            restart_reason,
            supply_voltage,
        })
    }
}

pub struct EzoProbe<IF, const C: usize = DEFAULT_BUFFER_LEN>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    engine: CommandEngine<IF, C>,
    stable_readings: u8,
    calibration_attempts: u32,
}

impl<IF, const C: usize> EzoProbe<IF, C>
where
    IF: CmdSerial + CmdTimer,
    IF::Error: Debug,
{
    pub fn new(interface: IF) -> Self {
        Self::from_engine(CommandEngine::with_config(interface, EngineConfig::ezo()))
    }

    pub fn from_engine(engine: CommandEngine<IF, C>) -> Self {
        EzoProbe {
            engine,
            stable_readings: timing::EZO_STABLE_READINGS,
            calibration_attempts: DEFAULT_CALIBRATION_ATTEMPTS,
        }
    }

    /// Overrides how many identical readings a calibration waits for, and how
    /// many samples it may take.
    pub fn with_stabilization(mut self, stable_readings: u8, attempts: u32) -> Self {
        self.stable_readings = stable_readings;
        self.calibration_attempts = attempts;
        self
    }

    /// One `R` reading, as text (multi-parameter circuits return comma-separated values).
    pub fn read_raw(&mut self) -> Result<Reading, CmdError<IF::Error>> {
        let frame = Self::frame("R")?;
        let text = self
            .engine
            .query(&frame, &EZO_PROFILE, timing::EZO_READ_BUDGET)?;
        Reading::from(text).map_err(|_| CmdError::InvalidFormat)
    }

    /// One `R` reading; the first value for multi-parameter circuits.
    pub fn read(&mut self) -> Result<f32, CmdError<IF::Error>> {
        let raw = self.read_raw()?;
        parse_first_value(raw.as_str()).ok_or(CmdError::InvalidFormat)
    }

    /// Waits for the reading to settle, then commits `point`.
    pub fn calibrate(&mut self, point: CalPoint) -> Result<CalibrationReport, CmdError<IF::Error>> {
        let read = Self::frame("R")?;
        let commit = point.frame().map_err(Self::widen)?;
        let mut sampler = StabilizationSampler::matching(self.stable_readings);
        self.engine.calibrate(
            &read,
            &commit,
            &EZO_PROFILE,
            timing::EZO_READ_BUDGET,
            &mut sampler,
            self.calibration_attempts,
        )
    }

    /// `Cal,clear`
    pub fn clear_calibration(&mut self) -> Result<(), CmdError<IF::Error>> {
        let frame = Self::frame("Cal,clear")?;
        self.engine
            .execute(&frame, &EZO_PROFILE, timing::EZO_COMMAND_BUDGET)
    }

    /// Number of stored calibration points, from `Cal,?` → `?CAL,<n>`.
    pub fn calibration_count(&mut self) -> Result<u8, CmdError<IF::Error>> {
        let frame = Self::frame("Cal,?")?;
        let line = self
            .engine
            .query(&frame, &EZO_PROFILE, timing::EZO_COMMAND_BUDGET)?;
        line.strip_prefix("?CAL,")
            .and_then(|n| n.trim().parse().ok())
            .ok_or(CmdError::InvalidFormat)
    }

    /// `Status` → restart reason and supply voltage.
    pub fn status(&mut self) -> Result<EzoStatus, CmdError<IF::Error>> {
        let frame = Self::frame("Status")?;
        let line = self
            .engine
            .query(&frame, &EZO_PROFILE, timing::EZO_COMMAND_BUDGET)?;
        EzoStatus::parse(line).ok_or(CmdError::InvalidFormat)
    }

    /// `Find` - blinks the LED.
    pub fn find(&mut self) -> Result<(), CmdError<IF::Error>> {
        let frame = Self::frame("Find")?;
        self.engine
            .execute(&frame, &EZO_PROFILE, timing::EZO_COMMAND_BUDGET)
    }

    /// `Sleep`. The circuit answers `*SL` rather than `*OK`.
    pub fn sleep(&mut self) -> Result<(), CmdError<IF::Error>> {
        let frame = Self::frame("Sleep")?;
        match self
            .engine
            .round_trip(&frame, &EZO_PROFILE, timing::EZO_COMMAND_BUDGET)?
        {
            ResponseOutcome::Success | ResponseOutcome::Status(DeviceStatus::Sleep) => Ok(()),
            other => other.into_result(),
        }
    }

    /// `*OK,1` / `*OK,0`. With codes disabled every later command would time
    /// out, so this is mostly useful for turning them back on.
    pub fn set_response_codes(&mut self, enabled: bool) -> Result<(), CmdError<IF::Error>> {
        let frame = CommandFrame::with_param("*OK", if enabled { "1" } else { "0" }, &EZO_PROFILE)
            .map_err(Self::widen)?;
        self.engine
            .execute(&frame, &EZO_PROFILE, timing::EZO_COMMAND_BUDGET)
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

    fn frame(body: &str) -> Result<CommandFrame, CmdError<IF::Error>> {
        CommandFrame::new(body, &EZO_PROFILE).map_err(Self::widen)
    }

    fn widen(e: FrameError) -> CmdError<IF::Error> {
        e.widen()
    }
}

fn parse_first_value(raw: &str) -> Option<f32> {
    raw.split(',').next()?.trim().parse().ok()
}
