// src/common/timing.rs

// Nominal values used to pace the polling loops. Round-trip budgets are
// expressed in poll iterations, so the wall-clock timeout of an exchange is
// roughly `budget * POLL_INTERVAL`.

use core::time::Duration;

// === Polling ===

/// Pause between two polls of the transport while a reply is pending.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);
/// How many times a refused write is retried before giving up.
pub const WRITE_RETRIES: u32 = 100;
/// Bytes pulled from the transport per poll iteration.
pub const READ_CHUNK: usize = 32;

// === EZO probe modules ===

/// A single `R` reading takes up to ~900 ms on the slower EZO circuits.
pub const EZO_READ_TIME: Duration = Duration::from_millis(900);
/// Non-reading commands (`Cal`, `Status`, `i`, ...) answer within ~300 ms.
pub const EZO_COMMAND_TIME: Duration = Duration::from_millis(300);
/// Iteration budget for a reading round trip at the default poll interval.
pub const EZO_READ_BUDGET: u32 = budget_for(EZO_READ_TIME, POLL_INTERVAL) + 100;
/// Iteration budget for any other EZO command.
pub const EZO_COMMAND_BUDGET: u32 = budget_for(EZO_COMMAND_TIME, POLL_INTERVAL) + 100;
/// Consecutive identical readings required before a calibration value is committed.
pub const EZO_STABLE_READINGS: u8 = 5;
/// Gap between stabilization samples.
pub const EZO_SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);

// === AT-command modems ===

/// Most AT commands answer well inside one second.
pub const AT_RESPONSE_TIME: Duration = Duration::from_millis(1000);
/// Iteration budget for a typical AT command at the default poll interval.
pub const AT_COMMAND_BUDGET: u32 = budget_for(AT_RESPONSE_TIME, POLL_INTERVAL);

/// Converts a wall-clock allowance into a poll-iteration budget.
pub const fn budget_for(allowance: Duration, interval: Duration) -> u32 {
    let interval_us = interval.as_micros();
    if interval_us == 0 {
        return u32::MAX;
    }
    let iterations = allowance.as_micros() / interval_us;
    if iterations > u32::MAX as u128 {
        u32::MAX
    } else {
        iterations as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_for() {
        assert_eq!(budget_for(Duration::from_millis(900), Duration::from_millis(1)), 900);
        assert_eq!(budget_for(Duration::from_millis(5), Duration::from_millis(2)), 2);
        assert_eq!(budget_for(Duration::from_millis(5), Duration::ZERO), u32::MAX);
        assert_eq!(EZO_READ_BUDGET, 1000);
        assert_eq!(AT_COMMAND_BUDGET, 1000);
    }
}
