// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod timing;
pub mod token;

#[cfg(test)]
pub(crate) mod mock;

// --- Re-export key types/traits/functions for easier access ---

// From buffer.rs
pub use buffer::ResponseBuffer;

// From config.rs
pub use config::EngineConfig;

// From error.rs
pub use error::{CmdError, FrameError};

// From frame.rs
pub use frame::{CommandFrame, MAX_FRAME_LEN};

// From hal_traits.rs
pub use hal_traits::{CmdSerial, CmdTimer}; // Core sync traits

// From token.rs
pub use token::{
    Classification, DeviceStatus, ProtocolProfile, ResponseOutcome, TerminalToken, AT_PROFILE,
    EZO_PROFILE,
};

// --- Feature-gated re-exports ---

// Async traits (from hal_traits.rs)
#[cfg(feature = "async")]
pub use hal_traits::CmdSerialAsync;

// embedded-hal integration (from hal_traits.rs)
#[cfg(feature = "impl-generic-hal")]
pub use hal_traits::HalInterface;
