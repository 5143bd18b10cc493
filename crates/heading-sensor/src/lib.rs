//! Magnetic Heading Sensor Driver
//!
//! Reads a tilt-compensated compass module's 16-bit heading register over
//! a two-wire bus. The transfer advances one bus operation per
//! bus-completion interrupt; the main loop only polls for the result.

mod bus;
mod driver;
mod error;
mod mock;

pub use bus::{BusStatus, TwoWireBus};
pub use driver::{HeadingPoll, HeadingSensor, HeadingSensorConfig, TransferState};
pub use error::SensorError;
pub use mock::MockCompassBus;

/// Reading recorded when a transfer aborts
pub const ERROR_READING: u16 = 0xEEEE;

/// Reading held while a transfer is in flight
pub const PENDING_READING: u16 = 0xFFFF;
