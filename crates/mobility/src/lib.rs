//! Vehicle Mobility
//!
//! Turns guidance targets into steering and throttle pulse widths. Throttle
//! changes are ramped toward neutral, and reverse is entered only through a
//! neutral dwell. Pulses are timed by hardware compare interrupts.

mod config;
mod drive;
mod pulse;

pub use config::{MobilityConfig, MobilityError, SpeedTable};
pub use drive::{DriveController, DriveState, SpeedClass, ThrottleCommand};
pub use pulse::{Channel, MockPulseHardware, PulseGenerator, PulseHardware};
