//! Block Storage Logger
//!
//! Brings an SD card up in SPI mode without any card library, reads its
//! capacity, finds where the previous runs stopped writing, and appends one
//! telemetry record per block. Any protocol fault latches the logger off
//! for the rest of the run; nothing else in the vehicle is affected.

mod bus;
mod logger;
mod mock;
mod protocol;

pub use bus::{ClockRate, SpiBus};
pub use logger::{BlockLogger, StorageConfig, StorageCursor};
pub use mock::MockCard;
pub use protocol::{capacity_blocks, SdCommand};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("No response to {0:?}")]
    NoResponse(SdCommand),

    #[error("Unexpected response {response:#04x} to {command:?}")]
    UnexpectedResponse { command: SdCommand, response: u8 },

    #[error("Interface condition echo {0:02x?} does not match the 0x1AA check pattern")]
    InterfaceEcho([u8; 4]),

    #[error("Card still idle after {0} operating-condition requests")]
    NotReady(u16),

    #[error("Card is not block addressed (OCR {0:#010x})")]
    NotBlockAddressed(u32),

    #[error("No data token after {0:?}")]
    NoDataToken(SdCommand),

    #[error("Card reports zero capacity")]
    ZeroCapacity,

    #[error("Block {block} rejected with data response {response:#04x}")]
    DataRejected { block: u32, response: u8 },

    #[error("Card still busy after {0} polls")]
    Busy(u32),

    #[error("Storage is disabled")]
    Disabled,

    #[error("Card is full at {0} blocks")]
    Full(u32),
}
