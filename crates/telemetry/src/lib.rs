//! Shared Vehicle State Record
//!
//! The single record every control-stack component reads from and writes
//! into during a cycle, plus its fixed 512-byte persisted layout. One
//! record is written to one storage block per cycle.

mod block;
mod error;
mod record;

pub use block::{BLOCK_SIZE, GUARD_PREFIX, GUARD_PREFIX_BYTES, GUARD_SUFFIX, PAYLOAD_LEN};
pub use error::RecordError;
pub use record::{
    ActuatorState, CompassState, EncoderState, GpsState, GuidanceState, Pose, RawSentence,
    SharedRecord, UtcDate, UtcTime,
};

/// Number of sentence slots shared between the serial framer and the record
pub const SENTENCE_SLOTS: usize = 4;

/// Capacity of one raw sentence buffer, including the line terminator and NUL
pub const SENTENCE_CAPACITY: usize = 84;

/// Cycle status bits, OR-accumulated during a cycle and cleared at its start.
///
/// Bit positions are part of the persisted format.
pub mod status {
    /// Hardware counter overflowed before the cycle boundary (overrun)
    pub const TIMER_OVERFLOW: u32 = 1 << 0;
    /// Cycle work alone exceeded the period
    pub const MAIN_LOOP_SLOW: u32 = 1 << 1;
    /// Illegal quadrature transition seen
    pub const ENCODER_ERROR: u32 = 1 << 2;
    /// Heading bus transfer aborted
    pub const COMPASS_ERROR: u32 = 1 << 3;
    /// Slot 0 delivered a sentence (slots 1..3 follow)
    pub const GPS_SLOT0_RECEIVED: u32 = 1 << 4;
    pub const GPS_SLOT1_RECEIVED: u32 = 1 << 5;
    pub const GPS_SLOT2_RECEIVED: u32 = 1 << 6;
    pub const GPS_SLOT3_RECEIVED: u32 = 1 << 7;
    /// Byte dropped because every sentence slot was busy
    pub const SERIAL_NO_BUFFER: u32 = 1 << 8;
    /// Sentence longer than a slot
    pub const SERIAL_BUFFER_OVERFLOW: u32 = 1 << 9;
    /// Start marker seen mid-sentence
    pub const SERIAL_UNEXPECTED_START: u32 = 1 << 10;
    /// Checksummed sentence of a type nobody consumes
    pub const SERIAL_UNKNOWN_SENTENCE: u32 = 1 << 11;
    pub const ENCODER_VALID: u32 = 1 << 12;
    pub const GPS_GGA_VALID: u32 = 1 << 13;
    pub const COMPASS_VALID: u32 = 1 << 14;
    pub const GPS_RMC_VALID: u32 = 1 << 15;
    pub const SERIAL_CHECKSUM_FAILED: u32 = 1 << 16;
    /// Block logger is latched off for the rest of the run
    pub const STORAGE_DISABLED: u32 = 1 << 17;
    /// Guidance moved on to a later waypoint this cycle
    pub const WAYPOINT_ADVANCED: u32 = 1 << 18;

    /// "Received" bit for a sentence slot index
    pub fn gps_slot_received(slot: usize) -> u32 {
        match slot {
            0 => GPS_SLOT0_RECEIVED,
            1 => GPS_SLOT1_RECEIVED,
            2 => GPS_SLOT2_RECEIVED,
            3 => GPS_SLOT3_RECEIVED,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_bits_are_distinct() {
        let mut seen = 0u32;
        for slot in 0..SENTENCE_SLOTS {
            let bit = status::gps_slot_received(slot);
            assert_eq!(bit.count_ones(), 1);
            assert_eq!(seen & bit, 0);
            seen |= bit;
        }
        assert_eq!(status::gps_slot_received(SENTENCE_SLOTS), 0);
    }
}
