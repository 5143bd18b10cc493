//! Shared record types

use crate::{SENTENCE_CAPACITY, SENTENCE_SLOTS};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// A raw NUL-terminated sentence as received from the positioning receiver
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawSentence([u8; SENTENCE_CAPACITY]);

impl RawSentence {
    /// Copy a sentence, truncating so a NUL always fits
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut raw = Self::default();
        let len = bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(bytes.len())
            .min(SENTENCE_CAPACITY - 1);
        raw.0[..len].copy_from_slice(&bytes[..len]);
        raw
    }

    /// Bytes up to (not including) the first NUL
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(SENTENCE_CAPACITY);
        &self.0[..len]
    }

    /// Lossy text view, line terminator included
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Full fixed-size buffer, as persisted
    pub fn raw(&self) -> &[u8; SENTENCE_CAPACITY] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    pub fn clear(&mut self) {
        self.0 = [0; SENTENCE_CAPACITY];
    }

    pub(crate) fn from_raw(raw: [u8; SENTENCE_CAPACITY]) -> Self {
        Self(raw)
    }
}

impl Default for RawSentence {
    fn default() -> Self {
        Self([0; SENTENCE_CAPACITY])
    }
}

impl fmt::Debug for RawSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawSentence({:?})", self.as_str())
    }
}

impl Serialize for RawSentence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str().trim_end())
    }
}

/// UTC time of a positioning fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UtcTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: f32,
}

/// UTC date from the course/speed sentence (two-digit year)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcDate {
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

/// Parsed positioning data
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsState {
    /// Signed decimal degrees, north positive
    pub latitude_deg: f32,
    /// Signed decimal degrees, east positive
    pub longitude_deg: f32,
    pub hdop: f32,
    pub altitude_m: f32,
    /// Local planar east offset from the reference point (meters)
    pub local_x: f32,
    /// Local planar north offset from the reference point (meters)
    pub local_y: f32,
    pub fix_time: UtcTime,
    pub satellites: u8,
    pub ground_speed_knots: f32,
    pub ground_course_deg: f32,
    pub date: UtcDate,
    /// East positive, west negative
    pub magnetic_variation_deg: f32,
}

/// Heading sensor output
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompassState {
    /// Register value in tenths of a degree
    pub raw: u16,
    pub degrees: f32,
    pub radians: f32,
}

/// Encoder ticks drained this cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderState {
    pub ticks: i16,
    pub valid: bool,
}

/// Vehicle pose estimate in the local frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    /// Radians
    pub heading: f32,
}

/// Active waypoint and bearing error
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GuidanceState {
    pub waypoint_index: u16,
    /// Signed bearing error (radians)
    pub target_angle: f32,
    pub throttle_target_us: u16,
}

/// Commanded actuator pulse widths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub steering_us: u16,
    pub throttle_us: u16,
    /// Drive state machine code
    pub drive_state: u8,
}

/// The per-cycle state record shared by every component
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SharedRecord {
    /// Cycles executed since power-up
    pub loop_counter: u32,
    /// OR of `status::*` bits raised this cycle
    pub status: u32,
    /// Sentences drained this cycle, by slot
    pub sentences: [RawSentence; SENTENCE_SLOTS],
    pub gps: GpsState,
    pub compass: CompassState,
    pub encoder: EncoderState,
    pub pose: Pose,
    pub guidance: GuidanceState,
    pub actuators: ActuatorState,
}

impl SharedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new cycle: bump the counter, drop last cycle's status and sentences
    pub fn begin_cycle(&mut self) {
        self.loop_counter = self.loop_counter.wrapping_add(1);
        self.status = 0;
        for sentence in self.sentences.iter_mut() {
            sentence.clear();
        }
    }

    /// OR status bits into this cycle's word
    pub fn raise(&mut self, bits: u32) {
        self.status |= bits;
    }

    /// True if every bit in `bits` is set
    pub fn has(&self, bits: u32) -> bool {
        self.status & bits == bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status;

    #[test]
    fn test_raw_sentence_truncates() {
        let long = [b'A'; 200];
        let raw = RawSentence::from_bytes(&long);
        assert_eq!(raw.as_bytes().len(), SENTENCE_CAPACITY - 1);
        assert_eq!(raw.raw()[SENTENCE_CAPACITY - 1], 0);
    }

    #[test]
    fn test_raw_sentence_stops_at_nul() {
        let raw = RawSentence::from_bytes(b"$GPGGA\n\0garbage");
        assert_eq!(raw.as_str(), "$GPGGA\n");
    }

    #[test]
    fn test_begin_cycle_clears_status() {
        let mut record = SharedRecord::new();
        record.raise(status::GPS_GGA_VALID | status::ENCODER_VALID);
        record.sentences[1] = RawSentence::from_bytes(b"$GPRMC\n");
        record.begin_cycle();

        assert_eq!(record.loop_counter, 1);
        assert_eq!(record.status, 0);
        assert!(record.sentences[1].is_empty());
    }

    #[test]
    fn test_has_requires_all_bits() {
        let mut record = SharedRecord::new();
        record.raise(status::COMPASS_VALID);
        assert!(record.has(status::COMPASS_VALID));
        assert!(!record.has(status::COMPASS_VALID | status::COMPASS_ERROR));
    }
}
