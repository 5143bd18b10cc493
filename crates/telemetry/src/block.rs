//! Fixed little-endian block layout
//!
//! ```text
//! 0    guard prefix        u32
//! 4    payload             PAYLOAD_LEN bytes, fields in declaration order
//! ..   zero padding
//! 508  guard suffix        u32
//! ```

use crate::record::{
    ActuatorState, CompassState, EncoderState, GpsState, GuidanceState, Pose, RawSentence,
    SharedRecord, UtcDate, UtcTime,
};
use crate::{RecordError, SENTENCE_CAPACITY, SENTENCE_SLOTS};
use byteorder::{ByteOrder, LittleEndian};

/// Storage device block size in bytes
pub const BLOCK_SIZE: usize = 512;

/// Leading sentinel of every persisted record
pub const GUARD_PREFIX: u32 = 0xBABE_CAFE;

/// Trailing sentinel of every persisted record
pub const GUARD_SUFFIX: u32 = 0xDEAD_BEEF;

/// The prefix as it appears in the first four bytes of a block
pub const GUARD_PREFIX_BYTES: [u8; 4] = GUARD_PREFIX.to_le_bytes();

const GUARD_LEN: usize = 4;
const GPS_LEN: usize = 6 * 4 + (1 + 1 + 4) + 1 + 4 + 4 + 3 + 4;
const COMPASS_LEN: usize = 2 + 4 + 4;
const ENCODER_LEN: usize = 2 + 1;
const POSE_LEN: usize = 3 * 4;
const GUIDANCE_LEN: usize = 2 + 4 + 2;
const ACTUATOR_LEN: usize = 2 + 2 + 1;

/// Encoded size of the record fields between the guards
pub const PAYLOAD_LEN: usize = 4
    + 4
    + SENTENCE_SLOTS * SENTENCE_CAPACITY
    + GPS_LEN
    + COMPASS_LEN
    + ENCODER_LEN
    + POSE_LEN
    + GUIDANCE_LEN
    + ACTUATOR_LEN;

const PADDING_LEN: usize = BLOCK_SIZE - 2 * GUARD_LEN - PAYLOAD_LEN;
const SUFFIX_OFFSET: usize = BLOCK_SIZE - GUARD_LEN;

const _: () = assert!(GUARD_LEN + PAYLOAD_LEN + PADDING_LEN + GUARD_LEN == BLOCK_SIZE);

struct BlockWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl BlockWriter<'_> {
    fn advance(&mut self, len: usize) -> &mut [u8] {
        let start = self.pos;
        self.pos += len;
        &mut self.buf[start..self.pos]
    }

    fn u8(&mut self, value: u8) {
        self.advance(1)[0] = value;
    }

    fn u16(&mut self, value: u16) {
        LittleEndian::write_u16(self.advance(2), value);
    }

    fn i16(&mut self, value: i16) {
        LittleEndian::write_i16(self.advance(2), value);
    }

    fn u32(&mut self, value: u32) {
        LittleEndian::write_u32(self.advance(4), value);
    }

    fn f32(&mut self, value: f32) {
        LittleEndian::write_f32(self.advance(4), value);
    }

    fn bytes(&mut self, value: &[u8]) {
        self.advance(value.len()).copy_from_slice(value);
    }
}

struct BlockReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BlockReader<'a> {
    fn take(&mut self, len: usize) -> &'a [u8] {
        let start = self.pos;
        self.pos += len;
        &self.buf[start..self.pos]
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn u16(&mut self) -> u16 {
        LittleEndian::read_u16(self.take(2))
    }

    fn i16(&mut self) -> i16 {
        LittleEndian::read_i16(self.take(2))
    }

    fn u32(&mut self) -> u32 {
        LittleEndian::read_u32(self.take(4))
    }

    fn f32(&mut self) -> f32 {
        LittleEndian::read_f32(self.take(4))
    }
}

impl SharedRecord {
    /// Serialize into exactly one storage block
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        let mut w = BlockWriter { buf: &mut block, pos: 0 };

        w.u32(GUARD_PREFIX);
        w.u32(self.loop_counter);
        w.u32(self.status);
        for sentence in &self.sentences {
            w.bytes(sentence.raw());
        }

        let gps = &self.gps;
        w.f32(gps.latitude_deg);
        w.f32(gps.longitude_deg);
        w.f32(gps.hdop);
        w.f32(gps.altitude_m);
        w.f32(gps.local_x);
        w.f32(gps.local_y);
        w.u8(gps.fix_time.hours);
        w.u8(gps.fix_time.minutes);
        w.f32(gps.fix_time.seconds);
        w.u8(gps.satellites);
        w.f32(gps.ground_speed_knots);
        w.f32(gps.ground_course_deg);
        w.u8(gps.date.day);
        w.u8(gps.date.month);
        w.u8(gps.date.year);
        w.f32(gps.magnetic_variation_deg);

        w.u16(self.compass.raw);
        w.f32(self.compass.degrees);
        w.f32(self.compass.radians);

        w.i16(self.encoder.ticks);
        w.u8(u8::from(self.encoder.valid));

        w.f32(self.pose.x);
        w.f32(self.pose.y);
        w.f32(self.pose.heading);

        w.u16(self.guidance.waypoint_index);
        w.f32(self.guidance.target_angle);
        w.u16(self.guidance.throttle_target_us);

        w.u16(self.actuators.steering_us);
        w.u16(self.actuators.throttle_us);
        w.u8(self.actuators.drive_state);

        debug_assert_eq!(w.pos, GUARD_LEN + PAYLOAD_LEN);
        LittleEndian::write_u32(&mut block[SUFFIX_OFFSET..], GUARD_SUFFIX);
        block
    }

    /// Rebuild a record from a persisted block, checking both guards
    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Result<Self, RecordError> {
        let prefix = LittleEndian::read_u32(&block[..GUARD_LEN]);
        if prefix != GUARD_PREFIX {
            return Err(RecordError::PrefixMismatch(prefix));
        }
        let suffix = LittleEndian::read_u32(&block[SUFFIX_OFFSET..]);
        if suffix != GUARD_SUFFIX {
            return Err(RecordError::SuffixMismatch(suffix));
        }

        let mut r = BlockReader { buf: block, pos: GUARD_LEN };
        let loop_counter = r.u32();
        let status = r.u32();
        let mut sentences = [RawSentence::default(); SENTENCE_SLOTS];
        for sentence in sentences.iter_mut() {
            let mut raw = [0u8; SENTENCE_CAPACITY];
            raw.copy_from_slice(r.take(SENTENCE_CAPACITY));
            *sentence = RawSentence::from_raw(raw);
        }

        let gps = GpsState {
            latitude_deg: r.f32(),
            longitude_deg: r.f32(),
            hdop: r.f32(),
            altitude_m: r.f32(),
            local_x: r.f32(),
            local_y: r.f32(),
            fix_time: UtcTime { hours: r.u8(), minutes: r.u8(), seconds: r.f32() },
            satellites: r.u8(),
            ground_speed_knots: r.f32(),
            ground_course_deg: r.f32(),
            date: UtcDate { day: r.u8(), month: r.u8(), year: r.u8() },
            magnetic_variation_deg: r.f32(),
        };
        let compass = CompassState { raw: r.u16(), degrees: r.f32(), radians: r.f32() };
        let encoder = EncoderState { ticks: r.i16(), valid: r.u8() != 0 };
        let pose = Pose { x: r.f32(), y: r.f32(), heading: r.f32() };
        let guidance = GuidanceState {
            waypoint_index: r.u16(),
            target_angle: r.f32(),
            throttle_target_us: r.u16(),
        };
        let actuators = ActuatorState {
            steering_us: r.u16(),
            throttle_us: r.u16(),
            drive_state: r.u8(),
        };

        Ok(Self { loop_counter, status, sentences, gps, compass, encoder, pose, guidance, actuators })
    }
}
