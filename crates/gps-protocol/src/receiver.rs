//! Main-loop side of the positioning receiver

use crate::{parse, LocalProjection, Sentence, SentenceError, SentencePool};
use std::sync::Arc;
use telemetry::{status, SharedRecord, SENTENCE_SLOTS};
use tracing::debug;

/// Drains framed sentences into the shared record once per cycle
pub struct GpsReceiver {
    pool: Arc<SentencePool>,
    projection: LocalProjection,
}

impl GpsReceiver {
    pub fn new(pool: Arc<SentencePool>, projection: LocalProjection) -> Self {
        Self { pool, projection }
    }

    /// Drain every ready slot, slot 0 first, parsing each into `record`
    pub fn update(&mut self, record: &mut SharedRecord) {
        record.raise(self.pool.take_faults());

        for slot in 0..SENTENCE_SLOTS {
            let Some(sentence) = self.pool.take_ready(slot) else {
                continue;
            };
            record.sentences[slot] = sentence;
            record.raise(status::gps_slot_received(slot));

            match parse(sentence.as_bytes(), &self.projection) {
                Ok(Sentence::Gga(fix)) => {
                    let gps = &mut record.gps;
                    gps.fix_time = fix.time;
                    gps.latitude_deg = fix.latitude_deg as f32;
                    gps.longitude_deg = fix.longitude_deg as f32;
                    gps.satellites = fix.satellites;
                    gps.hdop = fix.hdop;
                    gps.altitude_m = fix.altitude_m;
                    gps.local_x = fix.local_x;
                    gps.local_y = fix.local_y;
                    record.raise(status::GPS_GGA_VALID);
                }
                Ok(Sentence::Rmc(course)) => {
                    let gps = &mut record.gps;
                    gps.ground_speed_knots = course.ground_speed_knots;
                    gps.ground_course_deg = course.ground_course_deg;
                    gps.date = course.date;
                    gps.magnetic_variation_deg = course.magnetic_variation_deg;
                    record.raise(status::GPS_RMC_VALID);
                }
                Ok(Sentence::Unrecognized) => record.raise(status::SERIAL_UNKNOWN_SENTENCE),
                Err(SentenceError::Checksum) => record.raise(status::SERIAL_CHECKSUM_FAILED),
                Err(e) => debug!("Slot {} sentence ignored: {}", slot, e),
            }
        }
    }

    pub fn projection(&self) -> &LocalProjection {
        &self.projection
    }
}
