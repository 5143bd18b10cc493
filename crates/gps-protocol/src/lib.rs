//! Positioning Receiver Protocol
//!
//! Assembles NMEA 0183 sentences from a byte stream in interrupt context,
//! validates their checksums, and extracts fix-quality (GGA) and
//! course/speed (RMC) fields into the shared record.

mod checksum;
mod error;
mod framer;
mod projection;
mod receiver;
mod sentence;

pub use checksum::{checksum, validate_checksum};
pub use error::SentenceError;
pub use framer::{SentenceFramer, SentencePool};
pub use projection::{LocalProjection, ProjectionConfig};
pub use receiver::GpsReceiver;
pub use sentence::{parse, GgaFix, RmcCourse, Sentence};

/// Sentence start marker
pub const START_MARKER: u8 = b'$';

/// Checksum delimiter
pub const CHECKSUM_MARKER: u8 = b'*';

/// Line terminator
pub const LINE_TERMINATOR: u8 = b'\n';
