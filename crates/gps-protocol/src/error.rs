//! Sentence Error Types

use thiserror::Error;

/// Reasons a sentence produced no state update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentenceError {
    /// Checksum missing, malformed or wrong
    #[error("Checksum validation failed")]
    Checksum,

    /// Sentence bytes are not ASCII text
    #[error("Sentence is not valid ASCII")]
    NotAscii,

    /// Too few fields, or a required field is empty
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A numeric field did not parse
    #[error("Invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// Fix-quality sentence reported no fix
    #[error("Receiver reports no fix")]
    NoFix,

    /// Course/speed sentence flagged void
    #[error("Receiver reports void data")]
    VoidStatus,
}
