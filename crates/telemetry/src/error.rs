//! Record decoding errors

use thiserror::Error;

/// Reasons a storage block does not hold a valid record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Leading guard missing: free block or misaligned read
    #[error("Guard prefix mismatch: found {0:#010X}")]
    PrefixMismatch(u32),

    /// Trailing guard missing: torn or corrupted write
    #[error("Guard suffix mismatch: found {0:#010X}")]
    SuffixMismatch(u32),
}
