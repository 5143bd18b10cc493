//! Heading sensor errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// A transfer is already in flight
    #[error("Heading read already in progress")]
    Busy,
}
