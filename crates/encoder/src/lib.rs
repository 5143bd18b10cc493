//! Quadrature Encoder Counter
//!
//! Decodes wheel-encoder edges in interrupt context into one of two
//! counter cells. The main loop drains the cycle's ticks by swapping
//! which cell is active, so the handler never waits on the main loop.

mod counter;
mod decode;

pub use counter::{EncoderConfig, EncoderCounter, EncoderReading};
pub use decode::{decode, Step};
