//! Synchronous serial bus seam

/// SPI clock setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockRate {
    /// Below 400 kHz, required until the card leaves idle
    Slow,
    /// Full data rate
    Fast,
}

/// Full-duplex SPI master with a single chip select
pub trait SpiBus {
    /// Clock one byte out and return the byte clocked in
    fn exchange(&mut self, byte: u8) -> u8;
    /// Assert chip select
    fn select(&mut self);
    /// Release chip select
    fn deselect(&mut self);
    fn set_clock(&mut self, rate: ClockRate);
}
