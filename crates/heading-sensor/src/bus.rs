//! Two-wire bus seam

/// Bus status codes reported after each completed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusStatus {
    Start,
    RepeatedStart,
    AddressWriteAck,
    AddressWriteNack,
    DataWriteAck,
    DataWriteNack,
    ArbitrationLost,
    AddressReadAck,
    AddressReadNack,
    DataReadAck,
    DataReadNack,
    /// Any code this driver does not expect
    Other(u8),
}

impl BusStatus {
    pub fn from_code(code: u8) -> Self {
        match code & 0xF8 {
            0x08 => BusStatus::Start,
            0x10 => BusStatus::RepeatedStart,
            0x18 => BusStatus::AddressWriteAck,
            0x20 => BusStatus::AddressWriteNack,
            0x28 => BusStatus::DataWriteAck,
            0x30 => BusStatus::DataWriteNack,
            0x38 => BusStatus::ArbitrationLost,
            0x40 => BusStatus::AddressReadAck,
            0x48 => BusStatus::AddressReadNack,
            0x50 => BusStatus::DataReadAck,
            0x58 => BusStatus::DataReadNack,
            other => BusStatus::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BusStatus::Start => 0x08,
            BusStatus::RepeatedStart => 0x10,
            BusStatus::AddressWriteAck => 0x18,
            BusStatus::AddressWriteNack => 0x20,
            BusStatus::DataWriteAck => 0x28,
            BusStatus::DataWriteNack => 0x30,
            BusStatus::ArbitrationLost => 0x38,
            BusStatus::AddressReadAck => 0x40,
            BusStatus::AddressReadNack => 0x48,
            BusStatus::DataReadAck => 0x50,
            BusStatus::DataReadNack => 0x58,
            BusStatus::Other(code) => code,
        }
    }
}

/// Two-wire bus controller registers.
///
/// Every operation returns immediately; completion raises the bus
/// interrupt, after which [`TwoWireBus::status`] describes the outcome.
pub trait TwoWireBus {
    fn status(&self) -> BusStatus;

    /// Issue a start, or a repeated start while the bus is held
    fn start(&self);

    fn stop(&self);

    /// Transmit an address or data byte
    fn write(&self, byte: u8);

    /// Receive one byte, answering ACK (more wanted) or NACK (last byte)
    fn read(&self, ack: bool);

    /// Last received byte
    fn data(&self) -> u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        for code in (0x08..=0x58).step_by(8) {
            assert_eq!(BusStatus::from_code(code).code(), code);
        }
        assert_eq!(BusStatus::from_code(0xF8), BusStatus::Other(0xF8));
    }

    #[test]
    fn test_prescaler_bits_ignored() {
        assert_eq!(BusStatus::from_code(0x08 | 0x03), BusStatus::Start);
    }
}
