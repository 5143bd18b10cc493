//! SPI-mode command framing and response constants

/// Every command byte carries the start and transmission bits `01`
pub const COMMAND_HEADER: u8 = 0x40;
pub const COMMAND_INDEX_MASK: u8 = 0x3F;

/// Byte clocked out when only reading
pub const FILL: u8 = 0xFF;

/// R1 responses
pub const R1_READY: u8 = 0x00;
pub const R1_IDLE: u8 = 0x01;
/// Set in every byte that is not an R1 response
pub const R1_INVALID: u8 = 0x80;

/// Start of a single-block data transfer, in either direction
pub const DATA_TOKEN: u8 = 0xFE;

/// Data-response token for an accepted write, after masking
pub const DATA_RESPONSE_MASK: u8 = 0x1F;
pub const DATA_ACCEPTED: u8 = 0x05;

/// Card-capacity-status bit in the first OCR byte
pub const OCR_CCS: u8 = 0x40;

pub const CSD_LEN: usize = 16;
pub const CRC_LEN: usize = 2;

/// Commands the logger issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdCommand {
    /// CMD0
    GoIdle,
    /// CMD8
    SendIfCond,
    /// CMD55, prefix of every application command
    AppCmd,
    /// ACMD41, requesting high-capacity support
    SdSendOpCond,
    /// CMD58
    ReadOcr,
    /// CMD9
    SendCsd,
    /// CMD17
    ReadBlock(u32),
    /// CMD24
    WriteBlock(u32),
}

impl SdCommand {
    pub fn index(self) -> u8 {
        match self {
            SdCommand::GoIdle => 0x00,
            SdCommand::SendIfCond => 0x08,
            SdCommand::AppCmd => 0x37,
            SdCommand::SdSendOpCond => 0x29,
            SdCommand::ReadOcr => 0x3A,
            SdCommand::SendCsd => 0x09,
            SdCommand::ReadBlock(_) => 0x11,
            SdCommand::WriteBlock(_) => 0x18,
        }
    }

    pub fn argument(self) -> u32 {
        match self {
            SdCommand::SendIfCond => 0x0000_01AA,
            SdCommand::SdSendOpCond => 0x4000_0000,
            SdCommand::ReadBlock(block) | SdCommand::WriteBlock(block) => block,
            _ => 0,
        }
    }

    /// CRC7 and end bit. Only CMD0 and CMD8 are checked by the card.
    pub fn trailer(self) -> u8 {
        match self {
            SdCommand::GoIdle => 0x95,
            SdCommand::SendIfCond => 0x87,
            SdCommand::SdSendOpCond | SdCommand::ReadOcr => 0x01,
            _ => 0x00,
        }
    }

    /// The six bytes on the wire
    pub fn frame(self) -> [u8; 6] {
        let [a0, a1, a2, a3] = self.argument().to_be_bytes();
        [
            COMMAND_HEADER | (self.index() & COMMAND_INDEX_MASK),
            a0,
            a1,
            a2,
            a3,
            self.trailer(),
        ]
    }
}

/// The interface-condition reply echoes the voltage range and check pattern
pub fn if_cond_echo_ok(echo: &[u8; 4]) -> bool {
    echo[2] & 0x0F == 0x01 && echo[3] == 0xAA
}

/// Card size in 512-byte blocks from a version 2 CSD: `(C_SIZE + 1) * 512`
pub fn capacity_blocks(csd: &[u8; CSD_LEN]) -> u32 {
    let c_size =
        (u32::from(csd[7] & 0x3F) << 16) | (u32::from(csd[8]) << 8) | u32::from(csd[9]);
    (c_size + 1) * 512
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table() {
        assert_eq!(SdCommand::GoIdle.frame(), [0x40, 0, 0, 0, 0, 0x95]);
        assert_eq!(SdCommand::SendIfCond.frame(), [0x48, 0, 0, 0x01, 0xAA, 0x87]);
        assert_eq!(SdCommand::AppCmd.frame(), [0x77, 0, 0, 0, 0, 0x00]);
        assert_eq!(SdCommand::SdSendOpCond.frame(), [0x69, 0x40, 0, 0, 0, 0x01]);
        assert_eq!(SdCommand::ReadOcr.frame(), [0x7A, 0, 0, 0, 0, 0x01]);
        assert_eq!(SdCommand::SendCsd.frame(), [0x49, 0, 0, 0, 0, 0x00]);
    }

    #[test]
    fn test_block_address_is_big_endian() {
        assert_eq!(
            SdCommand::ReadBlock(0x0102_0304).frame(),
            [0x51, 0x01, 0x02, 0x03, 0x04, 0x00]
        );
        assert_eq!(SdCommand::WriteBlock(7).frame(), [0x58, 0, 0, 0, 7, 0x00]);
    }

    #[test]
    fn test_capacity_from_csd() {
        let mut csd = [0u8; CSD_LEN];
        csd[0] = 0x40;
        assert_eq!(capacity_blocks(&csd), 512);

        // 4 GB class card; reserved bits above C_SIZE are ignored.
        csd[7] = 0xC0;
        csd[8] = 0x1D;
        csd[9] = 0xA3;
        assert_eq!(capacity_blocks(&csd), (0x1DA3 + 1) * 512);
    }

    #[test]
    fn test_if_cond_echo() {
        assert!(if_cond_echo_ok(&[0x00, 0x00, 0x01, 0xAA]));
        assert!(!if_cond_echo_ok(&[0x00, 0x00, 0x01, 0x55]));
        assert!(!if_cond_echo_ok(&[0x00, 0x00, 0x00, 0xAA]));
    }
}
