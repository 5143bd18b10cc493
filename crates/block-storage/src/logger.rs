//! Card bring-up, free-block search and per-cycle record writes

use crate::protocol::{
    capacity_blocks, if_cond_echo_ok, CRC_LEN, CSD_LEN, DATA_ACCEPTED, DATA_RESPONSE_MASK,
    DATA_TOKEN, FILL, OCR_CCS, R1_IDLE, R1_INVALID, R1_READY,
};
use crate::{ClockRate, SdCommand, SpiBus, StorageError};
use serde::{Deserialize, Serialize};
use telemetry::{status, SharedRecord, BLOCK_SIZE, GUARD_PREFIX_BYTES};
use tracing::{debug, info, warn};

/// Bytes clocked with chip select released before the first command
const WAKE_UP_BYTES: usize = 10;

/// Retry ceilings for every bounded poll
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Skip the card entirely
    pub enabled: bool,
    /// Bytes polled for an R1 response
    pub response_poll_limit: u16,
    /// ACMD41 requests before giving up on the card leaving idle
    pub op_cond_retries: u16,
    /// Bytes polled for a data token
    pub token_poll_limit: u16,
    /// Bytes polled for the card to release busy after a write
    pub busy_poll_limit: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            response_poll_limit: 0xFF,
            op_cond_retries: 0xFF,
            token_poll_limit: 0xFF,
            busy_poll_limit: 0xFFFF,
        }
    }
}

/// Where the next record goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageCursor {
    pub next_block: u32,
    pub capacity_blocks: u32,
    /// Latches false on the first fault or when the card fills
    pub enabled: bool,
}

/// Append-only record logger on an SPI-mode SD card
pub struct BlockLogger<S: SpiBus> {
    bus: S,
    config: StorageConfig,
    cursor: StorageCursor,
    write_pending: bool,
}

impl<S: SpiBus> BlockLogger<S> {
    /// Logger starts disabled until [`BlockLogger::init`] succeeds
    pub fn new(bus: S, config: StorageConfig) -> Self {
        Self {
            bus,
            config,
            cursor: StorageCursor::default(),
            write_pending: false,
        }
    }

    pub fn cursor(&self) -> StorageCursor {
        self.cursor
    }

    pub fn is_enabled(&self) -> bool {
        self.cursor.enabled
    }

    pub fn bus(&self) -> &S {
        &self.bus
    }

    pub fn into_bus(self) -> S {
        self.bus
    }

    /// Run the full bring-up and locate the first free block.
    ///
    /// On any failure the logger stays disabled for the rest of the run.
    pub fn init(&mut self) -> Result<StorageCursor, StorageError> {
        self.cursor = StorageCursor::default();
        if !self.config.enabled {
            info!("Block logging disabled by configuration");
            return Err(StorageError::Disabled);
        }

        match self.bring_up() {
            Ok(()) => {
                self.cursor.enabled = true;
                info!(
                    "Logging enabled at block {} of {}",
                    self.cursor.next_block, self.cursor.capacity_blocks
                );
                Ok(self.cursor)
            }
            Err(e) => {
                warn!("Storage init failed, logging disabled: {}", e);
                Err(e)
            }
        }
    }

    fn bring_up(&mut self) -> Result<(), StorageError> {
        self.bus.set_clock(ClockRate::Slow);
        self.bus.deselect();
        for _ in 0..WAKE_UP_BYTES {
            self.bus.exchange(FILL);
        }
        self.bus.select();

        self.expect(SdCommand::GoIdle, R1_IDLE)?;

        self.expect(SdCommand::SendIfCond, R1_IDLE)?;
        let echo = self.read_array::<4>();
        if !if_cond_echo_ok(&echo) {
            return Err(StorageError::InterfaceEcho(echo));
        }

        self.wait_until_ready()?;

        self.expect(SdCommand::ReadOcr, R1_READY)?;
        let ocr = self.read_array::<4>();
        if ocr[0] & OCR_CCS == 0 {
            return Err(StorageError::NotBlockAddressed(u32::from_be_bytes(ocr)));
        }

        self.bus.set_clock(ClockRate::Fast);

        self.cursor.capacity_blocks = self.read_capacity()?;
        debug!("Card capacity {} blocks", self.cursor.capacity_blocks);
        self.cursor.next_block = self.find_available_block()?;
        Ok(())
    }

    /// ACMD41 until the card reports it has left idle
    fn wait_until_ready(&mut self) -> Result<(), StorageError> {
        for _ in 0..self.config.op_cond_retries {
            let response = self.command(SdCommand::AppCmd)?;
            if response & !R1_IDLE != 0 {
                return Err(StorageError::UnexpectedResponse {
                    command: SdCommand::AppCmd,
                    response,
                });
            }
            match self.command(SdCommand::SdSendOpCond)? {
                R1_READY => return Ok(()),
                R1_IDLE => continue,
                response => {
                    return Err(StorageError::UnexpectedResponse {
                        command: SdCommand::SdSendOpCond,
                        response,
                    })
                }
            }
        }
        Err(StorageError::NotReady(self.config.op_cond_retries))
    }

    /// Card size in blocks, from the CSD register
    pub fn read_capacity(&mut self) -> Result<u32, StorageError> {
        self.expect(SdCommand::SendCsd, R1_READY)?;
        self.wait_for_token(SdCommand::SendCsd)?;
        let csd = self.read_array::<CSD_LEN>();
        self.skip(CRC_LEN);

        match capacity_blocks(&csd) {
            0 => Err(StorageError::ZeroCapacity),
            blocks => Ok(blocks),
        }
    }

    /// A block is in use when it starts with the record guard prefix
    pub fn block_in_use(&mut self, block: u32) -> Result<bool, StorageError> {
        let command = SdCommand::ReadBlock(block);
        self.expect(command, R1_READY)?;
        self.wait_for_token(command)?;
        let head = self.read_array::<4>();
        self.skip(BLOCK_SIZE - head.len() + CRC_LEN);
        Ok(head == GUARD_PREFIX_BYTES)
    }

    /// First block after the records of earlier runs.
    ///
    /// Assumes earlier runs filled the card contiguously from block 0. The
    /// search is a lower bound over `1..capacity`: every block read left of the
    /// answer was seen in use, so the answer's predecessor is in use. A
    /// full card falls back to block 0.
    pub fn find_available_block(&mut self) -> Result<u32, StorageError> {
        if !self.block_in_use(0)? {
            return Ok(0);
        }

        let capacity = self.cursor.capacity_blocks;
        let (mut low, mut high) = (1u32, capacity);
        while low < high {
            let mid = low + (high - low) / 2;
            if self.block_in_use(mid)? {
                low = mid + 1;
            } else {
                high = mid;
            }
        }

        if low >= capacity {
            warn!("No free block on a {} block card, overwriting from block 0", capacity);
            return Ok(0);
        }
        Ok(low)
    }

    /// Write `record` to the next block.
    ///
    /// A no-op error once disabled. Any fault, or filling the card, latches
    /// the logger off.
    pub fn write_cycle_record(&mut self, record: &SharedRecord) -> Result<(), StorageError> {
        if !self.cursor.enabled {
            return Err(StorageError::Disabled);
        }
        let result = self.write_next(record);
        if result.is_err() {
            self.cursor.enabled = false;
        }
        result
    }

    fn write_next(&mut self, record: &SharedRecord) -> Result<(), StorageError> {
        let block = self.cursor.next_block;
        if block >= self.cursor.capacity_blocks {
            return Err(StorageError::Full(self.cursor.capacity_blocks));
        }

        self.wait_while_busy()?;

        self.expect(SdCommand::WriteBlock(block), R1_READY)?;
        self.bus.exchange(DATA_TOKEN);
        for byte in record.encode() {
            self.bus.exchange(byte);
        }
        // CRC is not checked in SPI mode.
        for _ in 0..CRC_LEN {
            self.bus.exchange(0x00);
        }

        let response = self.bus.exchange(FILL);
        if response & DATA_RESPONSE_MASK != DATA_ACCEPTED {
            return Err(StorageError::DataRejected { block, response });
        }
        self.write_pending = true;

        self.cursor.next_block += 1;
        if self.cursor.next_block >= self.cursor.capacity_blocks {
            info!("Card full after block {}, logging stopped", block);
            self.cursor.enabled = false;
        }
        Ok(())
    }

    /// Wait for the card to finish programming the last block.
    ///
    /// Each write already waits for the previous one, so programming runs
    /// while the rest of the stack works. Call this before releasing the bus.
    pub fn finish_write(&mut self) -> Result<(), StorageError> {
        let result = self.wait_while_busy();
        if result.is_err() {
            self.cursor.enabled = false;
        }
        result
    }

    fn wait_while_busy(&mut self) -> Result<(), StorageError> {
        if !self.write_pending {
            return Ok(());
        }
        self.write_pending = false;
        for _ in 0..self.config.busy_poll_limit {
            if self.bus.exchange(FILL) == FILL {
                return Ok(());
            }
        }
        Err(StorageError::Busy(self.config.busy_poll_limit))
    }

    /// Per-cycle entry point: write, and flag the record once disabled
    pub fn log_cycle(&mut self, record: &mut SharedRecord) {
        if !self.cursor.enabled {
            record.raise(status::STORAGE_DISABLED);
            return;
        }
        if let Err(e) = self.write_cycle_record(record) {
            warn!("Block logging disabled: {}", e);
            record.raise(status::STORAGE_DISABLED);
        }
    }

    /// Send a command and poll for its R1 response
    fn command(&mut self, command: SdCommand) -> Result<u8, StorageError> {
        for byte in command.frame() {
            self.bus.exchange(byte);
        }
        for _ in 0..self.config.response_poll_limit {
            let response = self.bus.exchange(FILL);
            if response & R1_INVALID == 0 {
                return Ok(response);
            }
        }
        Err(StorageError::NoResponse(command))
    }

    fn expect(&mut self, command: SdCommand, expected: u8) -> Result<(), StorageError> {
        match self.command(command)? {
            response if response == expected => Ok(()),
            response => Err(StorageError::UnexpectedResponse { command, response }),
        }
    }

    fn wait_for_token(&mut self, command: SdCommand) -> Result<(), StorageError> {
        for _ in 0..self.config.token_poll_limit {
            match self.bus.exchange(FILL) {
                DATA_TOKEN => return Ok(()),
                FILL => continue,
                _ => break,
            }
        }
        Err(StorageError::NoDataToken(command))
    }

    fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        for byte in bytes.iter_mut() {
            *byte = self.bus.exchange(FILL);
        }
        bytes
    }

    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            self.bus.exchange(FILL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockCard;
    use proptest::prelude::*;

    fn logger(card: MockCard) -> BlockLogger<MockCard> {
        BlockLogger::new(card, StorageConfig::default())
    }

    fn record(counter: u32) -> SharedRecord {
        let mut record = SharedRecord::new();
        record.loop_counter = counter;
        record
    }

    #[test]
    fn test_init_blank_card() {
        let mut logger = logger(MockCard::new(3));
        let cursor = logger.init().unwrap();

        assert_eq!(cursor, StorageCursor { next_block: 0, capacity_blocks: 2048, enabled: true });
        assert_eq!(logger.bus().clock(), ClockRate::Fast);
        assert_eq!(logger.bus().block_reads(), 1);
    }

    #[test]
    fn test_init_resumes_after_previous_run() {
        let mut card = MockCard::new(0);
        card.mark_used(37);
        let mut logger = logger(card);

        assert_eq!(logger.init().unwrap().next_block, 37);
    }

    #[test]
    fn test_full_card_falls_back_to_zero() {
        let mut card = MockCard::new(0);
        card.mark_used(512);
        let mut logger = logger(card);

        assert_eq!(logger.init().unwrap().next_block, 0);
    }

    #[test]
    fn test_init_needs_several_op_cond_polls() {
        let mut card = MockCard::new(0);
        card.set_op_cond_polls(20);
        assert!(logger(card).init().is_ok());

        let mut card = MockCard::new(0);
        card.set_op_cond_polls(1000);
        let mut stubborn = logger(card);
        assert_eq!(stubborn.init(), Err(StorageError::NotReady(0xFF)));
        assert!(!stubborn.is_enabled());
    }

    #[test]
    fn test_init_rejects_bad_if_cond() {
        let mut card = MockCard::new(0);
        card.fail_command(SdCommand::SendIfCond.index());
        let mut logger = logger(card);

        assert!(matches!(
            logger.init(),
            Err(StorageError::UnexpectedResponse { command: SdCommand::SendIfCond, .. })
        ));
        assert!(!logger.is_enabled());
        assert_eq!(logger.bus().clock(), ClockRate::Slow);
    }

    #[test]
    fn test_init_rejects_byte_addressed_card() {
        let mut card = MockCard::new(0);
        card.set_block_addressed(false);
        assert!(matches!(logger(card).init(), Err(StorageError::NotBlockAddressed(_))));
    }

    #[test]
    fn test_init_without_card() {
        let mut card = MockCard::new(0);
        card.go_silent();
        assert_eq!(logger(card).init(), Err(StorageError::NoResponse(SdCommand::GoIdle)));
    }

    #[test]
    fn test_disabled_by_config() {
        let config = StorageConfig { enabled: false, ..Default::default() };
        let mut logger = BlockLogger::new(MockCard::new(0), config);
        assert_eq!(logger.init(), Err(StorageError::Disabled));
        assert_eq!(logger.bus().block_reads(), 0);
    }

    #[test]
    fn test_write_appends_blocks() {
        let mut card = MockCard::new(0);
        card.mark_used(4);
        card.set_busy_polls(3);
        let mut logger = logger(card);
        logger.init().unwrap();

        logger.write_cycle_record(&record(100)).unwrap();
        logger.write_cycle_record(&record(101)).unwrap();
        logger.finish_write().unwrap();
        assert_eq!(logger.cursor().next_block, 6);

        let card = logger.into_bus();
        let block: [u8; BLOCK_SIZE] = card.block(4);
        assert_eq!(SharedRecord::decode(&block).unwrap().loop_counter, 100);
        assert_eq!(SharedRecord::decode(&card.block(5)).unwrap().loop_counter, 101);
    }

    #[test]
    fn test_rejected_write_latches_off() {
        let mut card = MockCard::new(0);
        card.reject_writes();
        let mut logger = logger(card);
        logger.init().unwrap();

        let mut rec = record(1);
        logger.log_cycle(&mut rec);
        assert!(rec.has(status::STORAGE_DISABLED));
        assert!(!logger.is_enabled());
        assert_eq!(logger.cursor().next_block, 0);

        assert_eq!(logger.write_cycle_record(&record(2)), Err(StorageError::Disabled));
    }

    #[test]
    fn test_stuck_busy_latches_off() {
        let mut card = MockCard::new(0);
        card.stick_busy();
        let config = StorageConfig { busy_poll_limit: 50, ..Default::default() };
        let mut logger = BlockLogger::new(card, config);
        logger.init().unwrap();

        logger.write_cycle_record(&record(1)).unwrap();
        assert_eq!(logger.finish_write(), Err(StorageError::Busy(50)));
        assert!(!logger.is_enabled());
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut card = MockCard::new(0);
        card.mark_used(510);
        let mut logger = logger(card);
        assert_eq!(logger.init().unwrap().next_block, 510);

        logger.write_cycle_record(&record(1)).unwrap();
        assert!(logger.is_enabled());
        logger.write_cycle_record(&record(2)).unwrap();
        assert!(!logger.is_enabled());
        assert_eq!(logger.cursor().next_block, 512);

        let mut rec = record(3);
        logger.log_cycle(&mut rec);
        assert!(rec.has(status::STORAGE_DISABLED));
        assert_eq!(logger.bus().written_blocks(), 2);
    }

    #[test]
    fn test_programming_overlaps_next_cycle() {
        let mut card = MockCard::new(0);
        card.set_busy_polls(3);
        let mut logger = logger(card);
        logger.init().unwrap();

        let mut rec = record(1);
        logger.log_cycle(&mut rec);
        assert!(logger.bus().is_busy());

        let mut rec = record(2);
        logger.log_cycle(&mut rec);
        assert!(!rec.has(status::STORAGE_DISABLED));
        assert_eq!(logger.bus().written_blocks(), 2);

        logger.finish_write().unwrap();
        assert!(!logger.bus().is_busy());
    }

    #[test]
    fn test_busy_timeout_on_next_write_latches_off() {
        let mut card = MockCard::new(0);
        card.stick_busy();
        let config = StorageConfig { busy_poll_limit: 50, ..Default::default() };
        let mut logger = BlockLogger::new(card, config);
        logger.init().unwrap();

        let mut rec = record(1);
        logger.log_cycle(&mut rec);
        assert!(!rec.has(status::STORAGE_DISABLED));

        let mut rec = record(2);
        logger.log_cycle(&mut rec);
        assert!(rec.has(status::STORAGE_DISABLED));
        assert!(!logger.is_enabled());
        assert_eq!(logger.finish_write(), Ok(()));
    }

    /// `ceil(log2(capacity)) + 2`
    fn read_bound(capacity: u32) -> u32 {
        32 - (capacity - 1).leading_zeros() + 2
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_search_finds_boundary(
            (c_size, used) in (0u32..16).prop_flat_map(|c| (Just(c), 0..=(c + 1) * 512))
        ) {
            let mut card = MockCard::new(c_size);
            let capacity = card.capacity_blocks();
            card.mark_used(used);
            let mut logger = logger(card);
            let cursor = logger.init().unwrap();

            let expected = if used == capacity { 0 } else { used };
            prop_assert_eq!(cursor.next_block, expected);
            prop_assert_eq!(cursor.capacity_blocks, capacity);
            prop_assert!(logger.bus().block_reads() <= read_bound(capacity));
        }
    }
}
