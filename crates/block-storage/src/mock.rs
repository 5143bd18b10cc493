//! Simulated SD card speaking the SPI-mode protocol

use crate::protocol::{
    CSD_LEN, DATA_ACCEPTED, DATA_TOKEN, FILL, R1_IDLE, R1_READY,
};
use crate::{ClockRate, SpiBus};
use std::collections::{BTreeMap, VecDeque};
use telemetry::{BLOCK_SIZE, GUARD_PREFIX_BYTES};

const ILLEGAL_COMMAND: u8 = 0x04;
const CRC_ERROR: u8 = 0x08;
const ADDRESS_ERROR: u8 = 0x20;
/// Data response: write error
const DATA_WRITE_ERROR: u8 = 0x0D;
/// Clock bytes the card needs with chip select released after power-up
const POWER_UP_BYTES: u32 = 10;

#[derive(Debug)]
enum Receive {
    /// Assembling a six-byte command
    Command(Vec<u8>),
    /// CMD24 accepted, waiting for the start token
    WriteToken(u32),
    WriteData(u32, Vec<u8>),
}

/// In-memory SD card.
///
/// Unwritten blocks read as zeros. Responses are delayed by one byte, as
/// real cards do, so the host's polling is exercised.
#[derive(Debug)]
pub struct MockCard {
    c_size: u32,
    blocks: BTreeMap<u32, Box<[u8; BLOCK_SIZE]>>,
    selected: bool,
    clock: ClockRate,
    power_up_clocks: u32,
    idle: bool,
    app_command: bool,
    op_cond_polls: u32,
    block_addressed: bool,
    receive: Receive,
    outgoing: VecDeque<u8>,
    block_reads: u32,
    written_blocks: u32,
    failing_command: Option<u8>,
    silent: bool,
    reject_writes: bool,
    busy_polls: u32,
    stuck_busy: bool,
}

impl MockCard {
    /// Blank card of `(c_size + 1) * 512` blocks
    pub fn new(c_size: u32) -> Self {
        Self {
            c_size: c_size & 0x003F_FFFF,
            blocks: BTreeMap::new(),
            selected: false,
            clock: ClockRate::Slow,
            power_up_clocks: 0,
            idle: false,
            app_command: false,
            op_cond_polls: 3,
            block_addressed: true,
            receive: Receive::Command(Vec::new()),
            outgoing: VecDeque::new(),
            block_reads: 0,
            written_blocks: 0,
            failing_command: None,
            silent: false,
            reject_writes: false,
            busy_polls: 2,
            stuck_busy: false,
        }
    }

    /// Card holding a raw image; a trailing partial block is zero-filled
    pub fn from_image(c_size: u32, image: &[u8]) -> Self {
        let mut card = Self::new(c_size);
        for (index, chunk) in image.chunks(BLOCK_SIZE).enumerate() {
            let mut block = Box::new([0u8; BLOCK_SIZE]);
            block[..chunk.len()].copy_from_slice(chunk);
            card.blocks.insert(index as u32, block);
        }
        card
    }

    /// Raw image up to the highest stored block
    pub fn image(&self) -> Vec<u8> {
        let Some((&last, _)) = self.blocks.last_key_value() else {
            return Vec::new();
        };
        let mut image = Vec::with_capacity((last as usize + 1) * BLOCK_SIZE);
        for index in 0..=last {
            image.extend_from_slice(&self.block(index));
        }
        image
    }

    pub fn capacity_blocks(&self) -> u32 {
        (self.c_size + 1) * 512
    }

    pub fn block(&self, index: u32) -> [u8; BLOCK_SIZE] {
        self.blocks.get(&index).map_or([0u8; BLOCK_SIZE], |b| **b)
    }

    /// Stamp the guard prefix on blocks `0..count`, as earlier runs would
    pub fn mark_used(&mut self, count: u32) {
        for index in 0..count.min(self.capacity_blocks()) {
            let block = self.blocks.entry(index).or_insert_with(|| Box::new([0u8; BLOCK_SIZE]));
            block[..GUARD_PREFIX_BYTES.len()].copy_from_slice(&GUARD_PREFIX_BYTES);
        }
    }

    pub fn block_reads(&self) -> u32 {
        self.block_reads
    }

    /// Blocks accepted since power-up
    pub fn written_blocks(&self) -> u32 {
        self.written_blocks
    }

    pub fn clock(&self) -> ClockRate {
        self.clock
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// ACMD41 requests answered "idle" before the card is ready
    pub fn set_op_cond_polls(&mut self, polls: u32) {
        self.op_cond_polls = polls;
    }

    /// Clear to model a standard-capacity, byte-addressed card
    pub fn set_block_addressed(&mut self, block_addressed: bool) {
        self.block_addressed = block_addressed;
    }

    /// Answer this command index with "illegal command"
    pub fn fail_command(&mut self, index: u8) {
        self.failing_command = Some(index);
    }

    /// Stop answering anything, as with no card in the socket
    pub fn go_silent(&mut self) {
        self.silent = true;
    }

    pub fn reject_writes(&mut self) {
        self.reject_writes = true;
    }

    /// Busy bytes sent after each accepted write
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Still programming the last written block
    pub fn is_busy(&self) -> bool {
        self.outgoing.iter().any(|&byte| byte == 0x00)
    }

    /// Never release busy after a write
    pub fn stick_busy(&mut self) {
        self.stuck_busy = true;
    }

    fn r1(&self) -> u8 {
        if self.idle {
            R1_IDLE
        } else {
            R1_READY
        }
    }

    fn respond(&mut self, bytes: &[u8]) {
        self.outgoing.push_back(FILL);
        self.outgoing.extend(bytes);
    }

    fn csd(&self) -> [u8; CSD_LEN] {
        let mut csd = [0u8; CSD_LEN];
        csd[0] = 0x40;
        csd[7] = ((self.c_size >> 16) & 0x3F) as u8;
        csd[8] = (self.c_size >> 8) as u8;
        csd[9] = self.c_size as u8;
        csd
    }

    fn execute(&mut self, frame: &[u8]) {
        let index = frame[0] & 0x3F;
        let argument = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        let trailer = frame[5];
        let app_command = std::mem::take(&mut self.app_command);

        if self.silent || self.power_up_clocks < POWER_UP_BYTES {
            return;
        }
        if self.failing_command == Some(index) {
            let r1 = self.r1() | ILLEGAL_COMMAND;
            self.respond(&[r1]);
            return;
        }

        match index {
            0x00 => {
                if trailer != 0x95 {
                    self.respond(&[R1_IDLE | CRC_ERROR]);
                    return;
                }
                self.idle = true;
                self.respond(&[R1_IDLE]);
            }
            0x08 => {
                if trailer != 0x87 {
                    self.respond(&[self.r1() | CRC_ERROR]);
                    return;
                }
                let [_, _, voltage, pattern] = argument.to_be_bytes();
                self.respond(&[self.r1(), 0x00, 0x00, voltage & 0x0F, pattern]);
            }
            0x37 => {
                self.app_command = true;
                self.respond(&[self.r1()]);
            }
            0x29 if app_command => {
                if self.op_cond_polls > 0 {
                    self.op_cond_polls -= 1;
                } else {
                    self.idle = false;
                }
                self.respond(&[self.r1()]);
            }
            0x3A => {
                let first = if self.block_addressed { 0xC0 } else { 0x80 };
                self.respond(&[self.r1(), first, 0xFF, 0x80, 0x00]);
            }
            0x09 if !self.idle => {
                let mut reply = vec![R1_READY, FILL, DATA_TOKEN];
                reply.extend_from_slice(&self.csd());
                reply.extend_from_slice(&[0xFF, 0xFF]);
                self.respond(&reply);
            }
            0x11 if !self.idle => {
                if argument >= self.capacity_blocks() {
                    self.respond(&[ADDRESS_ERROR]);
                    return;
                }
                self.block_reads += 1;
                let mut reply = vec![R1_READY, FILL, DATA_TOKEN];
                reply.extend_from_slice(&self.block(argument));
                reply.extend_from_slice(&[0xFF, 0xFF]);
                self.respond(&reply);
            }
            0x18 if !self.idle => {
                if argument >= self.capacity_blocks() {
                    self.respond(&[ADDRESS_ERROR]);
                    return;
                }
                self.respond(&[R1_READY]);
                self.receive = Receive::WriteToken(argument);
            }
            _ => {
                let r1 = self.r1() | ILLEGAL_COMMAND;
                self.respond(&[r1]);
            }
        }
    }

    fn receive(&mut self, byte: u8) {
        match std::mem::replace(&mut self.receive, Receive::Command(Vec::new())) {
            Receive::Command(mut frame) => {
                if frame.is_empty() && byte & 0xC0 != 0x40 {
                    return;
                }
                frame.push(byte);
                if frame.len() == 6 {
                    self.execute(&frame);
                } else {
                    self.receive = Receive::Command(frame);
                }
            }
            Receive::WriteToken(block) => {
                self.receive = if byte == DATA_TOKEN {
                    Receive::WriteData(block, Vec::with_capacity(BLOCK_SIZE + 2))
                } else {
                    Receive::WriteToken(block)
                };
            }
            Receive::WriteData(block, mut data) => {
                data.push(byte);
                if data.len() < BLOCK_SIZE + 2 {
                    self.receive = Receive::WriteData(block, data);
                    return;
                }
                if self.reject_writes {
                    self.outgoing.push_back(0xE0 | DATA_WRITE_ERROR);
                    return;
                }
                let mut stored = Box::new([0u8; BLOCK_SIZE]);
                stored.copy_from_slice(&data[..BLOCK_SIZE]);
                self.blocks.insert(block, stored);
                self.written_blocks += 1;
                self.outgoing.push_back(0xE0 | DATA_ACCEPTED);
                let busy = if self.stuck_busy { u32::MAX } else { self.busy_polls };
                // Bounded so a stuck card cannot exhaust memory.
                for _ in 0..busy.min(1 << 20) {
                    self.outgoing.push_back(0x00);
                }
            }
        }
    }
}

impl SpiBus for MockCard {
    fn exchange(&mut self, byte: u8) -> u8 {
        if !self.selected {
            self.power_up_clocks = self.power_up_clocks.saturating_add(1);
            return FILL;
        }
        let out = self.outgoing.pop_front().unwrap_or(FILL);
        self.receive(byte);
        out
    }

    fn select(&mut self) {
        self.selected = true;
    }

    fn deselect(&mut self) {
        self.selected = false;
    }

    fn set_clock(&mut self, rate: ClockRate) {
        self.clock = rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SdCommand;

    fn send(card: &mut MockCard, command: SdCommand) -> Vec<u8> {
        for byte in command.frame() {
            card.exchange(byte);
        }
        (0..3).map(|_| card.exchange(FILL)).collect()
    }

    #[test]
    fn test_needs_power_up_clocks() {
        let mut card = MockCard::new(0);
        card.select();
        assert_eq!(send(&mut card, SdCommand::GoIdle), vec![FILL; 3]);

        card.deselect();
        for _ in 0..10 {
            card.exchange(FILL);
        }
        card.select();
        assert_eq!(send(&mut card, SdCommand::GoIdle)[..2], [FILL, R1_IDLE]);
    }

    #[test]
    fn test_image_round_trip() {
        let mut card = MockCard::new(0);
        card.mark_used(3);
        let image = card.image();
        assert_eq!(image.len(), 3 * BLOCK_SIZE);

        let reloaded = MockCard::from_image(0, &image);
        assert_eq!(reloaded.block(2)[..4], GUARD_PREFIX_BYTES);
        assert_eq!(reloaded.block(3), [0u8; BLOCK_SIZE]);
    }
}
