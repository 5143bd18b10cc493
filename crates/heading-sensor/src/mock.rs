//! Simulated compass module on a two-wire bus

use crate::{BusStatus, HeadingSensor, TwoWireBus};
use std::sync::Mutex;

const REGISTER_COUNT: usize = 6;
const IDLE_STATUS: u8 = 0xF8;

#[derive(Debug)]
struct MockState {
    status: u8,
    data: u8,
    held: bool,
    expect_address: bool,
    pointer: usize,
    registers: [u8; REGISTER_COUNT],
    connected: bool,
    interrupt: bool,
    stopped: bool,
}

/// Bus controller with a compass module attached.
///
/// Register map: 0 version, 1 8-bit bearing, 2..3 16-bit bearing in
/// tenths of a degree (big-endian), 4 pitch, 5 roll.
#[derive(Debug)]
pub struct MockCompassBus {
    address: u8,
    state: Mutex<MockState>,
}

impl MockCompassBus {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            state: Mutex::new(MockState {
                status: IDLE_STATUS,
                data: 0,
                held: false,
                expect_address: false,
                pointer: 0,
                registers: [0x11, 0, 0, 0, 0, 0],
                connected: true,
                interrupt: false,
                stopped: false,
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    pub fn set_heading_tenths(&self, tenths: u16) {
        self.with(|s| {
            let [high, low] = tenths.to_be_bytes();
            s.registers[1] = (u32::from(tenths) * 255 / 3600) as u8;
            s.registers[2] = high;
            s.registers[3] = low;
        });
    }

    /// Device stops answering its address
    pub fn disconnect(&self) {
        self.with(|s| s.connected = false);
    }

    pub fn reconnect(&self) {
        self.with(|s| s.connected = true);
    }

    /// Consume a pending bus-completion interrupt
    pub fn take_interrupt(&self) -> bool {
        self.with(|s| std::mem::take(&mut s.interrupt))
    }

    /// A stop condition was sent since the last start
    pub fn stopped(&self) -> bool {
        self.with(|s| s.stopped)
    }

    fn complete(s: &mut MockState, status: u8) {
        s.status = status;
        s.interrupt = true;
    }
}

impl TwoWireBus for MockCompassBus {
    fn status(&self) -> BusStatus {
        BusStatus::from_code(self.with(|s| s.status))
    }

    fn start(&self) {
        self.with(|s| {
            let status = if s.held { 0x10 } else { 0x08 };
            s.held = true;
            s.expect_address = true;
            s.stopped = false;
            Self::complete(s, status);
        });
    }

    fn stop(&self) {
        self.with(|s| {
            s.held = false;
            s.stopped = true;
            s.status = IDLE_STATUS;
        });
    }

    fn write(&self, byte: u8) {
        let address = self.address;
        self.with(|s| {
            let status = if s.expect_address {
                s.expect_address = false;
                let read = byte & 1 == 1;
                match (s.connected && byte >> 1 == address, read) {
                    (true, false) => 0x18,
                    (true, true) => 0x40,
                    (false, false) => 0x20,
                    (false, true) => 0x48,
                }
            } else {
                s.pointer = usize::from(byte);
                0x28
            };
            Self::complete(s, status);
        });
    }

    fn read(&self, ack: bool) {
        self.with(|s| {
            s.data = s.registers.get(s.pointer).copied().unwrap_or(0xFF);
            s.pointer += 1;
            Self::complete(s, if ack { 0x50 } else { 0x58 });
        });
    }

    fn data(&self) -> u8 {
        self.with(|s| s.data)
    }
}

impl HeadingSensor<MockCompassBus> {
    /// Service bus interrupts until the transfer stops producing them
    pub fn complete_transfer(&self) {
        for _ in 0..16 {
            if !self.bus().take_interrupt() {
                break;
            }
            self.on_bus_event();
        }
    }
}
