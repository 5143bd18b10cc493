//! Heading transfer state machine

use crate::{BusStatus, SensorError, TwoWireBus, ERROR_READING, PENDING_READING};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};
use telemetry::{status, SharedRecord};
use tracing::debug;

/// Bus configuration of the compass module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingSensorConfig {
    /// 7-bit device address
    pub address: u8,
    /// First of the two big-endian heading registers
    pub heading_register: u8,
}

impl Default for HeadingSensorConfig {
    fn default() -> Self {
        Self {
            address: 0x60,
            heading_register: 2,
        }
    }
}

/// Where the current transfer stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferState {
    /// No transfer, or a start has been issued
    Idle,
    AddressedForWrite,
    RegisterSent,
    RepeatStart,
    AddressedForRead,
    ReadingHighByte,
    HighByteReceived,
    Done,
    Failed,
}

impl TransferState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TransferState::Idle,
            1 => TransferState::AddressedForWrite,
            2 => TransferState::RegisterSent,
            3 => TransferState::RepeatStart,
            4 => TransferState::AddressedForRead,
            5 => TransferState::ReadingHighByte,
            6 => TransferState::HighByteReceived,
            7 => TransferState::Done,
            _ => TransferState::Failed,
        }
    }
}

/// Result of one main-loop poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingPoll {
    /// Transfer still in flight (or just started)
    Pending,
    /// Heading in tenths of a degree
    Ready(u16),
    /// Last transfer aborted
    Error,
}

/// One-reading-in-flight heading driver.
///
/// [`HeadingSensor::on_bus_event`] runs in the bus interrupt;
/// [`HeadingSensor::poll`] runs once per cycle in the main loop.
pub struct HeadingSensor<B: TwoWireBus> {
    bus: B,
    address: u8,
    register: u8,
    state: AtomicU8,
    high_byte: AtomicU8,
    reading: AtomicU16,
    active: AtomicBool,
    ready: AtomicBool,
    error: AtomicBool,
}

impl<B: TwoWireBus> HeadingSensor<B> {
    pub fn new(bus: B, config: &HeadingSensorConfig) -> Self {
        Self {
            bus,
            address: config.address,
            register: config.heading_register,
            state: AtomicU8::new(TransferState::Idle as u8),
            high_byte: AtomicU8::new(0),
            reading: AtomicU16::new(PENDING_READING),
            active: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            error: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> TransferState {
        TransferState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// A transfer is in flight
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Start a new transfer. Only valid while no transfer is in flight.
    pub fn begin_reading(&self) -> Result<(), SensorError> {
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(SensorError::Busy);
        }
        self.ready.store(false, Ordering::Release);
        self.error.store(false, Ordering::Release);
        self.reading.store(PENDING_READING, Ordering::Release);
        self.set_state(TransferState::Idle);
        self.bus.start();
        Ok(())
    }

    /// Main loop: collect the previous result and rearm
    pub fn poll(&self) -> HeadingPoll {
        if self.is_busy() {
            return HeadingPoll::Pending;
        }

        let result = if self.ready.load(Ordering::Acquire) {
            HeadingPoll::Ready(self.reading.load(Ordering::Acquire))
        } else if self.error.load(Ordering::Acquire) {
            HeadingPoll::Error
        } else {
            HeadingPoll::Pending
        };

        if let Err(e) = self.begin_reading() {
            debug!("Heading rearm skipped: {}", e);
        }
        result
    }

    /// Main loop: poll and fold the outcome into the record
    pub fn update(&self, record: &mut SharedRecord) {
        match self.poll() {
            HeadingPoll::Ready(raw) => {
                let degrees = f32::from(raw) / 10.0;
                record.compass.raw = raw;
                record.compass.degrees = degrees;
                record.compass.radians = degrees.to_radians();
                record.raise(status::COMPASS_VALID);
            }
            HeadingPoll::Error => {
                record.compass.raw = ERROR_READING;
                record.raise(status::COMPASS_ERROR);
            }
            HeadingPoll::Pending => {}
        }
    }

    /// Interrupt context: advance the transfer by exactly one bus operation
    pub fn on_bus_event(&self) {
        let status = self.bus.status();
        let next = match (self.state(), status) {
            (TransferState::Idle, BusStatus::Start) => {
                self.bus.write(self.address << 1);
                TransferState::AddressedForWrite
            }
            (TransferState::AddressedForWrite, BusStatus::AddressWriteAck) => {
                self.bus.write(self.register);
                TransferState::RegisterSent
            }
            (TransferState::RegisterSent, BusStatus::DataWriteAck) => {
                self.bus.start();
                TransferState::RepeatStart
            }
            (TransferState::RepeatStart, BusStatus::RepeatedStart) => {
                self.bus.write(self.address << 1 | 1);
                TransferState::AddressedForRead
            }
            (TransferState::AddressedForRead, BusStatus::AddressReadAck) => {
                self.bus.read(true);
                TransferState::ReadingHighByte
            }
            (TransferState::ReadingHighByte, BusStatus::DataReadAck) => {
                self.high_byte.store(self.bus.data(), Ordering::Relaxed);
                self.bus.read(false);
                TransferState::HighByteReceived
            }
            (TransferState::HighByteReceived, BusStatus::DataReadNack) => {
                let high = self.high_byte.load(Ordering::Relaxed);
                let low = self.bus.data();
                self.bus.stop();
                self.reading.store(u16::from_be_bytes([high, low]), Ordering::Release);
                self.ready.store(true, Ordering::Release);
                self.finish(TransferState::Done);
                return;
            }
            _ => {
                self.bus.stop();
                self.reading.store(ERROR_READING, Ordering::Release);
                self.error.store(true, Ordering::Release);
                self.finish(TransferState::Failed);
                return;
            }
        };
        self.set_state(next);
    }

    fn set_state(&self, state: TransferState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn finish(&self, state: TransferState) {
        self.set_state(state);
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockCompassBus;

    fn sensor(heading_tenths: u16) -> HeadingSensor<MockCompassBus> {
        let bus = MockCompassBus::new(0x60);
        bus.set_heading_tenths(heading_tenths);
        HeadingSensor::new(bus, &HeadingSensorConfig::default())
    }

    #[test]
    fn test_first_poll_starts_transfer() {
        let sensor = sensor(1234);
        assert_eq!(sensor.poll(), HeadingPoll::Pending);
        assert!(sensor.is_busy());
        assert_eq!(sensor.poll(), HeadingPoll::Pending);
    }

    #[test]
    fn test_full_transfer_walks_states() {
        let sensor = sensor(3599);
        sensor.begin_reading().unwrap();

        let expected = [
            TransferState::AddressedForWrite,
            TransferState::RegisterSent,
            TransferState::RepeatStart,
            TransferState::AddressedForRead,
            TransferState::ReadingHighByte,
            TransferState::HighByteReceived,
            TransferState::Done,
        ];
        for state in expected {
            assert!(sensor.bus().take_interrupt());
            sensor.on_bus_event();
            assert_eq!(sensor.state(), state);
        }
        assert!(!sensor.bus().take_interrupt());
        assert_eq!(sensor.poll(), HeadingPoll::Ready(3599));
    }

    #[test]
    fn test_ready_rearms_immediately() {
        let sensor = sensor(900);
        sensor.poll();
        sensor.complete_transfer();
        assert_eq!(sensor.poll(), HeadingPoll::Ready(900));
        assert!(sensor.is_busy());

        sensor.bus().set_heading_tenths(901);
        sensor.complete_transfer();
        assert_eq!(sensor.poll(), HeadingPoll::Ready(901));
    }

    #[test]
    fn test_missing_device_aborts() {
        let sensor = sensor(900);
        sensor.bus().disconnect();
        sensor.poll();
        sensor.complete_transfer();

        assert_eq!(sensor.state(), TransferState::Failed);
        assert!(sensor.bus().stopped());
        assert_eq!(sensor.poll(), HeadingPoll::Error);
        assert!(sensor.is_busy());
    }

    #[test]
    fn test_begin_while_busy_rejected() {
        let sensor = sensor(0);
        sensor.begin_reading().unwrap();
        assert_eq!(sensor.begin_reading(), Err(SensorError::Busy));
    }

    #[test]
    fn test_update_converts_units() {
        let sensor = sensor(1800);
        let mut record = SharedRecord::new();
        sensor.update(&mut record);
        sensor.complete_transfer();
        sensor.update(&mut record);

        assert!(record.has(status::COMPASS_VALID));
        assert_eq!(record.compass.raw, 1800);
        assert_eq!(record.compass.degrees, 180.0);
        assert!((record.compass.radians - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn test_update_records_error_sentinel() {
        let sensor = sensor(1800);
        sensor.bus().disconnect();
        let mut record = SharedRecord::new();
        sensor.update(&mut record);
        sensor.complete_transfer();
        sensor.update(&mut record);

        assert!(record.has(status::COMPASS_ERROR));
        assert_eq!(record.compass.raw, ERROR_READING);
    }
}
