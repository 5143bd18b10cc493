//! Host simulation board
//!
//! Drives the full control stack against the mock peripherals and a
//! simple kinematic vehicle, feeding GGA fixes, encoder edges and compass
//! readings back through the interrupt handles.

use crate::{Board, CycleReport, InterruptHandles, Peripherals, Rover, RoverConfig};
use block_storage::{MockCard, StorageCursor};
use cycle_scheduler::MockTimer;
use gps_protocol::LocalProjection;
use heading_sensor::MockCompassBus;
use mobility::{MobilityConfig, MockPulseHardware};
use navigation::WAYPOINTS;
use telemetry::ActuatorState;
use tracing::debug;

/// Counter ticks the mock timer advances per read
const TIMER_STEP: u32 = 125;

/// Ground speed at full forward throttle (m/s)
const FULL_SPEED_MPS: f32 = 5.0;

/// Curvature at full steering travel (1/m)
const FULL_CURVATURE: f32 = 0.25;

/// Throttle offset from neutral giving full speed
const FULL_THROTTLE_SPAN_US: f32 = 500.0;

/// Encoder phase levels for forward rotation
const FORWARD_PHASES: [u8; 4] = [0b00, 0b10, 0b11, 0b01];

/// Peripherals backed by the in-memory mocks
pub struct SimBoard;

impl Board for SimBoard {
    type Timer = MockTimer;
    type CompassBus = MockCompassBus;
    type StorageBus = MockCard;
    type PulseOutput = MockPulseHardware;
}

/// Kinematic bicycle-style vehicle.
///
/// Heading is a math angle (radians, counter-clockwise from +x). A
/// steering pulse below neutral turns toward increasing heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimVehicle {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    phase: usize,
    /// Distance travelled but not yet reported as a whole tick
    remainder_m: f32,
}

impl SimVehicle {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self {
            x,
            y,
            heading,
            phase: 0,
            remainder_m: 0.0,
        }
    }

    /// Phase levels before the first edge
    pub fn encoder_sample(&self) -> u8 {
        FORWARD_PHASES[self.phase]
    }

    /// Compass register value in tenths of a degree
    pub fn compass_tenths(&self) -> u16 {
        let degrees = self.heading.to_degrees().rem_euclid(360.0);
        ((degrees * 10.0).round() as u16).min(3599)
    }

    /// Advance by `dt` seconds under `actuators`; returns the encoder
    /// samples produced, in order
    pub fn step(
        &mut self,
        actuators: &ActuatorState,
        mobility: &MobilityConfig,
        dt: f32,
        meters_per_tick: f32,
    ) -> Vec<u8> {
        let throttle = f32::from(actuators.throttle_us) - f32::from(mobility.throttle_neutral_us);
        let speed = throttle / FULL_THROTTLE_SPAN_US * FULL_SPEED_MPS;

        let neutral = f32::from(mobility.steering_neutral_us);
        let span = (neutral - f32::from(mobility.steering_min_us)).abs().max(1.0);
        let curvature = (neutral - f32::from(actuators.steering_us)) / span * FULL_CURVATURE;

        let distance = speed * dt;
        self.heading += distance * curvature;
        self.x += self.heading.cos() * distance;
        self.y += self.heading.sin() * distance;

        if meters_per_tick <= 0.0 {
            return Vec::new();
        }
        let travelled = self.remainder_m + distance;
        let ticks = (travelled / meters_per_tick).trunc();
        self.remainder_m = travelled - ticks * meters_per_tick;

        let forward = ticks >= 0.0;
        (0..ticks.abs() as u32)
            .map(|_| {
                self.phase = if forward { (self.phase + 1) % 4 } else { (self.phase + 3) % 4 };
                FORWARD_PHASES[self.phase]
            })
            .collect()
    }
}

/// A `$GPGGA` sentence with a valid fix at signed decimal degrees
pub fn gga_sentence(latitude_deg: f64, longitude_deg: f64, time_s: f64) -> String {
    let seconds = time_s.rem_euclid(86_400.0);
    let hours = (seconds / 3600.0).trunc();
    let minutes = ((seconds - hours * 3600.0) / 60.0).trunc();
    let secs = seconds - hours * 3600.0 - minutes * 60.0;

    let lat = latitude_deg.abs();
    let lon = longitude_deg.abs();
    let body = format!(
        "$GPGGA,{:02}{:02}{:05.2},{:02}{:07.4},{},{:03}{:07.4},{},1,08,0.9,1609.3,M,-20.0,M,,",
        hours as u32,
        minutes as u32,
        secs,
        lat.trunc() as u32,
        lat.fract() * 60.0,
        if latitude_deg < 0.0 { 'S' } else { 'N' },
        lon.trunc() as u32,
        lon.fract() * 60.0,
        if longitude_deg < 0.0 { 'W' } else { 'E' },
    );
    let mut line = body.into_bytes();
    line.push(b'*');
    let sum = gps_protocol::checksum(&line).map(|(acc, _)| acc).unwrap_or(0);
    format!("{}{:02X}\r\n", String::from_utf8_lossy(&line), sum)
}

/// The control stack on [`SimBoard`] plus the world around it
pub struct Simulation {
    rover: Rover<SimBoard>,
    handles: InterruptHandles<SimBoard>,
    vehicle: SimVehicle,
    projection: LocalProjection,
    mobility: MobilityConfig,
    meters_per_tick: f32,
    cycle_s: f32,
    gps_every: u32,
    elapsed_s: f64,
}

impl Simulation {
    pub fn new(config: &RoverConfig, card: MockCard) -> Self {
        let peripherals = Peripherals::<SimBoard> {
            timer: MockTimer::new(TIMER_STEP),
            compass_bus: MockCompassBus::new(config.heading.address),
            storage_bus: card,
            pulse_output: MockPulseHardware::new(),
        };
        let (mut rover, handles) = Rover::new(config, peripherals, &WAYPOINTS);
        rover
            .scheduler_mut()
            .timer_mut()
            .attach_overflow(handles.overrun.clone());

        let est = &config.estimator;
        let vehicle = SimVehicle::new(est.initial_x, est.initial_y, est.initial_heading_deg.to_radians());
        handles.encoder.prime(vehicle.encoder_sample());

        let loop_hz = config.scheduler.loop_hz();
        Self {
            rover,
            handles,
            vehicle,
            projection: LocalProjection::new(&config.projection),
            mobility: config.mobility.clone(),
            meters_per_tick: est.meters_per_tick,
            cycle_s: 1.0 / loop_hz,
            gps_every: loop_hz.round().max(1.0) as u32,
            elapsed_s: 0.0,
        }
    }

    /// Operator presses the start button
    pub fn press_start(&self) {
        self.handles.on_start_button();
    }

    pub fn start_up(&mut self) -> Option<StorageCursor> {
        self.handles.heading.bus().set_heading_tenths(self.vehicle.compass_tenths());
        let cursor = self.rover.start_up();
        self.handles.pulses.complete_pulses();
        self.handles.heading.complete_transfer();
        cursor
    }

    /// One control cycle, then one period of the world
    pub fn step(&mut self) -> CycleReport {
        let report = self.rover.run_cycle();
        self.handles.pulses.complete_pulses();

        let actuators = self.rover.record().actuators;
        let samples = self
            .vehicle
            .step(&actuators, &self.mobility, self.cycle_s, self.meters_per_tick);
        for sample in samples {
            self.handles.on_encoder_edge(sample);
        }

        self.handles.heading.bus().set_heading_tenths(self.vehicle.compass_tenths());
        self.handles.heading.complete_transfer();

        self.elapsed_s += f64::from(self.cycle_s);
        if report.loop_counter % self.gps_every == 0 {
            let (lat, lon) = self.projection.unproject(self.vehicle.x, self.vehicle.y);
            let sentence = gga_sentence(lat, lon, self.elapsed_s);
            debug!("Feeding {}", sentence.trim_end());
            for byte in sentence.bytes() {
                self.handles.on_serial_byte(byte);
            }
        }
        report
    }

    pub fn vehicle(&self) -> &SimVehicle {
        &self.vehicle
    }

    pub fn rover(&self) -> &Rover<SimBoard> {
        &self.rover
    }

    /// End the run and hand back the card
    pub fn finish(self) -> MockCard {
        self.rover.into_storage_bus()
    }
}
