//! The control cycle

use crate::{Board, MissionGate, MissionPhase, Peripherals, RoverConfig, StartSignal};
use block_storage::{BlockLogger, StorageCursor};
use cycle_scheduler::{CycleOutcome, CycleScheduler, OverrunFlag};
use encoder::EncoderCounter;
use gps_protocol::{GpsReceiver, LocalProjection, SentenceFramer, SentencePool};
use heading_sensor::HeadingSensor;
use mobility::{Channel, DriveController, PulseGenerator};
use navigation::{StateEstimator, Waypoint, WaypointGuidance};
use std::sync::Arc;
use telemetry::{Pose, SharedRecord};
use tracing::{debug, info, warn};

/// Summary of one completed cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub loop_counter: u32,
    /// Status bits as persisted for this cycle
    pub status: u32,
    pub phase: MissionPhase,
    pub outcome: CycleOutcome,
    pub pose: Pose,
    pub waypoint_index: usize,
}

/// Interrupt-side entry points.
///
/// Each method is what one interrupt vector calls; none of them block.
pub struct InterruptHandles<B: Board> {
    pub framer: SentenceFramer,
    pub encoder: Arc<EncoderCounter>,
    pub heading: Arc<HeadingSensor<B::CompassBus>>,
    pub pulses: Arc<PulseGenerator<B::PulseOutput>>,
    pub overrun: Arc<OverrunFlag>,
    pub start: Arc<StartSignal>,
}

impl<B: Board> InterruptHandles<B> {
    /// Serial receive
    pub fn on_serial_byte(&mut self, byte: u8) {
        self.framer.on_byte(byte);
    }

    /// Pin change on either encoder phase
    pub fn on_encoder_edge(&self, sample: u8) {
        self.encoder.on_edge(sample);
    }

    /// Two-wire bus operation complete
    pub fn on_compass_bus(&self) {
        self.heading.on_bus_event();
    }

    /// Pulse compare match
    pub fn on_compare_match(&self, channel: Channel) {
        self.pulses.on_compare_match(channel);
    }

    /// Cycle counter overflow
    pub fn on_timer_overflow(&self) {
        self.overrun.on_overflow();
    }

    /// Operator start button
    pub fn on_start_button(&self) {
        self.start.press();
    }
}

/// The vehicle: every component plus the shared record
pub struct Rover<B: Board> {
    scheduler: CycleScheduler<B::Timer>,
    gps: GpsReceiver,
    heading: Arc<HeadingSensor<B::CompassBus>>,
    encoder: Arc<EncoderCounter>,
    estimator: StateEstimator,
    guidance: WaypointGuidance<'static>,
    drive: DriveController,
    pulses: Arc<PulseGenerator<B::PulseOutput>>,
    logger: BlockLogger<B::StorageBus>,
    mission: MissionGate,
    start: Arc<StartSignal>,
    record: SharedRecord,
}

impl<B: Board> Rover<B> {
    /// Build the stack over `waypoints` and split off the interrupt handles
    pub fn new(
        config: &RoverConfig,
        peripherals: Peripherals<B>,
        waypoints: &'static [Waypoint],
    ) -> (Self, InterruptHandles<B>) {
        let (pool, framer) = SentencePool::with_framer();
        let heading = Arc::new(HeadingSensor::new(peripherals.compass_bus, &config.heading));
        let encoder = Arc::new(EncoderCounter::new(&config.encoder));
        let pulses = Arc::new(PulseGenerator::new(peripherals.pulse_output, &config.mobility));
        let start = Arc::new(StartSignal::new());
        let scheduler = CycleScheduler::new(peripherals.timer, config.scheduler.clone());

        let handles = InterruptHandles {
            framer,
            encoder: encoder.clone(),
            heading: heading.clone(),
            pulses: pulses.clone(),
            overrun: scheduler.overrun_flag(),
            start: start.clone(),
        };

        let rover = Self {
            mission: MissionGate::new(&config.mission, config.scheduler.loop_hz()),
            scheduler,
            gps: GpsReceiver::new(pool, LocalProjection::new(&config.projection)),
            heading,
            encoder,
            estimator: StateEstimator::new(config.estimator.clone()),
            guidance: WaypointGuidance::new(waypoints),
            drive: DriveController::new(config.mobility.clone()),
            pulses,
            logger: BlockLogger::new(peripherals.storage_bus, config.storage.clone()),
            start,
            record: SharedRecord::new(),
        };
        (rover, handles)
    }

    /// One-time bring-up: storage, the neutral pulse run, first heading read
    pub fn start_up(&mut self) -> Option<StorageCursor> {
        info!("Starting control stack with {} waypoints", self.guidance.waypoint_count());
        let cursor = self.logger.init().ok();

        let config = self.drive.config().clone();
        let scheduler = &mut self.scheduler;
        scheduler.begin_cycle();
        self.pulses.startup_neutral(&config, || {
            scheduler.wait_for_cycle_boundary();
            scheduler.begin_cycle();
        });
        self.scheduler.wait_for_cycle_boundary();

        if let Err(e) = self.heading.begin_reading() {
            debug!("Heading read not started: {}", e);
        }
        cursor
    }

    /// Run one control cycle in its fixed order: acquisition, estimation,
    /// guidance, actuation, logging, then the wait for the period boundary.
    pub fn run_cycle(&mut self) -> CycleReport {
        let carried = self.scheduler.begin_cycle();
        self.record.begin_cycle();
        self.record.raise(carried);
        self.pulses.emit(self.drive.steering_us(), self.drive.throttle_us());

        self.gps.update(&mut self.record);
        self.heading.update(&mut self.record);
        self.encoder.update(&mut self.record);

        let started = self.start.is_set();
        self.estimator.update(&mut self.record, started);
        let guidance = self.guidance.update(&mut self.record);

        let phase = self.mission.phase(self.record.loop_counter, started);
        match phase {
            MissionPhase::Holding => self.drive.neutral(),
            MissionPhase::Running => {
                self.drive.apply(guidance.throttle);
                self.drive.steer_to(guidance.target_angle);
            }
            MissionPhase::Finished => {
                self.drive.stop();
                self.drive.steer_to(0.0);
            }
        }
        self.record.guidance.throttle_target_us =
            self.drive.config().throttle_pulse(guidance.throttle);
        self.record.actuators = self.drive.actuator_state();

        // The card programs this block through the boundary wait; the next
        // write waits for it.
        self.logger.log_cycle(&mut self.record);

        let report = CycleReport {
            loop_counter: self.record.loop_counter,
            status: self.record.status,
            phase,
            outcome: self.scheduler.wait_for_cycle_boundary(),
            pose: self.record.pose,
            waypoint_index: self.guidance.index(),
        };
        debug!("Cycle {} done: {:?}", report.loop_counter, report.outcome);
        report
    }

    pub fn record(&self) -> &SharedRecord {
        &self.record
    }

    pub fn drive(&self) -> &DriveController {
        &self.drive
    }

    pub fn logger(&self) -> &BlockLogger<B::StorageBus> {
        &self.logger
    }

    pub fn scheduler(&self) -> &CycleScheduler<B::Timer> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut CycleScheduler<B::Timer> {
        &mut self.scheduler
    }

    /// Shut down and hand back the storage bus once the last block is programmed
    pub fn into_storage_bus(mut self) -> B::StorageBus {
        if let Err(e) = self.logger.finish_write() {
            warn!("Last block did not finish programming: {}", e);
        }
        self.logger.into_bus()
    }
}
