//! Throttle and steering state machine

use crate::MobilityConfig;
use serde::{Deserialize, Serialize};
use telemetry::ActuatorState;
use tracing::debug;

/// Throttle speed classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedClass {
    Creep,
    Cruise,
    Ludicrous,
}

/// What guidance asks the throttle to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleCommand {
    Stop,
    Forward(SpeedClass),
    Reverse(SpeedClass),
}

/// Drive state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveState {
    Neutral,
    Forward,
    /// Neutral dwell before reverse is engaged
    PreReverse,
    Reverse,
}

impl DriveState {
    /// Code persisted in the record
    pub fn code(self) -> u8 {
        match self {
            DriveState::Neutral => 0,
            DriveState::Forward => 1,
            DriveState::PreReverse => 2,
            DriveState::Reverse => 3,
        }
    }
}

impl MobilityConfig {
    /// Throttle pulse width for a command's steady state
    pub fn throttle_pulse(&self, command: ThrottleCommand) -> u16 {
        let pick = |table: &crate::SpeedTable, class: SpeedClass| match class {
            SpeedClass::Creep => table.creep_us,
            SpeedClass::Cruise => table.cruise_us,
            SpeedClass::Ludicrous => table.ludicrous_us,
        };
        match command {
            ThrottleCommand::Stop => self.throttle_neutral_us,
            ThrottleCommand::Forward(class) => pick(&self.forward, class),
            ThrottleCommand::Reverse(class) => pick(&self.reverse, class),
        }
    }
}

/// Ramp-limited throttle and clamped steering.
///
/// Each method is called at most once per cycle; ramp steps are per call.
#[derive(Debug, Clone)]
pub struct DriveController {
    config: MobilityConfig,
    state: DriveState,
    throttle_us: u16,
    steering_us: u16,
    hold_cycles: u16,
}

impl DriveController {
    pub fn new(config: MobilityConfig) -> Self {
        Self {
            state: DriveState::Neutral,
            throttle_us: config.throttle_neutral_us,
            steering_us: config.steering_neutral_us,
            hold_cycles: 0,
            config,
        }
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn throttle_us(&self) -> u16 {
        self.throttle_us
    }

    pub fn steering_us(&self) -> u16 {
        self.steering_us
    }

    pub fn config(&self) -> &MobilityConfig {
        &self.config
    }

    /// Jump straight to a forward speed
    pub fn drive_forward(&mut self, class: SpeedClass) {
        self.throttle_us = self.config.throttle_pulse(ThrottleCommand::Forward(class));
        self.set_state(DriveState::Forward);
    }

    /// Step throttle toward neutral; lands in `Neutral` once within one step
    pub fn stop(&mut self) {
        let neutral = i32::from(self.config.throttle_neutral_us);
        let throttle = i32::from(self.throttle_us);
        let step = if throttle > neutral {
            i32::from(self.config.stop_step_forward_us)
        } else {
            i32::from(self.config.stop_step_reverse_us)
        };

        if (throttle - neutral).abs() <= step {
            self.throttle_us = self.config.throttle_neutral_us;
            self.set_state(DriveState::Neutral);
        } else {
            self.throttle_us = to_pulse(throttle - step * (throttle - neutral).signum());
        }
    }

    /// Work toward reverse at `class`: leave forward, dwell, then ramp
    pub fn drive_reverse(&mut self, class: SpeedClass) {
        let target = self.config.throttle_pulse(ThrottleCommand::Reverse(class));
        match self.state {
            DriveState::Forward => self.stop(),
            DriveState::Neutral => {
                self.hold_cycles = 0;
                self.throttle_us = self.config.pre_reverse_us;
                self.set_state(DriveState::PreReverse);
            }
            DriveState::PreReverse => {
                self.hold_cycles += 1;
                self.throttle_us = self.config.pre_reverse_us;
                if self.hold_cycles >= self.config.pre_reverse_hold_cycles {
                    self.throttle_us = self.config.throttle_neutral_us;
                    self.set_state(DriveState::Reverse);
                    self.ramp_reverse(target);
                }
            }
            DriveState::Reverse => self.ramp_reverse(target),
        }
    }

    /// Dispatch a guidance command
    pub fn apply(&mut self, command: ThrottleCommand) {
        match command {
            ThrottleCommand::Stop => self.stop(),
            ThrottleCommand::Forward(class) => self.drive_forward(class),
            ThrottleCommand::Reverse(class) => self.drive_reverse(class),
        }
    }

    /// Convert a bearing error (radians) to a steering pulse within travel
    /// limits. Non-finite input steers neutral.
    pub fn steer_to(&mut self, angle_rad: f32) -> u16 {
        let c = &self.config;
        let neutral = f32::from(c.steering_neutral_us);
        let gain = c.steering_gain_us_per_deg;

        self.steering_us = if angle_rad.is_finite() && gain > 0.0 {
            // Positive bearing error lowers the pulse.
            let left_limit_deg = (neutral - f32::from(c.steering_max_us)) / gain;
            let right_limit_deg = (neutral - f32::from(c.steering_min_us)) / gain;
            let degrees = angle_rad.to_degrees().clamp(left_limit_deg, right_limit_deg);
            let pulse = (neutral - degrees * gain).round();
            (pulse as u16).clamp(c.steering_min_us, c.steering_max_us)
        } else {
            c.steering_neutral_us
        };
        self.steering_us
    }

    /// Center steering and cut throttle to neutral immediately
    pub fn neutral(&mut self) {
        self.steering_us = self.config.steering_neutral_us;
        self.throttle_us = self.config.throttle_neutral_us;
        self.set_state(DriveState::Neutral);
    }

    /// Snapshot for the record
    pub fn actuator_state(&self) -> ActuatorState {
        ActuatorState {
            steering_us: self.steering_us,
            throttle_us: self.throttle_us,
            drive_state: self.state.code(),
        }
    }

    fn ramp_reverse(&mut self, target: u16) {
        if target >= self.throttle_us {
            // Slowing down (or holding) in reverse takes effect at once.
            self.throttle_us = target;
        } else {
            let step = self.config.reverse_ramp_step_us;
            self.throttle_us = self.throttle_us.saturating_sub(step).max(target);
        }
    }

    fn set_state(&mut self, state: DriveState) {
        if state != self.state {
            debug!("Drive state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

fn to_pulse(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}
