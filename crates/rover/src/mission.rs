//! Mission timing gate and operator start signal

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Actuators stay neutral until this long after power-up
    pub start_delay_s: f32,
    /// Hard time limit; the vehicle is brought to a stop after it
    pub stop_time_s: f32,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            start_delay_s: 5.0,
            stop_time_s: 120.0,
        }
    }
}

/// What the control law may do this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionPhase {
    /// Start delay running or operator has not started the mission
    Holding,
    Running,
    /// Time limit passed
    Finished,
}

/// Operator start button, latched by its interrupt
#[derive(Debug, Default)]
pub struct StartSignal(AtomicBool);

impl StartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt context
    pub fn press(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Mission window measured in cycles since power-up
#[derive(Debug, Clone, Copy)]
pub struct MissionGate {
    start_cycle: u32,
    stop_cycle: u32,
}

impl MissionGate {
    pub fn new(config: &MissionConfig, loop_hz: f32) -> Self {
        let cycles = |seconds: f32| (seconds * loop_hz).round().max(0.0) as u32;
        Self {
            start_cycle: cycles(config.start_delay_s),
            stop_cycle: cycles(config.stop_time_s),
        }
    }

    pub fn phase(&self, loop_counter: u32, started: bool) -> MissionPhase {
        if loop_counter > self.stop_cycle {
            MissionPhase::Finished
        } else if loop_counter < self.start_cycle || !started {
            MissionPhase::Holding
        } else {
            MissionPhase::Running
        }
    }
}
