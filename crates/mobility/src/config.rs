//! Mobility configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MobilityError {
    #[error("Steering limits out of order: {min} <= {neutral} <= {max} violated")]
    SteeringLimits { min: u16, neutral: u16, max: u16 },

    #[error("Steering gain must be positive")]
    SteeringGain,

    #[error("{0} ramp step must be non-zero")]
    ZeroStep(&'static str),

    #[error("Timer resolution must be non-zero")]
    ZeroTimerResolution,
}

/// Pulse widths (µs) for each speed class in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedTable {
    pub creep_us: u16,
    pub cruise_us: u16,
    pub ludicrous_us: u16,
}

/// Actuator calibration and ramp rates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilityConfig {
    pub steering_neutral_us: u16,
    /// Travel limit reached by positive bearing errors
    pub steering_min_us: u16,
    /// Travel limit reached by negative bearing errors
    pub steering_max_us: u16,
    /// Steering pulse change per degree of bearing error (500 µs / 180°)
    pub steering_gain_us_per_deg: f32,

    pub throttle_neutral_us: u16,
    pub forward: SpeedTable,
    pub reverse: SpeedTable,

    /// Per-cycle step when stopping from forward
    pub stop_step_forward_us: u16,
    /// Per-cycle step when stopping from reverse
    pub stop_step_reverse_us: u16,
    /// Per-cycle step when speeding up in reverse
    pub reverse_ramp_step_us: u16,

    /// Throttle pulse held before reverse is accepted
    pub pre_reverse_us: u16,
    pub pre_reverse_hold_cycles: u16,

    /// Compare-timer resolution (16 MHz / 64 = 4 µs per tick)
    pub us_per_timer_tick: u16,
    /// Neutral pulses sent at power-up to satisfy throttle-neutral protection
    pub startup_neutral_pulses: u16,
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            steering_neutral_us: 1550,
            steering_min_us: 1000,
            steering_max_us: 2000,
            steering_gain_us_per_deg: 500.0 / 180.0,
            throttle_neutral_us: 1500,
            forward: SpeedTable {
                creep_us: 1600,
                cruise_us: 1800,
                ludicrous_us: 2000,
            },
            reverse: SpeedTable {
                creep_us: 1400,
                cruise_us: 1200,
                ludicrous_us: 1100,
            },
            stop_step_forward_us: 100,
            stop_step_reverse_us: 50,
            reverse_ramp_step_us: 25,
            pre_reverse_us: 1500,
            pre_reverse_hold_cycles: 10,
            us_per_timer_tick: 4,
            startup_neutral_pulses: 200,
        }
    }
}

impl MobilityConfig {
    pub fn validate(&self) -> Result<(), MobilityError> {
        if !(self.steering_min_us <= self.steering_neutral_us
            && self.steering_neutral_us <= self.steering_max_us)
        {
            return Err(MobilityError::SteeringLimits {
                min: self.steering_min_us,
                neutral: self.steering_neutral_us,
                max: self.steering_max_us,
            });
        }
        if !(self.steering_gain_us_per_deg > 0.0) {
            return Err(MobilityError::SteeringGain);
        }
        if self.stop_step_forward_us == 0 {
            return Err(MobilityError::ZeroStep("Forward stop"));
        }
        if self.stop_step_reverse_us == 0 {
            return Err(MobilityError::ZeroStep("Reverse stop"));
        }
        if self.reverse_ramp_step_us == 0 {
            return Err(MobilityError::ZeroStep("Reverse ramp"));
        }
        if self.us_per_timer_tick == 0 {
            return Err(MobilityError::ZeroTimerResolution);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MobilityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_steering_rejected() {
        let config = MobilityConfig {
            steering_min_us: 2000,
            steering_max_us: 1000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MobilityError::SteeringLimits { .. })));
    }

    #[test]
    fn test_zero_step_rejected() {
        let config = MobilityConfig { stop_step_reverse_us: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(MobilityError::ZeroStep("Reverse stop")));
    }
}
