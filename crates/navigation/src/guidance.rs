//! Waypoint guidance law

use crate::{Vec2, Waypoint, TERMINAL_WAYPOINT};
use mobility::ThrottleCommand;
use telemetry::{status, SharedRecord};
use tracing::info;

/// Guidance targets for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceOutput {
    pub throttle: ThrottleCommand,
    /// Signed bearing error to the active waypoint (radians)
    pub target_angle: f32,
    /// One or more gates were crossed this cycle
    pub advanced: bool,
}

/// Walks a waypoint table, retiring each waypoint once its gate is crossed
#[derive(Debug, Clone)]
pub struct WaypointGuidance<'a> {
    table: &'a [Waypoint],
    index: usize,
}

impl<'a> WaypointGuidance<'a> {
    pub fn new(table: &'a [Waypoint]) -> Self {
        Self { table, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Entries in the table, not counting the terminal waypoint
    pub fn waypoint_count(&self) -> usize {
        self.table.len()
    }

    /// Past the last table entry
    pub fn is_terminal(&self) -> bool {
        self.index >= self.table.len()
    }

    /// Active waypoint, or the terminal one past the table end
    pub fn current(&self) -> Waypoint {
        self.table.get(self.index).copied().unwrap_or(TERMINAL_WAYPOINT)
    }

    /// The active gate has been crossed. The terminal waypoint never is.
    pub fn boundary_crossed(&self, position: Vec2) -> bool {
        !self.is_terminal() && self.current().boundary_crossed(position)
    }

    /// Skip every waypoint whose gate lies behind `position`
    pub fn advance(&mut self, position: Vec2) -> bool {
        let start = self.index;
        while self.boundary_crossed(position) {
            self.index += 1;
        }
        self.index != start
    }

    /// Signed bearing error from `heading` to the active waypoint
    pub fn target_angle(&self, position: Vec2, heading: f32) -> f32 {
        let to_waypoint = self.current().position - position;
        let length = to_waypoint.length();
        if length == 0.0 {
            return 0.0;
        }
        let sine = Vec2::from_angle(heading).cross(to_waypoint) / length;
        sine.clamp(-1.0, 1.0).asin()
    }

    /// Advance on the record's pose and publish the new targets
    pub fn update(&mut self, record: &mut SharedRecord) -> GuidanceOutput {
        let position = Vec2::new(record.pose.x, record.pose.y);
        let advanced = self.advance(position);
        if advanced {
            if self.is_terminal() {
                info!("Final waypoint gate crossed; holding terminal waypoint");
            } else {
                info!("Advanced to waypoint {}", self.index);
            }
            record.raise(status::WAYPOINT_ADVANCED);
        }

        let target_angle = self.target_angle(position, record.pose.heading);
        record.guidance.waypoint_index = u16::try_from(self.index).unwrap_or(u16::MAX);
        record.guidance.target_angle = target_angle;

        GuidanceOutput {
            throttle: self.current().throttle,
            target_angle,
            advanced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WAYPOINTS;
    use mobility::SpeedClass;
    use std::f32::consts::FRAC_PI_2;

    fn gate(y: f32) -> Waypoint {
        Waypoint {
            throttle: ThrottleCommand::Forward(SpeedClass::Creep),
            position: Vec2::new(0.0, y + 5.0),
            boundary_point: Vec2::new(0.0, y),
            boundary_normal: Vec2::new(0.0, -1.0),
            trust_weight: 1.0,
        }
    }

    #[test]
    fn test_advance_skips_all_crossed_gates() {
        let table = [gate(10.0), gate(20.0), gate(30.0)];
        let mut guidance = WaypointGuidance::new(&table);

        assert!(!guidance.advance(Vec2::new(0.0, 5.0)));
        assert_eq!(guidance.index(), 0);

        assert!(guidance.advance(Vec2::new(0.0, 25.0)));
        assert_eq!(guidance.index(), 2);
    }

    #[test]
    fn test_advance_clamps_at_terminal() {
        let table = [gate(10.0)];
        let mut guidance = WaypointGuidance::new(&table);
        assert!(guidance.advance(Vec2::new(0.0, 100.0)));
        assert!(guidance.is_terminal());
        assert_eq!(guidance.current(), TERMINAL_WAYPOINT);

        assert!(!guidance.advance(Vec2::new(0.0, -100.0)));
        assert!(!guidance.boundary_crossed(Vec2::new(0.0, -100.0)));
        assert_eq!(guidance.current().throttle, ThrottleCommand::Stop);
    }

    #[test]
    fn test_target_angle_sign() {
        let table = [gate(10.0)];
        let guidance = WaypointGuidance::new(&table);
        let origin = Vec2::new(0.0, 0.0);

        // Waypoint straight ahead.
        assert!(guidance.target_angle(origin, FRAC_PI_2).abs() < 1e-6);
        // Heading east, waypoint to the north: counter-clockwise.
        assert!((guidance.target_angle(origin, 0.0) - FRAC_PI_2).abs() < 1e-6);
        // Heading west: clockwise.
        assert!((guidance.target_angle(origin, std::f32::consts::PI) + FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_target_angle_at_waypoint_is_zero() {
        let table = [gate(10.0)];
        let guidance = WaypointGuidance::new(&table);
        assert_eq!(guidance.target_angle(Vec2::new(0.0, 15.0), 1.0), 0.0);
    }

    #[test]
    fn test_update_writes_record() {
        let mut guidance = WaypointGuidance::new(&WAYPOINTS);
        let mut record = SharedRecord::new();
        record.pose.x = 21.0;

        let output = guidance.update(&mut record);
        assert!(output.advanced);
        assert!(record.has(status::WAYPOINT_ADVANCED));
        assert_eq!(record.guidance.waypoint_index, 1);
        assert_eq!(output.throttle, ThrottleCommand::Forward(SpeedClass::Cruise));
    }
}
