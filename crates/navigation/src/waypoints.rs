//! Course waypoint table

use crate::Vec2;
use mobility::{SpeedClass, ThrottleCommand};

/// One course waypoint and the gate line that retires it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub throttle: ThrottleCommand,
    /// Steering target
    pub position: Vec2,
    /// A point on the gate line
    pub boundary_point: Vec2,
    /// Gate normal, pointing back toward the approach side
    pub boundary_normal: Vec2,
    /// Weight given to encoder odometry on this leg
    pub trust_weight: f32,
}

impl Waypoint {
    const fn cruise(position: Vec2, boundary_point: Vec2, boundary_normal: Vec2) -> Self {
        Self {
            throttle: ThrottleCommand::Forward(SpeedClass::Cruise),
            position,
            boundary_point,
            boundary_normal,
            trust_weight: 1.0,
        }
    }

    /// The vehicle is on the far side of this waypoint's gate line
    pub fn boundary_crossed(&self, position: Vec2) -> bool {
        self.boundary_normal.dot(position - self.boundary_point) < 0.0
    }
}

/// Synthesized past the end of the table: stop, with a gate that never trips
pub const TERMINAL_WAYPOINT: Waypoint = Waypoint {
    throttle: ThrottleCommand::Stop,
    position: Vec2::new(0.0, 0.0),
    boundary_point: Vec2::new(0.0, 0.0),
    boundary_normal: Vec2::new(1.0, 0.0),
    trust_weight: 1.0,
};

/// The course, in the local frame of the reference point.
///
/// Gate normals are the surveyed gate-line directions turned a quarter
/// turn clockwise.
pub static WAYPOINTS: [Waypoint; 9] = [
    Waypoint::cruise(Vec2::new(37.50, 0.80), Vec2::new(20.50, 12.50), Vec2::new(-0.99996, -0.00930)),
    Waypoint::cruise(Vec2::new(39.10, 12.10), Vec2::new(25.10, 11.30), Vec2::new(-1.00000, 0.00000)),
    Waypoint::cruise(Vec2::new(36.50, 40.10), Vec2::new(20.10, 9.20), Vec2::new(-0.01507, -0.99989)),
    Waypoint::cruise(Vec2::new(35.00, 61.90), Vec2::new(20.10, 50.00), Vec2::new(0.00000, -1.00000)),
    Waypoint::cruise(Vec2::new(30.00, 69.90), Vec2::new(20.10, 60.00), Vec2::new(0.00000, -1.00000)),
    Waypoint::cruise(Vec2::new(10.00, 64.70), Vec2::new(20.10, 60.00), Vec2::new(0.71065, -0.70354)),
    Waypoint::cruise(Vec2::new(-39.80, 64.50), Vec2::new(-26.10, 60.00), Vec2::new(0.99995, -0.01000)),
    Waypoint::cruise(Vec2::new(-35.30, -9.50), Vec2::new(-25.10, 10.00), Vec2::new(0.00000, 1.00000)),
    Waypoint::cruise(Vec2::new(37.50, 0.80), Vec2::new(0.50, 12.50), Vec2::new(-0.99996, -0.00930)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_scenario() {
        let waypoint = Waypoint {
            boundary_point: Vec2::new(0.0, 10.0),
            boundary_normal: Vec2::new(0.0, -1.0),
            ..TERMINAL_WAYPOINT
        };
        assert!(waypoint.boundary_crossed(Vec2::new(0.0, 15.0)));
        assert!(!waypoint.boundary_crossed(Vec2::new(0.0, 5.0)));
    }

    #[test]
    fn test_on_the_line_is_not_crossed() {
        let waypoint = WAYPOINTS[1];
        assert!(!waypoint.boundary_crossed(waypoint.boundary_point));
    }

    #[test]
    fn test_course_start_keeps_first_waypoint() {
        assert!(!WAYPOINTS[0].boundary_crossed(Vec2::new(0.0, 0.0)));
        assert!(WAYPOINTS[0].boundary_crossed(Vec2::new(21.0, 0.0)));
        assert!(WAYPOINTS[7].boundary_crossed(Vec2::new(-30.0, 5.0)));
    }

    #[test]
    fn test_table_normals_are_unit() {
        for waypoint in WAYPOINTS.iter() {
            assert!((waypoint.boundary_normal.length() - 1.0).abs() < 1e-3);
            assert_eq!(waypoint.throttle, ThrottleCommand::Forward(SpeedClass::Cruise));
        }
    }
}
