//! Navigation
//!
//! Dead-reckoning pose estimation and waypoint guidance over a fixed,
//! build-time waypoint table.

mod estimator;
mod geometry;
mod guidance;
mod waypoints;

pub use estimator::{EstimatorConfig, PoseSource, StateEstimator};
pub use geometry::Vec2;
pub use guidance::{GuidanceOutput, WaypointGuidance};
pub use waypoints::{Waypoint, TERMINAL_WAYPOINT, WAYPOINTS};
