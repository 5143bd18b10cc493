//! Priority-fusion pose estimator
//!
//! A valid GGA fix overrides everything. Without one, encoder ticks are
//! integrated along the compass heading. With neither, the pose is held.

use serde::{Deserialize, Serialize};
use telemetry::{status, Pose, SharedRecord};
use tracing::debug;

/// Odometry scale and start pose
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Distance travelled per encoder tick
    pub meters_per_tick: f32,
    pub initial_x: f32,
    pub initial_y: f32,
    pub initial_heading_deg: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            meters_per_tick: 0.000_187_987_6,
            initial_x: 0.0,
            initial_y: 0.0,
            initial_heading_deg: 0.0,
        }
    }
}

/// Which source moved the pose this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseSource {
    Gps,
    Odometry,
    Held,
}

pub struct StateEstimator {
    config: EstimatorConfig,
    pose: Pose,
}

impl StateEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let pose = Self::initial_pose(&config);
        Self { config, pose }
    }

    fn initial_pose(config: &EstimatorConfig) -> Pose {
        Pose {
            x: config.initial_x,
            y: config.initial_y,
            heading: config.initial_heading_deg.to_radians(),
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Fuse this cycle's acquisitions into the pose and publish it.
    ///
    /// Until `started` the position is pinned to the configured start point.
    pub fn update(&mut self, record: &mut SharedRecord, started: bool) -> PoseSource {
        if record.has(status::COMPASS_VALID) {
            self.pose.heading = record.compass.radians;
        }

        let source = if !started {
            let initial = Self::initial_pose(&self.config);
            self.pose.x = initial.x;
            self.pose.y = initial.y;
            PoseSource::Held
        } else if record.has(status::GPS_GGA_VALID) {
            self.pose.x = record.gps.local_x;
            self.pose.y = record.gps.local_y;
            PoseSource::Gps
        } else if record.has(status::ENCODER_VALID) && record.encoder.valid {
            let distance = f32::from(record.encoder.ticks) * self.config.meters_per_tick;
            self.pose.x += self.pose.heading.cos() * distance;
            self.pose.y += self.pose.heading.sin() * distance;
            PoseSource::Odometry
        } else {
            PoseSource::Held
        };

        debug!(
            "Pose ({:.2}, {:.2}) heading {:.3} from {:?}",
            self.pose.x, self.pose.y, self.pose.heading, source
        );
        record.pose = self.pose;
        source
    }
}
