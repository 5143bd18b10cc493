//! Local planar projection

use serde::{Deserialize, Serialize};

const WGS84_SEMI_MAJOR_M: f64 = 6_378_137.0;
const WGS84_ECCENTRICITY_SQ: f64 = 6.694_379_990_14e-3;

/// Reference point of the local frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Reference latitude (degrees, north positive)
    pub reference_latitude_deg: f64,
    /// Reference longitude (degrees, east positive)
    pub reference_longitude_deg: f64,
    /// Rotation of the local Y axis from true north (degrees, clockwise)
    pub reference_heading_deg: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        // Course starting line
        Self {
            reference_latitude_deg: 40.071_375,
            reference_longitude_deg: -105.229_789,
            reference_heading_deg: 0.0,
        }
    }
}

/// Equirectangular projection about a fixed reference point.
///
/// X points east and Y north (before the reference heading rotation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    ref_lat_rad: f64,
    ref_lon_rad: f64,
    /// Meters per radian of latitude (meridional radius)
    north_scale: f64,
    /// Meters per radian of longitude at the reference latitude
    east_scale: f64,
    heading_sin: f64,
    heading_cos: f64,
}

impl LocalProjection {
    pub fn new(config: &ProjectionConfig) -> Self {
        let ref_lat_rad = config.reference_latitude_deg.to_radians();
        let sin_sq = ref_lat_rad.sin().powi(2);
        let denom = 1.0 - WGS84_ECCENTRICITY_SQ * sin_sq;
        let prime_vertical = WGS84_SEMI_MAJOR_M / denom.sqrt();
        let meridional = WGS84_SEMI_MAJOR_M * (1.0 - WGS84_ECCENTRICITY_SQ) / denom.powf(1.5);
        let heading = config.reference_heading_deg.to_radians();

        Self {
            ref_lat_rad,
            ref_lon_rad: config.reference_longitude_deg.to_radians(),
            north_scale: meridional,
            east_scale: prime_vertical * ref_lat_rad.cos(),
            heading_sin: heading.sin(),
            heading_cos: heading.cos(),
        }
    }

    /// Project signed decimal degrees to local (x, y) meters
    pub fn project(&self, latitude_deg: f64, longitude_deg: f64) -> (f32, f32) {
        let north = (latitude_deg.to_radians() - self.ref_lat_rad) * self.north_scale;
        let east = (longitude_deg.to_radians() - self.ref_lon_rad) * self.east_scale;

        let y = north * self.heading_cos + east * self.heading_sin;
        let x = -north * self.heading_sin + east * self.heading_cos;
        (x as f32, y as f32)
    }

    /// Local (x, y) meters back to signed decimal degrees
    pub fn unproject(&self, x: f32, y: f32) -> (f64, f64) {
        let (x, y) = (f64::from(x), f64::from(y));
        let north = y * self.heading_cos - x * self.heading_sin;
        let east = y * self.heading_sin + x * self.heading_cos;
        (
            (self.ref_lat_rad + north / self.north_scale).to_degrees(),
            (self.ref_lon_rad + east / self.east_scale).to_degrees(),
        )
    }
}

impl Default for LocalProjection {
    fn default() -> Self {
        Self::new(&ProjectionConfig::default())
    }
}
